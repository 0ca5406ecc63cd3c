//! Event handling shared by the mesh and ICN sides of the bridge.
//!
//! [`BridgeCore`] owns the forwarding table and the name mapper. It is driven
//! by a single dispatcher so the two never see concurrent mutation.

use icn_gateway_common::{
    frame::{SensorFrame, MAX_CONTENT_NAME_LEN},
    metrics::GatewayMetrics,
    name::depth,
    MeshAddress, NameMapper,
    SignalCode,
};
use icn_gateway_fib::{FibEntry, ForwardingTable, NextHops};
use icn_gateway_icn::{IcnChannel, IcnInterest, PublishOptions};
use icn_gateway_mesh::{MeshSink, RxPacket};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::config::RouteConfig;

/// Work items delivered to the dispatcher
#[derive(Debug)]
pub enum BridgeEvent {
    /// A packet reported by the mesh radio
    MeshPacket(RxPacket),

    /// An Interest delivered by the ICN daemon
    Interest(IcnInterest),

    /// Request for a copy of the forwarding table
    DumpRoutes(oneshot::Sender<Vec<(String, FibEntry)>>),
}

/// Result of handling a mesh packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Reading published under the contained unique name
    Published(String),
    /// Frame decoded but its signal code is not acted on
    Ignored(SignalCode),
    /// Frame failed length or field validation
    Malformed,
    /// The ICN channel rejected the publication of the contained name
    PublishFailed(String),
}

/// Result of handling an ICN Interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterestOutcome {
    /// No FIB entry matched the logical name
    NoRoute(String),
    /// The logical name cannot be carried in a sensor frame
    Unencodable(String),
    /// The Interest frame went out to `sent` next hops; `failed` sends errored
    Forwarded {
        name: String,
        sent: usize,
        failed: usize,
    },
}

/// Bridge state and the two event handlers
pub struct BridgeCore {
    fib: ForwardingTable,
    names: NameMapper,
    publish_options: PublishOptions,
    icn: Arc<dyn IcnChannel>,
    mesh: Arc<dyn MeshSink>,
    metrics: Arc<GatewayMetrics>,
}

impl BridgeCore {
    pub fn new(
        fib: ForwardingTable,
        publish_options: PublishOptions,
        icn: Arc<dyn IcnChannel>,
        mesh: Arc<dyn MeshSink>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            fib,
            names: NameMapper::new(),
            publish_options,
            icn,
            mesh,
            metrics,
        }
    }

    /// Install static routes into the forwarding table
    pub fn install_routes(&mut self, routes: &[RouteConfig]) -> anyhow::Result<()> {
        for route in routes {
            if route.next_hops.is_empty() {
                warn!("Skipping route {} without next hops", route.prefix);
                continue;
            }

            let hops: NextHops = route.next_hops.iter().cloned().collect();
            if route.is_virtual {
                self.fib.save_virtual(&route.prefix, hops)?;
            } else {
                self.fib.save(&route.prefix, hops)?;
            }
            info!(
                "Installed {} route {} -> {:?}",
                if route.is_virtual { "virtual" } else { "static" },
                route.prefix,
                route.next_hops
            );
        }

        self.metrics.fib_size.set(self.fib.len() as u64);
        Ok(())
    }

    /// Handle one event
    pub async fn handle(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::MeshPacket(packet) => {
                self.on_mesh_packet(packet).await;
            }
            BridgeEvent::Interest(interest) => {
                self.on_icn_interest(&interest).await;
            }
            BridgeEvent::DumpRoutes(reply) => {
                let routes = self
                    .fib
                    .entries()
                    .map(|(prefix, entry)| (prefix.to_string(), entry.clone()))
                    .collect();
                let _ = reply.send(routes);
            }
        }
    }

    /// Validate a packet from the radio and handle the frame it carries
    pub async fn on_mesh_packet(&mut self, packet: RxPacket) -> FrameOutcome {
        self.metrics.frames_received.increment();

        if packet.declared_len != packet.payload.len() {
            debug!(
                "Frame from {} announced {} bytes but carried {}",
                packet.source,
                packet.declared_len,
                packet.payload.len()
            );
        }

        match SensorFrame::decode(&packet.payload) {
            Ok(frame) => self.on_sensor_frame(&packet.source, &frame).await,
            Err(e) => {
                warn!("Dropping frame from {}: {}", packet.source, e);
                self.metrics.frames_malformed.increment();
                FrameOutcome::Malformed
            }
        }
    }

    /// Learn the sender's route and publish a DATA reading
    pub async fn on_sensor_frame(&mut self, source: &MeshAddress, frame: &SensorFrame) -> FrameOutcome {
        if frame.signal_code != SignalCode::Data {
            info!(
                "Ignoring {} frame for {} from {}",
                frame.signal_code, frame.content_name, source
            );
            self.metrics.frames_ignored.increment();
            return FrameOutcome::Ignored(frame.signal_code);
        }

        debug!(
            "DATA frame from {}: {} (hop {}, {} bytes)",
            source,
            frame.content_name,
            frame.hop_count,
            frame.content.len()
        );

        if depth(&frame.content_name) > 0 {
            let hops: NextHops = std::iter::once(source.clone()).collect();
            if let Err(e) = self.fib.save(&frame.content_name, hops) {
                warn!("Failed to learn route for {}: {}", frame.content_name, e);
            }
            self.metrics.fib_size.set(self.fib.len() as u64);
        }

        let unique_name = self.names.add_timestamp(&frame.content_name);
        match self
            .icn
            .publish(&unique_name, &frame.content, &self.publish_options)
            .await
        {
            Ok(()) => {
                info!("Published {} ({} bytes)", unique_name, frame.content.len());
                self.metrics.data_published.increment();
                FrameOutcome::Published(unique_name)
            }
            Err(e) => {
                error!("Failed to publish {}: {}", unique_name, e);
                self.metrics.publish_failures.increment();
                FrameOutcome::PublishFailed(unique_name)
            }
        }
    }

    /// Resolve an Interest to next hops and forward it into the mesh
    pub async fn on_icn_interest(&mut self, interest: &IcnInterest) -> InterestOutcome {
        self.metrics.interests_received.increment();

        let logical_name = self.names.remove_timestamp(&interest.name);
        let next_hops = self.fib.lookup(&logical_name);
        if next_hops.is_empty() {
            info!("No route for {} (Interest {})", logical_name, interest.name);
            self.metrics.interests_unrouted.increment();
            return InterestOutcome::NoRoute(logical_name);
        }

        let wire_name = fit_content_name(&logical_name);
        if wire_name.len() < logical_name.len() {
            debug!("Truncated Interest name {} to {}", logical_name, wire_name);
        }
        let frame = match SensorFrame::interest(wire_name).encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Cannot forward Interest {}: {}", logical_name, e);
                self.metrics.forward_failures.increment();
                return InterestOutcome::Unencodable(logical_name);
            }
        };

        let mut sent = 0;
        let mut failed = 0;
        for hop in &next_hops {
            match self.mesh.send_frame(hop, &frame).await {
                Ok(()) => {
                    info!("Forwarded Interest {} to {}", logical_name, hop);
                    self.metrics.interests_forwarded.increment();
                    sent += 1;
                }
                Err(e) => {
                    warn!("Failed to forward Interest {} to {}: {}", logical_name, hop, e);
                    self.metrics.forward_failures.increment();
                    failed += 1;
                }
            }
        }

        InterestOutcome::Forwarded {
            name: logical_name,
            sent,
            failed,
        }
    }

    pub fn fib(&self) -> &ForwardingTable {
        &self.fib
    }
}

/// Longest prefix of `name` that fits the frame's content-name field
fn fit_content_name(name: &str) -> &str {
    if name.len() <= MAX_CONTENT_NAME_LEN {
        return name;
    }
    let mut end = MAX_CONTENT_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use icn_gateway_common::{frame::FRAME_LEN, Error, Result};
    use icn_gateway_icn::LoopbackIcnChannel;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    /// Mesh sink that records frames and fails for selected addresses
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(MeshAddress, Vec<u8>)>>,
        unreachable: HashSet<String>,
    }

    #[async_trait]
    impl MeshSink for RecordingSink {
        async fn send_frame(&self, dest: &MeshAddress, frame: &[u8]) -> Result<()> {
            if self.unreachable.contains(dest.as_str()) {
                return Err(Error::Transport(format!("{} unreachable", dest)));
            }
            self.sent.lock().await.push((dest.clone(), frame.to_vec()));
            Ok(())
        }
    }

    fn addr(s: &str) -> MeshAddress {
        MeshAddress::new(s).unwrap()
    }

    fn core_with(sink: Arc<RecordingSink>) -> (BridgeCore, Arc<LoopbackIcnChannel>) {
        let icn = Arc::new(LoopbackIcnChannel::new());
        let core = BridgeCore::new(
            ForwardingTable::default(),
            PublishOptions::default(),
            icn.clone(),
            sink,
            Arc::new(GatewayMetrics::new()),
        );
        (core, icn)
    }

    fn data_packet(source: &str, name: &str, content: &str) -> RxPacket {
        let payload = SensorFrame::data(name, content.as_bytes().to_vec())
            .encode()
            .unwrap();
        RxPacket {
            source: addr(source),
            declared_len: payload.len(),
            payload,
        }
    }

    #[tokio::test]
    async fn test_data_frame_learns_route_and_publishes() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, icn) = core_with(sink);

        let outcome = core
            .on_mesh_packet(data_packet("AA:BB:CC:DD:EE:01", "/sensor/1/temp", "23.5"))
            .await;

        let name = match outcome {
            FrameOutcome::Published(name) => name,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(name.starts_with("/sensor/1/temp/"));
        assert!(name["/sensor/1/temp/".len()..].parse::<u64>().is_ok());

        let entry = core.fib().get("/sensor/1/temp").unwrap();
        assert!(!entry.is_virtual);
        assert_eq!(entry.next_hops, NextHops::from([addr("AA:BB:CC:DD:EE:01")]));

        let published = icn.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].name, name);
        assert_eq!(&published[0].payload[..], b"23.5");
    }

    #[tokio::test]
    async fn test_newer_source_replaces_route() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, _icn) = core_with(sink);

        core.on_mesh_packet(data_packet("node-a", "/s/1", "1")).await;
        core.on_mesh_packet(data_packet("node-b", "/s/1", "2")).await;

        let entry = core.fib().get("/s/1").unwrap();
        assert_eq!(entry.next_hops, NextHops::from([addr("node-b")]));
    }

    #[tokio::test]
    async fn test_malformed_and_ignored_frames() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, icn) = core_with(sink);

        let short = RxPacket {
            source: addr("node-a"),
            declared_len: 4,
            payload: Bytes::from_static(b"DATA"),
        };
        assert_eq!(core.on_mesh_packet(short).await, FrameOutcome::Malformed);

        let interest = SensorFrame::interest("/s/1").encode().unwrap();
        assert_eq!(interest.len(), FRAME_LEN);
        let outcome = core
            .on_mesh_packet(RxPacket {
                source: addr("node-a"),
                declared_len: FRAME_LEN,
                payload: interest,
            })
            .await;
        assert_eq!(outcome, FrameOutcome::Ignored(SignalCode::Interest));

        assert!(core.fib().is_empty());
        assert!(icn.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_learned_route() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, icn) = core_with(sink);
        icn.set_publish_failure(true);

        let outcome = core.on_mesh_packet(data_packet("node-a", "/s/1", "1")).await;
        assert!(matches!(outcome, FrameOutcome::PublishFailed(_)));
        assert!(core.fib().find("/s/1"));
    }

    #[tokio::test]
    async fn test_interest_forwarded_to_learned_source() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, _icn) = core_with(sink.clone());
        core.on_mesh_packet(data_packet("AA:BB:CC:DD:EE:01", "/sensor/1/temp", "23.5"))
            .await;

        let outcome = core
            .on_icn_interest(&IcnInterest::new("/sensor/1/temp/1234567890123"))
            .await;
        assert_eq!(
            outcome,
            InterestOutcome::Forwarded {
                name: "/sensor/1/temp".into(),
                sent: 1,
                failed: 0
            }
        );

        let sent = sink.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, addr("AA:BB:CC:DD:EE:01"));

        let frame = SensorFrame::decode(&sent[0].1).unwrap();
        assert_eq!(frame.signal_code, SignalCode::Interest);
        assert_eq!(frame.hop_count, 1);
        assert_eq!(frame.content_name, "/sensor/1/temp");
        assert_eq!(&frame.content[..], b"N/A");
    }

    #[tokio::test]
    async fn test_interest_without_route_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, _icn) = core_with(sink.clone());

        let outcome = core
            .on_icn_interest(&IcnInterest::new("/sensor/1/temp/1234567890123"))
            .await;
        assert_eq!(outcome, InterestOutcome::NoRoute("/sensor/1/temp".into()));
        assert!(sink.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_partial_forward_failure_continues() {
        let sink = Arc::new(RecordingSink {
            unreachable: ["node-b".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let (mut core, _icn) = core_with(sink.clone());
        core.install_routes(&[RouteConfig {
            prefix: "/zone".into(),
            next_hops: vec![addr("node-a"), addr("node-b"), addr("node-c")],
            is_virtual: false,
        }])
        .unwrap();

        let outcome = core.on_icn_interest(&IcnInterest::new("/zone/7")).await;
        assert_eq!(
            outcome,
            InterestOutcome::Forwarded {
                name: "/zone".into(),
                sent: 2,
                failed: 1
            }
        );
        let sent = sink.sent.lock().await;
        let dests: Vec<&str> = sent.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(dests, vec!["node-a", "node-c"]);
    }

    #[tokio::test]
    async fn test_virtual_route_window() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, _icn) = core_with(sink);
        core.install_routes(&[RouteConfig {
            prefix: "/farm".into(),
            next_hops: vec![addr("gw-1")],
            is_virtual: true,
        }])
        .unwrap();

        // Timestamp stripped: /farm/a/b/c has depth 4 = 1 + 3
        let outcome = core.on_icn_interest(&IcnInterest::new("/farm/a/b/c/99")).await;
        assert!(matches!(outcome, InterestOutcome::Forwarded { sent: 1, .. }));

        let outcome = core.on_icn_interest(&IcnInterest::new("/farm/a/b/c/d/99")).await;
        assert_eq!(outcome, InterestOutcome::NoRoute("/farm/a/b/c/d".into()));
    }

    #[tokio::test]
    async fn test_overlong_interest_name_is_truncated_and_forwarded() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, _icn) = core_with(sink.clone());
        core.install_routes(&[RouteConfig {
            prefix: "/long".into(),
            next_hops: vec![addr("node-a"), addr("node-b")],
            is_virtual: false,
        }])
        .unwrap();

        let logical = format!("/long/{}", "x".repeat(120));
        let outcome = core
            .on_icn_interest(&IcnInterest::new(format!("{}/1", logical)))
            .await;
        assert_eq!(
            outcome,
            InterestOutcome::Forwarded {
                name: logical.clone(),
                sent: 2,
                failed: 0
            }
        );

        let sent = sink.sent.lock().await;
        assert_eq!(sent.len(), 2);
        for (_, raw) in sent.iter() {
            let frame = SensorFrame::decode(raw).unwrap();
            assert_eq!(frame.content_name.len(), MAX_CONTENT_NAME_LEN);
            assert_eq!(frame.content_name, logical[..MAX_CONTENT_NAME_LEN]);
        }
    }

    #[tokio::test]
    async fn test_unencodable_interest_counts_as_failure() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, _icn) = core_with(sink.clone());
        core.install_routes(&[RouteConfig {
            prefix: "/café".into(),
            next_hops: vec![addr("node-a")],
            is_virtual: false,
        }])
        .unwrap();

        let outcome = core.on_icn_interest(&IcnInterest::new("/café/7")).await;
        assert_eq!(outcome, InterestOutcome::Unencodable("/café".into()));
        assert!(sink.sent.lock().await.is_empty());
        assert_eq!(core.metrics.snapshot().forward_failures, 1);
    }

    #[test]
    fn test_fit_content_name_respects_char_boundaries() {
        assert_eq!(fit_content_name("/a/b"), "/a/b");

        let name = format!("/{}é", "x".repeat(MAX_CONTENT_NAME_LEN - 2));
        assert_eq!(name.len(), MAX_CONTENT_NAME_LEN + 1);
        assert_eq!(fit_content_name(&name), &name[..MAX_CONTENT_NAME_LEN - 1]);
    }

    #[tokio::test]
    async fn test_dump_routes() {
        let sink = Arc::new(RecordingSink::default());
        let (mut core, _icn) = core_with(sink);
        core.on_mesh_packet(data_packet("node-a", "/s/1", "1")).await;

        let (reply, routes) = oneshot::channel();
        core.handle(BridgeEvent::DumpRoutes(reply)).await;
        let routes = routes.await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].0, "/s/1");
    }
}
