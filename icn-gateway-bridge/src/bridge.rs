//! Gateway lifecycle and task supervision.
//!
//! A running bridge consists of three tasks: a mesh source reading packets
//! from the radio, an ICN source receiving Interests from the daemon, and a
//! dispatcher that owns the [`BridgeCore`]. The sources feed the dispatcher
//! through one bounded queue; a shared cancellation token stops all three.

use anyhow::{anyhow, bail, Context, Result};
use icn_gateway_common::{
    metrics::{GatewayMetrics, MetricsSnapshot},
    Error,
};
use icn_gateway_fib::{FibEntry, ForwardingTable};
use icn_gateway_icn::{IcnChannel, TlvIcnChannel};
use icn_gateway_mesh::{MeshLink, MeshReader, MeshSink, MeshWriter};
use log::{debug, error, info, trace, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::handler::{BridgeCore, BridgeEvent};

/// Lifecycle state of a [`GatewayBridge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Stopped,
    Initializing,
    Running,
    Stopping,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            BridgeState::Stopped => "stopped",
            BridgeState::Initializing => "initializing",
            BridgeState::Running => "running",
            BridgeState::Stopping => "stopping",
        };
        f.write_str(state)
    }
}

/// Handles owned while the bridge is running
struct RunningBridge {
    cancel: CancellationToken,
    events: mpsc::Sender<BridgeEvent>,
    sources: Vec<(&'static str, JoinHandle<()>)>,
    dispatcher: JoinHandle<BridgeCore>,
    icn: Arc<dyn IcnChannel>,
    mesh: MeshWriter,
    registered: Vec<String>,
}

/// Edge gateway between the sensor mesh and the ICN daemon
pub struct GatewayBridge {
    config: GatewayConfig,
    state: watch::Sender<BridgeState>,
    metrics: Arc<GatewayMetrics>,
    running: Option<RunningBridge>,
}

impl GatewayBridge {
    /// Create a stopped bridge
    pub fn new(config: GatewayConfig) -> Self {
        let (state, _) = watch::channel(BridgeState::Stopped);
        Self {
            config,
            state,
            metrics: Arc::new(GatewayMetrics::new()),
            running: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Observe lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Open the configured mesh link and ICN daemon channel, then start
    pub async fn open(&mut self) -> Result<()> {
        self.ensure_stopped()?;
        self.set_state(BridgeState::Initializing);

        let opened = async {
            let endpoint = self.config.mesh_endpoint();
            let link = MeshLink::open(&endpoint, self.config.mesh_link_options())
                .await
                .map_err(|e| {
                    Error::Initialization(format!("cannot open mesh link {}: {}", endpoint, e))
                })?;

            let options = self.config.channel_options();
            let icn = TlvIcnChannel::connect(&options).await.map_err(|e| {
                Error::Initialization(format!(
                    "cannot reach ICN daemon at {}: {}",
                    options.address, e
                ))
            })?;

            Ok::<_, Error>((link, Arc::new(icn) as Arc<dyn IcnChannel>))
        }
        .await;

        match opened {
            Ok((link, icn)) => self.launch(link, icn).await,
            Err(e) => {
                error!("{}", e);
                self.set_state(BridgeState::Stopped);
                Err(e.into())
            }
        }
    }

    /// Start on an already-open mesh link and ICN channel
    pub async fn start(&mut self, link: MeshLink, icn: Arc<dyn IcnChannel>) -> Result<()> {
        self.ensure_stopped()?;
        self.set_state(BridgeState::Initializing);
        self.launch(link, icn).await
    }

    async fn launch(&mut self, link: MeshLink, icn: Arc<dyn IcnChannel>) -> Result<()> {
        let (reader, writer) = link.split();

        let mut registered = Vec::new();
        for prefix in &self.config.icn.register_prefixes {
            if let Err(e) = icn.register_name(prefix).await {
                error!("Failed to register {}: {}", prefix, e);
                withdraw(icn.as_ref(), &registered).await;
                release(icn.as_ref(), &writer).await;
                self.set_state(BridgeState::Stopped);
                return Err(anyhow::Error::new(e).context(format!("Failed to register prefix {}", prefix)));
            }
            info!("Registered prefix {}", prefix);
            registered.push(prefix.clone());
        }

        let fib = ForwardingTable::new(self.config.fib.capacity, self.config.fib.max_virtual_depth);
        let sink: Arc<dyn MeshSink> = Arc::new(writer.clone());
        let mut core = BridgeCore::new(
            fib,
            self.config.publish_options(),
            icn.clone(),
            sink,
            self.metrics.clone(),
        );
        if let Err(e) = core.install_routes(&self.config.fib.routes) {
            withdraw(icn.as_ref(), &registered).await;
            release(icn.as_ref(), &writer).await;
            self.set_state(BridgeState::Stopped);
            return Err(e.context("Failed to install static routes"));
        }

        let cancel = CancellationToken::new();
        let (events, inbox) = mpsc::channel(self.config.bridge.event_buffer.max(1));

        let sources = vec![
            (
                "mesh",
                tokio::spawn(run_mesh_source(
                    reader,
                    events.clone(),
                    cancel.clone(),
                    self.config.idle_sleep(),
                )),
            ),
            (
                "icn",
                tokio::spawn(run_icn_source(
                    icn.clone(),
                    events.clone(),
                    cancel.clone(),
                    self.config.receive_timeout(),
                )),
            ),
        ];
        let dispatcher = tokio::spawn(run_dispatcher(core, inbox, cancel.clone()));

        self.running = Some(RunningBridge {
            cancel,
            events,
            sources,
            dispatcher,
            icn,
            mesh: writer,
            registered,
        });
        self.set_state(BridgeState::Running);
        info!("Gateway bridge running");
        Ok(())
    }

    /// Copy of the forwarding table, most recently used first
    pub async fn routes(&self) -> Result<Vec<(String, FibEntry)>> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| anyhow!("bridge is {}", self.state()))?;

        let (reply, response) = oneshot::channel();
        running
            .events
            .send(BridgeEvent::DumpRoutes(reply))
            .await
            .map_err(|_| anyhow!("dispatcher has stopped"))?;
        response.await.context("dispatcher dropped the route request")
    }

    /// Stop the event sources and release the channels.
    ///
    /// Sources and the dispatcher are joined before any channel is closed,
    /// so no handler runs once shutdown has begun.
    pub async fn shutdown(&mut self) -> Result<MetricsSnapshot> {
        let Some(running) = self.running.take() else {
            bail!("bridge is {}", self.state());
        };

        self.set_state(BridgeState::Stopping);
        running.cancel.cancel();

        for (name, task) in running.sources {
            if let Err(e) = task.await {
                warn!("{} source task failed: {}", name, e);
            }
        }

        match running.dispatcher.await {
            Ok(core) => debug!("Dispatcher stopped with {} FIB entries", core.fib().len()),
            Err(e) => warn!("Dispatcher task failed: {}", e),
        }

        withdraw(running.icn.as_ref(), &running.registered).await;
        release(running.icn.as_ref(), &running.mesh).await;

        self.set_state(BridgeState::Stopped);
        let snapshot = self.metrics.snapshot();
        info!("Gateway bridge stopped: {}", snapshot);
        Ok(snapshot)
    }

    fn ensure_stopped(&self) -> Result<()> {
        match self.state() {
            BridgeState::Stopped => Ok(()),
            state => bail!("bridge is already {}", state),
        }
    }

    fn set_state(&self, state: BridgeState) {
        debug!("Bridge state: {} -> {}", self.state(), state);
        self.state.send_replace(state);
    }
}

impl Drop for GatewayBridge {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

async fn withdraw(icn: &dyn IcnChannel, prefixes: &[String]) {
    for prefix in prefixes {
        match icn.deregister_name(prefix).await {
            Ok(()) => info!("Deregistered prefix {}", prefix),
            Err(e) => warn!("Failed to deregister {}: {}", prefix, e),
        }
    }
}

async fn release(icn: &dyn IcnChannel, mesh: &MeshWriter) {
    if let Err(e) = icn.close().await {
        warn!("Error closing ICN channel: {}", e);
    }
    if let Err(e) = mesh.shutdown().await {
        debug!("Error closing mesh link: {}", e);
    }
}

/// Forward an event unless the bridge is stopping
async fn deliver(
    events: &mpsc::Sender<BridgeEvent>,
    cancel: &CancellationToken,
    event: BridgeEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

async fn run_mesh_source(
    mut reader: MeshReader,
    events: mpsc::Sender<BridgeEvent>,
    cancel: CancellationToken,
    idle_sleep: Duration,
) {
    debug!("Mesh source reading from {}", reader.label());

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = reader.next_packet() => result,
        };

        match result {
            Ok(Some(packet)) => {
                trace!("Mesh packet from {}", packet.source);
                if !deliver(&events, &cancel, BridgeEvent::MeshPacket(packet)).await {
                    break;
                }
            }
            Ok(None) => {
                warn!("Mesh link {} closed", reader.label());
                break;
            }
            Err(e) if e.is_transient() => {
                warn!("Mesh read error: {}", e);
                tokio::time::sleep(idle_sleep).await;
            }
            Err(e) => {
                error!("Mesh link {} failed: {}", reader.label(), e);
                break;
            }
        }
    }

    debug!("Mesh source stopped");
}

async fn run_icn_source(
    icn: Arc<dyn IcnChannel>,
    events: mpsc::Sender<BridgeEvent>,
    cancel: CancellationToken,
    receive_timeout: Duration,
) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = icn.receive_interest(receive_timeout) => result,
        };

        match result {
            Ok(Some(interest)) => {
                debug!("Interest received: {} (chunk {})", interest.name, interest.chunk_num);
                if !deliver(&events, &cancel, BridgeEvent::Interest(interest)).await {
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) if e.is_transient() => warn!("Dropping undecodable ICN message: {}", e),
            Err(e) => {
                error!("ICN channel failed: {}", e);
                break;
            }
        }
    }

    debug!("ICN source stopped");
}

async fn run_dispatcher(
    mut core: BridgeCore,
    mut inbox: mpsc::Receiver<BridgeEvent>,
    cancel: CancellationToken,
) -> BridgeCore {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = inbox.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        core.handle(event).await;
    }

    debug!("Dispatcher stopped");
    core
}
