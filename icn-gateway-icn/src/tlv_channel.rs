//! ICN channel speaking TLV messages over a TCP connection to the daemon.

use async_trait::async_trait;
use bytes::BytesMut;
use icn_gateway_common::{
    tlv::{TlvElement, TLV_INTEREST},
    Error, Result,
};
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
    time::timeout,
};

use crate::channel::{IcnChannel, IcnInterest, PublishOptions};
use crate::config::ChannelOptions;
use crate::message::{
    data_message, decode_interest, deregister_message, epoch_millis, interest_message,
    register_message,
};

struct InboundStream {
    half: OwnedReadHalf,
    buffer: BytesMut,
}

/// TCP/TLV client channel to an ICN daemon
pub struct TlvIcnChannel {
    /// Daemon address, for logging
    peer: String,

    /// Receive side and its partial-message buffer
    inbound: Mutex<InboundStream>,

    /// Send side
    outbound: Mutex<OwnedWriteHalf>,

    /// Whether the channel was closed
    closed: AtomicBool,
}

impl TlvIcnChannel {
    /// Connect to the daemon described by `options`
    pub async fn connect(options: &ChannelOptions) -> Result<Self> {
        let connecting = TcpStream::connect(options.address.as_str());
        let stream = match options.connect_timeout() {
            Some(limit) => timeout(limit, connecting).await.map_err(|_| {
                Error::Channel(format!("timed out connecting to {}", options.address))
            })?,
            None => connecting.await,
        }
        .map_err(|e| Error::Channel(format!("failed to connect to {}: {}", options.address, e)))?;

        stream.set_nodelay(true)?;
        info!("Connected to ICN daemon at {}", options.address);
        Ok(Self::from_stream(stream, options.address.clone()))
    }

    /// Wrap an established connection
    pub fn from_stream(stream: TcpStream, peer: impl Into<String>) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            peer: peer.into(),
            inbound: Mutex::new(InboundStream {
                half: read_half,
                buffer: BytesMut::with_capacity(4096),
            }),
            outbound: Mutex::new(write_half),
            closed: AtomicBool::new(false),
        }
    }

    async fn send(&self, message: TlvElement) -> Result<()> {
        self.ensure_open()?;

        let bytes = message.to_bytes();
        let mut outbound = self.outbound.lock().await;
        outbound
            .write_all(&bytes)
            .await
            .map_err(|e| Error::Channel(format!("write to {} failed: {}", self.peer, e)))?;
        trace!("Sent {} byte message of type {:#04x} to {}", bytes.len(), message.tlv_type, self.peer);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Channel(format!("channel to {} is closed", self.peer)));
        }
        Ok(())
    }
}

impl InboundStream {
    /// Read until the next Interest message; other messages are skipped
    async fn next_interest(&mut self, peer: &str) -> Result<IcnInterest> {
        loop {
            while let Some(element) = self.next_element(peer)? {
                if element.tlv_type == TLV_INTEREST {
                    return decode_interest(&element);
                }
                trace!("Ignoring message of type {:#04x} from {}", element.tlv_type, peer);
            }

            let n = self.half.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(Error::Channel(format!("{} closed the connection", peer)));
            }
        }
    }

    /// Next complete element in the buffer.
    ///
    /// A header that cannot be parsed leaves no way to find the next element
    /// boundary, so the buffered bytes are discarded along with it.
    fn next_element(&mut self, peer: &str) -> Result<Option<TlvElement>> {
        TlvElement::try_decode_stream(&mut self.buffer).map_err(|e| {
            warn!(
                "Discarding {} buffered bytes from {}: {}",
                self.buffer.len(),
                peer,
                e
            );
            self.buffer.clear();
            e
        })
    }
}

#[async_trait]
impl IcnChannel for TlvIcnChannel {
    async fn publish(&self, name: &str, payload: &[u8], options: &PublishOptions) -> Result<()> {
        self.send(data_message(name, payload, options, epoch_millis()))
            .await
    }

    async fn send_interest(&self, name: &str, lifetime: Duration) -> Result<()> {
        self.send(interest_message(name, lifetime)).await
    }

    async fn receive_interest(&self, wait: Duration) -> Result<Option<IcnInterest>> {
        self.ensure_open()?;

        let mut inbound = self.inbound.lock().await;
        match timeout(wait, inbound.next_interest(&self.peer)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn register_name(&self, name: &str) -> Result<()> {
        self.send(register_message(name)).await?;
        debug!("Registered {} with {}", name, self.peer);
        Ok(())
    }

    async fn deregister_name(&self, name: &str) -> Result<()> {
        self.send(deregister_message(name)).await?;
        debug!("Deregistered {} from {}", name, self.peer);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut outbound = self.outbound.lock().await;
        outbound.shutdown().await?;
        info!("Closed ICN channel to {}", self.peer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::decode_data;
    use icn_gateway_common::tlv::{decode_name, TLV_REGISTER};
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TlvIcnChannel, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let options = ChannelOptions::with_address(addr.to_string());
        let (channel, accepted) = tokio::join!(TlvIcnChannel::connect(&options), listener.accept());
        (channel.unwrap(), accepted.unwrap().0)
    }

    async fn read_message(daemon: &mut TcpStream, buffer: &mut BytesMut) -> TlvElement {
        loop {
            if let Some(element) = TlvElement::try_decode_stream(buffer).unwrap() {
                return element;
            }
            assert!(daemon.read_buf(buffer).await.unwrap() > 0);
        }
    }

    #[tokio::test]
    async fn test_publish_sends_data_message() {
        let (channel, mut daemon) = connected_pair().await;
        let mut buffer = BytesMut::new();

        channel
            .publish("/sensor/1/temp/42", b"23.5", &PublishOptions::default())
            .await
            .unwrap();

        let data = decode_data(&read_message(&mut daemon, &mut buffer).await).unwrap();
        assert_eq!(data.name, "/sensor/1/temp/42");
        assert_eq!(&data.content[..], b"23.5");
        assert_eq!(data.expires_at_ms - data.cache_until_ms, 3_600_000 - 10_000);
    }

    #[tokio::test]
    async fn test_register_sends_register_message() {
        let (channel, mut daemon) = connected_pair().await;
        let mut buffer = BytesMut::new();

        channel.register_name("/sensor").await.unwrap();

        let message = read_message(&mut daemon, &mut buffer).await;
        assert_eq!(message.tlv_type, TLV_REGISTER);
        assert_eq!(decode_name(&message.children().unwrap()[0]).unwrap(), "/sensor");
    }

    #[tokio::test]
    async fn test_receive_interest_skips_other_messages() {
        let (channel, mut daemon) = connected_pair().await;

        let mut wire = BytesMut::new();
        data_message("/x", b"", &PublishOptions::default(), 0).encode(&mut wire);
        let interest = interest_message("/sensor/1/temp/1234567890123", Duration::from_secs(4)).to_bytes();
        // Split the Interest across two writes
        wire.extend_from_slice(&interest[..3]);
        daemon.write_all(&wire).await.unwrap();

        let receiving = channel.receive_interest(Duration::from_secs(5));
        let writing = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            daemon.write_all(&interest[3..]).await.unwrap();
        };
        let (received, _) = tokio::join!(receiving, writing);

        assert_eq!(
            received.unwrap(),
            Some(IcnInterest::new("/sensor/1/temp/1234567890123"))
        );
    }

    #[tokio::test]
    async fn test_unparseable_header_is_discarded() {
        let (channel, mut daemon) = connected_pair().await;

        daemon.write_all(&[TLV_INTEREST, 255]).await.unwrap();
        let result = channel.receive_interest(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Tlv(_))));

        let interest = interest_message("/sensor/1/temp/1", Duration::from_secs(4)).to_bytes();
        daemon.write_all(&interest).await.unwrap();

        let received = channel
            .receive_interest(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(received, Some(IcnInterest::new("/sensor/1/temp/1")));
    }

    #[tokio::test]
    async fn test_receive_interest_times_out() {
        let (channel, _daemon) = connected_pair().await;
        let received = channel
            .receive_interest(Duration::from_millis(20))
            .await
            .unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_receive_after_daemon_hangup_is_error() {
        let (channel, daemon) = connected_pair().await;
        drop(daemon);

        let result = channel.receive_interest(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::Channel(_))));
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_operations() {
        let (channel, _daemon) = connected_pair().await;
        channel.close().await.unwrap();
        channel.close().await.unwrap();

        assert!(channel.register_name("/a").await.is_err());
        assert!(channel
            .receive_interest(Duration::from_millis(1))
            .await
            .is_err());
    }
}
