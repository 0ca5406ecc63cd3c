//! Byte-stream link to the mesh radio.
//!
//! The radio is attached either to a local serial device or exposed through a
//! TCP serial bridge (`tcp://host:port`). Once opened, the link is split into a
//! [`MeshReader`] that yields inbound packets and a cloneable [`MeshWriter`]
//! that issues `TX:` commands.

use async_trait::async_trait;
use icn_gateway_common::{Error, MeshAddress, Result};
use log::{debug, info, trace, warn};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;

use crate::line::{tx_line, MeshLine, RxPacket};

/// Default maximum length of one protocol line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const READ_CHUNK: usize = 256;

/// Where the mesh radio is reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEndpoint {
    /// Local serial device
    Serial { path: String, baud_rate: u32 },
    /// TCP serial bridge
    Tcp(String),
}

impl MeshEndpoint {
    /// Interpret an endpoint string: `tcp://host:port` or a device path
    pub fn parse(endpoint: &str, baud_rate: u32) -> Self {
        match endpoint.strip_prefix("tcp://") {
            Some(addr) => MeshEndpoint::Tcp(addr.to_string()),
            None => MeshEndpoint::Serial {
                path: endpoint.to_string(),
                baud_rate,
            },
        }
    }
}

impl fmt::Display for MeshEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshEndpoint::Serial { path, baud_rate } => write!(f, "{}@{}", path, baud_rate),
            MeshEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Tuning for a mesh link
#[derive(Debug, Clone)]
pub struct MeshLinkOptions {
    /// Lines longer than this are discarded
    pub max_line_length: usize,
}

impl Default for MeshLinkOptions {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Destination for outbound sensor frames
#[async_trait]
pub trait MeshSink: Send + Sync {
    /// Send one encoded frame to a mesh node
    async fn send_frame(&self, dest: &MeshAddress, frame: &[u8]) -> Result<()>;
}

/// An open link to the mesh radio
pub struct MeshLink {
    reader: MeshReader,
    writer: MeshWriter,
}

impl MeshLink {
    /// Open the link described by `endpoint`
    pub async fn open(endpoint: &MeshEndpoint, options: MeshLinkOptions) -> Result<Self> {
        let label = endpoint.to_string();

        let link = match endpoint {
            MeshEndpoint::Serial { path, baud_rate } => {
                let port = tokio_serial::new(path.clone(), *baud_rate)
                    .open_native_async()
                    .map_err(|e| {
                        Error::Transport(format!("failed to open serial device {}: {}", label, e))
                    })?;
                Self::from_stream(port, label.clone(), options)
            }
            MeshEndpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await.map_err(|e| {
                    Error::Transport(format!("failed to connect to {}: {}", label, e))
                })?;
                stream.set_nodelay(true)?;
                Self::from_stream(stream, label.clone(), options)
            }
        };

        info!("Mesh link open on {}", label);
        Ok(link)
    }

    /// Wrap an already-connected byte stream
    pub fn from_stream<S>(stream: S, label: impl Into<String>, options: MeshLinkOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let label: Arc<str> = Arc::from(label.into());
        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            reader: MeshReader {
                inner: Box::new(read_half),
                buffer: Vec::with_capacity(options.max_line_length),
                max_line_length: options.max_line_length.max(1),
                discarding: false,
                label: label.clone(),
            },
            writer: MeshWriter {
                inner: Arc::new(Mutex::new(Box::new(write_half))),
                label,
            },
        }
    }

    /// Separate the inbound and outbound halves
    pub fn split(self) -> (MeshReader, MeshWriter) {
        (self.reader, self.writer)
    }
}

/// Inbound half of a mesh link
pub struct MeshReader {
    inner: Box<dyn AsyncRead + Send + Unpin>,
    buffer: Vec<u8>,
    max_line_length: usize,
    /// Skipping the rest of an overlong line
    discarding: bool,
    label: Arc<str>,
}

impl MeshReader {
    /// Wait for the next `RX:` packet.
    ///
    /// Returns `Ok(None)` once the link reaches end of stream. Malformed lines
    /// are reported as [`Error::MalformedLine`]; the reader stays usable after
    /// them. Cancelling the returned future loses no buffered data.
    pub async fn next_packet(&mut self) -> Result<Option<RxPacket>> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            while let Some(line) = self.take_line() {
                let text = std::str::from_utf8(&line)
                    .map_err(|_| Error::MalformedLine("line is not valid UTF-8".into()))?;

                match MeshLine::parse(text)? {
                    Some(MeshLine::Rx(packet)) => {
                        trace!("[{}] RX from {}", self.label, packet.source);
                        return Ok(Some(packet));
                    }
                    Some(MeshLine::Tx { dest, .. }) => {
                        trace!("[{}] ignoring echoed TX to {}", self.label, dest);
                    }
                    None => {
                        trace!("[{}] ignoring line {:?}", self.label, text.trim_end());
                    }
                }
            }

            if self.buffer.len() > self.max_line_length {
                let dropped = self.buffer.len();
                self.buffer.clear();
                self.discarding = true;
                return Err(Error::MalformedLine(format!(
                    "line exceeds {} bytes ({} buffered)",
                    self.max_line_length, dropped
                )));
            }

            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    debug!(
                        "[{}] discarding {} bytes of unterminated input at EOF",
                        self.label,
                        self.buffer.len()
                    );
                    self.buffer.clear();
                }
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.discarding {
                    self.buffer.clear();
                }
                return None;
            };

            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if self.discarding {
                trace!("[{}] dropped {} trailing bytes of an overlong line", self.label, line.len());
                self.discarding = false;
                continue;
            }
            return Some(line);
        }
    }

    /// Human-readable endpoint of this link
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Outbound half of a mesh link
#[derive(Clone)]
pub struct MeshWriter {
    inner: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    label: Arc<str>,
}

impl MeshWriter {
    /// Write one `TX:` command for `frame`
    pub async fn send_frame(&self, dest: &MeshAddress, frame: &[u8]) -> Result<()> {
        let line = tx_line(dest, frame);
        let mut inner = self.inner.lock().await;

        inner.write_all(line.as_bytes()).await?;
        inner.flush().await?;

        trace!("[{}] TX {} bytes to {}", self.label, frame.len(), dest);
        Ok(())
    }

    /// Flush and close the outbound half
    pub async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Err(e) = inner.shutdown().await {
            warn!("[{}] error closing mesh link: {}", self.label, e);
            return Err(e.into());
        }
        debug!("[{}] mesh link closed", self.label);
        Ok(())
    }
}

#[async_trait]
impl MeshSink for MeshWriter {
    async fn send_frame(&self, dest: &MeshAddress, frame: &[u8]) -> Result<()> {
        MeshWriter::send_frame(self, dest, frame).await
    }
}
