//! Mesh radio command lines.
//!
//! The radio speaks a newline-terminated text protocol:
//!
//! ```text
//! TX:<next-hop-address>|<base64(frame)>
//! RX:<source-address>|<length>|<base64(frame)>
//! ```
//!
//! Any other line (boot banners, diagnostics) is not part of the protocol and
//! is ignored by the parser.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use icn_gateway_common::{Error, MeshAddress, Result};
use std::fmt;

/// Prefix of an outbound command line
pub const TX_PREFIX: &str = "TX:";

/// Prefix of an inbound packet line
pub const RX_PREFIX: &str = "RX:";

/// Separator between line fields
pub const FIELD_SEPARATOR: char = '|';

/// A packet reported by the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPacket {
    /// Mesh node that sent the packet
    pub source: MeshAddress,
    /// Length announced by the radio
    pub declared_len: usize,
    /// Decoded packet bytes
    pub payload: Bytes,
}

/// A parsed protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshLine {
    /// Command asking the radio to transmit `payload` to `dest`
    Tx { dest: MeshAddress, payload: Bytes },
    /// Packet received by the radio
    Rx(RxPacket),
}

impl MeshLine {
    /// Parse one line, with or without its terminator.
    ///
    /// Returns `Ok(None)` for lines that are not part of the protocol.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim_end_matches(['\n', '\r']);

        if let Some(rest) = line.strip_prefix(RX_PREFIX) {
            let mut fields = rest.splitn(3, FIELD_SEPARATOR);
            let (Some(source), Some(len), Some(encoded)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::MalformedLine(format!("incomplete RX line: {:?}", line)));
            };

            let declared_len = len.trim().parse::<usize>().map_err(|e| {
                Error::MalformedLine(format!("invalid RX length {:?}: {}", len, e))
            })?;

            return Ok(Some(MeshLine::Rx(RxPacket {
                source: MeshAddress::new(source)?,
                declared_len,
                payload: decode_payload(encoded)?,
            })));
        }

        if let Some(rest) = line.strip_prefix(TX_PREFIX) {
            let Some((dest, encoded)) = rest.split_once(FIELD_SEPARATOR) else {
                return Err(Error::MalformedLine(format!("incomplete TX line: {:?}", line)));
            };

            return Ok(Some(MeshLine::Tx {
                dest: MeshAddress::new(dest)?,
                payload: decode_payload(encoded)?,
            }));
        }

        Ok(None)
    }
}

impl fmt::Display for MeshLine {
    /// Formats the line including its `\n` terminator
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshLine::Tx { dest, payload } => writeln!(
                f,
                "{}{}{}{}",
                TX_PREFIX,
                dest,
                FIELD_SEPARATOR,
                BASE64_STANDARD.encode(payload)
            ),
            MeshLine::Rx(packet) => writeln!(
                f,
                "{}{}{}{}{}{}",
                RX_PREFIX,
                packet.source,
                FIELD_SEPARATOR,
                packet.declared_len,
                FIELD_SEPARATOR,
                BASE64_STANDARD.encode(&packet.payload)
            ),
        }
    }
}

/// Build the `TX:` command line that sends `frame` to `dest`
pub fn tx_line(dest: &MeshAddress, frame: &[u8]) -> String {
    MeshLine::Tx {
        dest: dest.clone(),
        payload: Bytes::copy_from_slice(frame),
    }
    .to_string()
}

fn decode_payload(encoded: &str) -> Result<Bytes> {
    BASE64_STANDARD
        .decode(encoded.trim())
        .map(Bytes::from)
        .map_err(|e| Error::MalformedLine(format!("invalid base64 payload: {}", e)))
}
