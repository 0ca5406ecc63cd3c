//! Fixed-layout sensor frames exchanged with the mesh.
//!
//! A frame is a packed 131-byte record:
//!
//! | field          | size | encoding                          |
//! |----------------|------|-----------------------------------|
//! | `signal_code`  | 10   | ASCII, null padded                |
//! | `hop_count`    | 1    | unsigned byte                     |
//! | `content_name` | 100  | ASCII, null padded                |
//! | `content`      | 20   | bytes, null padded                |
//!
//! Every text field keeps its last byte as a terminator, so a name carries at
//! most 99 bytes and a payload at most 19.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::error::Error;

/// Size of the `signal_code` field.
pub const SIGNAL_CODE_LEN: usize = 10;

/// Size of the `content_name` field.
pub const CONTENT_NAME_LEN: usize = 100;

/// Size of the `content` field.
pub const CONTENT_LEN: usize = 20;

/// Total wire size of a frame.
pub const FRAME_LEN: usize = SIGNAL_CODE_LEN + 1 + CONTENT_NAME_LEN + CONTENT_LEN;

/// Maximum number of name bytes a frame can carry.
pub const MAX_CONTENT_NAME_LEN: usize = CONTENT_NAME_LEN - 1;

/// Maximum number of payload bytes a frame can carry.
pub const MAX_CONTENT_LEN: usize = CONTENT_LEN - 1;

/// Placeholder payload of an Interest frame sent to the mesh.
pub const INTEREST_PLACEHOLDER: &[u8] = b"N/A";

/// Kind of a sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalCode {
    /// A reading published by a sensor.
    Data,
    /// A request for a reading.
    Interest,
}

impl SignalCode {
    /// Wire representation of the signal code.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCode::Data => "DATA",
            SignalCode::Interest => "INTEREST",
        }
    }

    fn from_wire(field: &[u8]) -> Result<Self, Error> {
        match field {
            b"DATA" => Ok(SignalCode::Data),
            b"INTEREST" => Ok(SignalCode::Interest),
            other => Err(Error::MalformedFrame(format!(
                "unknown signal code {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

impl fmt::Display for SignalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded sensor frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFrame {
    /// What the frame carries.
    pub signal_code: SignalCode,

    /// Number of mesh hops travelled.
    pub hop_count: u8,

    /// Hierarchical content name (at most 99 bytes).
    pub content_name: String,

    /// Payload bytes (at most 19).
    pub content: Bytes,
}

impl SensorFrame {
    /// Creates a DATA frame as a sensor would send it.
    pub fn data(content_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            signal_code: SignalCode::Data,
            hop_count: 0,
            content_name: content_name.into(),
            content: content.into(),
        }
    }

    /// Creates the single-hop INTEREST frame the gateway forwards to the mesh.
    pub fn interest(content_name: impl Into<String>) -> Self {
        Self {
            signal_code: SignalCode::Interest,
            hop_count: 1,
            content_name: content_name.into(),
            content: Bytes::from_static(INTEREST_PLACEHOLDER),
        }
    }

    /// Decodes a frame, rejecting anything that is not exactly [`FRAME_LEN`] bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() != FRAME_LEN {
            return Err(Error::MalformedFrame(format!(
                "expected {} bytes, got {}",
                FRAME_LEN,
                raw.len()
            )));
        }

        let (signal, rest) = raw.split_at(SIGNAL_CODE_LEN);
        let (hop, rest) = rest.split_at(1);
        let (name, content) = rest.split_at(CONTENT_NAME_LEN);

        let signal_code = SignalCode::from_wire(field_bytes(signal))?;

        let name = field_bytes(name);
        if !name.is_ascii() {
            return Err(Error::MalformedFrame("content name is not ASCII".into()));
        }
        // ASCII is always valid UTF-8
        let content_name = String::from_utf8_lossy(name).into_owned();

        Ok(Self {
            signal_code,
            hop_count: hop[0],
            content_name,
            content: Bytes::copy_from_slice(field_bytes(content)),
        })
    }

    /// Encodes the frame into its fixed wire layout.
    pub fn encode(&self) -> Result<Bytes, Error> {
        if !self.content_name.is_ascii() {
            return Err(Error::MalformedFrame("content name is not ASCII".into()));
        }
        if self.content_name.len() > MAX_CONTENT_NAME_LEN {
            return Err(Error::MalformedFrame(format!(
                "content name is {} bytes, at most {} fit",
                self.content_name.len(),
                MAX_CONTENT_NAME_LEN
            )));
        }
        if self.content.len() > MAX_CONTENT_LEN {
            return Err(Error::MalformedFrame(format!(
                "content is {} bytes, at most {} fit",
                self.content.len(),
                MAX_CONTENT_LEN
            )));
        }

        let mut buf = BytesMut::with_capacity(FRAME_LEN);
        put_padded(&mut buf, self.signal_code.as_str().as_bytes(), SIGNAL_CODE_LEN);
        buf.put_u8(self.hop_count);
        put_padded(&mut buf, self.content_name.as_bytes(), CONTENT_NAME_LEN);
        put_padded(&mut buf, &self.content, CONTENT_LEN);

        Ok(buf.freeze())
    }
}

/// Meaningful bytes of a null-padded field.
///
/// Stops at the first NUL and never looks at the field's final byte, which is
/// reserved as a terminator.
fn field_bytes(field: &[u8]) -> &[u8] {
    let usable = &field[..field.len() - 1];
    let end = usable.iter().position(|&b| b == 0).unwrap_or(usable.len());
    &usable[..end]
}

fn put_padded(buf: &mut BytesMut, value: &[u8], width: usize) {
    buf.put_slice(value);
    buf.put_bytes(0, width - value.len());
}
