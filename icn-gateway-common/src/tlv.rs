//! TLV (Type-Length-Value) encoding used on the ICN daemon channel.
//!
//! Messages exchanged with the local ICN daemon are single top-level TLV
//! elements whose value is a sequence of nested elements. Types are one byte;
//! lengths use the NDN variable-width scheme.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::name;

/* ---------------------------------------------------------------- *
 * Message types (top level)
 * ---------------------------------------------------------------- */

pub const TLV_INTEREST: u8 = 0x05;
pub const TLV_DATA: u8 = 0x06;
pub const TLV_REGISTER: u8 = 0x10;
pub const TLV_DEREGISTER: u8 = 0x11;

/* ---------------------------------------------------------------- *
 * Field types (nested)
 * ---------------------------------------------------------------- */

pub const TLV_NAME: u8 = 0x07;
pub const TLV_COMPONENT: u8 = 0x08;
pub const TLV_CHUNK_NUMBER: u8 = 0x0B;
pub const TLV_INTEREST_LIFETIME: u8 = 0x0C;
pub const TLV_CACHE_TIME: u8 = 0x0D;
pub const TLV_EXPIRY: u8 = 0x0E;
pub const TLV_CONTENT: u8 = 0x15;

/// Largest value accepted from the wire.
pub const MAX_TLV_VALUE_LEN: usize = 65_535;

/* ---------------------------------------------------------------- *
 * Length field
 * ---------------------------------------------------------------- */

/// Encode the variable-width TLV *length* field.
///
/// * `< 253`  → 1 byte
/// * `≤ 65 535`  → marker 253 + 2-byte length
/// * otherwise → marker 254 + 4-byte length
pub fn encode_length(length: usize, buf: &mut BytesMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/// Peek at a length field without consuming it.
///
/// Returns `Ok(None)` when `buf` does not yet hold the whole field, otherwise
/// the decoded length and the number of bytes the field occupies.
fn peek_length(buf: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };

    match first {
        0..=252 => Ok(Some((first as usize, 1))),
        253 => {
            if buf.len() < 3 {
                return Ok(None);
            }
            Ok(Some((u16::from_be_bytes([buf[1], buf[2]]) as usize, 3)))
        }
        254 => {
            if buf.len() < 5 {
                return Ok(None);
            }
            Ok(Some((u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize, 5)))
        }
        255 => Err(Error::Tlv("64-bit TLV lengths not supported".into())),
    }
}

/* ---------------------------------------------------------------- *
 * TLV element
 * ---------------------------------------------------------------- */

/// A TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    /// Create a new element from raw parts.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Element carrying a non-negative integer in the shortest big-endian form.
    pub fn from_u64(tlv_type: u8, value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take(7).take_while(|&&b| b == 0).count();
        Self::new(tlv_type, Bytes::copy_from_slice(&bytes[skip..]))
    }

    /// Element holding a sequence of nested elements.
    pub fn nested(tlv_type: u8, children: &[TlvElement]) -> Self {
        let mut buf = BytesMut::new();
        for child in children {
            child.encode(&mut buf);
        }
        Self::new(tlv_type, buf.freeze())
    }

    /// Interpret the value as a big-endian non-negative integer.
    pub fn as_u64(&self) -> Result<u64, Error> {
        if self.value.is_empty() || self.value.len() > 8 {
            return Err(Error::Tlv(format!(
                "integer field of type {:#04x} has {} bytes",
                self.tlv_type,
                self.value.len()
            )));
        }
        Ok(self.value.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    /// Decode the nested elements of this element's value.
    pub fn children(&self) -> Result<Vec<TlvElement>, Error> {
        let mut buf = self.value.clone();
        let mut children = Vec::new();
        while buf.has_remaining() {
            children.push(Self::decode(&mut buf)?);
        }
        Ok(children)
    }

    /// Encode this element into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tlv_type);
        encode_length(self.value.len(), buf);
        buf.extend_from_slice(&self.value);
    }

    /// Encode this element into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.value.len() + 6);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a single complete element from `buf`.
    pub fn decode(buf: &mut Bytes) -> Result<Self, Error> {
        let (tlv_type, length, header) = match Self::peek_header(buf)? {
            Some(parts) => parts,
            None => return Err(Error::Tlv("Buffer too small for TLV header".into())),
        };

        if buf.len() < header + length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.len() - header
            )));
        }

        buf.advance(header);
        let value = buf.split_to(length);
        Ok(Self { tlv_type, value })
    }

    /// Pull one element off the front of a stream buffer.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched while the element is
    /// still incomplete.
    pub fn try_decode_stream(buf: &mut BytesMut) -> Result<Option<Self>, Error> {
        let (tlv_type, length, header) = match Self::peek_header(buf)? {
            Some(parts) => parts,
            None => return Ok(None),
        };

        if length > MAX_TLV_VALUE_LEN {
            return Err(Error::Tlv(format!(
                "TLV value of {} bytes exceeds the {} byte limit",
                length, MAX_TLV_VALUE_LEN
            )));
        }
        if buf.len() < header + length {
            return Ok(None);
        }

        buf.advance(header);
        let value = buf.split_to(length).freeze();
        Ok(Some(Self { tlv_type, value }))
    }

    fn peek_header(buf: &[u8]) -> Result<Option<(u8, usize, usize)>, Error> {
        let Some(&tlv_type) = buf.first() else {
            return Ok(None);
        };
        Ok(peek_length(&buf[1..])?.map(|(length, size)| (tlv_type, length, 1 + size)))
    }
}

/* ---------------------------------------------------------------- *
 * Names
 * ---------------------------------------------------------------- */

/// Encode a `/`-delimited name as a Name element of Component elements.
pub fn encode_name(uri: &str) -> TlvElement {
    let components: Vec<TlvElement> = name::components(uri)
        .map(|comp| TlvElement::new(TLV_COMPONENT, Bytes::copy_from_slice(comp.as_bytes())))
        .collect();
    TlvElement::nested(TLV_NAME, &components)
}

/// Decode a Name element back into its `/`-delimited form.
pub fn decode_name(element: &TlvElement) -> Result<String, Error> {
    if element.tlv_type != TLV_NAME {
        return Err(Error::Tlv(format!(
            "Expected name TLV type {}, got {}",
            TLV_NAME, element.tlv_type
        )));
    }

    let mut uri = String::new();
    for comp in element.children()? {
        if comp.tlv_type != TLV_COMPONENT {
            return Err(Error::Tlv(format!(
                "Expected name component TLV type {}, got {}",
                TLV_COMPONENT, comp.tlv_type
            )));
        }
        let text = std::str::from_utf8(&comp.value)
            .map_err(|_| Error::Tlv("name component is not UTF-8".into()))?;
        uri.push(name::NAME_SEPARATOR);
        uri.push_str(text);
    }

    if uri.is_empty() {
        uri.push(name::NAME_SEPARATOR);
    }
    Ok(uri)
}
