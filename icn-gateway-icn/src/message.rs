//! TLV messages exchanged with the ICN daemon.
//!
//! Every message is one top-level element (Interest, Data, Register or
//! Deregister) whose value holds nested fields. Cache time and expiry travel
//! as absolute millisecond epoch timestamps.

use bytes::Bytes;
use icn_gateway_common::{
    tlv::{
        decode_name, encode_name, TlvElement, TLV_CACHE_TIME, TLV_CHUNK_NUMBER, TLV_CONTENT,
        TLV_DATA, TLV_DEREGISTER, TLV_EXPIRY, TLV_INTEREST, TLV_INTEREST_LIFETIME, TLV_NAME,
        TLV_REGISTER,
    },
    Error, Result,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::channel::{IcnInterest, PublishOptions};

/// A Data message as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    pub name: String,
    pub chunk_num: u32,
    pub content: Bytes,
    /// Absolute cache deadline (ms since epoch)
    pub cache_until_ms: u64,
    /// Absolute expiry (ms since epoch)
    pub expires_at_ms: u64,
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Build a Data message publishing `payload` under `name`
pub fn data_message(name: &str, payload: &[u8], options: &PublishOptions, now_ms: u64) -> TlvElement {
    TlvElement::nested(
        TLV_DATA,
        &[
            encode_name(name),
            TlvElement::from_u64(TLV_CHUNK_NUMBER, options.chunk_num as u64),
            TlvElement::new(TLV_CONTENT, Bytes::copy_from_slice(payload)),
            TlvElement::from_u64(
                TLV_CACHE_TIME,
                now_ms.saturating_add(options.cache_time.as_millis() as u64),
            ),
            TlvElement::from_u64(
                TLV_EXPIRY,
                now_ms.saturating_add(options.expiry.as_millis() as u64),
            ),
        ],
    )
}

/// Build an Interest message for `name`
pub fn interest_message(name: &str, lifetime: Duration) -> TlvElement {
    TlvElement::nested(
        TLV_INTEREST,
        &[
            encode_name(name),
            TlvElement::from_u64(TLV_INTEREST_LIFETIME, lifetime.as_millis() as u64),
        ],
    )
}

/// Build a prefix registration message
pub fn register_message(name: &str) -> TlvElement {
    TlvElement::nested(TLV_REGISTER, &[encode_name(name)])
}

/// Build a prefix withdrawal message
pub fn deregister_message(name: &str) -> TlvElement {
    TlvElement::nested(TLV_DEREGISTER, &[encode_name(name)])
}

/// Decode an Interest message; a missing chunk number means chunk 0
pub fn decode_interest(element: &TlvElement) -> Result<IcnInterest> {
    expect_type(element, TLV_INTEREST)?;

    let mut name = None;
    let mut chunk_num = 0;
    for field in element.children()? {
        match field.tlv_type {
            TLV_NAME => name = Some(decode_name(&field)?),
            TLV_CHUNK_NUMBER => chunk_num = chunk_from(&field)?,
            _ => {}
        }
    }

    let name = name.ok_or_else(|| Error::Tlv("Interest without a name".into()))?;
    Ok(IcnInterest { name, chunk_num })
}

/// Decode a Data message
pub fn decode_data(element: &TlvElement) -> Result<DataMessage> {
    expect_type(element, TLV_DATA)?;

    let mut name = None;
    let mut message = DataMessage {
        name: String::new(),
        chunk_num: 0,
        content: Bytes::new(),
        cache_until_ms: 0,
        expires_at_ms: 0,
    };

    for field in element.children()? {
        match field.tlv_type {
            TLV_NAME => name = Some(decode_name(&field)?),
            TLV_CHUNK_NUMBER => message.chunk_num = chunk_from(&field)?,
            TLV_CONTENT => message.content = field.value.clone(),
            TLV_CACHE_TIME => message.cache_until_ms = field.as_u64()?,
            TLV_EXPIRY => message.expires_at_ms = field.as_u64()?,
            _ => {}
        }
    }

    message.name = name.ok_or_else(|| Error::Tlv("Data without a name".into()))?;
    Ok(message)
}

fn expect_type(element: &TlvElement, tlv_type: u8) -> Result<()> {
    if element.tlv_type != tlv_type {
        return Err(Error::Tlv(format!(
            "Expected TLV type {:#04x}, got {:#04x}",
            tlv_type, element.tlv_type
        )));
    }
    Ok(())
}

fn chunk_from(field: &TlvElement) -> Result<u32> {
    u32::try_from(field.as_u64()?)
        .map_err(|_| Error::Tlv("chunk number does not fit in 32 bits".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_message_fields() {
        let options = PublishOptions::default();
        let element = data_message("/sensor/1/temp/1700000000000", b"23.5", &options, 1_000);
        let data = decode_data(&element).unwrap();

        assert_eq!(data.name, "/sensor/1/temp/1700000000000");
        assert_eq!(data.chunk_num, 0);
        assert_eq!(&data.content[..], b"23.5");
        assert_eq!(data.cache_until_ms, 11_000);
        assert_eq!(data.expires_at_ms, 3_601_000);
    }

    #[test]
    fn test_interest_message() {
        let element = interest_message("/sensor/1", Duration::from_millis(4000));
        assert_eq!(element.tlv_type, TLV_INTEREST);

        let interest = decode_interest(&element).unwrap();
        assert_eq!(interest, IcnInterest::new("/sensor/1"));
    }

    #[test]
    fn test_decode_interest_with_chunk() {
        let element = TlvElement::nested(
            TLV_INTEREST,
            &[encode_name("/a/b"), TlvElement::from_u64(TLV_CHUNK_NUMBER, 7)],
        );
        let interest = decode_interest(&element).unwrap();
        assert_eq!(interest.name, "/a/b");
        assert_eq!(interest.chunk_num, 7);
    }

    #[test]
    fn test_decode_rejects_wrong_type_and_missing_name() {
        assert!(decode_interest(&register_message("/a")).is_err());

        let nameless = TlvElement::nested(TLV_INTEREST, &[]);
        assert!(matches!(decode_interest(&nameless), Err(Error::Tlv(_))));
    }

    #[test]
    fn test_register_messages() {
        assert_eq!(register_message("/a").tlv_type, TLV_REGISTER);
        assert_eq!(deregister_message("/a").tlv_type, TLV_DEREGISTER);
        assert_eq!(
            decode_name(&deregister_message("/a/b").children().unwrap()[0]).unwrap(),
            "/a/b"
        );
    }
}
