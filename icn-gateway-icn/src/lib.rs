//! ICN daemon channel for the sensor gateway.
//!
//! [`IcnChannel`] is the request/response contract the bridge relies on.
//! [`TlvIcnChannel`] implements it over a TCP connection to the local daemon
//! using TLV-encoded messages, and [`LoopbackIcnChannel`] keeps everything in
//! process.

mod config;
mod loopback;
mod tlv_channel;

pub mod channel;
pub mod message;

pub use channel::{
    IcnChannel, IcnInterest, PublishOptions, DEFAULT_CACHE_TIME, DEFAULT_CHUNK_NUM,
    DEFAULT_EXPIRY,
};
pub use config::ChannelOptions;
pub use loopback::{LoopbackIcnChannel, PublishedObject};
pub use tlv_channel::TlvIcnChannel;

/// Default TCP port of the local ICN daemon
pub const DEFAULT_ICN_PORT: u16 = 9896;
