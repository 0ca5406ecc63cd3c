//! The contract between the gateway and the ICN daemon.

use async_trait::async_trait;
use icn_gateway_common::Result;
use std::time::Duration;

/// Default chunk number of published objects
pub const DEFAULT_CHUNK_NUM: u32 = 0;

/// Default cache lifetime of published objects
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_millis(10_000);

/// Default expiry of published objects
pub const DEFAULT_EXPIRY: Duration = Duration::from_millis(3_600_000);

/// An Interest delivered by the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcnInterest {
    /// Requested name
    pub name: String,
    /// Requested chunk
    pub chunk_num: u32,
}

impl IcnInterest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunk_num: DEFAULT_CHUNK_NUM,
        }
    }
}

/// Parameters attached to a published content object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Chunk number of the object
    pub chunk_num: u32,
    /// How long the daemon may serve the object from its cache
    pub cache_time: Duration,
    /// How long the object stays valid
    pub expiry: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            chunk_num: DEFAULT_CHUNK_NUM,
            cache_time: DEFAULT_CACHE_TIME,
            expiry: DEFAULT_EXPIRY,
        }
    }
}

/// Request/response channel to an ICN daemon.
///
/// Implementations must tolerate `receive_interest` running concurrently with
/// the other operations.
#[async_trait]
pub trait IcnChannel: Send + Sync {
    /// Publish `payload` as a content object named `name`
    async fn publish(&self, name: &str, payload: &[u8], options: &PublishOptions) -> Result<()>;

    /// Express an Interest for `name`
    async fn send_interest(&self, name: &str, lifetime: Duration) -> Result<()>;

    /// Wait up to `timeout` for the next Interest.
    ///
    /// `Ok(None)` means the timeout elapsed without an Interest arriving.
    async fn receive_interest(&self, timeout: Duration) -> Result<Option<IcnInterest>>;

    /// Advertise `name` so that matching Interests are delivered here
    async fn register_name(&self, name: &str) -> Result<()>;

    /// Withdraw a previously registered name
    async fn deregister_name(&self, name: &str) -> Result<()>;

    /// Release the connection to the daemon
    async fn close(&self) -> Result<()>;
}
