//! Connection options for the ICN daemon channel.

use std::time::Duration;

use crate::DEFAULT_ICN_PORT;

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Address of the local ICN daemon
    pub address: String,

    /// Connect timeout (in milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// Lifetime of Interests expressed through the channel (in milliseconds)
    pub interest_lifetime_ms: u64,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_ICN_PORT),
            connect_timeout_ms: Some(5000),
            interest_lifetime_ms: 4000,
        }
    }
}

impl ChannelOptions {
    /// Options for a daemon at `address`
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn interest_lifetime(&self) -> Duration {
        Duration::from_millis(self.interest_lifetime_ms)
    }
}
