//! Gateway configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `ICNGW__<SECTION>__<KEY>` environment variables.

use anyhow::{Context, Result};
use icn_gateway_common::{
    types::{DEFAULT_FIB_CAPACITY, DEFAULT_MAX_VIRTUAL_DEPTH},
    MeshAddress,
};
use icn_gateway_icn::{ChannelOptions, PublishOptions, DEFAULT_ICN_PORT};
use icn_gateway_mesh::{MeshEndpoint, MeshLinkOptions, DEFAULT_BAUD_RATE, DEFAULT_MAX_LINE_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "ICNGW";

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub mesh: MeshConfig,
    pub icn: IcnConfig,
    pub fib: FibConfig,
    pub bridge: BridgeConfig,
}

/// Mesh radio link
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Serial device path, or `tcp://host:port` for a TCP serial bridge
    pub endpoint: String,

    /// Serial baud rate
    pub baud_rate: u32,

    /// Longest accepted protocol line
    pub max_line_length: usize,

    /// Pause after a transient read error (in milliseconds)
    pub idle_sleep_ms: u64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            endpoint: "/dev/serial0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            idle_sleep_ms: 1,
        }
    }
}

/// ICN daemon channel and publication parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IcnConfig {
    /// Address of the local ICN daemon
    pub address: String,

    /// Upper bound of a single Interest receive (in milliseconds)
    pub receive_timeout_ms: u64,

    /// Cache lifetime of published readings (in milliseconds)
    pub cache_time_ms: u64,

    /// Expiry of published readings (in milliseconds)
    pub expiry_ms: u64,

    /// Chunk number of published readings
    pub chunk_num: u32,

    /// Prefixes advertised to the daemon while running
    pub register_prefixes: Vec<String>,
}

impl Default for IcnConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_ICN_PORT),
            receive_timeout_ms: 1000,
            cache_time_ms: 10_000,
            expiry_ms: 3_600_000,
            chunk_num: 0,
            register_prefixes: Vec::new(),
        }
    }
}

/// Forwarding table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FibConfig {
    /// Maximum number of prefixes
    pub capacity: usize,

    /// Extra depth a virtual route answers for
    pub max_virtual_depth: usize,

    /// Routes installed at startup
    pub routes: Vec<RouteConfig>,
}

impl Default for FibConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_FIB_CAPACITY,
            max_virtual_depth: DEFAULT_MAX_VIRTUAL_DEPTH,
            routes: Vec::new(),
        }
    }
}

/// A static route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    pub next_hops: Vec<MeshAddress>,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

/// Event dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Capacity of the queue between the event sources and the dispatcher
    pub event_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { event_buffer: 64 }
    }
}

impl GatewayConfig {
    /// Load the configuration from `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().with_context(|| match path {
            Some(path) => format!("Failed to read configuration from {}", path.display()),
            None => "Failed to read configuration from the environment".to_string(),
        })?;

        settings
            .try_deserialize()
            .context("Invalid gateway configuration")
    }

    pub fn mesh_endpoint(&self) -> MeshEndpoint {
        MeshEndpoint::parse(&self.mesh.endpoint, self.mesh.baud_rate)
    }

    pub fn mesh_link_options(&self) -> MeshLinkOptions {
        MeshLinkOptions {
            max_line_length: self.mesh.max_line_length,
        }
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions::with_address(self.icn.address.clone())
    }

    /// Parameters attached to every published reading
    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            chunk_num: self.icn.chunk_num,
            cache_time: Duration::from_millis(self.icn.cache_time_ms),
            expiry: Duration::from_millis(self.icn.expiry_ms),
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.icn.receive_timeout_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.mesh.idle_sleep_ms)
    }
}
