//! Edge gateway between a wireless sensor mesh and an ICN overlay.
//!
//! DATA frames arriving from the mesh teach the forwarding table which node
//! serves a name and are published to the ICN daemon under a timestamped
//! name. Interests from the daemon are resolved through the forwarding table
//! and forwarded to the mesh as INTEREST frames.

pub mod bridge;
pub mod config;
pub mod handler;

pub use bridge::{BridgeState, GatewayBridge};
pub use config::{GatewayConfig, RouteConfig};
pub use handler::{BridgeCore, BridgeEvent, FrameOutcome, InterestOutcome};
