//! Common types and utilities for the ICN sensor gateway.
//!
//! This crate provides the pieces shared by the forwarding table, the mesh
//! transport, the ICN channel and the bridge: content-name handling, the
//! fixed-layout sensor frame codec, TLV primitives and gateway metrics.

pub mod error;
pub mod frame;
pub mod metrics;
pub mod name;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub use frame::{SensorFrame, SignalCode};
pub use name::NameMapper;
pub use types::MeshAddress;

pub type Result<T> = std::result::Result<T, Error>;
