//! Forwarding table for the ICN sensor gateway.
//!
//! [`BoundedRecencyCache`] is a fixed-capacity LRU store with an
//! open-addressed hash index; [`ForwardingTable`] builds the name-prefix
//! routing logic on top of it.

pub mod cache;
pub mod fib;

pub use cache::{BoundedRecencyCache, CacheError};
pub use fib::{FibEntry, ForwardingTable, NextHops};
pub use icn_gateway_common::name::{depth, extract_prefix};
