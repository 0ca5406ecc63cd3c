//! Command implementations for the gateway CLI

pub mod frame;
pub mod run;
