//! Common types shared between the forwarding table, mesh transport and bridge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Default number of entries held by the forwarding table.
pub const DEFAULT_FIB_CAPACITY: usize = 100;

/// Default number of extra hierarchy levels a virtual FIB entry answers for.
pub const DEFAULT_MAX_VIRTUAL_DEPTH: usize = 3;

/// Address of a node on the sensor mesh (typically a MAC such as
/// `AA:BB:CC:DD:EE:01`).
///
/// The address is carried verbatim inside `TX:`/`RX:` command lines, so it may
/// not be empty and may not contain the `|` field separator or line breaks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeshAddress(String);

impl MeshAddress {
    /// Creates a mesh address, validating that it can travel on a command line.
    pub fn new(address: impl Into<String>) -> Result<Self, Error> {
        let address = address.into();
        let address = address.trim();

        if address.is_empty() {
            return Err(Error::MalformedLine("empty mesh address".into()));
        }
        if address.contains(['|', '\n', '\r']) {
            return Err(Error::MalformedLine(format!(
                "mesh address contains a reserved character: {:?}",
                address
            )));
        }

        Ok(Self(address.to_string()))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeshAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MeshAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MeshAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MeshAddress> for String {
    fn from(address: MeshAddress) -> Self {
        address.0
    }
}
