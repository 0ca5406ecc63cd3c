//! Error types for the ICN sensor gateway.

use thiserror::Error;

/// All possible errors that can occur within the gateway.
#[derive(Error, Debug)]
pub enum Error {
    /// A sensor frame had the wrong length or unreadable fields.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A mesh transport line looked like a command but could not be decoded.
    #[error("Malformed mesh line: {0}")]
    MalformedLine(String),

    /// Failure on the mesh byte-stream link.
    #[error("Mesh transport error: {0}")]
    Transport(String),

    /// Publish/receive failure on the ICN channel.
    #[error("ICN channel error: {0}")]
    Channel(String),

    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// A collaborator could not be reached while the bridge was starting.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a loop reading from the failing source may keep going.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            Error::MalformedFrame(_) | Error::MalformedLine(_) | Error::Tlv(_) => true,
            _ => false,
        }
    }
}
