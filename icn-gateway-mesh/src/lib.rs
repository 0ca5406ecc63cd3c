//! Mesh radio link for the ICN sensor gateway.
//!
//! The radio is driven through a newline-delimited text protocol carrying
//! base64-encoded sensor frames; see [`line`] for the format and
//! [`transport`] for the async link itself.

pub mod line;
pub mod transport;

pub use line::{tx_line, MeshLine, RxPacket};
pub use transport::{
    MeshEndpoint, MeshLink, MeshLinkOptions, MeshReader, MeshSink, MeshWriter,
    DEFAULT_BAUD_RATE, DEFAULT_MAX_LINE_LENGTH,
};
