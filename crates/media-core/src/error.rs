use std::io;
use thiserror::Error;

use crate::port::PortId;

/// Result type for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for media operations
///
/// Only configuration-time and topology failures are reported through this
/// type. Stream I/O trouble during a tick is absorbed by the port and surfaced
/// through [`PortStatus`](crate::PortStatus) instead.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Neither the input nor the output handle is usable
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Operation referenced a port that is not registered with the bridge
    #[error("Unknown port: {0}")]
    UnknownPort(PortId),

    /// Sample rate or format cannot be honoured without conversion
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Feature not available on this platform
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The bridge has no free slot left
    #[error("Too many ports: bridge limit is {0}")]
    TooManyPorts(usize),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
