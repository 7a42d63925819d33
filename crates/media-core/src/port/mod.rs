//! Mixing graph nodes
//!
//! Everything the bridge mixes implements [`MediaPort`]: the file-descriptor
//! port, the call media of the session layer, and the auxiliary tone and
//! memory ports.

mod duplex;
mod fd_port;
mod memory;
mod tone;

pub use duplex::DuplexPort;
pub use fd_port::{FdPort, FdPortOptions};
pub use memory::{MemoryBuffers, MemoryPort};
pub use tone::ToneGenerator;

use std::fmt;

use crate::error::Result;
use crate::format::AudioFormat;
use crate::frame::AudioFrame;
use crate::status::{Direction, PortStatus};

/// Port identifier, equal to the bridge slot the port occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

impl PortId {
    /// Slot number
    pub fn slot(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

impl From<PortId> for u32 {
    fn from(id: PortId) -> Self {
        id.0
    }
}

/// Build a four character port signature
pub const fn signature(code: &[u8; 4]) -> u32 {
    ((code[0] as u32) << 24) | ((code[1] as u32) << 16) | ((code[2] as u32) << 8) | code[3] as u32
}

/// Static description of a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name
    pub name: String,
    /// Four character code identifying the port implementation
    pub signature: u32,
    /// Sample format
    pub format: AudioFormat,
    /// Samples (all channels) per frame
    pub samples_per_frame: usize,
}

impl PortInfo {
    /// Create port info
    pub fn new(
        name: impl Into<String>,
        signature: u32,
        format: AudioFormat,
        samples_per_frame: usize,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            format,
            samples_per_frame,
        }
    }

    /// Signature as printable text, e.g. `PAFD`
    pub fn signature_text(&self) -> String {
        self.signature
            .to_be_bytes()
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
            .collect()
    }
}

/// A node in the mixing graph
///
/// The bridge calls [`get_frame`](MediaPort::get_frame) on every port with
/// outgoing edges and [`put_frame`](MediaPort::put_frame) on every port with
/// incoming edges, once per tick, from the clock thread. Implementations
/// must not block.
pub trait MediaPort: Send {
    /// Port description
    fn info(&self) -> &PortInfo;

    /// Produce the next frame
    ///
    /// `frame.samples` is already sized to the bridge frame; a port with
    /// nothing to deliver leaves `frame_type` as [`FrameType::None`](crate::FrameType::None).
    fn get_frame(&mut self, frame: &mut AudioFrame) -> Result<()>;

    /// Consume a mixed frame
    fn put_frame(&mut self, frame: &AudioFrame) -> Result<()>;

    /// Degradation status
    fn status(&self) -> PortStatus {
        PortStatus::healthy(Direction::ReadWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip_text() {
        let info = PortInfo::new("x", signature(b"PAFD"), AudioFormat::telephony(), 160);
        assert_eq!(info.signature_text(), "PAFD");
    }

    #[test]
    fn test_port_id_display() {
        assert_eq!(PortId(3).to_string(), "port#3");
        assert_eq!(u32::from(PortId(7)), 7);
    }
}
