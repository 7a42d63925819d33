//! # Media core for the fdport project
//!
//! `media-core` lets raw PCM byte streams (files, pipes, sockets, OS handles)
//! take part in a real-time audio mixing graph alongside call media.
//!
//! This crate provides:
//!
//! - [`PcmStreamEndpoint`]: frame-sized reads and writes on headerless
//!   16-bit PCM streams, blocking or buffered non-blocking
//! - [`FdPort`]: the endpoint presented as a node of the mixing graph
//! - [`ConferenceBridge`]: directed many-to-many mixing with saturation
//! - [`BridgeClock`]: the thread that ticks the bridge every frame
//! - [`ToneGenerator`] and [`MemoryPort`]: auxiliary ports for tests and
//!   simulated calls
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fdport_media_core::prelude::*;
//!
//! # fn main() -> fdport_media_core::Result<()> {
//! let bridge = Arc::new(ConferenceBridge::new(BridgeConfig::default())?);
//!
//! let fd_port = bridge.create_fd_port(FdPortOptions::new(
//!     std::path::Path::new("in.pcm"),
//!     std::path::Path::new("out.pcm"),
//! ))?;
//!
//! let (call, _buffers) = MemoryPort::new("call", bridge.format(), bridge.samples_per_frame());
//! let call = bridge.add_port(Box::new(call))?;
//!
//! bridge.connect(call, fd_port)?;
//! bridge.connect(fd_port, call)?;
//!
//! let _clock = BridgeClock::start(bridge.clone())?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod clock;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod frame;
pub mod port;
pub mod status;

pub use bridge::{ConferenceBridge, OwnedPort, PortState, TickReport};
pub use clock::BridgeClock;
pub use endpoint::{FdPortFlags, PcmStreamEndpoint, StreamHandle, FD_BUF_SIZE};
pub use error::{Error, Result};
pub use format::{AudioFormat, BridgeConfig, Sample, SampleRate};
pub use frame::{AudioFrame, FrameType};
pub use port::{
    DuplexPort, FdPort, FdPortOptions, MediaPort, MemoryBuffers, MemoryPort, PortId, PortInfo, ToneGenerator,
};
pub use status::{Direction, EndpointStatus, IoWarning, PortStatus};

/// Commonly used types
pub mod prelude {
    pub use crate::bridge::{ConferenceBridge, OwnedPort, PortState, TickReport};
    pub use crate::clock::BridgeClock;
    pub use crate::endpoint::{FdPortFlags, StreamHandle};
    pub use crate::error::{Error, Result};
    pub use crate::format::{AudioFormat, BridgeConfig, SampleRate};
    pub use crate::frame::{AudioFrame, FrameType};
    pub use crate::port::{
        DuplexPort, FdPortOptions, MediaPort, MemoryBuffers, MemoryPort, PortId, PortInfo, ToneGenerator,
    };
    pub use crate::status::{Direction, IoWarning, PortStatus};
}
