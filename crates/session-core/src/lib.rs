//! # Session core for the fdport project
//!
//! Connects the calls reported by a call-control layer to the
//! file-descriptor audio port of a [`ConferenceBridge`](fdport_media_core::ConferenceBridge).
//!
//! - [`CallEventHandler`] / [`CallControl`]: the two directions of the
//!   boundary with the SIP stack
//! - [`CallSessionManager`]: one-call-at-a-time session handler owning the
//!   fd port
//! - [`SimulatedCallControl`]: an in-process call-control stand-in
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fdport_media_core::{BridgeConfig, ConferenceBridge, FdPortOptions};
//! use fdport_session_core::{CallSessionManager, SimulatedCallControl, SimulatedCallOptions};
//!
//! # async fn run() -> fdport_session_core::Result<()> {
//! let bridge = Arc::new(ConferenceBridge::new(BridgeConfig::default())?);
//! let fd_port = bridge.create_fd_port_owned(FdPortOptions::new(
//!     std::path::Path::new("in.pcm"),
//!     std::path::Path::new("out.pcm"),
//! ))?;
//!
//! let control = SimulatedCallControl::new(bridge.clone());
//! let manager = Arc::new(CallSessionManager::new(fd_port, control.clone()));
//!
//! let call = control.place_call(manager.clone(), SimulatedCallOptions::default()).await?;
//! call.hangup().await;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod events;
pub mod handler;
pub mod manager;
pub mod simulated;
pub mod types;

pub use errors::{Result, SessionError};
pub use events::SessionEvent;
pub use handler::{CallControl, CallEventHandler};
pub use manager::{CallSessionManager, HangupPolicy};
pub use simulated::{SimulatedCall, SimulatedCallControl, SimulatedCallOptions};
pub use types::{
    CallDecision, CallId, CallInfo, CallState, IncomingCall, MediaState, StatusCode,
};
