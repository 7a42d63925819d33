//! Call and media types exchanged with the call-control layer

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use fdport_media_core::PortId;
use serde::{Deserialize, Serialize};

/// Identifier of a call, as assigned by the call-control layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    /// Create a call id from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique id (`call-1`, `call-2`, ...)
    pub fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(format!("call-{}", NEXT.fetch_add(1, Ordering::Relaxed)))
    }

    /// Id as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// SIP response status used when answering or hanging up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// 180 Ringing
    pub const RINGING: StatusCode = StatusCode(180);
    /// 200 OK
    pub const OK: StatusCode = StatusCode(200);
    /// 486 Busy Here
    pub const BUSY_HERE: StatusCode = StatusCode(486);
    /// 603 Decline
    pub const DECLINE: StatusCode = StatusCode(603);

    /// Numeric code
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Standard reason phrase
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            180 => "Ringing",
            200 => "OK",
            486 => "Busy Here",
            603 => "Decline",
            _ => "",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// Invite session state of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Incoming call received
    Incoming,
    /// Provisional response sent or received
    Early,
    /// Answer sent, waiting for ACK
    Connecting,
    /// Call established
    Confirmed,
    /// Call ended
    Disconnected,
}

impl CallState {
    /// Whether the call has ended
    pub fn is_terminated(&self) -> bool {
        matches!(self, CallState::Disconnected)
    }
}

/// State of a call's audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaState {
    /// No media
    None,
    /// Audio is flowing
    Active,
    /// Call put on hold locally
    LocalHold,
    /// Call put on hold by the remote party
    RemoteHold,
    /// Media failed
    Error,
}

/// Information about an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCall {
    /// Call identifier
    pub call_id: CallId,
    /// URI of the caller
    pub remote_uri: String,
}

impl IncomingCall {
    /// Create incoming call info
    pub fn new(call_id: CallId, remote_uri: impl Into<String>) -> Self {
        Self {
            call_id,
            remote_uri: remote_uri.into(),
        }
    }
}

/// Decision on an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallDecision {
    /// Answer the call
    Accept,
    /// Reject the call
    Reject {
        /// Final response status
        status: StatusCode,
        /// Human readable reason
        reason: String,
    },
}

impl CallDecision {
    /// Whether the call was accepted
    pub fn is_accept(&self) -> bool {
        matches!(self, CallDecision::Accept)
    }
}

/// Snapshot of the call the session manager is serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    /// Call identifier
    pub call_id: CallId,
    /// URI of the caller
    pub remote_uri: String,
    /// Last reported call state
    pub state: CallState,
    /// Last reported media state
    pub media_state: MediaState,
    /// Bridge port of the call's audio, once media is active
    pub audio_port: Option<PortId>,
    /// Whether the call audio is wired to the fd port
    pub media_connected: bool,
}
