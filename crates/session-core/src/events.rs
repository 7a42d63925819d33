//! Session events for observers

use fdport_media_core::PortId;

use crate::types::{CallId, StatusCode};

/// Something the session manager did in response to a call event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Incoming call answered
    CallAnswered {
        /// Call identifier
        call_id: CallId,
        /// URI of the caller
        remote_uri: String,
    },
    /// Incoming call rejected
    CallRejected {
        /// Call identifier
        call_id: CallId,
        /// Final response sent
        status: StatusCode,
    },
    /// Call audio wired to the fd port in both directions
    MediaConnected {
        /// Call identifier
        call_id: CallId,
        /// Bridge port of the call audio
        call_port: PortId,
        /// Bridge port of the file-descriptor port
        fd_port: PortId,
    },
    /// Call audio unwired from the fd port
    MediaDisconnected {
        /// Call identifier
        call_id: CallId,
    },
    /// Call ended and the current-call slot was cleared
    CallEnded {
        /// Call identifier
        call_id: CallId,
    },
}

impl SessionEvent {
    /// Call the event refers to
    pub fn call_id(&self) -> &CallId {
        match self {
            SessionEvent::CallAnswered { call_id, .. }
            | SessionEvent::CallRejected { call_id, .. }
            | SessionEvent::MediaConnected { call_id, .. }
            | SessionEvent::MediaDisconnected { call_id }
            | SessionEvent::CallEnded { call_id } => call_id,
        }
    }
}
