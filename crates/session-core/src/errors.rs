//! Error types for session core

use thiserror::Error;

use crate::types::CallId;

/// Main result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Main error type for session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bridge or port failure
    #[error("Media error: {0}")]
    Media(#[from] fdport_media_core::Error),

    /// Call is not known to the session manager
    #[error("Call not found: {0}")]
    CallNotFound(CallId),

    /// Invalid call state for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The call-control collaborator refused or failed an operation
    #[error("Call control error: {0}")]
    Control(String),
}

impl SessionError {
    /// Build a call-control error
    pub fn control(msg: impl Into<String>) -> Self {
        SessionError::Control(msg.into())
    }

    /// Build an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        SessionError::InvalidState(msg.into())
    }
}
