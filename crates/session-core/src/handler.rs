//! Interfaces between the session layer and the call-control collaborator
//!
//! The call-control layer (a SIP stack, or [`SimulatedCallControl`](crate::SimulatedCallControl))
//! reports call events through [`CallEventHandler`] and receives answers and
//! hangups through [`CallControl`]. Handlers are injected, not subclassed.

use async_trait::async_trait;
use fdport_media_core::PortId;

use crate::errors::Result;
use crate::types::{CallDecision, CallId, CallState, IncomingCall, MediaState, StatusCode};

/// Call events delivered by the call-control layer
#[async_trait]
pub trait CallEventHandler: Send + Sync + std::fmt::Debug {
    /// A new call arrived; the handler answers or rejects it
    async fn on_incoming_call(&self, call: IncomingCall) -> CallDecision;

    /// The invite session state of a call changed
    async fn on_call_state_changed(&self, call_id: &CallId, state: CallState);

    /// The audio stream of a call changed
    ///
    /// `audio_port` is the call's bridge port; it is only meaningful while
    /// the media state is [`MediaState::Active`].
    async fn on_media_state_changed(
        &self,
        call_id: &CallId,
        state: MediaState,
        audio_port: Option<PortId>,
    );
}

/// Operations the session layer asks of the call-control layer
#[async_trait]
pub trait CallControl: Send + Sync + std::fmt::Debug {
    /// Send a final response to an incoming call
    async fn answer(&self, call_id: &CallId, status: StatusCode) -> Result<()>;

    /// End a call, or reject it when not yet answered
    async fn hangup(&self, call_id: &CallId, status: StatusCode) -> Result<()>;
}
