//! In-process stand-in for a SIP stack
//!
//! Plays the call-control role for the demo and the tests: it records the
//! answers and hangups the session layer requests, and drives a handler
//! through the life of a call whose media is a tone source paired with a
//! capture sink.

use std::sync::Arc;

use async_trait::async_trait;
use fdport_media_core::{
    ConferenceBridge, DuplexPort, MemoryBuffers, MemoryPort, OwnedPort, PortId, ToneGenerator,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::errors::{Result, SessionError};
use crate::handler::{CallControl, CallEventHandler};
use crate::types::{CallDecision, CallId, CallState, IncomingCall, MediaState, StatusCode};

/// Media of a simulated call
#[derive(Debug, Clone)]
pub struct SimulatedCallOptions {
    /// URI the call appears to come from
    pub remote_uri: String,
    /// Frequency of the tone the caller sends
    pub tone_hz: f64,
    /// Amplitude of the tone
    pub amplitude: i16,
    /// Stop sending tone after this many samples
    pub tone_samples: Option<u64>,
}

impl Default for SimulatedCallOptions {
    fn default() -> Self {
        Self {
            remote_uri: "sip:caller@127.0.0.1".to_string(),
            tone_hz: 440.0,
            amplitude: 8000,
            tone_samples: None,
        }
    }
}

/// Call-control stand-in recording what the session layer asked for
#[derive(Debug)]
pub struct SimulatedCallControl {
    bridge: Arc<ConferenceBridge>,
    answered: Mutex<Vec<(CallId, StatusCode)>>,
    hung_up: Mutex<Vec<(CallId, StatusCode)>>,
}

impl SimulatedCallControl {
    /// Create a controller placing call media on `bridge`
    pub fn new(bridge: Arc<ConferenceBridge>) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            answered: Mutex::new(Vec::new()),
            hung_up: Mutex::new(Vec::new()),
        })
    }

    /// Answers sent so far
    pub fn answered(&self) -> Vec<(CallId, StatusCode)> {
        self.answered.lock().clone()
    }

    /// Hangups sent so far
    pub fn hung_up(&self) -> Vec<(CallId, StatusCode)> {
        self.hung_up.lock().clone()
    }

    /// Offer a call to `handler` and bring its media up if answered
    pub async fn place_call(
        &self,
        handler: Arc<dyn CallEventHandler>,
        options: SimulatedCallOptions,
    ) -> Result<SimulatedCall> {
        let call_id = CallId::generate();
        let incoming = IncomingCall::new(call_id.clone(), options.remote_uri.clone());
        debug!("Offering simulated call {} from {}", call_id, options.remote_uri);

        let decision = handler.on_incoming_call(incoming).await;
        if !decision.is_accept() {
            handler
                .on_call_state_changed(&call_id, CallState::Disconnected)
                .await;
            return Ok(SimulatedCall {
                call_id,
                handler,
                decision,
                media: None,
                received: None,
            });
        }

        handler.on_call_state_changed(&call_id, CallState::Connecting).await;
        handler.on_call_state_changed(&call_id, CallState::Confirmed).await;

        let (media, received) = self.create_media(&call_id, &options)?;
        handler
            .on_media_state_changed(&call_id, MediaState::Active, Some(media.id()))
            .await;
        info!("Simulated call {} up, media on {}", call_id, media.id());

        Ok(SimulatedCall {
            call_id,
            handler,
            decision,
            media: Some(media),
            received: Some(received),
        })
    }

    fn create_media(
        &self,
        call_id: &CallId,
        options: &SimulatedCallOptions,
    ) -> Result<(OwnedPort, MemoryBuffers)> {
        let format = self.bridge.format();
        let spf = self.bridge.samples_per_frame();

        let mut tone = ToneGenerator::new(options.tone_hz, options.amplitude, format, spf)?;
        if let Some(limit) = options.tone_samples {
            tone = tone.with_sample_limit(limit);
        }
        let (sink, received) = MemoryPort::new(format!("{call_id}-rx"), format, spf);
        let port = DuplexPort::new(call_id.to_string(), Box::new(tone), Box::new(sink))?;
        let media = self.bridge.add_port_owned(Box::new(port))?;
        Ok((media, received))
    }
}

#[async_trait]
impl CallControl for SimulatedCallControl {
    async fn answer(&self, call_id: &CallId, status: StatusCode) -> Result<()> {
        debug!("Simulated answer {} with {}", call_id, status);
        self.answered.lock().push((call_id.clone(), status));
        Ok(())
    }

    async fn hangup(&self, call_id: &CallId, status: StatusCode) -> Result<()> {
        debug!("Simulated hangup {} with {}", call_id, status);
        self.hung_up.lock().push((call_id.clone(), status));
        Ok(())
    }
}

/// A call placed by [`SimulatedCallControl`]
#[derive(Debug)]
pub struct SimulatedCall {
    call_id: CallId,
    handler: Arc<dyn CallEventHandler>,
    decision: CallDecision,
    media: Option<OwnedPort>,
    received: Option<MemoryBuffers>,
}

impl SimulatedCall {
    /// Call identifier
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// How the handler decided on the call
    pub fn decision(&self) -> &CallDecision {
        &self.decision
    }

    /// Bridge port of the call media, while the call is up
    pub fn audio_port(&self) -> Option<PortId> {
        self.media.as_ref().map(|m| m.id())
    }

    /// Audio the caller has received so far
    pub fn received(&self) -> Vec<i16> {
        self.received.as_ref().map(|r| r.captured()).unwrap_or_default()
    }

    /// Report a media state change, e.g. the remote putting the call on hold
    pub async fn set_media_state(&self, state: MediaState) -> Result<()> {
        let port = self
            .audio_port()
            .ok_or_else(|| SessionError::invalid_state(format!("call {} has no media", self.call_id)))?;
        let port = (state == MediaState::Active).then_some(port);
        self.handler
            .on_media_state_changed(&self.call_id, state, port)
            .await;
        Ok(())
    }

    /// Remote hangup: media goes away, the call disconnects
    ///
    /// Returns everything the caller received.
    pub async fn hangup(mut self) -> Vec<i16> {
        if let Some(media) = self.media.take() {
            self.handler
                .on_media_state_changed(&self.call_id, MediaState::None, None)
                .await;
            self.handler
                .on_call_state_changed(&self.call_id, CallState::Disconnected)
                .await;
            drop(media);
        }
        info!("Simulated call {} ended", self.call_id);
        self.received()
    }
}
