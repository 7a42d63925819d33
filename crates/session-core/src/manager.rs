//! Call session manager
//!
//! Owns the state the sample application used to keep in globals: the
//! bridge, the file-descriptor port and the single current call. It serves
//! one call at a time, answering the first incoming call and rejecting any
//! other with `486 Busy Here` while it is up. When the call's media becomes
//! active, the call port and the fd port are connected in both directions.

use std::sync::Arc;

use async_trait::async_trait;
use fdport_media_core::{ConferenceBridge, OwnedPort, PortId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::events::SessionEvent;
use crate::handler::{CallControl, CallEventHandler};
use crate::types::{
    CallDecision, CallId, CallInfo, CallState, IncomingCall, MediaState, StatusCode,
};

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What happens to the fd port edges when a call's media stops or the call ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HangupPolicy {
    /// Remove both edges as soon as media is no longer active
    #[default]
    Disconnect,
    /// Leave the edges in place until the call port is destroyed
    KeepConnected,
}

#[derive(Debug, Default)]
struct SessionState {
    current: Option<CallInfo>,
}

/// Session handler wiring calls to the file-descriptor port
#[derive(Debug)]
pub struct CallSessionManager {
    fd_port: OwnedPort,
    bridge: Arc<ConferenceBridge>,
    control: Arc<dyn CallControl>,
    policy: HangupPolicy,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl CallSessionManager {
    /// Create a manager serving calls with the given fd port
    pub fn new(fd_port: OwnedPort, control: Arc<dyn CallControl>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            bridge: Arc::clone(fd_port.bridge()),
            fd_port,
            control,
            policy: HangupPolicy::default(),
            state: Mutex::new(SessionState::default()),
            events,
        }
    }

    /// Set the hangup policy
    pub fn with_policy(mut self, policy: HangupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Hangup policy in effect
    pub fn policy(&self) -> HangupPolicy {
        self.policy
    }

    /// Bridge port of the fd port
    pub fn fd_port_id(&self) -> PortId {
        self.fd_port.id()
    }

    /// Bridge the fd port is registered with
    pub fn bridge(&self) -> &Arc<ConferenceBridge> {
        &self.bridge
    }

    /// Snapshot of the current call, if any
    pub fn current_call(&self) -> Option<CallInfo> {
        self.state.lock().current.clone()
    }

    /// Whether a call is being served
    pub fn is_busy(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Connect the call port and the fd port in both directions
    fn connect_media(&self, call_port: PortId) -> Result<()> {
        let fd_port = self.fd_port.id();
        self.bridge.connect(fd_port, call_port)?;
        self.bridge.connect(call_port, fd_port)?;
        Ok(())
    }

    /// Remove both edges between the call port and the fd port
    fn disconnect_media(&self, call_port: PortId) -> Result<()> {
        let fd_port = self.fd_port.id();
        self.bridge.disconnect(fd_port, call_port)?;
        self.bridge.disconnect(call_port, fd_port)?;
        Ok(())
    }

    /// Unwire the call if it is wired; returns whether anything changed
    fn release_media(&self, call_id: &CallId, call_port: Option<PortId>) -> bool {
        let Some(call_port) = call_port else {
            return false;
        };
        match self.disconnect_media(call_port) {
            Ok(()) => {
                debug!("Disconnected media of {} (port {})", call_id, call_port);
                true
            }
            Err(e) => {
                // The call port may already be gone, which removed its edges
                debug!("Media of {} already released: {}", call_id, e);
                true
            }
        }
    }

    async fn reject_busy(&self, call: &IncomingCall) -> CallDecision {
        let status = StatusCode::BUSY_HERE;
        info!("Rejecting call {} from {}: already in a call", call.call_id, call.remote_uri);
        if let Err(e) = self.control.hangup(&call.call_id, status).await {
            warn!("Failed to reject call {}: {}", call.call_id, e);
        }
        self.emit(SessionEvent::CallRejected {
            call_id: call.call_id.clone(),
            status,
        });
        CallDecision::Reject {
            status,
            reason: status.reason_phrase().to_string(),
        }
    }
}

#[async_trait]
impl CallEventHandler for CallSessionManager {
    async fn on_incoming_call(&self, call: IncomingCall) -> CallDecision {
        let claimed = {
            let mut state = self.state.lock();
            if state.current.is_some() {
                false
            } else {
                state.current = Some(CallInfo {
                    call_id: call.call_id.clone(),
                    remote_uri: call.remote_uri.clone(),
                    state: CallState::Incoming,
                    media_state: MediaState::None,
                    audio_port: None,
                    media_connected: false,
                });
                true
            }
        };
        if !claimed {
            return self.reject_busy(&call).await;
        }

        info!("Incoming call {} from {}", call.call_id, call.remote_uri);
        if let Err(e) = self.control.answer(&call.call_id, StatusCode::OK).await {
            warn!("Failed to answer call {}: {}", call.call_id, e);
            let mut state = self.state.lock();
            if state.current.as_ref().map(|c| &c.call_id) == Some(&call.call_id) {
                state.current = None;
            }
            return CallDecision::Reject {
                status: StatusCode::DECLINE,
                reason: e.to_string(),
            };
        }

        self.emit(SessionEvent::CallAnswered {
            call_id: call.call_id,
            remote_uri: call.remote_uri,
        });
        CallDecision::Accept
    }

    async fn on_call_state_changed(&self, call_id: &CallId, new_state: CallState) {
        // Edges come off under the state lock so a concurrent media event
        // cannot rewire a call that has already ended
        let released = {
            let mut state = self.state.lock();
            let Some(current) = state.current.as_mut().filter(|c| &c.call_id == call_id) else {
                // e.g. a call rejected as busy hanging up
                debug!("Ignoring state {:?} of call {} (not current)", new_state, call_id);
                return;
            };
            current.state = new_state;
            debug!("Call {} state: {:?}", call_id, new_state);
            if !new_state.is_terminated() {
                return;
            }
            let Some(ended) = state.current.take() else {
                return;
            };
            ended.media_connected
                && self.policy == HangupPolicy::Disconnect
                && self.release_media(call_id, ended.audio_port)
        };

        info!("Call {} hung up", call_id);
        if released {
            self.emit(SessionEvent::MediaDisconnected {
                call_id: call_id.clone(),
            });
        }
        self.emit(SessionEvent::CallEnded {
            call_id: call_id.clone(),
        });
    }

    async fn on_media_state_changed(
        &self,
        call_id: &CallId,
        media_state: MediaState,
        audio_port: Option<PortId>,
    ) {
        let event = {
            let mut state = self.state.lock();
            let Some(current) = state.current.as_mut().filter(|c| &c.call_id == call_id) else {
                debug!("Ignoring media state of call {} (not current)", call_id);
                return;
            };
            current.media_state = media_state;
            let previous = current.audio_port.filter(|_| current.media_connected);

            if media_state == MediaState::Active {
                let Some(port) = audio_port else {
                    warn!("Call {} reports active media without an audio port", call_id);
                    return;
                };
                if let Some(stale) = previous.filter(|&p| p != port) {
                    self.release_media(call_id, Some(stale));
                }
                current.audio_port = Some(port);
                match self.connect_media(port) {
                    Ok(()) => {
                        current.media_connected = true;
                        info!(
                            "Call {} media active: {} <-> {}",
                            call_id,
                            port,
                            self.fd_port.id()
                        );
                        Some(SessionEvent::MediaConnected {
                            call_id: call_id.clone(),
                            call_port: port,
                            fd_port: self.fd_port.id(),
                        })
                    }
                    Err(e) => {
                        current.media_connected = false;
                        warn!("Failed to connect media of call {}: {}", call_id, e);
                        None
                    }
                }
            } else if self.policy == HangupPolicy::Disconnect && previous.is_some() {
                current.media_connected = false;
                self.release_media(call_id, previous);
                debug!("Call {} media {:?}, unwired", call_id, media_state);
                Some(SessionEvent::MediaDisconnected {
                    call_id: call_id.clone(),
                })
            } else {
                None
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedCallControl;
    use fdport_media_core::{BridgeConfig, FdPortOptions, MemoryPort, StreamHandle};

    fn setup(policy: HangupPolicy) -> (Arc<ConferenceBridge>, Arc<SimulatedCallControl>, CallSessionManager) {
        let bridge = Arc::new(ConferenceBridge::new(BridgeConfig::default()).unwrap());
        let fd_port = bridge
            .create_fd_port_owned(FdPortOptions::new(
                StreamHandle::None,
                tempfile::tempfile().unwrap(),
            ))
            .unwrap();
        let control = SimulatedCallControl::new(bridge.clone());
        let manager = CallSessionManager::new(fd_port, control.clone()).with_policy(policy);
        (bridge, control, manager)
    }

    fn call_port(bridge: &ConferenceBridge) -> PortId {
        let (port, _) = MemoryPort::new("call", bridge.format(), bridge.samples_per_frame());
        bridge.add_port(Box::new(port)).unwrap()
    }

    #[tokio::test]
    async fn test_first_call_answered_second_busy() {
        let (_bridge, control, manager) = setup(HangupPolicy::Disconnect);
        let first = IncomingCall::new(CallId::new("a"), "sip:alice@example.com");
        let second = IncomingCall::new(CallId::new("b"), "sip:bob@example.com");

        assert_eq!(manager.on_incoming_call(first).await, CallDecision::Accept);
        let decision = manager.on_incoming_call(second).await;
        assert!(matches!(decision, CallDecision::Reject { status, .. } if status == StatusCode::BUSY_HERE));

        assert_eq!(manager.current_call().unwrap().call_id, CallId::new("a"));
        assert_eq!(control.answered(), vec![(CallId::new("a"), StatusCode::OK)]);
        assert_eq!(control.hung_up(), vec![(CallId::new("b"), StatusCode::BUSY_HERE)]);
    }

    #[tokio::test]
    async fn test_rejected_call_ending_keeps_current_call() {
        let (_bridge, _control, manager) = setup(HangupPolicy::Disconnect);
        manager
            .on_incoming_call(IncomingCall::new(CallId::new("a"), "sip:a@x"))
            .await;
        manager
            .on_incoming_call(IncomingCall::new(CallId::new("b"), "sip:b@x"))
            .await;

        manager
            .on_call_state_changed(&CallId::new("b"), CallState::Disconnected)
            .await;
        assert!(manager.is_busy());
    }

    #[tokio::test]
    async fn test_active_media_connects_both_directions() {
        let (bridge, _control, manager) = setup(HangupPolicy::Disconnect);
        let mut events = manager.subscribe();
        let call = CallId::new("a");
        let port = call_port(&bridge);

        manager.on_incoming_call(IncomingCall::new(call.clone(), "sip:a@x")).await;
        manager.on_media_state_changed(&call, MediaState::Active, Some(port)).await;

        let fd = manager.fd_port_id();
        assert!(bridge.is_connected(fd, port));
        assert!(bridge.is_connected(port, fd));
        assert!(manager.current_call().unwrap().media_connected);

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::CallAnswered { .. }));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::MediaConnected {
                call_id: call,
                call_port: port,
                fd_port: fd
            }
        );
    }

    #[tokio::test]
    async fn test_hangup_disconnects_by_default() {
        let (bridge, _control, manager) = setup(HangupPolicy::Disconnect);
        let call = CallId::new("a");
        let port = call_port(&bridge);
        manager.on_incoming_call(IncomingCall::new(call.clone(), "sip:a@x")).await;
        manager.on_media_state_changed(&call, MediaState::Active, Some(port)).await;

        manager.on_call_state_changed(&call, CallState::Disconnected).await;
        assert!(bridge.connections().is_empty());
        assert!(!manager.is_busy());
    }

    #[tokio::test]
    async fn test_keep_connected_leaves_edges() {
        let (bridge, _control, manager) = setup(HangupPolicy::KeepConnected);
        let call = CallId::new("a");
        let port = call_port(&bridge);
        manager.on_incoming_call(IncomingCall::new(call.clone(), "sip:a@x")).await;
        manager.on_media_state_changed(&call, MediaState::Active, Some(port)).await;

        manager.on_media_state_changed(&call, MediaState::None, None).await;
        manager.on_call_state_changed(&call, CallState::Disconnected).await;
        assert_eq!(bridge.connections().len(), 2);
        assert!(!manager.is_busy());

        // Destroying the call port is what finally removes them
        bridge.destroy_port(port).unwrap();
        assert!(bridge.connections().is_empty());
    }

    #[tokio::test]
    async fn test_hold_unwires_and_resume_rewires() {
        let (bridge, _control, manager) = setup(HangupPolicy::Disconnect);
        let call = CallId::new("a");
        let port = call_port(&bridge);
        manager.on_incoming_call(IncomingCall::new(call.clone(), "sip:a@x")).await;
        manager.on_media_state_changed(&call, MediaState::Active, Some(port)).await;

        manager.on_media_state_changed(&call, MediaState::LocalHold, None).await;
        assert!(bridge.connections().is_empty());

        manager.on_media_state_changed(&call, MediaState::Active, Some(port)).await;
        assert_eq!(bridge.connections().len(), 2);
    }

    #[tokio::test]
    async fn test_new_audio_port_replaces_old_one() {
        let (bridge, _control, manager) = setup(HangupPolicy::Disconnect);
        let call = CallId::new("a");
        let old = call_port(&bridge);
        let new = call_port(&bridge);
        manager.on_incoming_call(IncomingCall::new(call.clone(), "sip:a@x")).await;
        manager.on_media_state_changed(&call, MediaState::Active, Some(old)).await;
        manager.on_media_state_changed(&call, MediaState::Active, Some(new)).await;

        let fd = manager.fd_port_id();
        let mut expected = vec![(fd, new), (new, fd)];
        expected.sort();
        assert_eq!(bridge.connections(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hangup_racing_media_leaves_no_edges() {
        let (bridge, _control, manager) = setup(HangupPolicy::Disconnect);
        let manager = Arc::new(manager);
        let port = call_port(&bridge);

        for i in 0..200 {
            let call = CallId::new(format!("race-{i}"));
            manager.on_incoming_call(IncomingCall::new(call.clone(), "sip:a@x")).await;

            let media = {
                let (manager, call) = (manager.clone(), call.clone());
                tokio::spawn(async move {
                    manager.on_media_state_changed(&call, MediaState::Active, Some(port)).await
                })
            };
            let hangup = {
                let (manager, call) = (manager.clone(), call.clone());
                tokio::spawn(async move {
                    manager.on_call_state_changed(&call, CallState::Disconnected).await
                })
            };
            media.await.unwrap();
            hangup.await.unwrap();

            assert!(!manager.is_busy());
            assert!(bridge.connections().is_empty(), "edges left behind by {call}");
        }
    }

    #[tokio::test]
    async fn test_media_for_unknown_call_is_ignored() {
        let (bridge, _control, manager) = setup(HangupPolicy::Disconnect);
        let port = call_port(&bridge);
        manager
            .on_media_state_changed(&CallId::new("ghost"), MediaState::Active, Some(port))
            .await;
        assert!(bridge.connections().is_empty());
    }
}
