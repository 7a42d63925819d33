//! Call sessions driven end to end through the simulated call control

use std::sync::Arc;
use std::time::Duration;

use fdport_media_core::{BridgeClock, BridgeConfig, ConferenceBridge, FdPortOptions, ToneGenerator};
use fdport_session_core::*;
use serial_test::serial;

struct Fixture {
    _dir: tempfile::TempDir,
    out_path: std::path::PathBuf,
    bridge: Arc<ConferenceBridge>,
    control: Arc<SimulatedCallControl>,
    manager: Arc<CallSessionManager>,
}

fn fixture(input_samples: usize, policy: HangupPolicy) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.pcm");
    let out_path = dir.path().join("out.pcm");
    std::fs::write(&in_path, vec![0u8; input_samples * 2]).unwrap();

    let bridge = Arc::new(ConferenceBridge::new(BridgeConfig::default()).unwrap());
    let fd_port = bridge
        .create_fd_port_owned(FdPortOptions::new(in_path.as_path(), out_path.as_path()))
        .unwrap();
    let control = SimulatedCallControl::new(bridge.clone());
    let manager = Arc::new(CallSessionManager::new(fd_port, control.clone()).with_policy(policy));

    Fixture {
        _dir: dir,
        out_path,
        bridge,
        control,
        manager,
    }
}

fn read_pcm(path: &std::path::Path) -> Vec<i16> {
    std::fs::read(path)
        .unwrap()
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[tokio::test]
async fn test_call_audio_reaches_output_file() {
    let fx = fixture(8000, HangupPolicy::Disconnect);
    let mut events = fx.manager.subscribe();
    let options = SimulatedCallOptions {
        tone_hz: 440.0,
        amplitude: 10000,
        tone_samples: Some(8000),
        ..Default::default()
    };

    let call = fx.control.place_call(fx.manager.clone(), options).await.unwrap();
    assert!(call.decision().is_accept());
    let call_port = call.audio_port().unwrap();
    assert!(fx.bridge.is_connected(fx.manager.fd_port_id(), call_port));
    assert!(fx.bridge.is_connected(call_port, fx.manager.fd_port_id()));

    for _ in 0..50 {
        fx.bridge.tick();
    }
    let received = call.hangup().await;

    assert_eq!(received, vec![0i16; 8000]);
    assert_eq!(
        read_pcm(&fx.out_path),
        ToneGenerator::samples(440.0, 10000, 8000, 0, 8000)
    );
    assert!(fx.bridge.connections().is_empty());
    assert!(!fx.manager.is_busy());

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(std::mem::discriminant(&event));
        assert!(event.call_id().as_str().starts_with("call-"));
    }
    assert_eq!(kinds.len(), 4);
}

#[tokio::test]
async fn test_second_call_is_busy() {
    let fx = fixture(160, HangupPolicy::Disconnect);
    let first = fx
        .control
        .place_call(fx.manager.clone(), SimulatedCallOptions::default())
        .await
        .unwrap();
    let second = fx
        .control
        .place_call(fx.manager.clone(), SimulatedCallOptions::default())
        .await
        .unwrap();

    assert!(matches!(
        second.decision(),
        CallDecision::Reject { status, .. } if *status == StatusCode::BUSY_HERE
    ));
    assert!(second.audio_port().is_none());
    assert_eq!(fx.control.hung_up(), vec![(second.call_id().clone(), StatusCode::BUSY_HERE)]);

    // The busy call's disconnect leaves the first call in place
    assert_eq!(fx.manager.current_call().unwrap().call_id, *first.call_id());
    assert_eq!(fx.bridge.connections().len(), 2);

    first.hangup().await;
    let third = fx
        .control
        .place_call(fx.manager.clone(), SimulatedCallOptions::default())
        .await
        .unwrap();
    assert!(third.decision().is_accept());
    third.hangup().await;
}

#[tokio::test]
async fn test_hold_stops_audio_to_file() {
    let fx = fixture(0, HangupPolicy::Disconnect);
    let call = fx
        .control
        .place_call(fx.manager.clone(), SimulatedCallOptions::default())
        .await
        .unwrap();

    for _ in 0..5 {
        fx.bridge.tick();
    }
    call.set_media_state(MediaState::RemoteHold).await.unwrap();
    assert!(fx.bridge.connections().is_empty());
    for _ in 0..5 {
        fx.bridge.tick();
    }
    call.set_media_state(MediaState::Active).await.unwrap();
    for _ in 0..5 {
        fx.bridge.tick();
    }
    call.hangup().await;

    // Only the ticks with media connected reached the file
    assert_eq!(read_pcm(&fx.out_path).len(), 10 * 160);
}

#[tokio::test]
async fn test_keep_connected_policy_holds_edges_until_port_is_gone() {
    let fx = fixture(0, HangupPolicy::KeepConnected);
    let mut events = fx.manager.subscribe();
    let call = fx
        .control
        .place_call(fx.manager.clone(), SimulatedCallOptions::default())
        .await
        .unwrap();
    let port = call.audio_port().unwrap();

    call.set_media_state(MediaState::LocalHold).await.unwrap();
    assert!(fx.bridge.is_connected(port, fx.manager.fd_port_id()));

    call.hangup().await;
    // The simulated stack destroys the call port on hangup
    assert!(fx.bridge.connections().is_empty());

    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, SessionEvent::MediaDisconnected { .. }));
    }
}

#[tokio::test]
#[serial]
async fn test_call_with_running_clock() {
    let fx = fixture(8000, HangupPolicy::Disconnect);
    let mut clock = BridgeClock::start(fx.bridge.clone()).unwrap();

    let call = fx
        .control
        .place_call(fx.manager.clone(), SimulatedCallOptions::default())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let received = call.hangup().await;
    clock.stop();

    assert!(!received.is_empty());
    assert!(received.iter().all(|&s| s == 0));
    let written = read_pcm(&fx.out_path);
    assert_eq!(written.len() % 160, 0);
    assert!(!written.is_empty());
}
