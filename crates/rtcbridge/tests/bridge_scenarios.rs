use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rtcbridge::core::{decode_event, DecodedEvent, RecordingRuntime, RuntimeHandle, WireSchema};
use rtcbridge::engine::{
    ContextHandle, EngineCall, EngineEvent, LoopbackController, OfflineReason, ViewHandle,
};
use rtcbridge::envelope::{EnvelopeConfig, JOIN_SUCCESS, USER_JOINED, USER_OFFLINE};
use rtcbridge::{Bridge, BridgeConfig, BridgeError, BridgeState, InitMode};

fn create(
    controller: &LoopbackController,
    runtime: &Arc<RecordingRuntime>,
    config: BridgeConfig,
    mode: InitMode,
) -> rtcbridge::Result<Bridge> {
    Bridge::create(
        controller.factory(),
        RuntimeHandle::new(runtime.clone()),
        ContextHandle::from_raw(0x51),
        config,
        mode,
    )
}

#[test]
fn join_success_reaches_managed_target() {
    let controller = LoopbackController::new();
    controller.set_local_uid(42);
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = create(&controller, &runtime, BridgeConfig::default(), InitMode::Sync)
        .expect("bridge should be created");

    assert_eq!(bridge.state(), BridgeState::Ready);
    bridge.join_channel("room1").expect("join should succeed");

    let deliveries = runtime.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].message_id, JOIN_SUCCESS);
    assert_eq!(
        deliveries[0].wire,
        [11, 0, 42, 0, 0, 0, b'r', b'o', b'o', b'm', b'1']
    );
    assert_eq!(
        decode_event(
            deliveries[0].message_id,
            &deliveries[0].wire,
            WireSchema::Legacy,
            &EnvelopeConfig::default()
        )
        .unwrap(),
        DecodedEvent::JoinSuccess {
            uid: 42,
            channel: b"room1".to_vec(),
        }
    );
    assert!(controller.calls().contains(&EngineCall::JoinChannel {
        channel: "room1".to_string(),
        uid: 0,
    }));
}

#[test]
fn legacy_offline_concatenates_digits() {
    let controller = LoopbackController::new();
    let runtime = Arc::new(RecordingRuntime::new());
    let _bridge = create(&controller, &runtime, BridgeConfig::default(), InitMode::Sync).unwrap();

    assert!(controller.emit(&EngineEvent::UserOffline {
        uid: 7,
        reason: OfflineReason::Dropped,
    }));

    let deliveries = runtime.deliveries();
    assert_eq!(deliveries[0].message_id, USER_OFFLINE);
    assert_eq!(deliveries[0].wire, b"\x04\x0071");
}

#[test]
fn binary_schema_keeps_fields_apart() {
    let controller = LoopbackController::new();
    let runtime = Arc::new(RecordingRuntime::new());
    let config = BridgeConfig {
        wire_schema: WireSchema::Binary,
        ..BridgeConfig::default()
    };
    let _bridge = create(&controller, &runtime, config, InitMode::Sync).unwrap();

    controller.emit(&EngineEvent::UserOffline {
        uid: 10,
        reason: OfflineReason::BecomeAudience,
    });

    let wire = &runtime.deliveries()[0].wire;
    assert_eq!(wire, &[10, 0, 10, 0, 0, 0, 2, 0, 0, 0]);
    assert_eq!(
        decode_event(USER_OFFLINE, wire, WireSchema::Binary, &EnvelopeConfig::default()).unwrap(),
        DecodedEvent::UserOffline {
            uid: 10,
            reason: OfflineReason::BecomeAudience,
        }
    );
}

#[test]
fn destroy_is_reported_once() {
    let controller = LoopbackController::new();
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = create(&controller, &runtime, BridgeConfig::default(), InitMode::Sync).unwrap();

    bridge.destroy().expect("first destroy should succeed");
    assert!(matches!(bridge.destroy(), Err(BridgeError::AlreadyClosed)));
    assert_eq!(bridge.state(), BridgeState::Closed);
    assert_eq!(controller.release_count(), 1);
    assert_eq!(runtime.live_target_count(), 0);

    // Late callbacks find no handler.
    assert!(!controller.emit(&EngineEvent::LeaveChannel));
    assert!(matches!(
        bridge.switch_camera(),
        Err(BridgeError::NotReady(BridgeState::Closed))
    ));
}

#[test]
fn async_bridge_rejects_until_ready() {
    let controller = LoopbackController::new();
    controller.set_init_delay(Duration::from_millis(150));
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = create(&controller, &runtime, BridgeConfig::default(), InitMode::Async).unwrap();

    assert!(matches!(
        bridge.join_channel("room1"),
        Err(BridgeError::NotReady(BridgeState::Initializing))
    ));

    bridge.wait_ready(None).expect("engine should come up");
    assert_eq!(bridge.state(), BridgeState::Ready);
    bridge.join_channel("room1").expect("join should succeed after ready");
}

#[test]
fn async_failure_closes_bridge() {
    let controller = LoopbackController::new();
    controller.fail_initialize(110);
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = create(&controller, &runtime, BridgeConfig::default(), InitMode::Async).unwrap();

    assert!(matches!(
        bridge.wait_ready(Some(Duration::from_secs(5))),
        Err(BridgeError::ConstructionFailed(110))
    ));
    assert_eq!(bridge.state(), BridgeState::Closed);
    assert_eq!(controller.release_count(), 1);
}

#[test]
fn every_attach_is_paired_with_a_detach() {
    let controller = LoopbackController::new();
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = create(&controller, &runtime, BridgeConfig::default(), InitMode::Sync).unwrap();

    for uid in 1..=5 {
        controller.emit(&EngineEvent::UserJoined { uid, elapsed_ms: 0 });
    }
    controller.emit(&EngineEvent::FirstRemoteVideoDecoded {
        uid: 3,
        width: 640,
        height: 360,
        elapsed_ms: 12,
    });
    drop(bridge);

    assert_eq!(runtime.deliveries().len(), 5);
    assert_eq!(runtime.remote_views().len(), 1);
    assert_eq!(runtime.attach_count(), runtime.detach_count());
    assert_eq!(runtime.released_target_count(), 1);
}

#[test]
fn events_from_many_engine_threads_are_all_delivered() {
    let controller = LoopbackController::new();
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = create(&controller, &runtime, BridgeConfig::default(), InitMode::Sync).unwrap();

    let handles: Vec<_> = (0..4u32)
        .map(|worker| {
            let controller = controller.clone();
            thread::spawn(move || {
                for i in 0..25u32 {
                    controller.emit(&EngineEvent::UserMuteAudio {
                        uid: worker * 100 + i,
                        muted: i % 2 == 0,
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("engine thread should not panic");
    }

    let deliveries = runtime.deliveries();
    assert_eq!(deliveries.len(), 100);
    assert!(deliveries.iter().all(|d| d.thread != thread::current().id()));
    assert_eq!(bridge.dispatch_stats().delivered, 100);
    assert_eq!(runtime.attach_count(), runtime.detach_count());
}

#[test]
fn message_handler_calling_back_during_join_does_not_hang() {
    let controller = LoopbackController::new();
    controller.set_local_uid(42);
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = Arc::new(
        create(&controller, &runtime, BridgeConfig::default(), InitMode::Sync)
            .expect("bridge should be created"),
    );

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    {
        let bridge = Arc::downgrade(&bridge);
        let outcomes = Arc::clone(&outcomes);
        runtime.on_deliver(move |delivery| {
            if delivery.message_id != JOIN_SUCCESS {
                return;
            }
            if let Some(bridge) = bridge.upgrade() {
                let outcome = bridge.setup_local_video(ViewHandle::from_raw(7));
                outcomes.lock().unwrap().push(outcome);
            }
        });
    }

    // The join fires JOIN_SUCCESS synchronously on this thread.
    let (done_tx, done_rx) = mpsc::channel();
    let joiner = {
        let bridge = Arc::clone(&bridge);
        thread::spawn(move || {
            let joined = bridge.join_channel("room1");
            done_tx.send(()).unwrap();
            joined
        })
    };
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("join_channel should return");
    joiner.join().unwrap().expect("join should succeed");

    assert!(matches!(
        outcomes.lock().unwrap()[..],
        [Err(BridgeError::Reentrant("setupLocalVideo"))]
    ));
    assert_eq!(runtime.deliveries().len(), 1);

    // Outside the handler the same command goes through.
    bridge
        .setup_local_video(ViewHandle::from_raw(7))
        .expect("setup should succeed");
    assert_eq!(bridge.state(), BridgeState::Ready);
}

#[test]
fn message_handler_can_destroy_the_bridge() {
    let controller = LoopbackController::new();
    let runtime = Arc::new(RecordingRuntime::new());
    let bridge = Arc::new(
        create(&controller, &runtime, BridgeConfig::default(), InitMode::Sync)
            .expect("bridge should be created"),
    );

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    {
        let bridge = Arc::downgrade(&bridge);
        let outcomes = Arc::clone(&outcomes);
        runtime.on_deliver(move |delivery| {
            if delivery.message_id != USER_JOINED {
                return;
            }
            if let Some(bridge) = bridge.upgrade() {
                let outcome = bridge.destroy();
                outcomes.lock().unwrap().push(outcome);
            }
        });
    }

    let emitter = controller.clone();
    thread::spawn(move || {
        emitter.emit(&EngineEvent::UserJoined {
            uid: 5,
            elapsed_ms: 0,
        })
    })
    .join()
    .unwrap();

    assert!(matches!(outcomes.lock().unwrap()[..], [Ok(())]));
    assert_eq!(bridge.state(), BridgeState::Closed);
    assert_eq!(controller.release_count(), 1);
    assert_eq!(runtime.live_target_count(), 0);
    assert_eq!(runtime.attach_count(), runtime.detach_count());
    assert!(matches!(bridge.destroy(), Err(BridgeError::AlreadyClosed)));
}
