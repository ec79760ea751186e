//! End-to-end session behaviour against the mock platform
//!
//! Time is paused, so scan timeouts and echo windows advance only when the
//! test sleeps. Any command round-trip (e.g. `snapshot`) waits until every
//! platform event injected before it has been handled.


use std::time::Duration;

use antenna_core::{
    AdapterState, ConnectionState, Origin, Peripheral, PlatformError, PlatformEvent,
    SessionError, SessionEvent, StopReason, EMERGENCY_PHRASE,
};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use test_utils::*;

fn drain(notices: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = notices.try_recv() {
        events.push(event);
    }
    events
}

fn transitions(events: &[SessionEvent]) -> Vec<(ConnectionState, ConnectionState)> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

fn has_alert(events: &[SessionEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, SessionEvent::Alert { .. }))
}

// ----------------------------------------------------------------------------
// Scanning
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_scan_times_out_after_fifteen_seconds() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();

    session.start_scan().await.unwrap();
    platform.discover(Peripheral::new(ANTENNA_A)).await;
    platform.discover(Peripheral::new(ANTENNA_B)).await;
    assert_eq!(session.snapshot().await.unwrap().peripherals.len(), 2);

    sleep(Duration::from_secs(14)).await;
    assert_eq!(session.snapshot().await.unwrap().state, ConnectionState::Scanning);

    sleep(Duration::from_secs(2)).await;
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.peripherals.len(), 2);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Scan ended. Start a new scan to retry.")
    );
    assert_eq!(platform.call_count("stop_scan"), 1);
    assert!(drain(&mut notices).contains(&SessionEvent::ScanEnded {
        reason: StopReason::Timeout
    }));
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_cancels_timeout() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);

    session.start_scan().await.unwrap();
    session.stop_scan().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Disconnected);

    sleep(Duration::from_secs(20)).await;
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.last_error, None);
    assert_eq!(platform.call_count("stop_scan"), 1);
    assert_eq!(count_system(&session, "Scan stopped by user."), 1);

    // Stopping again is harmless
    session.stop_scan().await.unwrap();
    assert_eq!(platform.call_count("stop_scan"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_scan_clears_registry() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);

    session.start_scan().await.unwrap();
    platform.discover(Peripheral::new(ANTENNA_A)).await;
    session.stop_scan().await.unwrap();
    assert_eq!(session.peripherals().len(), 1);

    session.start_scan().await.unwrap();
    assert!(session.snapshot().await.unwrap().peripherals.is_empty());

    platform.discover(Peripheral::new(ANTENNA_B)).await;
    let peripherals = session.snapshot().await.unwrap().peripherals;
    assert_eq!(peripherals.len(), 1);
    assert_eq!(peripherals[0].id.as_str(), ANTENNA_B);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_sightings_are_deduplicated() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);

    session.start_scan().await.unwrap();
    platform.discover(Peripheral::new(ANTENNA_A)).await;
    platform
        .discover(
            Peripheral::new(ANTENNA_A)
                .with_name("Antena-1")
                .with_signal_strength(-60),
        )
        .await;
    platform.discover(Peripheral::new(ANTENNA_A)).await;

    let peripherals = session.snapshot().await.unwrap().peripherals;
    assert_eq!(peripherals.len(), 1);
    assert_eq!(peripherals[0].label(), "Antena-1");
    assert_eq!(peripherals[0].signal_strength, Some(-60));
    assert_eq!(count_system(&session, "Antenna found"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sightings_outside_a_scan_are_ignored() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);

    session.start_scan().await.unwrap();
    session.stop_scan().await.unwrap();
    platform.discover(Peripheral::new(ANTENNA_B)).await;

    assert!(session.snapshot().await.unwrap().peripherals.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_blocks_scan() {
    let platform = MockPlatform::new();
    platform.deny_permission();
    let session = spawn_session(&platform);

    assert_eq!(
        session.start_scan().await,
        Err(SessionError::PermissionDenied)
    );
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.last_error.is_some());
    assert_eq!(platform.call_count("start_scan"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_powered_off_adapter_blocks_scan() {
    let platform = MockPlatform::new();
    platform.set_adapter(AdapterState::PoweredOff);
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();

    assert_eq!(
        session.start_scan().await,
        Err(SessionError::AdapterNotReady)
    );
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(has_alert(&drain(&mut notices)));
    assert_eq!(platform.call_count("start_scan"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_scan_passes_through_error() {
    let platform = MockPlatform::new();
    platform.fail_next_scan(PlatformError::Other("radio busy".to_string()));
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();

    let result = session.start_scan().await;
    assert!(matches!(result, Err(SessionError::ScanFailed(_))));
    assert_eq!(
        transitions(&drain(&mut notices)),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Scanning),
            (ConnectionState::Scanning, ConnectionState::Error),
            (ConnectionState::Error, ConnectionState::Disconnected),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_scan_feed_failure_stops_scan() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);

    session.start_scan().await.unwrap();
    platform
        .emit(PlatformEvent::ScanFailed("adapter reset".to_string()))
        .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.last_error.unwrap().contains("adapter reset"));
    assert_eq!(platform.call_count("stop_scan"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_power_loss_while_scanning_stops_the_scan() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();

    session.start_scan().await.unwrap();
    platform
        .emit(PlatformEvent::AdapterStateChanged(AdapterState::PoweredOff))
        .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(platform.call_count("stop_scan"), 1);
    assert_eq!(count_system(&session, "Scan stopped after an error."), 1);

    let events = drain(&mut notices);
    assert!(has_alert(&events));
    assert!(events.contains(&SessionEvent::ScanEnded {
        reason: StopReason::Error
    }));
    assert_eq!(
        transitions(&events),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Scanning),
            (ConnectionState::Scanning, ConnectionState::Error),
            (ConnectionState::Error, ConnectionState::Disconnected),
        ]
    );

    // The timeout of the stopped scan never fires
    sleep(Duration::from_secs(20)).await;
    assert_eq!(session.snapshot().await.unwrap().last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_adapter_is_watched_while_idle() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();
    session.snapshot().await.unwrap();
    assert_eq!(platform.call_count("watch_adapter"), 1);

    platform
        .emit(PlatformEvent::AdapterStateChanged(AdapterState::PoweredOff))
        .await;
    session.snapshot().await.unwrap();
    assert_eq!(count_system(&session, "Bluetooth state: PoweredOff"), 1);
    assert!(has_alert(&drain(&mut notices)));

    platform
        .emit(PlatformEvent::AdapterStateChanged(AdapterState::PoweredOn))
        .await;
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(count_system(&session, "Bluetooth powered on. Ready to scan."), 1);
    assert!(transitions(&drain(&mut notices)).is_empty());
    assert_eq!(platform.call_count("stop_scan"), 0);
}

// ----------------------------------------------------------------------------
// Connection Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_connect_walks_the_state_machine() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();

    session.start_scan().await.unwrap();
    platform
        .discover(Peripheral::new(ANTENNA_A).with_name("Antena-1"))
        .await;
    session.connect(ANTENNA_A).await.unwrap();

    let events = drain(&mut notices);
    assert_eq!(
        transitions(&events),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Scanning),
            (ConnectionState::Scanning, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Connected),
        ]
    );
    assert!(events.contains(&SessionEvent::ScanEnded {
        reason: StopReason::Connecting
    }));
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::SessionOpened { peripheral } if peripheral.label() == "Antena-1"
    )));

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.connected.unwrap().id.as_str(), ANTENNA_A);
    assert!(session
        .conversation()
        .snapshot()
        .iter()
        .all(|entry| entry.origin == Origin::System));

    let calls = platform.calls();
    let stop = calls.iter().position(|call| call == "stop_scan").unwrap();
    let connect = calls.iter().position(|call| call.starts_with("connect")).unwrap();
    assert!(stop < connect);
    assert_eq!(platform.call_count("subscribe"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_returns_to_disconnected() {
    let platform = MockPlatform::new();
    platform.fail_next_connect(PlatformError::Timeout { duration_ms: 10_000 });
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();

    let result = session.connect(ANTENNA_A).await;
    assert!(matches!(result, Err(SessionError::LinkEstablishFailed(_))));

    assert_eq!(
        transitions(&drain(&mut notices)),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Error),
            (ConnectionState::Error, ConnectionState::Disconnected),
        ]
    );
    let snapshot = session.snapshot().await.unwrap();
    assert!(snapshot.connected.is_none());
    assert!(snapshot.last_error.unwrap().starts_with("Connection failed"));
    assert_eq!(platform.call_count("disconnect"), 1);
    assert_eq!(platform.call_count("discover_services"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_discovery_and_subscribe_failures_release_the_link() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);

    platform.fail_next_discovery(PlatformError::Other("gatt error".to_string()));
    let result = session.connect(ANTENNA_A).await;
    assert!(matches!(result, Err(SessionError::DiscoveryFailed(_))));
    assert_eq!(session.state(), ConnectionState::Disconnected);

    platform.fail_next_subscribe(PlatformError::CharacteristicNotFound(
        "notify".to_string(),
    ));
    let result = session.connect(ANTENNA_A).await;
    assert!(matches!(result, Err(SessionError::SubscribeFailed(_))));
    assert_eq!(session.state(), ConnectionState::Disconnected);

    assert_eq!(platform.call_count("disconnect"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scan_and_connect_rejected_while_connected() {
    let (_platform, session) = connected_session().await;

    assert_eq!(
        session.start_scan().await,
        Err(SessionError::InvalidState {
            actual: ConnectionState::Connected
        })
    );
    assert!(matches!(
        session.connect(ANTENNA_B).await,
        Err(SessionError::InvalidState { .. })
    ));
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_user_disconnect_returns_to_scanner() {
    let (platform, session) = connected_session().await;
    let mut notices = session.subscribe();

    session.disconnect().await.unwrap();

    let events = drain(&mut notices);
    assert_eq!(
        transitions(&events),
        vec![(ConnectionState::Connected, ConnectionState::Disconnected)]
    );
    assert!(events.contains(&SessionEvent::ReturnToScanner));
    assert_eq!(platform.call_count("unsubscribe"), 1);
    assert_eq!(platform.call_count("disconnect"), 1);

    // A second disconnect has nothing to release
    session.disconnect().await.unwrap();
    assert_eq!(platform.call_count("disconnect"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_then_manual_disconnect_tears_down_once() {
    let (platform, session) = connected_session().await;
    let mut notices = session.subscribe();

    platform.drop_link(ANTENNA_A).await;
    session.disconnect().await.unwrap();

    let events = drain(&mut notices);
    assert_eq!(
        transitions(&events),
        vec![
            (ConnectionState::Connected, ConnectionState::Error),
            (ConnectionState::Error, ConnectionState::Disconnected),
        ]
    );
    assert!(has_alert(&events));
    assert_eq!(
        events
            .iter()
            .filter(|event| **event == SessionEvent::ReturnToScanner)
            .count(),
        1
    );
    assert_eq!(platform.call_count("disconnect"), 1);
    assert_eq!(count_system(&session, "Disconnected."), 1);
    assert_eq!(count_system(&session, "Device Antena-1 disconnected unexpectedly."), 1);
    assert!(session.last_error().unwrap().contains("Antena-1"));
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_of_other_peripheral_is_ignored() {
    let (platform, session) = connected_session().await;

    platform.drop_link(ANTENNA_B).await;
    assert_eq!(session.snapshot().await.unwrap().state, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_connect_cancels_scan_timeout() {
    let (platform, session) = connected_session().await;

    sleep(Duration::from_secs(20)).await;
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.last_error, None);
    assert_eq!(platform.call_count("stop_scan"), 1);
    assert_eq!(count_system(&session, "Scan stopped after timeout."), 0);
}

#[tokio::test(start_paused = true)]
async fn test_notification_error_keeps_the_session() {
    let (platform, session) = connected_session().await;
    let subscription = platform.subscription().unwrap();

    platform
        .emit(PlatformEvent::NotificationError {
            subscription: subscription.id,
            message: "GATT error 0x85".to_string(),
        })
        .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert!(snapshot.connected.is_some());
    assert_eq!(count_system(&session, "Notification error: GATT error 0x85"), 1);
    assert_eq!(platform.call_count("disconnect"), 0);
    assert_eq!(platform.call_count("unsubscribe"), 0);

    platform.notify("sigo aqui").await;
    session.snapshot().await.unwrap();
    assert_eq!(entries_from(&session, Origin::Peer)[0].text, "sigo aqui");
}

#[tokio::test(start_paused = true)]
async fn test_adapter_power_loss_drops_the_link() {
    let (platform, session) = connected_session().await;
    let mut notices = session.subscribe();

    platform
        .emit(PlatformEvent::AdapterStateChanged(AdapterState::PoweredOff))
        .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.connected.is_none());
    let events = drain(&mut notices);
    assert!(has_alert(&events));
    assert!(events.contains(&SessionEvent::ReturnToScanner));
}

// ----------------------------------------------------------------------------
// Messaging
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_send_writes_base64_and_logs_locally() {
    let (platform, session) = connected_session().await;

    session.send("  hola ").await.unwrap();

    assert_eq!(platform.writes(), vec![b"aG9sYQ==".to_vec()]);
    let local = entries_from(&session, Origin::Local);
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].text, "hola");
    assert!(!local[0].is_emergency);
}

#[tokio::test(start_paused = true)]
async fn test_blank_send_is_ignored() {
    let (platform, session) = connected_session().await;
    let before = session.conversation().len();

    session.send("   ").await.unwrap();
    session.send("").await.unwrap();

    assert!(platform.writes().is_empty());
    assert_eq!(session.conversation().len(), before);
}

#[tokio::test(start_paused = true)]
async fn test_send_without_connection_fails() {
    let platform = MockPlatform::new();
    let session = spawn_session(&platform);
    let mut notices = session.subscribe();

    assert_eq!(session.send("hola").await, Err(SessionError::NotConnected));
    assert!(platform.writes().is_empty());
    assert!(entries_from(&session, Origin::Local).is_empty());
    assert_eq!(count_system(&session, "Error: no active connection"), 1);
    assert!(has_alert(&drain(&mut notices)));
}

#[tokio::test(start_paused = true)]
async fn test_echo_and_duplicate_are_suppressed() {
    let (platform, session) = connected_session().await;

    session.send("hola").await.unwrap();
    platform.notify("hola").await;
    sleep(Duration::from_millis(100)).await;
    platform.notify("hola").await;
    session.snapshot().await.unwrap();
    assert!(entries_from(&session, Origin::Peer).is_empty());

    // Past the grace window the same text is a genuine peer message
    sleep(Duration::from_millis(600)).await;
    platform.notify("hola").await;
    session.snapshot().await.unwrap();
    let peer = entries_from(&session, Origin::Peer);
    assert_eq!(peer.len(), 1);
    assert_eq!(peer[0].text, "hola");
}

#[tokio::test(start_paused = true)]
async fn test_different_text_is_not_an_echo() {
    let (platform, session) = connected_session().await;

    session.send("hola").await.unwrap();
    platform.notify("adios").await;
    platform.notify("hola").await;
    session.snapshot().await.unwrap();

    let peer = entries_from(&session, Origin::Peer);
    assert_eq!(peer.len(), 1);
    assert_eq!(peer[0].text, "adios");
}

#[tokio::test(start_paused = true)]
async fn test_emergency_send_and_its_echo() {
    let (platform, session) = connected_session().await;
    let before = session.conversation().len();

    session.send_emergency("SOS").await.unwrap();
    platform.notify("SOS").await;
    sleep(Duration::from_millis(200)).await;
    platform.notify("SOS").await;
    session.snapshot().await.unwrap();

    let added = session.conversation().entries_from(before);
    assert_eq!(added.len(), 2);
    assert_eq!(added[0].origin, Origin::Local);
    assert_eq!(added[0].text, "SOS");
    assert!(added[0].is_emergency);
    assert_eq!(added[1].origin, Origin::System);
    assert_eq!(added[1].text, "Message sent.");
}

#[tokio::test(start_paused = true)]
async fn test_emergency_phrase_echo_is_suppressed() {
    let (platform, session) = connected_session().await;

    session.send_emergency(EMERGENCY_PHRASE).await.unwrap();
    platform.notify(EMERGENCY_PHRASE).await;
    session.snapshot().await.unwrap();

    let local = entries_from(&session, Origin::Local);
    assert_eq!(local.len(), 1);
    assert!(local[0].is_emergency);
    assert!(entries_from(&session, Origin::Peer).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_incoming_emergency_is_flagged() {
    let (platform, session) = connected_session().await;

    platform
        .notify(&format!("Ayuda: {}", EMERGENCY_PHRASE))
        .await;
    platform.notify("hola").await;
    session.snapshot().await.unwrap();

    let peer = entries_from(&session, Origin::Peer);
    assert_eq!(peer.len(), 2);
    assert!(peer[0].is_emergency);
    assert!(!peer[1].is_emergency);
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_notification_is_logged() {
    let (platform, session) = connected_session().await;

    platform.notify_raw(b"%%%not base64%%%").await;
    platform.notify_raw(b"  ").await;
    session.snapshot().await.unwrap();

    assert!(entries_from(&session, Origin::Peer).is_empty());
    assert_eq!(count_system(&session, "Could not decode incoming message"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_notifications_after_disconnect_are_dropped() {
    let (platform, session) = connected_session().await;
    let stale = platform.subscription().unwrap();

    session.disconnect().await.unwrap();
    platform
        .emit(PlatformEvent::Notification {
            subscription: stale.id,
            value: b"aG9sYQ==".to_vec(),
        })
        .await;
    session.snapshot().await.unwrap();

    assert!(entries_from(&session, Origin::Peer).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_keeps_a_healthy_link() {
    let (platform, session) = connected_session().await;
    let mut notices = session.subscribe();

    platform.fail_next_write(PlatformError::Other("GATT busy".to_string()));
    let result = session.send("hola").await;
    assert!(matches!(result, Err(SessionError::WriteFailed(_))));

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert!(snapshot.last_error.unwrap().contains("GATT busy"));
    assert!(has_alert(&drain(&mut notices)));

    // The failed message left no pending echo behind
    platform.notify("hola").await;
    session.snapshot().await.unwrap();
    assert_eq!(entries_from(&session, Origin::Peer).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_on_lost_link_disconnects() {
    let (platform, session) = connected_session().await;
    let mut notices = session.subscribe();

    platform.fail_next_write(PlatformError::LinkLost(ANTENNA_A.to_string()));
    let result = session.send("hola").await;
    assert!(matches!(result, Err(SessionError::WriteFailed(_))));

    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(drain(&mut notices).contains(&SessionEvent::ReturnToScanner));
    assert_eq!(platform.call_count("unsubscribe"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_write_times_out_without_blocking_the_session() {
    let (platform, session) = connected_session().await;
    platform.stall_writes();

    let sender = session.clone();
    let pending = tokio::spawn(async move { sender.send("hola").await });
    sleep(Duration::from_millis(10)).await;
    assert_eq!(platform.call_count("write"), 1);

    platform.drop_link(ANTENNA_A).await;
    timeout(Duration::from_secs(60), session.disconnect())
        .await
        .expect("disconnect is not blocked by the write")
        .unwrap();

    assert_eq!(
        pending.await.unwrap(),
        Err(SessionError::WriteFailed(PlatformError::Timeout {
            duration_ms: 10_000
        }))
    );
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(
        count_system(&session, "Device Antena-1 disconnected unexpectedly."),
        1
    );
    assert_eq!(platform.call_count("disconnect"), 1);
}

// ----------------------------------------------------------------------------
// Shutdown
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_link_and_closes_log() {
    let (platform, session) = connected_session().await;
    let mut cursor = session.conversation().cursor();

    session.shutdown().await.unwrap();

    assert_eq!(platform.call_count("disconnect"), 1);
    while cursor.next().await.is_some() {}
    assert_eq!(cursor.position(), session.conversation().len());
    assert_eq!(session.snapshot().await, Err(SessionError::SessionClosed));
}
