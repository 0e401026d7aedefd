use crate::{
    BridgeConnection, ConnectionState, CoreError, InboundFrame, OutboundFrame,
    tests::support::ScriptedSerial,
};

use std::{sync::Arc, time::Duration};

/// Short acknowledgment timeout so silent-port tests stay fast.
const TEST_TIMEOUT: Duration = Duration::from_millis(50);

fn ack() -> Vec<u8> {
    // StatusResponse, version 1, status ok.
    vec![0x20, 0x01, 0x00]
}

fn connection(transport: &Arc<ScriptedSerial>) -> BridgeConnection {
    BridgeConnection::new(
        Arc::<ScriptedSerial>::clone(transport),
        115_200,
        TEST_TIMEOUT,
    )
}

/// WHAT: Auto-connect skips silent ports and lands on the answering one
/// WHY: Scanning must tolerate unrelated serial devices
#[test]
fn given_silent_first_port_when_auto_connecting_then_second_port_wins() {
    let transport = Arc::new(ScriptedSerial::new());
    transport.add_port("COM1", vec![]);
    transport.add_port("COM2", vec![vec![ack()]]);
    let bridge = connection(&transport);

    let port = bridge.auto_connect().unwrap();

    assert_eq!(port, "COM2");
    assert_eq!(
        bridge.current_state(),
        ConnectionState::Connected {
            port: "COM2".to_string(),
        }
    );
}

/// WHAT: A protocol version mismatch fails the handshake
/// WHY: Mismatched firmware must be rejected, not half-worked-with
#[test]
fn given_wrong_protocol_version_when_connecting_then_transport_error() {
    let transport = Arc::new(ScriptedSerial::new());
    // StatusResponse with version 2.
    transport.add_port("COM7", vec![vec![vec![0x20, 0x02, 0x00]]]);
    let bridge = connection(&transport);

    let result = bridge.connect("COM7");

    assert!(matches!(result, Err(CoreError::Transport { .. })));
    assert_eq!(bridge.current_state(), ConnectionState::Disconnected);
}

/// WHAT: An unacknowledged command is retried once, then succeeds
/// WHY: One lost ack must not fail an otherwise healthy link
#[test]
fn given_ack_only_on_retry_when_requesting_then_ok_after_two_sends() {
    let transport = Arc::new(ScriptedSerial::new());
    // Probe answered; first command send silent; retry answered.
    transport.add_port("COM3", vec![vec![ack()], vec![], vec![ack()]]);
    let bridge = connection(&transport);
    bridge.connect("COM3").unwrap();

    bridge
        .request_blocking(OutboundFrame::MoveAbsolute { x: 5, y: 6 })
        .unwrap();

    // Probe, first send, identical retry.
    let writes = transport.writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0], OutboundFrame::StatusQuery.encode().unwrap());
    assert_eq!(writes[1], writes[2]);
    assert_eq!(writes[1], OutboundFrame::MoveAbsolute { x: 5, y: 6 }.encode().unwrap());
}

/// WHAT: Exhausting the retry surfaces an actuator error
/// WHY: A dead device must fail the command, not hang the engine
#[test]
fn given_no_ack_at_all_when_requesting_then_actuator_dispatch_error() {
    let transport = Arc::new(ScriptedSerial::new());
    transport.add_port("COM4", vec![vec![ack()]]);
    let bridge = connection(&transport);
    bridge.connect("COM4").unwrap();

    let result = bridge.request_blocking(OutboundFrame::Click { button: 0, phase: 2 });

    assert!(matches!(result, Err(CoreError::ActuatorDispatch { .. })));
}

/// WHAT: A device nack carries the device's error text
/// WHY: "device error 3: bad" beats "command failed" in a log
#[test]
fn given_device_error_frame_when_requesting_then_error_with_message() {
    let transport = Arc::new(ScriptedSerial::new());
    let mut nack = vec![0xFF, 0x03, 0x03];
    nack.extend_from_slice(b"bad");
    transport.add_port("COM5", vec![vec![ack()], vec![nack]]);
    let bridge = connection(&transport);
    bridge.connect("COM5").unwrap();

    let result = bridge.request_blocking(OutboundFrame::StatusQuery);

    match result {
        Err(CoreError::ActuatorDispatch { reason, .. }) => {
            assert!(reason.contains("bad"), "reason was {reason}");
        }
        other => panic!("expected dispatch error, got {other:?}"),
    }
}

/// WHAT: Notifications interleaved with an ack are forwarded, not lost
/// WHY: The device reports its own input on the same byte stream
#[test]
fn given_notification_before_ack_when_requesting_then_event_forwarded() {
    let transport = Arc::new(ScriptedSerial::new());
    // The command response is MouseMove(10, 20) followed by the ack.
    let mut response = vec![0x01, 0x0A, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00];
    response.extend_from_slice(&ack());
    transport.add_port("COM6", vec![vec![ack()], vec![response]]);
    let bridge = connection(&transport);
    bridge.connect("COM6").unwrap();
    let mut events = bridge.take_device_events().unwrap();

    bridge
        .request_blocking(OutboundFrame::Key { code: 0x41, phase: 0 })
        .unwrap();

    assert_eq!(
        events.try_recv().ok(),
        Some(InboundFrame::MouseMove { x: 10, y: 20 })
    );
}

/// WHAT: Requests without a connection fail immediately
/// WHY: The actuator must report "not connected", not block forever
#[test]
fn given_disconnected_bridge_when_requesting_then_transport_error() {
    let transport = Arc::new(ScriptedSerial::new());
    let bridge = connection(&transport);

    let result = bridge.request_blocking(OutboundFrame::StatusQuery);

    assert!(matches!(result, Err(CoreError::Transport { .. })));
}

/// WHAT: Disconnect settles the state and refuses further requests
/// WHY: Teardown must be clean from any state
#[test]
fn given_connected_bridge_when_disconnecting_then_state_settles_and_requests_fail() {
    let transport = Arc::new(ScriptedSerial::new());
    transport.add_port("COM8", vec![vec![ack()]]);
    let bridge = connection(&transport);
    bridge.connect("COM8").unwrap();

    bridge.disconnect();

    assert_eq!(bridge.current_state(), ConnectionState::Disconnected);
    assert!(matches!(
        bridge.request_blocking(OutboundFrame::StatusQuery),
        Err(CoreError::Transport { .. })
    ));

    // Disconnect is idempotent.
    bridge.disconnect();
    assert_eq!(bridge.current_state(), ConnectionState::Disconnected);
}
