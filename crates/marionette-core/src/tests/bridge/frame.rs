use crate::{
    ClickPhase, CoreError, FrameDecoder, InboundFrame, KeyPhase, MouseButton, OutboundFrame,
    button_code, click_phase_code, key_phase_code,
};

/// WHAT: Absolute moves encode as tag + two little-endian i32s
/// WHY: The device parses fixed offsets; byte layout is the contract
#[test]
fn given_move_absolute_when_encoding_then_tag_and_le_payload() {
    let bytes = OutboundFrame::MoveAbsolute { x: 0x0102, y: -1 }.encode().unwrap();

    assert_eq!(bytes[0], 0x10);
    assert_eq!(&bytes[1..5], &[0x02, 0x01, 0x00, 0x00]);
    assert_eq!(&bytes[5..9], &[0xFF, 0xFF, 0xFF, 0xFF]);
}

/// WHAT: Relative moves carry signed 16-bit deltas
/// WHY: Negative deltas must survive the wire
#[test]
fn given_negative_delta_when_encoding_move_relative_then_le_i16() {
    let bytes = OutboundFrame::MoveRelative { dx: -2, dy: 3 }.encode().unwrap();

    assert_eq!(bytes, vec![0x11, 0xFE, 0xFF, 0x03, 0x00]);
}

/// WHAT: Text frames carry a u16 length prefix then UTF-8 bytes
/// WHY: The device allocates from the prefix before reading the body
#[test]
fn given_text_when_encoding_type_text_then_length_prefixed_utf8() {
    let bytes = OutboundFrame::TypeText("hé".to_string()).encode().unwrap();

    // "hé" is 3 bytes of UTF-8.
    assert_eq!(bytes[0], 0x14);
    assert_eq!(&bytes[1..3], &[0x03, 0x00]);
    assert_eq!(&bytes[3..], "hé".as_bytes());
}

/// WHAT: Text longer than the u16 prefix capacity is a validation error
/// WHY: Truncating at the prefix limit could split a UTF-8 sequence and
/// silently drop the tail of the payload
#[test]
fn given_oversize_text_when_encoding_type_text_then_validation_error() {
    let oversize = "a".repeat(u16::MAX as usize + 1);

    let result = OutboundFrame::TypeText(oversize).encode();

    assert!(matches!(result, Err(CoreError::Validation { .. })));
}

/// WHAT: Frames split across reads decode once complete
/// WHY: Serial chunks arbitrarily; the decoder must buffer partials
#[test]
fn given_split_status_response_when_decoding_then_frame_after_second_chunk() {
    let mut decoder = FrameDecoder::new();

    decoder.push_bytes(&[0x20, 0x01]);
    assert_eq!(decoder.next_frame().unwrap(), None);

    decoder.push_bytes(&[0x00]);
    assert_eq!(
        decoder.next_frame().unwrap(),
        Some(InboundFrame::StatusResponse {
            version: 1,
            status: 0,
        })
    );
    assert_eq!(decoder.next_frame().unwrap(), None);
}

/// WHAT: Several frames in one chunk decode in order
/// WHY: A chatty device can batch notifications into one read
#[test]
fn given_two_frames_in_one_chunk_when_decoding_then_both_in_order() {
    let mut decoder = FrameDecoder::new();
    decoder.push_bytes(&[
        0x01, 0x0A, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, // MouseMove(10, 20)
        0x02, 0x00, 0x02, // MouseClick(left, click)
    ]);

    assert_eq!(
        decoder.next_frame().unwrap(),
        Some(InboundFrame::MouseMove { x: 10, y: 20 })
    );
    assert_eq!(
        decoder.next_frame().unwrap(),
        Some(InboundFrame::MouseClick {
            button: 0,
            phase: 2,
        })
    );
}

/// WHAT: Device error frames decode code and message
/// WHY: The message text surfaces in actuator errors
#[test]
fn given_error_frame_when_decoding_then_code_and_message() {
    let mut decoder = FrameDecoder::new();
    let mut bytes = vec![0xFF, 0x07, 0x04];
    bytes.extend_from_slice(b"oops");
    decoder.push_bytes(&bytes);

    assert_eq!(
        decoder.next_frame().unwrap(),
        Some(InboundFrame::Error {
            code: 7,
            message: "oops".to_string(),
        })
    );
}

/// WHAT: An unknown tag is a transport error
/// WHY: Tag-length framing cannot resynchronize past garbage
#[test]
fn given_unknown_tag_when_decoding_then_transport_error() {
    let mut decoder = FrameDecoder::new();
    decoder.push_bytes(&[0x7E, 0x00]);

    assert!(matches!(
        decoder.next_frame(),
        Err(CoreError::Transport { .. })
    ));
}

/// WHAT: Wire codes match the documented protocol values
/// WHY: Host and firmware agree on these numbers, not on enum ordering
#[test]
fn given_enum_values_when_mapping_to_wire_codes_then_protocol_numbers() {
    assert_eq!(button_code(MouseButton::Left), 0);
    assert_eq!(button_code(MouseButton::X2), 4);
    assert_eq!(click_phase_code(ClickPhase::Click), 2);
    assert_eq!(key_phase_code(KeyPhase::Up), 1);
}
