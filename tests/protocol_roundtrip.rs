//! Frame round-trip properties for the length-prefixed wire protocol.

use cryostation::protocol::{
    decode_frame, encode_command_with_float, encode_frame, parse_bool_payload, ProtocolError,
    MAX_FRAME_BODY,
};

#[test]
fn test_round_trip_recovers_payload_for_all_lengths() {
    for len in 0..=MAX_FRAME_BODY {
        let payload: String = "abcdefghij".chars().cycle().take(len).collect();
        let frame = encode_frame(&payload).expect("encode");
        assert_eq!(frame.len(), len + 2);

        let decoded = decode_frame(&frame).expect("decode");
        assert_eq!(decoded, payload.as_bytes(), "length {len}");
    }
}

#[test]
fn test_one_past_the_limit_is_rejected() {
    let payload = "x".repeat(MAX_FRAME_BODY + 1);
    assert!(matches!(
        encode_frame(&payload),
        Err(ProtocolError::BodyTooLong(_))
    ));
}

#[test]
fn test_float_command_round_trip() {
    let frame = encode_command_with_float("SHTSP", 5.0).expect("encode");
    let decoded = decode_frame(&frame).expect("decode");
    assert_eq!(decoded, b"SHTSP 5.000000e+00");
}

#[test]
fn test_boolean_payload_round_trip() {
    let frame = encode_frame("T").expect("encode");
    let decoded = decode_frame(&frame).expect("decode");
    assert!(parse_bool_payload(
        std::str::from_utf8(decoded).expect("utf8")
    ));
}
