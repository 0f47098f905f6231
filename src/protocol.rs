//! Cryostat wire protocol framing.
//!
//! The instrument speaks a line-less, length-prefixed ASCII protocol:
//! every command and every response is framed as a two-digit decimal
//! length (zero-padded, max 99) followed by exactly that many bytes.
//!
//! ```text
//! "03GUT"               get user temperature
//! "17STSP 4.835000e+01"  set platform setpoint (float args are %.6e)
//! "062.4513"            response: payload "2.4513"
//! ```
//!
//! Boolean-style responses carry the single character `T` for true;
//! anything else reads as false. Numeric responses carry a decimal
//! string parseable as a float.

use thiserror::Error;

/// Maximum frame body length expressible in the two-digit prefix.
pub const MAX_FRAME_BODY: usize = 99;

/// Default instrument TCP port.
pub const DEFAULT_PORT: u16 = 7773;

/// Framing errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame body too long: {0} bytes (max {MAX_FRAME_BODY})")]
    BodyTooLong(usize),

    #[error("frame body contains non-ASCII bytes")]
    NonAscii,

    #[error("malformed length prefix {0:?}")]
    BadLengthPrefix([u8; 2]),

    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("response payload is not valid UTF-8")]
    InvalidPayload,
}

/// Encode a command or response body into a length-prefixed frame.
pub fn encode_frame(body: &str) -> Result<Vec<u8>, ProtocolError> {
    if !body.is_ascii() {
        return Err(ProtocolError::NonAscii);
    }
    if body.len() > MAX_FRAME_BODY {
        return Err(ProtocolError::BodyTooLong(body.len()));
    }
    Ok(format!("{:02}{}", body.len(), body).into_bytes())
}

/// Encode a command carrying a float argument (`"<CMD> %.6e"`).
pub fn encode_command_with_float(command: &str, value: f64) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(&format!("{} {}", command, format_scientific(value)))
}

/// Parse a two-byte decimal length prefix.
pub fn parse_length_prefix(prefix: [u8; 2]) -> Result<usize, ProtocolError> {
    if !prefix.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::BadLengthPrefix(prefix));
    }
    Ok(usize::from(prefix[0] - b'0') * 10 + usize::from(prefix[1] - b'0'))
}

/// Decode a complete frame, returning exactly the declared payload bytes.
///
/// Trailing bytes beyond the declared length are ignored, matching the
/// instrument's habit of padding responses.
pub fn decode_frame(frame: &[u8]) -> Result<&[u8], ProtocolError> {
    if frame.len() < 2 {
        return Err(ProtocolError::Truncated {
            expected: 2,
            actual: frame.len(),
        });
    }
    let declared = parse_length_prefix([frame[0], frame[1]])?;
    let body = &frame[2..];
    if body.len() < declared {
        return Err(ProtocolError::Truncated {
            expected: declared,
            actual: body.len(),
        });
    }
    Ok(&body[..declared])
}

/// Interpret a boolean-style response payload (`"T"` is true).
pub fn parse_bool_payload(payload: &str) -> bool {
    payload == "T"
}

/// Format a float the way the instrument expects: C-style `%.6e`
/// (six fractional digits, signed two-digit exponent).
///
/// Rust's `{:e}` emits `3.000000e1`; the firmware wants `3.000000e+01`.
pub fn format_scientific(value: f64) -> String {
    let formatted = format!("{value:.6e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple_command() {
        let frame = encode_frame("GUT").expect("encode");
        assert_eq!(frame, b"03GUT");
    }

    #[test]
    fn test_encode_rejects_oversized_body() {
        let body = "X".repeat(100);
        assert!(matches!(
            encode_frame(&body),
            Err(ProtocolError::BodyTooLong(100))
        ));
    }

    #[test]
    fn test_encode_rejects_non_ascii() {
        assert!(matches!(
            encode_frame("GUT\u{2603}"),
            Err(ProtocolError::NonAscii)
        ));
    }

    #[test]
    fn test_float_command_framing() {
        let frame = encode_command_with_float("STSP", 48.35).expect("encode");
        assert_eq!(frame, b"17STSP 4.835000e+01");
    }

    #[test]
    fn test_format_scientific_matches_instrument() {
        assert_eq!(format_scientific(30.0), "3.000000e+01");
        assert_eq!(format_scientific(0.05), "5.000000e-02");
        assert_eq!(format_scientific(-1.5), "-1.500000e+00");
        assert_eq!(format_scientific(0.0), "0.000000e+00");
        assert_eq!(format_scientific(3.0), "3.000000e+00");
    }

    #[test]
    fn test_decode_returns_declared_payload_only() {
        let payload = decode_frame(b"042.45trailing-garbage").expect("decode");
        assert_eq!(payload, b"2.45");
    }

    #[test]
    fn test_decode_rejects_bad_prefix() {
        assert!(matches!(
            decode_frame(b"XXGUT"),
            Err(ProtocolError::BadLengthPrefix(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_frame() {
        assert!(matches!(
            decode_frame(b"09short"),
            Err(ProtocolError::Truncated {
                expected: 9,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_bool_payload() {
        assert!(parse_bool_payload("T"));
        assert!(!parse_bool_payload("F"));
        assert!(!parse_bool_payload(""));
        assert!(!parse_bool_payload("True"));
    }
}
