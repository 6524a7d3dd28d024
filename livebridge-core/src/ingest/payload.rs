//! Payload extraction from inbound frames.
//!
//! The recording agent pushes media either as raw binary frames or as
//! text frames carrying a JSON document with a base64-encoded payload.
//! Three JSON shapes exist in the wild, tried in strict priority
//! order; extraction is total and never fails on malformed input.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use serde_json::Value;

/// One inbound unit from a streaming connection.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Binary(Bytes),
    Text(String),
}

/// Extracts the media payload from an inbound frame.
///
/// Binary frames pass through unchanged. Text frames are parsed as
/// JSON and the payload is searched for in priority order:
/// `data.data.buffer`, then top-level `data`, then `payload`, each
/// decoded from base64. The first stage yielding non-empty bytes
/// wins; any parse, field, or decode failure falls through to the
/// next stage. Returns `None` when no payload can be recovered.
pub fn extract_payload(frame: &InboundFrame) -> Option<Bytes> {
    match frame {
        InboundFrame::Binary(data) => {
            if data.is_empty() {
                None
            } else {
                Some(data.clone())
            }
        }
        InboundFrame::Text(text) => {
            let document: Value = serde_json::from_str(text).ok()?;

            let candidates = [
                document
                    .get("data")
                    .and_then(|v| v.get("data"))
                    .and_then(|v| v.get("buffer"))
                    .and_then(Value::as_str),
                document.get("data").and_then(Value::as_str),
                document.get("payload").and_then(Value::as_str),
            ];

            candidates
                .into_iter()
                .flatten()
                .find_map(|encoded| decode_non_empty(encoded))
        }
    }
}

fn decode_non_empty(encoded: &str) -> Option<Bytes> {
    let decoded = BASE64_STANDARD.decode(encoded).ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(Bytes::from(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(data: &[u8]) -> String {
        BASE64_STANDARD.encode(data)
    }

    #[test]
    fn test_binary_frame_passes_through() {
        let frame = InboundFrame::Binary(Bytes::from_static(b"\x00\x00\x00\x01gB"));
        assert_eq!(
            extract_payload(&frame).unwrap().as_ref(),
            b"\x00\x00\x00\x01gB"
        );
    }

    #[test]
    fn test_empty_binary_frame_yields_nothing() {
        assert!(extract_payload(&InboundFrame::Binary(Bytes::new())).is_none());
    }

    #[test]
    fn test_nested_buffer_shape_round_trips() {
        let payload = b"nested media bytes";
        let text = format!(
            r#"{{"data": {{"data": {{"buffer": "{}"}}}}}}"#,
            encode(payload)
        );

        let extracted = extract_payload(&InboundFrame::Text(text)).unwrap();
        assert_eq!(extracted.as_ref(), payload);
    }

    #[test]
    fn test_top_level_data_shape_round_trips() {
        let payload = b"flat media bytes";
        let text = format!(r#"{{"data": "{}"}}"#, encode(payload));

        let extracted = extract_payload(&InboundFrame::Text(text)).unwrap();
        assert_eq!(extracted.as_ref(), payload);
    }

    #[test]
    fn test_payload_field_shape_round_trips() {
        let payload = b"payload field bytes";
        let text = format!(r#"{{"payload": "{}"}}"#, encode(payload));

        let extracted = extract_payload(&InboundFrame::Text(text)).unwrap();
        assert_eq!(extracted.as_ref(), payload);
    }

    #[test]
    fn test_nested_shape_wins_over_top_level() {
        let text = format!(
            r#"{{"data": {{"data": {{"buffer": "{}"}}}}, "payload": "{}"}}"#,
            encode(b"nested"),
            encode(b"flat")
        );

        let extracted = extract_payload(&InboundFrame::Text(text)).unwrap();
        assert_eq!(extracted.as_ref(), b"nested");
    }

    #[test]
    fn test_invalid_base64_falls_through_to_next_shape() {
        let text = format!(
            r#"{{"data": "*** not base64 ***", "payload": "{}"}}"#,
            encode(b"fallback")
        );

        let extracted = extract_payload(&InboundFrame::Text(text)).unwrap();
        assert_eq!(extracted.as_ref(), b"fallback");
    }

    #[test]
    fn test_invalid_json_yields_nothing() {
        assert!(extract_payload(&InboundFrame::Text("{not json".to_string())).is_none());
    }

    #[test]
    fn test_unrelated_json_event_yields_nothing() {
        let text = r#"{"event": "participant_joined", "id": 42}"#.to_string();
        assert!(extract_payload(&InboundFrame::Text(text)).is_none());
    }

    #[test]
    fn test_non_string_data_field_yields_nothing() {
        let text = r#"{"data": 12345}"#.to_string();
        assert!(extract_payload(&InboundFrame::Text(text)).is_none());
    }

    #[test]
    fn test_empty_decoded_payload_yields_nothing() {
        let text = r#"{"data": ""}"#.to_string();
        assert!(extract_payload(&InboundFrame::Text(text)).is_none());
    }

    #[test]
    fn test_arbitrary_bytes_round_trip_all_shapes() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let encoded = encode(&payload);

        let shapes = [
            format!(r#"{{"data": {{"data": {{"buffer": "{encoded}"}}}}}}"#),
            format!(r#"{{"data": "{encoded}"}}"#),
            format!(r#"{{"payload": "{encoded}"}}"#),
        ];

        for shape in shapes {
            let extracted = extract_payload(&InboundFrame::Text(shape)).unwrap();
            assert_eq!(extracted.as_ref(), payload.as_slice());
        }
    }
}
