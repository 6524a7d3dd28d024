//! Chunk assembly and frame-rate estimation.

use std::time::Duration;

use crate::ingest::Packet;

/// One time-boxed segment of drained media, consumed immediately by
/// the muxer.
#[derive(Debug)]
pub struct Chunk {
    /// Monotonic chunk counter, advanced once per assembled chunk
    pub sequence: u64,
    /// Video packets in arrival order; never empty
    pub video: Vec<Packet>,
    /// Audio packets in arrival order; possibly empty
    pub audio: Vec<Packet>,
    /// Estimated source frame rate, passed to the transcoder as an
    /// input hint
    pub frame_rate: f64,
}

impl Chunk {
    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }
}

/// Span between the first and last packet's capture time.
pub fn video_span(packets: &[Packet]) -> Duration {
    match (packets.first(), packets.last()) {
        (Some(first), Some(last)) => {
            last.captured_at.saturating_duration_since(first.captured_at)
        }
        _ => Duration::ZERO,
    }
}

/// Estimates the source frame rate as packet count over observed span,
/// clamped to `[min, max]`.
///
/// The source paces packets irregularly, so without this hint the
/// transcoder assumes an unrelated default rate and produces chunks
/// with wildly wrong durations. A zero span clamps to `max`.
pub fn estimate_frame_rate(packets: &[Packet], min: f64, max: f64) -> f64 {
    let span = video_span(packets).as_secs_f64();
    if span > 0.0 {
        (packets.len() as f64 / span).clamp(min, max)
    } else {
        max
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use bytes::Bytes;

    use super::*;

    fn packets_over(count: usize, span: Duration) -> Vec<Packet> {
        let start = Instant::now() - span;
        let step = span / count as u32;
        (0..count)
            .map(|i| Packet {
                payload: Bytes::from_static(b"frame"),
                captured_at: start + step * i as u32,
            })
            .collect()
    }

    #[test]
    fn test_uniform_packets_estimate_source_rate() {
        // 100 packets uniformly over 10 seconds: span covers 99 steps,
        // so the estimate lands just above 10.
        let packets = packets_over(100, Duration::from_secs(10));

        let rate = estimate_frame_rate(&packets, 1.0, 60.0);

        assert!((rate - 10.0).abs() < 0.2, "estimated {rate}");
    }

    #[test]
    fn test_estimate_clamped_to_range() {
        let slow = packets_over(2, Duration::from_secs(10));
        assert_eq!(estimate_frame_rate(&slow, 1.0, 60.0), 1.0);

        let burst = packets_over(500, Duration::from_millis(100));
        assert_eq!(estimate_frame_rate(&burst, 1.0, 60.0), 60.0);
    }

    #[test]
    fn test_zero_span_clamps_to_max() {
        let now = Instant::now();
        let packets = vec![
            Packet {
                payload: Bytes::from_static(b"a"),
                captured_at: now,
            },
            Packet {
                payload: Bytes::from_static(b"b"),
                captured_at: now,
            },
        ];

        assert_eq!(estimate_frame_rate(&packets, 1.0, 60.0), 60.0);
    }

    #[test]
    fn test_span_of_empty_or_single_packet() {
        assert_eq!(video_span(&[]), Duration::ZERO);

        let single = vec![Packet {
            payload: Bytes::from_static(b"a"),
            captured_at: Instant::now(),
        }];
        assert_eq!(video_span(&single), Duration::ZERO);
    }
}
