//! Ordered holding area for not-yet-muxed media packets.

use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;

/// One elementary-stream payload with its capture time.
#[derive(Debug, Clone)]
pub struct Packet {
    pub payload: Bytes,
    pub captured_at: Instant,
}

/// Arrival-ordered packet buffer for one media kind.
///
/// `append` and `drain` are the only operations; there is deliberately
/// no way to read the buffer without clearing it, so a drained batch
/// can never overlap with a later one. Safe under concurrent appenders
/// and one (or more) drainers.
#[derive(Default)]
pub struct MediaBuffer {
    packets: Mutex<Vec<Packet>>,
}

impl MediaBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a packet at the end of the live sequence.
    pub fn append(&self, packet: Packet) {
        self.packets.lock().push(packet);
    }

    /// Atomically captures the entire current sequence and leaves the
    /// buffer empty.
    ///
    /// Every appended packet appears in exactly one drained batch, in
    /// original arrival order.
    pub fn drain(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.packets.lock())
    }

    /// Number of packets currently buffered.
    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn packet(byte: u8) -> Packet {
        Packet {
            payload: Bytes::copy_from_slice(&[byte]),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_drain_preserves_arrival_order() {
        let buffer = MediaBuffer::new();
        for byte in 0..10u8 {
            buffer.append(packet(byte));
        }

        let drained = buffer.drain();

        let order: Vec<u8> = drained.iter().map(|p| p.payload[0]).collect();
        assert_eq!(order, (0..10).collect::<Vec<u8>>());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_on_empty_buffer_returns_empty_batch() {
        let buffer = MediaBuffer::new();
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_packets_never_duplicated_across_drains() {
        let buffer = MediaBuffer::new();
        buffer.append(packet(1));

        let first = buffer.drain();
        buffer.append(packet(2));
        let second = buffer.drain();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].payload[0], 1);
        assert_eq!(second[0].payload[0], 2);
    }

    #[test]
    fn test_concurrent_appends_and_drains_lose_nothing() {
        const APPENDERS: usize = 4;
        const PER_APPENDER: usize = 500;

        let buffer = Arc::new(MediaBuffer::new());
        let mut handles = Vec::new();

        for _ in 0..APPENDERS {
            let buffer = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                for byte in 0..PER_APPENDER {
                    buffer.append(packet((byte % 256) as u8));
                }
            }));
        }

        let drainer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                let mut collected = 0usize;
                for _ in 0..50 {
                    collected += buffer.drain().len();
                    std::thread::yield_now();
                }
                collected
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        let drained_midway = drainer.join().unwrap();
        let remainder = buffer.drain().len();

        assert_eq!(drained_midway + remainder, APPENDERS * PER_APPENDER);
        assert!(buffer.is_empty());
    }
}
