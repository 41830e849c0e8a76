use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use vfx_frame::VideoFrame;

struct Ring {
    slots: Vec<Option<VideoFrame>>,
    write_idx: usize,
}

/// Thread-safe ring of the most recent output frames.
///
/// Holds up to `capacity` frames and overwrites the oldest when full. Frames
/// share their pixel buffers, so reading one back is a reference-count bump.
pub struct FrameBuffer {
    ring: Mutex<Ring>,
    capacity: usize,
    /// Incremented on every push, independent of frame timestamps.
    sequence: AtomicU64,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                write_idx: 0,
            }),
            capacity,
            sequence: AtomicU64::new(0),
        }
    }

    /// Push a frame, overwriting the oldest if full. A zero-capacity buffer
    /// only counts the push.
    pub fn push(&self, frame: VideoFrame) {
        if self.capacity > 0 {
            let mut ring = self.ring.lock();
            let idx = ring.write_idx;
            ring.slots[idx] = Some(frame);
            ring.write_idx = (idx + 1) % self.capacity;
        }
        self.sequence.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Most recently pushed frame, if any.
    pub fn latest(&self) -> Option<VideoFrame> {
        if self.capacity == 0 {
            return None;
        }
        let ring = self.ring.lock();
        let idx = (ring.write_idx + self.capacity - 1) % self.capacity;
        ring.slots[idx].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfx_frame::{PixelBuffer, PixelFormat, Rotation};

    fn frame(ts: i64) -> VideoFrame {
        VideoFrame::new(PixelBuffer::zeroed(1, 1, PixelFormat::Rgba8), Rotation::Deg0, ts)
    }

    #[test]
    fn latest_is_none_when_empty() {
        let buffer = FrameBuffer::new(3);
        assert!(buffer.latest().is_none());
        assert_eq!(buffer.sequence(), 0);
    }

    #[test]
    fn latest_returns_most_recent_push() {
        let buffer = FrameBuffer::new(3);
        buffer.push(frame(1));
        buffer.push(frame(2));
        assert_eq!(buffer.latest().unwrap().timestamp_ns(), 2);
    }

    #[test]
    fn wraps_around_when_full() {
        let buffer = FrameBuffer::new(2);
        for ts in 1..=5 {
            buffer.push(frame(ts));
        }
        assert_eq!(buffer.latest().unwrap().timestamp_ns(), 5);
        assert_eq!(buffer.sequence(), 5);
    }

    #[test]
    fn latest_shares_pixel_buffer() {
        let buffer = FrameBuffer::new(1);
        let input = frame(7);
        buffer.push(input.clone());
        assert!(buffer.latest().unwrap().same_buffer(&input));
    }

    #[test]
    fn zero_capacity_only_counts() {
        let buffer = FrameBuffer::new(0);
        buffer.push(frame(1));
        assert!(buffer.latest().is_none());
        assert_eq!(buffer.sequence(), 1);
    }
}
