//! Synthetic capture session.
//!
//! Spawns a named thread that renders a moving gradient at a fixed interval,
//! delivers each frame through the media stack, and keeps the output in a
//! [`FrameBuffer`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info};
use vfx_frame::{PixelBuffer, PixelFormat, Rotation, VideoFrame};

use crate::capture::buffer::FrameBuffer;
use crate::capture::loopback::LoopbackMediaStack;
use crate::capture::media::TrackId;
use crate::effects::error::{EffectsError, Result};

/// Output frames kept for readers.
const BUFFER_CAPACITY: usize = 3;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub rotation: Rotation,
    /// Time between frames.
    pub interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            format: PixelFormat::Rgba8,
            rotation: Rotation::Deg0,
            interval: Duration::from_millis(33),
        }
    }
}

/// Active synthetic capture for one track.
pub struct CaptureSession {
    track: TrackId,
    buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Start capturing on a thread named `capture-<track>`.
    pub fn start(
        stack: Arc<LoopbackMediaStack>,
        track: TrackId,
        config: CaptureConfig,
    ) -> Result<Self> {
        let buffer = Arc::new(FrameBuffer::new(BUFFER_CAPACITY));
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let track = track.clone();
            let buffer = Arc::clone(&buffer);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name(format!("capture-{track}"))
                .spawn(move || {
                    info!("capture thread starting for {track}");
                    let mut index: u64 = 0;
                    while running.load(Ordering::Relaxed) {
                        let frame = synthetic_frame(&config, index);
                        let output = stack.deliver(&track, frame);
                        buffer.push(output);
                        index += 1;
                        std::thread::sleep(config.interval);
                    }
                    info!("capture thread exiting for {track} after {index} frames");
                })
                .map_err(|e| {
                    EffectsError::MediaStack(format!("failed to spawn capture thread: {e}"))
                })?
        };

        Ok(Self {
            track,
            buffer,
            running,
            thread: Some(thread),
        })
    }

    pub fn track(&self) -> &TrackId {
        &self.track
    }

    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the capture thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("capture thread for {} panicked", self.track);
            }
            debug!("capture session for {} stopped", self.track);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Diagonal gradient that shifts by one step per frame.
fn synthetic_frame(config: &CaptureConfig, index: u64) -> VideoFrame {
    let bpp = config.format.bytes_per_pixel();
    let shift = (index % 256) as u32;
    let mut buffer = PixelBuffer::zeroed(config.width, config.height, config.format);
    let row_bytes = config.width as usize * bpp;

    if row_bytes > 0 {
        for (y, row) in buffer.data_mut().chunks_mut(row_bytes).enumerate() {
            for (x, pixel) in row.chunks_mut(bpp).enumerate() {
                let value = ((x as u32 + y as u32 + shift) % 256) as u8;
                pixel.fill(value);
                if bpp == 4 {
                    pixel[3] = 255;
                }
            }
        }
    }

    let timestamp_ns = (index as i64).saturating_mul(config.interval.as_nanos() as i64);
    VideoFrame::new(buffer, config.rotation, timestamp_ns)
}
