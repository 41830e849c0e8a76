//! Frame interceptor: the per-frame hook registered with the media stack.
//!
//! Runs on the capture thread. It never fails and never holds the pipeline
//! lock for longer than the frame budget; every failure degrades to returning
//! the original frame.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use vfx_frame::VideoFrame;

use crate::capture::media::{MediaStack, VideoFrameProcessor};
use crate::diagnostics::stats::InterceptorStats;
use crate::effects::error::{panic_message, EffectsError, Result};
use crate::session::controller::SessionShared;

pub struct FrameInterceptor {
    session: Weak<SessionShared>,
    stats: Arc<Mutex<InterceptorStats>>,
    budget: Duration,
}

impl FrameInterceptor {
    pub(crate) fn new(
        session: Weak<SessionShared>,
        stats: Arc<Mutex<InterceptorStats>>,
        budget: Duration,
    ) -> Self {
        Self {
            session,
            stats,
            budget,
        }
    }

    /// Transform one captured frame, or hand it back untouched.
    pub fn on_frame(&self, frame: VideoFrame) -> VideoFrame {
        // A torn-down session means no effects.
        let Some(session) = self.session.upgrade() else {
            self.stats.lock().record_passthrough();
            return frame;
        };

        let Some(mut slot) = session.effects.try_lock_for(self.budget) else {
            trace!(
                "pipeline busy for longer than {:?}; passing frame through",
                self.budget
            );
            self.stats.lock().record_degraded();
            return frame;
        };

        let handle = match slot.as_mut() {
            Some(handle) if handle.should_process() => handle,
            _ => {
                self.stats.lock().record_passthrough();
                return frame;
            }
        };

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| handle.process(&frame)));
        let elapsed = started.elapsed();

        match outcome {
            Ok(Some(processed)) => {
                self.stats.lock().record_processed(elapsed);
                processed
            }
            Ok(None) => self.degrade(
                frame,
                EffectsError::FrameProcessingDegraded("pipeline returned no frame".to_string()),
            ),
            Err(payload) => self.degrade(
                frame,
                EffectsError::FrameProcessingDegraded(format!(
                    "pipeline panicked: {}",
                    panic_message(payload.as_ref())
                )),
            ),
        }
    }

    fn degrade(&self, frame: VideoFrame, reason: EffectsError) -> VideoFrame {
        debug!("{reason}");
        self.stats.lock().record_degraded();
        frame
    }
}

impl VideoFrameProcessor for FrameInterceptor {
    fn process_frame(&self, frame: VideoFrame) -> VideoFrame {
        self.on_frame(frame)
    }
}

/// A live processor registration with the media stack.
///
/// Unregisters on drop. `unregister` is idempotent.
pub struct ProcessorRegistration {
    name: String,
    media: Arc<dyn MediaStack>,
    active: bool,
}

impl ProcessorRegistration {
    pub fn register(
        media: Arc<dyn MediaStack>,
        name: &str,
        processor: Arc<dyn VideoFrameProcessor>,
    ) -> Result<Self> {
        media.add_processor(name, processor)?;
        info!("registered frame processor '{name}'");
        Ok(Self {
            name: name.to_string(),
            media,
            active: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the processor from the media stack. A failing stack is logged;
    /// the registration is considered gone either way.
    pub fn unregister(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        match self.media.remove_processor(&self.name) {
            Ok(()) => info!("unregistered frame processor '{}'", self.name),
            Err(e) => warn!("failed to unregister frame processor '{}': {e}", self.name),
        }
    }
}

impl Drop for ProcessorRegistration {
    fn drop(&mut self) {
        self.unregister();
    }
}
