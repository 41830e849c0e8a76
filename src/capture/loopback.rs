//! In-process media stack.
//!
//! Holds registered processors by name and the effect list of each track.
//! `deliver` plays the role of the capture thread: it runs a frame through
//! every effect activated on the track, in order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vfx_frame::VideoFrame;

use crate::capture::media::{MediaStack, TrackId, VideoFrameProcessor};
use crate::effects::error::{EffectsError, Result};

#[derive(Default)]
struct LoopbackState {
    processors: HashMap<String, Arc<dyn VideoFrameProcessor>>,
    track_effects: HashMap<TrackId, Vec<String>>,
    add_calls: u32,
    remove_calls: u32,
    failures: Vec<&'static str>,
}

impl LoopbackState {
    /// Fire a one-shot injected failure for the operation.
    fn check(&mut self, operation: &str) -> Result<()> {
        if let Some(pos) = self.failures.iter().position(|op| *op == operation) {
            self.failures.remove(pos);
            return Err(EffectsError::MediaStack(format!(
                "loopback stack rejected {operation}"
            )));
        }
        Ok(())
    }
}

/// [`MediaStack`] that lives entirely in this process.
#[derive(Default)]
pub struct LoopbackMediaStack {
    state: Mutex<LoopbackState>,
}

impl LoopbackMediaStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `operation` fail. Operation names:
    /// `"add_processor"`, `"remove_processor"`, `"set_video_effects"`.
    pub fn fail_next(&self, operation: &'static str) {
        self.state.lock().failures.push(operation);
    }

    /// Run `frame` through the effects active on `track`.
    ///
    /// The processor list is copied out before any processor runs, so a
    /// processor may call back into the stack.
    pub fn deliver(&self, track: &TrackId, frame: VideoFrame) -> VideoFrame {
        let chain: Vec<Arc<dyn VideoFrameProcessor>> = {
            let state = self.state.lock();
            match state.track_effects.get(track) {
                Some(effects) => effects
                    .iter()
                    .filter_map(|name| state.processors.get(name).cloned())
                    .collect(),
                None => Vec::new(),
            }
        };

        chain
            .iter()
            .fold(frame, |frame, processor| processor.process_frame(frame))
    }

    /// Whether a processor is registered under `name`.
    pub fn has_processor(&self, name: &str) -> bool {
        self.state.lock().processors.contains_key(name)
    }

    /// Effects currently activated on `track`.
    pub fn effects_for(&self, track: &TrackId) -> Vec<String> {
        self.state
            .lock()
            .track_effects
            .get(track)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `add_processor` calls, failed ones included.
    pub fn add_calls(&self) -> u32 {
        self.state.lock().add_calls
    }

    /// Number of `remove_processor` calls, failed ones included.
    pub fn remove_calls(&self) -> u32 {
        self.state.lock().remove_calls
    }
}

impl MediaStack for LoopbackMediaStack {
    fn add_processor(&self, name: &str, processor: Arc<dyn VideoFrameProcessor>) -> Result<()> {
        let mut state = self.state.lock();
        state.add_calls += 1;
        state.check("add_processor")?;
        if state.processors.insert(name.to_string(), processor).is_some() {
            tracing::debug!("replaced frame processor '{name}'");
        }
        Ok(())
    }

    fn remove_processor(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.remove_calls += 1;
        state.check("remove_processor")?;
        state.processors.remove(name);
        Ok(())
    }

    fn set_video_effects(&self, track: &TrackId, effects: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.check("set_video_effects")?;
        state.track_effects.insert(track.clone(), effects.to_vec());
        Ok(())
    }
}
