use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use vfx_frame::VideoFrame;

use crate::effects::error::Result;

/// Identifier of a local video track in the media stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Per-frame hook the media stack calls on its capture thread.
///
/// Implementations must return promptly and must never fail; returning the
/// input frame unchanged is always acceptable.
pub trait VideoFrameProcessor: Send + Sync {
    fn process_frame(&self, frame: VideoFrame) -> VideoFrame;
}

/// The host media stack the bridge registers its processor with.
pub trait MediaStack: Send + Sync {
    /// Register `processor` under `name`, replacing any previous holder.
    fn add_processor(&self, name: &str, processor: Arc<dyn VideoFrameProcessor>) -> Result<()>;

    /// Remove the processor registered under `name`. Unknown names are a no-op.
    fn remove_processor(&self, name: &str) -> Result<()>;

    /// Activate the named effects on a track, in order.
    fn set_video_effects(&self, track: &TrackId, effects: &[String]) -> Result<()>;
}
