use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::media::TrackId;
use crate::sdk::types::SegmentationPreset;

/// Blur strength used when the caller does not pass one.
pub const DEFAULT_BLUR_POWER: f32 = 0.3;

/// Name the frame interceptor is registered under.
pub const DEFAULT_PROCESSOR_NAME: &str = "tsvb";

/// Caller-supplied session configuration, as handed to `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsConfig {
    pub customer_id: String,
    pub track_id: TrackId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_blur_power: Option<f32>,
}

impl EffectsConfig {
    pub fn new(customer_id: impl Into<String>, track_id: impl Into<TrackId>) -> Self {
        Self {
            customer_id: customer_id.into(),
            track_id: track_id.into(),
            default_blur_power: None,
        }
    }

    /// Blur power to use for a call that did not specify one.
    pub fn blur_power_or_default(&self, requested: Option<f32>) -> f32 {
        requested
            .or(self.default_blur_power)
            .unwrap_or(DEFAULT_BLUR_POWER)
    }
}

/// Deployment options for the bridge. Every field has a default, so a
/// partial JSON file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeOptions {
    pub processor_name: String,
    pub segmentation_preset: SegmentationPreset,
    /// Longest a frame may wait for the pipeline lock before passing through.
    pub frame_budget_ms: u64,
    pub assets_dir: Option<PathBuf>,
    pub max_background_dimension: Option<u32>,
}

impl BridgeOptions {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            processor_name: DEFAULT_PROCESSOR_NAME.to_string(),
            segmentation_preset: SegmentationPreset::Quality,
            frame_budget_ms: 33,
            assets_dir: None,
            max_background_dimension: None,
        }
    }
}
