//! Pipeline handle: the effects pipeline plus the effect state that gates it.
//!
//! Every method takes `&mut self`. The session keeps the handle inside a
//! single `Mutex`, so mutation from the control queue and frame processing on
//! the capture thread are serialized by construction.

use serde::Serialize;
use vfx_frame::{PixelBuffer, VideoFrame};

use crate::effects::error::Result;
use crate::sdk::api::{EffectPipeline, ReplacementController};
use crate::sdk::types::{PipelineConfiguration, SegmentationPreset};

/// Which background effect is active. Blur and replace never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectState {
    pub blur_enabled: bool,
    pub replace_enabled: bool,
}

impl EffectState {
    /// True when some effect wants frames routed through the pipeline.
    pub fn any_enabled(&self) -> bool {
        self.blur_enabled || self.replace_enabled
    }
}

/// Owns an SDK pipeline, its configuration, and the current effect state.
pub struct PipelineHandle {
    pipeline: Box<dyn EffectPipeline>,
    configuration: PipelineConfiguration,
    state: EffectState,
    replacement: Option<Box<dyn ReplacementController>>,
    ready: bool,
}

impl PipelineHandle {
    /// Take ownership of a fresh pipeline and apply the segmentation preset.
    ///
    /// # Errors
    ///
    /// Returns `EffectsError::PipelineOperationFailed` if the engine rejects
    /// the configuration.
    pub fn new(mut pipeline: Box<dyn EffectPipeline>, preset: SegmentationPreset) -> Result<Self> {
        let mut configuration = pipeline.configuration();
        configuration.segmentation_preset = preset;
        pipeline.set_configuration(configuration.clone())?;
        tracing::debug!("pipeline configured with {preset:?} segmentation");

        Ok(Self {
            pipeline,
            configuration,
            state: EffectState::default(),
            replacement: None,
            ready: true,
        })
    }

    pub fn configuration(&self) -> &PipelineConfiguration {
        &self.configuration
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// True when frames should be routed through the pipeline.
    pub fn should_process(&self) -> bool {
        self.ready && self.state.any_enabled()
    }

    /// Enable blur. Replace and denoise are switched off on success; on failure
    /// nothing changes.
    pub fn enable_blur(&mut self, power: f32) -> Result<()> {
        self.pipeline.enable_blur_background(power)?;
        self.pipeline.disable_replace_background();
        self.pipeline.disable_denoise_background();
        self.replacement = None;
        self.state = EffectState {
            blur_enabled: true,
            replace_enabled: false,
        };
        tracing::info!("background blur enabled (power {power})");
        Ok(())
    }

    pub fn disable_blur(&mut self) {
        self.pipeline.disable_blur_background();
        self.state.blur_enabled = false;
        tracing::info!("background blur disabled");
    }

    /// Enable background replacement, optionally with an already-decoded
    /// image. Blur and denoise are switched off on success; on failure the
    /// engine is rolled back and the state is unchanged.
    pub fn enable_replace(&mut self, background: Option<PixelBuffer>) -> Result<()> {
        let was_replacing = self.state.replace_enabled;
        let mut controller = self.pipeline.enable_replace_background()?;

        if let Some(image) = background.as_ref() {
            if let Err(e) = controller.set_background(image) {
                if !was_replacing {
                    self.pipeline.disable_replace_background();
                }
                return Err(e.into());
            }
        }

        self.pipeline.disable_blur_background();
        self.pipeline.disable_denoise_background();
        self.replacement = Some(controller);
        self.state = EffectState {
            blur_enabled: false,
            replace_enabled: true,
        };
        match background {
            Some(image) => tracing::info!(
                "background replacement enabled ({}x{} image)",
                image.width(),
                image.height()
            ),
            None => tracing::info!("background replacement enabled (engine default image)"),
        }
        Ok(())
    }

    pub fn disable_replace(&mut self) {
        self.pipeline.disable_replace_background();
        if let Some(mut controller) = self.replacement.take() {
            controller.clear_background();
        }
        self.state.replace_enabled = false;
        tracing::info!("background replacement disabled");
    }

    /// Switch every mode off. Used on cleanup.
    pub fn disable_all(&mut self) {
        self.ready = false;
        self.state = EffectState::default();
        self.replacement = None;
        self.pipeline.disable_blur_background();
        self.pipeline.disable_replace_background();
        self.pipeline.disable_denoise_background();
    }

    /// Run a frame through the pipeline.
    ///
    /// Frames without pixels are returned unchanged. `None` means the engine
    /// failed and the caller should pass the original frame through.
    pub fn process(&mut self, frame: &VideoFrame) -> Option<VideoFrame> {
        if frame.buffer().is_empty() {
            return Some(frame.clone());
        }
        match self.pipeline.process(frame.buffer()) {
            Ok(buffer) => Some(frame.with_buffer(buffer)),
            Err(e) => {
                tracing::debug!("pipeline failed to process frame: {e}");
                None
            }
        }
    }
}
