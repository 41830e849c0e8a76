//! Traits abstracting the effects SDK, so the session and pipeline code can be
//! exercised against `MockEffectsSdk` as well as a vendor binding.

use vfx_frame::PixelBuffer;

use super::types::{AuthStatus, PipelineConfiguration, Result};

/// Entry point of the effects SDK: licensing and pipeline construction.
pub trait EffectsSdk: Send + Sync {
    /// Check the customer license. Blocking; may hit the network.
    fn authorize(&self, customer_id: &str) -> Result<AuthStatus>;

    /// Create a fresh pipeline. Only valid after an `Active` authorization.
    fn new_pipeline(&self) -> Result<Box<dyn EffectPipeline>>;
}

/// A stateful frame transform.
///
/// Methods take `&mut self`: the pipeline is not safe for concurrent use, and
/// the caller serializes every call behind one lock.
pub trait EffectPipeline: Send {
    /// Current configuration.
    fn configuration(&self) -> PipelineConfiguration;

    /// Replace the configuration.
    fn set_configuration(&mut self, config: PipelineConfiguration) -> Result<()>;

    /// Turn background blur on with the given normalized strength.
    fn enable_blur_background(&mut self, power: f32) -> Result<()>;

    fn disable_blur_background(&mut self);

    /// Turn background replacement on, returning the controller used to set
    /// the replacement image.
    fn enable_replace_background(&mut self) -> Result<Box<dyn ReplacementController>>;

    fn disable_replace_background(&mut self);

    fn disable_denoise_background(&mut self);

    /// Run one frame through the pipeline.
    fn process(&mut self, buffer: &PixelBuffer) -> Result<PixelBuffer>;
}

/// Handle for the image shown behind the subject in replace mode.
pub trait ReplacementController: Send {
    fn set_background(&mut self, image: &PixelBuffer) -> Result<()>;

    /// Go back to the engine's default background.
    fn clear_background(&mut self);
}
