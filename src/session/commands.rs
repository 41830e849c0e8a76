use parking_lot::Mutex;

use crate::diagnostics::stats::InterceptorSnapshot;
use crate::effects::background::BackgroundSource;
use crate::effects::status::BridgeResult;
use crate::session::controller::SessionController;
use crate::settings::types::{EffectsConfig, DEFAULT_BLUR_POWER};

/// Application-facing surface. Mutating calls are async and resolve to a
/// [`BridgeResult`]; status queries are synchronous snapshots.
pub struct VideoEffects {
    controller: SessionController,
    config: Mutex<Option<EffectsConfig>>,
}

impl VideoEffects {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            config: Mutex::new(None),
        }
    }

    /// The underlying session controller.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Start the session for `config`. The config is recorded before the
    /// attempt, so `get_config` reflects the latest request.
    pub async fn initialize(&self, config: EffectsConfig) -> BridgeResult {
        let customer_id = config.customer_id.clone();
        let track = config.track_id.clone();
        *self.config.lock() = Some(config);

        let result = self.controller.initialize(&customer_id, &track).await;
        if let Err(e) = &result {
            tracing::warn!("failed to initialize video effects: {e}");
        }
        result.into()
    }

    /// Enable blur. Without an explicit power the configured default is used,
    /// then 0.3.
    pub async fn enable_blur_background(&self, power: Option<f32>) -> BridgeResult {
        let power = match self.config.lock().as_ref() {
            Some(config) => config.blur_power_or_default(power),
            None => power.unwrap_or(DEFAULT_BLUR_POWER),
        };
        self.controller.enable_blur(power).await.into()
    }

    /// Turn blur off. Background replacement is left as it is.
    pub async fn disable_blur_background(&self) -> BridgeResult {
        self.controller.disable_blur().await.into()
    }

    /// Enable background replacement. `None` or an empty string keeps the
    /// engine's current image.
    pub async fn enable_replace_background(&self, image: Option<&str>) -> BridgeResult {
        let source = image
            .filter(|raw| !raw.trim().is_empty())
            .map(BackgroundSource::parse);
        self.controller.enable_replace(source).await.into()
    }

    /// Turn background replacement off.
    pub async fn disable_replace_background(&self) -> BridgeResult {
        self.controller.disable_replace().await.into()
    }

    /// Whether blur is currently on.
    pub fn is_blur_enabled(&self) -> bool {
        self.controller.is_blur_enabled()
    }

    /// Whether background replacement is currently on.
    pub fn is_virtual_background_enabled(&self) -> bool {
        self.controller.is_virtual_background_enabled()
    }

    /// Whether a session is live.
    pub fn is_initialized(&self) -> bool {
        self.controller.is_initialized()
    }

    /// Release the session and forget the recorded config.
    pub fn cleanup(&self) {
        self.controller.cleanup();
        self.config.lock().take();
    }

    /// The config from the most recent `initialize`, if any.
    pub fn get_config(&self) -> Option<EffectsConfig> {
        self.config.lock().clone()
    }

    /// Snapshot of the frame interceptor's counters.
    pub fn diagnostics(&self) -> InterceptorSnapshot {
        self.controller.diagnostics()
    }
}
