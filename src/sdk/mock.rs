//! Mock effects SDK for running without the vendor engine.
//!
//! Uses a builder pattern to configure the license state, latency, and error
//! or panic injection. Pipelines created by the mock share its state, so tests
//! can inspect exactly what the session asked the engine to do.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use vfx_frame::PixelBuffer;

use super::api::{EffectPipeline, EffectsSdk, ReplacementController};
use super::types::{AuthStatus, PipelineConfiguration, Result, SdkError};

/// Configurable error injection for a specific operation.
#[derive(Debug, Clone)]
struct ErrorInjection {
    operation: &'static str,
    error: SdkError,
}

/// Engine-side view of the most recently created pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockPipelineState {
    pub configuration: PipelineConfiguration,
    pub blur_enabled: bool,
    pub blur_power: Option<f32>,
    pub replace_enabled: bool,
    pub denoise_enabled: bool,
    pub background: Option<PixelBuffer>,
    pub frames_processed: u64,
}

#[derive(Debug)]
struct MockState {
    auth_status: AuthStatus,
    auth_delay: Duration,
    process_delay: Duration,
    denoise_on_create: bool,
    auth_calls: u32,
    pipelines_created: u32,
    error_injections: Vec<ErrorInjection>,
    panics: Vec<&'static str>,
    pipeline: MockPipelineState,
}

impl MockState {
    /// Fire a one-shot injected panic for the given operation.
    fn check_panic(&mut self, operation: &str) {
        if let Some(pos) = self.panics.iter().position(|op| *op == operation) {
            self.panics.remove(pos);
            panic!("mock effects engine panicked in {operation}");
        }
    }

    /// Check for injected panics, then injected errors, for the operation.
    fn check(&mut self, operation: &str) -> Result<()> {
        self.check_panic(operation);
        if let Some(pos) = self
            .error_injections
            .iter()
            .position(|e| e.operation == operation)
        {
            let injection = self.error_injections.remove(pos);
            return Err(injection.error);
        }
        Ok(())
    }
}

/// Mock effects SDK.
///
/// Authorizes every non-empty customer id with the configured status
/// (`Active` by default). Blur flattens the frame to its mean value; replace
/// copies the background image when its size matches the frame, and blacks
/// the frame out otherwise.
pub struct MockEffectsSdk {
    state: Arc<Mutex<MockState>>,
}

impl MockEffectsSdk {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                auth_status: AuthStatus::Active,
                auth_delay: Duration::ZERO,
                process_delay: Duration::ZERO,
                denoise_on_create: false,
                auth_calls: 0,
                pipelines_created: 0,
                error_injections: Vec::new(),
                panics: Vec::new(),
                pipeline: MockPipelineState::default(),
            })),
        }
    }

    /// License status returned by `authorize`.
    pub fn with_auth_status(self, status: AuthStatus) -> Self {
        self.state.lock().auth_status = status;
        self
    }

    /// Simulated round-trip time of the authorization request.
    pub fn with_auth_delay(self, delay: Duration) -> Self {
        self.state.lock().auth_delay = delay;
        self
    }

    /// Simulated per-frame processing time.
    pub fn with_process_delay(self, delay: Duration) -> Self {
        self.state.lock().process_delay = delay;
        self
    }

    /// Start new pipelines with denoise switched on.
    pub fn with_denoise_enabled(self) -> Self {
        self.state.lock().denoise_on_create = true;
        self
    }

    /// Inject a one-shot error for an operation.
    ///
    /// Operation names: `"authorize"`, `"new_pipeline"`, `"set_configuration"`,
    /// `"enable_blur_background"`, `"enable_replace_background"`,
    /// `"set_background"`, `"process"`.
    pub fn with_error(self, operation: &'static str, error: SdkError) -> Self {
        self.state
            .lock()
            .error_injections
            .push(ErrorInjection { operation, error });
        self
    }

    /// Inject a one-shot panic. Accepts the names listed for `with_error`
    /// plus the `disable_*_background` operations.
    pub fn with_panic(self, operation: &'static str) -> Self {
        self.state.lock().panics.push(operation);
        self
    }

    /// Number of `authorize` calls received.
    pub fn auth_calls(&self) -> u32 {
        self.state.lock().auth_calls
    }

    /// Number of pipelines handed out.
    pub fn pipelines_created(&self) -> u32 {
        self.state.lock().pipelines_created
    }

    /// Snapshot of the engine-side pipeline state.
    pub fn pipeline_state(&self) -> MockPipelineState {
        self.state.lock().pipeline.clone()
    }
}

impl Default for MockEffectsSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectsSdk for MockEffectsSdk {
    fn authorize(&self, customer_id: &str) -> Result<AuthStatus> {
        let delay = {
            let mut state = self.state.lock();
            state.auth_calls += 1;
            state.auth_delay
        };
        // Sleep outside the lock so status queries stay responsive.
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        state.check("authorize")?;
        if customer_id.is_empty() {
            return Err(SdkError::Authorization(
                "customer id must not be empty".to_string(),
            ));
        }
        Ok(state.auth_status)
    }

    fn new_pipeline(&self) -> Result<Box<dyn EffectPipeline>> {
        let mut state = self.state.lock();
        state.check("new_pipeline")?;
        state.pipelines_created += 1;
        state.pipeline = MockPipelineState {
            denoise_enabled: state.denoise_on_create,
            ..MockPipelineState::default()
        };
        Ok(Box::new(MockPipeline {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Pipeline handed out by [`MockEffectsSdk`].
struct MockPipeline {
    state: Arc<Mutex<MockState>>,
}

enum MockMode {
    Passthrough,
    Blur,
    Replace(Option<PixelBuffer>),
}

impl EffectPipeline for MockPipeline {
    fn configuration(&self) -> PipelineConfiguration {
        self.state.lock().pipeline.configuration.clone()
    }

    fn set_configuration(&mut self, config: PipelineConfiguration) -> Result<()> {
        let mut state = self.state.lock();
        state.check("set_configuration")?;
        state.pipeline.configuration = config;
        Ok(())
    }

    fn enable_blur_background(&mut self, power: f32) -> Result<()> {
        let mut state = self.state.lock();
        state.check("enable_blur_background")?;
        state.pipeline.blur_enabled = true;
        state.pipeline.blur_power = Some(power);
        Ok(())
    }

    fn disable_blur_background(&mut self) {
        let mut state = self.state.lock();
        state.check_panic("disable_blur_background");
        state.pipeline.blur_enabled = false;
    }

    fn enable_replace_background(&mut self) -> Result<Box<dyn ReplacementController>> {
        let mut state = self.state.lock();
        state.check("enable_replace_background")?;
        state.pipeline.replace_enabled = true;
        Ok(Box::new(MockReplacementController {
            state: Arc::clone(&self.state),
        }))
    }

    fn disable_replace_background(&mut self) {
        let mut state = self.state.lock();
        state.check_panic("disable_replace_background");
        state.pipeline.replace_enabled = false;
        state.pipeline.background = None;
    }

    fn disable_denoise_background(&mut self) {
        let mut state = self.state.lock();
        state.check_panic("disable_denoise_background");
        state.pipeline.denoise_enabled = false;
    }

    fn process(&mut self, buffer: &PixelBuffer) -> Result<PixelBuffer> {
        let (mode, delay) = {
            let mut state = self.state.lock();
            state.check("process")?;
            state.pipeline.frames_processed += 1;
            let mode = if state.pipeline.blur_enabled {
                MockMode::Blur
            } else if state.pipeline.replace_enabled {
                MockMode::Replace(state.pipeline.background.clone())
            } else {
                MockMode::Passthrough
            };
            (mode, state.process_delay)
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let output = match mode {
            MockMode::Passthrough => buffer.clone(),
            MockMode::Blur => flatten(buffer),
            MockMode::Replace(Some(background))
                if background.width() == buffer.width()
                    && background.height() == buffer.height()
                    && background.format() == buffer.format() =>
            {
                background
            }
            MockMode::Replace(_) => {
                PixelBuffer::zeroed(buffer.width(), buffer.height(), buffer.format())
            }
        };
        Ok(output)
    }
}

/// Replace every byte with the buffer's mean byte value.
fn flatten(buffer: &PixelBuffer) -> PixelBuffer {
    let data = buffer.data();
    let mean = if data.is_empty() {
        0
    } else {
        (data.iter().map(|&b| u64::from(b)).sum::<u64>() / data.len() as u64) as u8
    };
    let mut output = PixelBuffer::zeroed(buffer.width(), buffer.height(), buffer.format());
    output.data_mut().fill(mean);
    output
}

struct MockReplacementController {
    state: Arc<Mutex<MockState>>,
}

impl ReplacementController for MockReplacementController {
    fn set_background(&mut self, image: &PixelBuffer) -> Result<()> {
        let mut state = self.state.lock();
        state.check("set_background")?;
        state.pipeline.background = Some(image.clone());
        Ok(())
    }

    fn clear_background(&mut self) {
        self.state.lock().pipeline.background = None;
    }
}
