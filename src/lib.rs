pub mod capture;
pub mod diagnostics;
pub mod effects;
pub mod sdk;
pub mod session;
pub mod settings;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

pub use capture::media::{MediaStack, TrackId, VideoFrameProcessor};
pub use effects::background::{BackgroundSource, ImageResolver, LocalImageResolver};
pub use effects::error::{EffectsError, Result};
pub use effects::pipeline::{EffectState, PipelineHandle};
pub use effects::status::{BridgeResult, InitStatus};
pub use session::commands::VideoEffects;
pub use session::controller::SessionController;
pub use session::interceptor::FrameInterceptor;
pub use settings::types::{BridgeOptions, EffectsConfig};

use capture::camera::{CaptureConfig, CaptureSession};
use capture::loopback::LoopbackMediaStack;
use sdk::mock::MockEffectsSdk;

/// Environment variable holding the customer id for the demo run.
pub const CUSTOMER_ID_ENV: &str = "VFX_CUSTOMER_ID";

/// How long each demo phase lets the capture thread run.
const PHASE: Duration = Duration::from_millis(300);

/// Run the demo: a mock engine and loopback media stack, driven through
/// initialize, blur, replace and cleanup while synthetic frames flow.
///
/// Set `VFX_OPTIONS` to a JSON options file and `RUST_LOG` to adjust logging.
pub fn run() -> std::result::Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("effects_bridge_lib=info".parse()?),
        )
        .init();

    let options = BridgeOptions::from_env()?;
    let customer_id =
        std::env::var(CUSTOMER_ID_ENV).unwrap_or_else(|_| "demo-customer".to_string());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(demo(options, customer_id))
}

async fn demo(
    options: BridgeOptions,
    customer_id: String,
) -> std::result::Result<(), Box<dyn Error>> {
    let stack = Arc::new(LoopbackMediaStack::new());
    let controller = SessionController::new(
        Arc::new(MockEffectsSdk::new()),
        stack.clone(),
        Arc::new(LocalImageResolver::from_options(&options)),
        options,
    )?;
    let effects = VideoEffects::new(controller);
    let track = TrackId::new("camera-0");

    let init = effects
        .initialize(EffectsConfig::new(customer_id, track.clone()))
        .await;
    report("initialize", &init)?;
    if !init.success {
        return Err(init.error.unwrap_or_default().into());
    }

    let mut capture = CaptureSession::start(stack, track, CaptureConfig::default())?;
    tokio::time::sleep(PHASE).await;

    report(
        "enableBlurBackground",
        &effects.enable_blur_background(None).await,
    )?;
    tokio::time::sleep(PHASE).await;

    report(
        "enableReplaceBackground",
        &effects.enable_replace_background(None).await,
    )?;
    tokio::time::sleep(PHASE).await;

    capture.stop();
    info!(
        "captured {} frames, blur={}, virtual background={}",
        capture.buffer().sequence(),
        effects.is_blur_enabled(),
        effects.is_virtual_background_enabled()
    );
    println!("{}", serde_json::to_string_pretty(&effects.diagnostics())?);

    effects.cleanup();
    Ok(())
}

fn report(operation: &str, result: &BridgeResult) -> serde_json::Result<()> {
    info!("{operation}: {}", serde_json::to_string(result)?);
    Ok(())
}
