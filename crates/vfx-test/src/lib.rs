//! Fixtures shared by the end-to-end session scenarios.

use std::sync::Arc;

use effects_bridge_lib::capture::loopback::LoopbackMediaStack;
use effects_bridge_lib::sdk::mock::MockEffectsSdk;
use effects_bridge_lib::{BridgeOptions, EffectsError, LocalImageResolver, SessionController};
use vfx_frame::{FrameError, PixelBuffer, PixelFormat, Rotation, VideoFrame};

/// Controller wired to the mock SDK, `stack` and a local image resolver with
/// default options.
pub fn controller(
    sdk: Arc<MockEffectsSdk>,
    stack: Arc<LoopbackMediaStack>,
) -> Result<SessionController, EffectsError> {
    SessionController::new(
        sdk,
        stack,
        Arc::new(LocalImageResolver::new()),
        BridgeOptions::default(),
    )
}

/// RGBA frame filled with a repeating byte pattern.
pub fn frame(width: u32, height: u32) -> Result<VideoFrame, FrameError> {
    let data = (0..width * height * 4).map(|i| (i % 199) as u8).collect();
    Ok(VideoFrame::new(
        PixelBuffer::new(width, height, PixelFormat::Rgba8, data)?,
        Rotation::Deg0,
        0,
    ))
}
