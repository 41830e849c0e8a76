//! Session controller: authorization lifecycle, track binding and the
//! control queue that serializes every pipeline mutation.
//!
//! State lives in [`SessionShared`]. The record mutex guards the lifecycle
//! fields; the effects mutex guards the pipeline handle and is the only lock
//! the frame path takes. When both are needed the record lock is taken first.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::capture::media::{MediaStack, TrackId};
use crate::diagnostics::stats::{InterceptorSnapshot, InterceptorStats};
use crate::effects::background::{BackgroundSource, ImageResolver};
use crate::effects::error::{panic_message, EffectsError, Result};
use crate::effects::pipeline::{EffectState, PipelineHandle};
use crate::effects::status::{auth_error_message, InitStatus};
use crate::sdk::api::EffectsSdk;
use crate::sdk::types::AuthStatus;
use crate::session::control::ControlQueue;
use crate::session::interceptor::{FrameInterceptor, ProcessorRegistration};
use crate::settings::types::BridgeOptions;

type InitAttempt = Shared<BoxFuture<'static, Result<InitStatus>>>;

struct InFlight {
    id: u64,
    attempt: InitAttempt,
}

type InFlightSlot = Arc<Mutex<Option<InFlight>>>;

/// Empties the in-flight slot once its attempt's control job is done,
/// whether or not any caller is still awaiting the result.
struct InFlightGuard {
    slot: InFlightSlot,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| current.id == self.id) {
            *slot = None;
        }
    }
}

#[derive(Default)]
pub(crate) struct SessionRecord {
    credential: Option<String>,
    bound_track: Option<TrackId>,
    initialized: bool,
    registration: Option<ProcessorRegistration>,
}

/// State shared between the controller, its control jobs and the frame
/// interceptor.
#[derive(Default)]
pub(crate) struct SessionShared {
    pub(crate) record: Mutex<SessionRecord>,
    pub(crate) effects: Mutex<Option<PipelineHandle>>,
    /// Bumped by `cleanup`; control jobs submitted before it are discarded.
    pub(crate) generation: AtomicU64,
    /// Bumped by every request that changes which background mode is wanted.
    pub(crate) replace_epoch: AtomicU64,
}

/// Everything a control job needs, cloned into the job.
#[derive(Clone)]
struct ControlContext {
    shared: Arc<SessionShared>,
    sdk: Arc<dyn EffectsSdk>,
    media: Arc<dyn MediaStack>,
    options: Arc<BridgeOptions>,
    stats: Arc<Mutex<InterceptorStats>>,
}

impl ControlContext {
    fn initialize(&self, customer_id: &str, track: &TrackId, generation: u64) -> Result<InitStatus> {
        self.ensure_current(generation)?;

        {
            let mut record = self.shared.record.lock();
            if record.initialized {
                if record.bound_track.as_ref() == Some(track) {
                    debug!("initialize: already bound to {track}");
                    return Ok(InitStatus::AlreadyInitialized);
                }
                self.rebind(&mut record, track)?;
                drop(record);
                self.activate_effects(track);
                return Ok(InitStatus::TrackUpdated);
            }
        }

        let status = self.sdk.authorize(customer_id)?;
        if status != AuthStatus::Active {
            warn!("authorization returned {}", status.as_str());
            return Err(EffectsError::AuthorizationFailed(
                auth_error_message(status).to_string(),
            ));
        }

        let pipeline = self.sdk.new_pipeline()?;
        let handle = PipelineHandle::new(pipeline, self.options.segmentation_preset)?;

        {
            let mut record = self.shared.record.lock();
            // Cleanup may have run while authorization was in flight.
            self.ensure_current(generation)?;

            *self.shared.effects.lock() = Some(handle);
            let registration = match self.register() {
                Ok(registration) => registration,
                Err(e) => {
                    self.shared.effects.lock().take();
                    return Err(e);
                }
            };

            record.credential = Some(customer_id.to_string());
            record.bound_track = Some(track.clone());
            record.registration = Some(registration);
            record.initialized = true;
        }

        self.stats.lock().reset();
        self.activate_effects(track);
        info!("effects session active on {track}");
        Ok(InitStatus::Active)
    }

    /// Move the interceptor to a new track. The old registration is removed
    /// before the new one is made.
    fn rebind(&self, record: &mut SessionRecord, track: &TrackId) -> Result<()> {
        if let Some(mut old) = record.registration.take() {
            old.unregister();
        }

        match self.register() {
            Ok(registration) => {
                record.registration = Some(registration);
                let previous = record.bound_track.replace(track.clone());
                info!(
                    "effects session rebound from {} to {track}",
                    previous.map_or_else(|| "<none>".to_string(), |t| t.to_string())
                );
                Ok(())
            }
            Err(e) => {
                // Keep frames flowing on the old track if we can.
                record.registration = self.register().ok();
                Err(e)
            }
        }
    }

    fn register(&self) -> Result<ProcessorRegistration> {
        let interceptor = FrameInterceptor::new(
            Arc::downgrade(&self.shared),
            Arc::clone(&self.stats),
            self.options.frame_budget(),
        );
        ProcessorRegistration::register(
            Arc::clone(&self.media),
            &self.options.processor_name,
            Arc::new(interceptor),
        )
    }

    /// Ask the media stack to run our processor on `track`. Failure leaves the
    /// session live.
    fn activate_effects(&self, track: &TrackId) {
        let effects = [self.options.processor_name.clone()];
        if let Err(e) = self.media.set_video_effects(track, &effects) {
            warn!("failed to activate video effects on {track}: {e}");
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if self.shared.generation.load(Ordering::SeqCst) != generation {
            return Err(EffectsError::Superseded(
                "session was cleaned up while the request was pending".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run `op` against the live pipeline handle.
fn with_pipeline<T>(
    shared: &SessionShared,
    op: impl FnOnce(&mut PipelineHandle) -> Result<T>,
) -> Result<T> {
    let mut slot = shared.effects.lock();
    let handle = slot.as_mut().ok_or(EffectsError::NotInitialized)?;
    op(handle)
}

/// Owns one effects session.
pub struct SessionController {
    ctx: ControlContext,
    resolver: Arc<dyn ImageResolver>,
    queue: ControlQueue,
    in_flight: InFlightSlot,
    attempts: AtomicU64,
}

impl SessionController {
    pub fn new(
        sdk: Arc<dyn EffectsSdk>,
        media: Arc<dyn MediaStack>,
        resolver: Arc<dyn ImageResolver>,
        options: BridgeOptions,
    ) -> Result<Self> {
        let queue = ControlQueue::new("effects-control")?;
        Ok(Self {
            ctx: ControlContext {
                shared: Arc::new(SessionShared::default()),
                sdk,
                media,
                options: Arc::new(options),
                stats: Arc::new(Mutex::new(InterceptorStats::new())),
            },
            resolver,
            queue,
            in_flight: Arc::new(Mutex::new(None)),
            attempts: AtomicU64::new(0),
        })
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.ctx.options
    }

    /// Authorize and start the session, or rebind it to a new track.
    ///
    /// Calls made while an attempt is outstanding share that attempt's result.
    pub async fn initialize(&self, customer_id: &str, track: &TrackId) -> Result<InitStatus> {
        let attempt = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.as_ref() {
                Some(current) => {
                    debug!("initialize already in flight; sharing its result");
                    current.attempt.clone()
                }
                None => {
                    let id = self.attempts.fetch_add(1, Ordering::SeqCst);
                    let attempt = self.start_initialize(id, customer_id.to_string(), track.clone());
                    *in_flight = Some(InFlight {
                        id,
                        attempt: attempt.clone(),
                    });
                    attempt
                }
            }
        };
        attempt.await
    }

    /// Queue an initialize job. The job clears the in-flight slot itself, so a
    /// caller that stops waiting never leaves a finished attempt behind.
    fn start_initialize(&self, id: u64, customer_id: String, track: TrackId) -> InitAttempt {
        let ctx = self.ctx.clone();
        let generation = self.ctx.shared.generation.load(Ordering::SeqCst);
        let guard = InFlightGuard {
            slot: Arc::clone(&self.in_flight),
            id,
        };
        self.queue
            .submit(move || {
                let _guard = guard;
                ctx.initialize(&customer_id, &track, generation)
            })
            .boxed()
            .shared()
    }

    pub async fn enable_blur(&self, power: f32) -> Result<()> {
        self.ensure_initialized()?;
        self.ctx.shared.replace_epoch.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(&self.ctx.shared);
        self.queue
            .submit(move || with_pipeline(&shared, |handle| handle.enable_blur(power)))
            .await
    }

    pub async fn disable_blur(&self) -> Result<()> {
        self.ensure_initialized()?;
        let shared = Arc::clone(&self.ctx.shared);
        self.queue
            .submit(move || {
                with_pipeline(&shared, |handle| {
                    handle.disable_blur();
                    Ok(())
                })
            })
            .await
    }

    /// Enable background replacement.
    ///
    /// The image is resolved on a blocking worker before the control job is
    /// queued. If another background change is requested meanwhile, this
    /// request is discarded with `Superseded`.
    pub async fn enable_replace(&self, source: Option<BackgroundSource>) -> Result<()> {
        self.ensure_initialized()?;
        let epoch = self.ctx.shared.replace_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let image = match source {
            Some(source) => {
                let resolver = Arc::clone(&self.resolver);
                let image = tokio::task::spawn_blocking(move || resolver.resolve(&source))
                    .await
                    .map_err(|e| {
                        EffectsError::AssetResolutionFailed(format!("image resolver failed: {e}"))
                    })??;
                Some(image)
            }
            None => None,
        };

        let shared = Arc::clone(&self.ctx.shared);
        self.queue
            .submit(move || {
                if shared.replace_epoch.load(Ordering::SeqCst) != epoch {
                    debug!("discarding stale background replacement");
                    return Err(EffectsError::Superseded(
                        "a later background change was requested".to_string(),
                    ));
                }
                with_pipeline(&shared, |handle| handle.enable_replace(image))
            })
            .await
    }

    pub async fn disable_replace(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.ctx.shared.replace_epoch.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(&self.ctx.shared);
        self.queue
            .submit(move || {
                with_pipeline(&shared, |handle| {
                    handle.disable_replace();
                    Ok(())
                })
            })
            .await
    }

    /// Tear the session down. Safe to call any number of times; engine
    /// failures during teardown are logged and the session still resets.
    pub fn cleanup(&self) {
        let shared = &self.ctx.shared;
        let mut record = shared.record.lock();
        shared.generation.fetch_add(1, Ordering::SeqCst);
        shared.replace_epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(mut registration) = record.registration.take() {
            registration.unregister();
        }

        let handle = shared.effects.lock().take();
        if let Some(mut handle) = handle {
            let teardown = catch_unwind(AssertUnwindSafe(move || {
                handle.disable_all();
                drop(handle);
            }));
            if let Err(payload) = teardown {
                warn!(
                    "effects engine panicked during cleanup: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        let was_initialized = record.initialized;
        *record = SessionRecord::default();
        drop(record);

        self.ctx.stats.lock().reset();
        self.in_flight.lock().take();
        if was_initialized {
            info!("effects session cleaned up");
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(EffectsError::NotInitialized)
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.ctx.shared.record.lock().initialized
    }

    pub fn effect_state(&self) -> EffectState {
        self.ctx
            .shared
            .effects
            .lock()
            .as_ref()
            .map(PipelineHandle::state)
            .unwrap_or_default()
    }

    pub fn is_blur_enabled(&self) -> bool {
        self.effect_state().blur_enabled
    }

    pub fn is_virtual_background_enabled(&self) -> bool {
        self.effect_state().replace_enabled
    }

    pub fn bound_track(&self) -> Option<TrackId> {
        self.ctx.shared.record.lock().bound_track.clone()
    }

    /// Customer id the live session was authorized with.
    pub fn customer_id(&self) -> Option<String> {
        self.ctx.shared.record.lock().credential.clone()
    }

    pub fn diagnostics(&self) -> InterceptorSnapshot {
        self.ctx.stats.lock().snapshot()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::loopback::LoopbackMediaStack;
    use crate::effects::background::LocalImageResolver;
    use crate::sdk::mock::MockEffectsSdk;
    use crate::sdk::types::{SdkError, SegmentationPreset};
    use std::time::Duration;
    use vfx_frame::{PixelBuffer, PixelFormat, Rotation, VideoFrame};

    struct Harness {
        sdk: Arc<MockEffectsSdk>,
        stack: Arc<LoopbackMediaStack>,
        controller: SessionController,
    }

    /// Resolves every source to a small image after a delay.
    struct SlowResolver(Duration);

    impl ImageResolver for SlowResolver {
        fn resolve(&self, _source: &BackgroundSource) -> Result<PixelBuffer> {
            std::thread::sleep(self.0);
            Ok(PixelBuffer::zeroed(4, 4, PixelFormat::Rgba8))
        }
    }

    fn harness_with(sdk: MockEffectsSdk) -> Harness {
        harness_with_resolver(sdk, Arc::new(LocalImageResolver::new()))
    }

    fn harness_with_resolver(sdk: MockEffectsSdk, resolver: Arc<dyn ImageResolver>) -> Harness {
        let sdk = Arc::new(sdk);
        let stack = Arc::new(LoopbackMediaStack::new());
        let controller =
            SessionController::new(sdk.clone(), stack.clone(), resolver, BridgeOptions::default())
                .unwrap();
        Harness {
            sdk,
            stack,
            controller,
        }
    }

    fn harness() -> Harness {
        harness_with(MockEffectsSdk::new())
    }

    fn track(id: &str) -> TrackId {
        TrackId::new(id)
    }

    fn frame() -> VideoFrame {
        let data = (0..4 * 4 * 4).map(|i| (i * 3 % 256) as u8).collect();
        VideoFrame::new(
            PixelBuffer::new(4, 4, PixelFormat::Rgba8, data).unwrap(),
            Rotation::Deg0,
            0,
        )
    }

    #[tokio::test]
    async fn first_initialize_authorizes_and_registers() {
        let h = harness();
        let status = h.controller.initialize("cust-1", &track("t1")).await.unwrap();

        assert_eq!(status, InitStatus::Active);
        assert!(h.controller.is_initialized());
        assert_eq!(h.sdk.auth_calls(), 1);
        assert_eq!(h.sdk.pipelines_created(), 1);
        assert!(h.stack.has_processor("tsvb"));
        assert_eq!(h.stack.effects_for(&track("t1")), vec!["tsvb".to_string()]);
        assert_eq!(h.controller.bound_track(), Some(track("t1")));
        assert_eq!(h.controller.customer_id().as_deref(), Some("cust-1"));
        assert_eq!(
            h.sdk.pipeline_state().configuration.segmentation_preset,
            SegmentationPreset::Quality
        );
    }

    #[tokio::test]
    async fn same_track_is_already_initialized() {
        let h = harness();
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        let status = h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        assert_eq!(status, InitStatus::AlreadyInitialized);
        assert_eq!(h.sdk.auth_calls(), 1);
        assert_eq!(h.stack.add_calls(), 1);
    }

    #[tokio::test]
    async fn new_track_rebinds_without_reauthorizing() {
        let h = harness();
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        let status = h.controller.initialize("cust-1", &track("t2")).await.unwrap();

        assert_eq!(status, InitStatus::TrackUpdated);
        assert_eq!(h.sdk.auth_calls(), 1);
        assert_eq!(h.sdk.pipelines_created(), 1);
        assert_eq!(h.controller.bound_track(), Some(track("t2")));
        // Old registration removed before the new one was added.
        assert_eq!(h.stack.remove_calls(), 1);
        assert_eq!(h.stack.add_calls(), 2);
        assert!(h.stack.has_processor("tsvb"));
        assert_eq!(h.stack.effects_for(&track("t2")), vec!["tsvb".to_string()]);
    }

    #[tokio::test]
    async fn expired_license_fails_without_state_change() {
        let h = harness_with(MockEffectsSdk::new().with_auth_status(AuthStatus::Expired));
        let err = h
            .controller
            .initialize("cust-1", &track("t1"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EffectsError::AuthorizationFailed("License expired".to_string())
        );
        assert!(!h.controller.is_initialized());
        assert_eq!(h.sdk.pipelines_created(), 0);
        assert!(!h.stack.has_processor("tsvb"));
    }

    #[tokio::test]
    async fn failed_authorization_can_be_retried() {
        let h = harness_with(
            MockEffectsSdk::new()
                .with_error("authorize", SdkError::Authorization("offline".to_string())),
        );
        assert!(h.controller.initialize("cust-1", &track("t1")).await.is_err());
        let status = h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        assert_eq!(status, InitStatus::Active);
        assert_eq!(h.sdk.auth_calls(), 2);
    }

    #[tokio::test]
    async fn registration_failure_rolls_back() {
        let h = harness();
        h.stack.fail_next("add_processor");
        let err = h
            .controller
            .initialize("cust-1", &track("t1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EffectsError::MediaStack(_)));
        assert!(!h.controller.is_initialized());
        assert!(h.controller.ctx.shared.effects.lock().is_none());
    }

    #[tokio::test]
    async fn effect_activation_failure_keeps_session() {
        let h = harness();
        h.stack.fail_next("set_video_effects");
        let status = h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        assert_eq!(status, InitStatus::Active);
        assert!(h.controller.is_initialized());
    }

    #[tokio::test]
    async fn concurrent_initialize_shares_one_attempt() {
        let h = harness_with(MockEffectsSdk::new().with_auth_delay(Duration::from_millis(50)));
        let t1 = track("t1");
        let (a, b, c) = tokio::join!(
            h.controller.initialize("cust-1", &t1),
            h.controller.initialize("cust-1", &t1),
            h.controller.initialize("cust-1", &t1),
        );

        assert_eq!(a.unwrap(), InitStatus::Active);
        assert_eq!(b.unwrap(), InitStatus::Active);
        assert_eq!(c.unwrap(), InitStatus::Active);
        assert_eq!(h.sdk.auth_calls(), 1);
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let h = harness();
        assert_eq!(
            h.controller.enable_blur(0.5).await,
            Err(EffectsError::NotInitialized)
        );
        assert_eq!(
            h.controller.disable_blur().await,
            Err(EffectsError::NotInitialized)
        );
        assert_eq!(
            h.controller.enable_replace(None).await,
            Err(EffectsError::NotInitialized)
        );
        assert_eq!(
            h.controller.disable_replace().await,
            Err(EffectsError::NotInitialized)
        );
        assert_eq!(h.sdk.pipelines_created(), 0);
    }

    #[tokio::test]
    async fn blur_and_replace_are_mutually_exclusive() {
        let h = harness();
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();

        h.controller.enable_blur(0.5).await.unwrap();
        assert!(h.controller.is_blur_enabled());
        assert!(!h.controller.is_virtual_background_enabled());
        assert_eq!(h.sdk.pipeline_state().blur_power, Some(0.5));

        h.controller.enable_replace(None).await.unwrap();
        assert!(!h.controller.is_blur_enabled());
        assert!(h.controller.is_virtual_background_enabled());

        h.controller.enable_blur(0.3).await.unwrap();
        assert!(h.controller.is_blur_enabled());
        assert!(!h.controller.is_virtual_background_enabled());

        h.controller.disable_blur().await.unwrap();
        assert_eq!(h.controller.effect_state(), EffectState::default());
    }

    #[tokio::test]
    async fn engine_rejection_leaves_state_unchanged() {
        let h = harness_with(MockEffectsSdk::new().with_error(
            "enable_replace_background",
            SdkError::Rejected("no model".to_string()),
        ));
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        h.controller.enable_blur(0.4).await.unwrap();

        let err = h.controller.enable_replace(None).await.unwrap_err();
        assert!(matches!(err, EffectsError::PipelineOperationFailed(_)));
        assert!(h.controller.is_blur_enabled());
        assert!(!h.controller.is_virtual_background_enabled());
    }

    #[tokio::test]
    async fn engine_panic_in_control_job_is_reported() {
        let h = harness_with(MockEffectsSdk::new().with_panic("enable_blur_background"));
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();

        let err = h.controller.enable_blur(0.5).await.unwrap_err();
        assert!(matches!(err, EffectsError::PipelineOperationFailed(_)));
        // The queue keeps working.
        h.controller.enable_blur(0.5).await.unwrap();
        assert!(h.controller.is_blur_enabled());
    }

    #[tokio::test]
    async fn unresolvable_background_fails_before_queueing() {
        let h = harness();
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        h.controller.enable_blur(0.5).await.unwrap();

        let err = h
            .controller
            .enable_replace(Some(BackgroundSource::Url(
                "https://example.com/bg.jpg".to_string(),
            )))
            .await
            .unwrap_err();
        assert!(matches!(err, EffectsError::AssetResolutionFailed(_)));
        assert!(h.controller.is_blur_enabled());
    }

    #[tokio::test]
    async fn replace_with_image_applies_background() {
        let h = harness_with_resolver(
            MockEffectsSdk::new(),
            Arc::new(SlowResolver(Duration::ZERO)),
        );
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        h.controller
            .enable_replace(Some(BackgroundSource::Asset("office".to_string())))
            .await
            .unwrap();

        assert!(h.controller.is_virtual_background_enabled());
        let background = h.sdk.pipeline_state().background.unwrap();
        assert_eq!((background.width(), background.height()), (4, 4));
    }

    #[tokio::test]
    async fn replace_superseded_by_later_blur_is_discarded() {
        let h = harness_with_resolver(
            MockEffectsSdk::new(),
            Arc::new(SlowResolver(Duration::from_millis(150))),
        );
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();

        let (replace, blur) = tokio::join!(
            h.controller
                .enable_replace(Some(BackgroundSource::Asset("office".to_string()))),
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                h.controller.enable_blur(0.5).await
            }
        );

        assert!(matches!(replace, Err(EffectsError::Superseded(_))));
        blur.unwrap();
        assert!(h.controller.is_blur_enabled());
        assert!(!h.controller.is_virtual_background_enabled());
        assert!(h.sdk.pipeline_state().background.is_none());
    }

    #[tokio::test]
    async fn cleanup_resets_everything_and_is_idempotent() {
        let h = harness();
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        h.controller.enable_blur(0.5).await.unwrap();

        h.controller.cleanup();
        assert!(!h.controller.is_initialized());
        assert!(!h.controller.is_blur_enabled());
        assert!(h.controller.bound_track().is_none());
        assert!(!h.stack.has_processor("tsvb"));
        assert!(!h.sdk.pipeline_state().blur_enabled);

        h.controller.cleanup();
        assert_eq!(h.stack.remove_calls(), 1);

        assert_eq!(
            h.controller.enable_blur(0.5).await,
            Err(EffectsError::NotInitialized)
        );
    }

    #[tokio::test]
    async fn cleanup_survives_engine_panic() {
        let h = harness_with(MockEffectsSdk::new().with_panic("disable_blur_background"));
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();

        h.controller.cleanup();
        assert!(!h.controller.is_initialized());
        assert!(!h.stack.has_processor("tsvb"));
    }

    #[tokio::test]
    async fn reinitialize_after_cleanup_authorizes_again() {
        let h = harness();
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        h.controller.cleanup();

        let status = h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        assert_eq!(status, InitStatus::Active);
        assert_eq!(h.sdk.auth_calls(), 2);
        assert_eq!(h.sdk.pipelines_created(), 2);
    }

    #[tokio::test]
    async fn cleanup_during_authorization_discards_attempt() {
        let h = harness_with(MockEffectsSdk::new().with_auth_delay(Duration::from_millis(100)));
        let t1 = track("t1");
        let init = h.controller.initialize("cust-1", &t1);
        let cleanup = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            h.controller.cleanup();
        };
        let (result, ()) = tokio::join!(init, cleanup);

        assert!(matches!(result, Err(EffectsError::Superseded(_))));
        assert!(!h.controller.is_initialized());
        assert!(!h.stack.has_processor("tsvb"));
        assert!(h.controller.ctx.shared.effects.lock().is_none());
    }

    #[tokio::test]
    async fn abandoned_initialize_does_not_answer_later_calls() {
        let h = harness_with(MockEffectsSdk::new().with_auth_delay(Duration::from_millis(100)));
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            h.controller.initialize("cust-1", &track("t1")),
        )
        .await;
        assert!(abandoned.is_err());

        // The queued job still completes without anyone awaiting it.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(h.controller.is_initialized());

        let status = h.controller.initialize("cust-1", &track("t2")).await.unwrap();
        assert_eq!(status, InitStatus::TrackUpdated);
        assert_eq!(h.controller.bound_track(), Some(track("t2")));
        assert!(h.stack.effects_for(&track("t2")).contains(&"tsvb".to_string()));
        assert_eq!(h.sdk.auth_calls(), 1);
    }

    #[tokio::test]
    async fn abandoned_failed_initialize_is_retried() {
        let h = harness_with(
            MockEffectsSdk::new()
                .with_auth_delay(Duration::from_millis(100))
                .with_error("authorize", SdkError::Authorization("offline".to_string())),
        );
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            h.controller.initialize("cust-1", &track("t1")),
        )
        .await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_millis(250)).await;

        let status = h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        assert_eq!(status, InitStatus::Active);
        assert_eq!(h.sdk.auth_calls(), 2);
    }

    #[tokio::test]
    async fn frames_flow_through_registered_interceptor() {
        let h = harness();
        let t1 = track("t1");
        h.controller.initialize("cust-1", &t1).await.unwrap();

        let input = frame();
        assert!(h.stack.deliver(&t1, input.clone()).same_buffer(&input));

        h.controller.enable_blur(0.5).await.unwrap();
        let output = h.stack.deliver(&t1, input.clone());
        assert!(!output.same_buffer(&input));

        let diagnostics = h.controller.diagnostics();
        assert_eq!(diagnostics.frames_passthrough, 1);
        assert_eq!(diagnostics.frames_processed, 1);

        h.controller.cleanup();
        assert!(h.stack.deliver(&t1, input.clone()).same_buffer(&input));
    }

    #[tokio::test]
    async fn drop_cleans_up() {
        let h = harness();
        h.controller.initialize("cust-1", &track("t1")).await.unwrap();
        let Harness {
            stack, controller, ..
        } = h;
        drop(controller);
        assert!(!stack.has_processor("tsvb"));
    }
}
