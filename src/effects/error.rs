use std::any::Any;

use thiserror::Error;

use crate::sdk::types::SdkError;

/// Effects subsystem errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectsError {
    #[error("effects SDK is not initialized; call initialize() first")]
    NotInitialized,

    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("pipeline operation failed: {0}")]
    PipelineOperationFailed(String),

    #[error("background image could not be loaded: {0}")]
    AssetResolutionFailed(String),

    #[error("frame processing degraded: {0}")]
    FrameProcessingDegraded(String),

    #[error("media stack request failed: {0}")]
    MediaStack(String),

    #[error("superseded: {0}")]
    Superseded(String),

    #[error("control queue is closed")]
    ControlQueueClosed,
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, EffectsError>;

impl From<SdkError> for EffectsError {
    fn from(err: SdkError) -> Self {
        match err {
            SdkError::Authorization(msg) => Self::AuthorizationFailed(msg),
            other => Self::PipelineOperationFailed(other.to_string()),
        }
    }
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
