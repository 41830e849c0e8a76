//! Uniform `{success, status?, error?}` results for the application layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::effects::error::EffectsError;
use crate::sdk::types::AuthStatus;

/// Outcome of a successful `initialize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStatus {
    /// First-time authorization succeeded and the pipeline is live.
    Active,
    /// The session was already live; it is now bound to a different track.
    TrackUpdated,
    /// Same track, already live. Nothing happened.
    AlreadyInitialized,
}

impl InitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => AuthStatus::Active.as_str(),
            Self::TrackUpdated => "track_updated",
            Self::AlreadyInitialized => "already_initialized",
        }
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result payload handed back to the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            status: None,
            error: None,
        }
    }

    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            success: true,
            status: Some(status.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            success: false,
            status: None,
            error: Some(error),
        }
    }
}

impl From<&EffectsError> for BridgeResult {
    fn from(err: &EffectsError) -> Self {
        Self::failed(err.to_string())
    }
}

impl From<Result<InitStatus, EffectsError>> for BridgeResult {
    fn from(result: Result<InitStatus, EffectsError>) -> Self {
        match result {
            Ok(status) => Self::with_status(status.as_str()),
            Err(e) => Self::from(&e),
        }
    }
}

impl From<Result<(), EffectsError>> for BridgeResult {
    fn from(result: Result<(), EffectsError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::from(&e),
        }
    }
}

/// Human-readable reason for a non-active license.
pub fn auth_error_message(status: AuthStatus) -> &'static str {
    match status {
        AuthStatus::Expired => "License expired",
        AuthStatus::Inactive => "License is inactive",
        AuthStatus::Active | AuthStatus::Unknown => "Unknown authorization error",
    }
}
