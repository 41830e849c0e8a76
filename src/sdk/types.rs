use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by the effects SDK.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("authorization request failed: {0}")]
    Authorization(String),

    #[error("pipeline could not be created: {0}")]
    PipelineCreation(String),

    #[error("configuration rejected: {0}")]
    Configuration(String),

    #[error("operation rejected by effects engine: {0}")]
    Rejected(String),

    #[error("frame processing failed: {0}")]
    Processing(String),
}

/// Convenience Result alias for SDK calls.
pub type Result<T> = std::result::Result<T, SdkError>;

/// License state returned by the SDK's authorization call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Active,
    Expired,
    Inactive,
    Unknown,
}

impl AuthStatus {
    /// Wire label used in result payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
            Self::Unknown => "unknown",
        }
    }
}

/// Segmentation model preset, trading accuracy against per-frame cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationPreset {
    #[default]
    Quality,
    Balanced,
    Speed,
    Lightning,
}

/// Pipeline configuration. Applied once, right after the pipeline is created.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineConfiguration {
    pub segmentation_preset: SegmentationPreset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_status_labels() {
        assert_eq!(AuthStatus::Active.as_str(), "active");
        assert_eq!(AuthStatus::Expired.as_str(), "expired");
        assert_eq!(AuthStatus::Inactive.as_str(), "inactive");
        assert_eq!(AuthStatus::Unknown.as_str(), "unknown");
    }

    #[test]
    fn segmentation_preset_defaults_to_quality() {
        assert_eq!(SegmentationPreset::default(), SegmentationPreset::Quality);
        assert_eq!(
            PipelineConfiguration::default().segmentation_preset,
            SegmentationPreset::Quality
        );
    }

    #[test]
    fn segmentation_preset_serialises_to_snake_case() {
        let json = serde_json::to_value(SegmentationPreset::Lightning).unwrap();
        assert_eq!(json, "lightning");
        let parsed: SegmentationPreset = serde_json::from_str("\"balanced\"").unwrap();
        assert_eq!(parsed, SegmentationPreset::Balanced);
    }

    #[test]
    fn sdk_error_messages_are_descriptive() {
        let err = SdkError::Rejected("blur unavailable".to_string());
        assert_eq!(
            err.to_string(),
            "operation rejected by effects engine: blur unavailable"
        );
    }
}
