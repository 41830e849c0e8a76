use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::settings::types::BridgeOptions;

/// Environment variable naming the options file.
pub const OPTIONS_ENV: &str = "VFX_OPTIONS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid options in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialise options: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BridgeOptions {
    /// Load options from a JSON file, returning defaults when the file is missing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the file named by `VFX_OPTIONS`, or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_optional(std::env::var_os(OPTIONS_ENV).map(PathBuf::from).as_deref())
    }

    fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                tracing::debug!("loading bridge options from {}", path.display());
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Save to disk atomically (write .tmp then rename).
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(io_err)?;
        std::fs::rename(&tmp_path, path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::types::SegmentationPreset;
    use tempfile::TempDir;

    #[test]
    fn load_returns_default_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.json");
        assert_eq!(BridgeOptions::load(&path).unwrap(), BridgeOptions::default());
    }

    #[test]
    fn load_parses_valid_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(
            &path,
            r#"{"processorName":"fx","segmentationPreset":"lightning","maxBackgroundDimension":720}"#,
        )
        .unwrap();

        let options = BridgeOptions::load(&path).unwrap();
        assert_eq!(options.processor_name, "fx");
        assert_eq!(options.segmentation_preset, SegmentationPreset::Lightning);
        assert_eq!(options.max_background_dimension, Some(720));
    }

    #[test]
    fn load_returns_parse_error_for_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, "not valid json!!!").unwrap();

        let err = BridgeOptions::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("options.json"));
    }

    #[test]
    fn load_optional_without_path_gives_defaults() {
        assert_eq!(
            BridgeOptions::load_optional(None).unwrap(),
            BridgeOptions::default()
        );
    }

    #[test]
    fn save_then_load_preserves_options() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("options.json");
        let options = BridgeOptions {
            frame_budget_ms: 12,
            assets_dir: Some(dir.path().join("assets")),
            ..BridgeOptions::default()
        };

        options.save(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(BridgeOptions::load(&path).unwrap(), options);
    }
}
