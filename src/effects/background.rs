//! Background images for replace mode.
//!
//! Images are resolved and decoded on a blocking worker before the control
//! job runs, so the pipeline lock is never held across file or network I/O.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use vfx_frame::{PixelBuffer, PixelFormat};

use crate::effects::error::{EffectsError, Result};
use crate::settings::types::BridgeOptions;

/// Where a replacement background comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSource {
    /// `http://` or `https://` URL.
    Url(String),
    /// Local file, from an absolute path or a `file://` URL.
    File(PathBuf),
    /// Base64 payload of a `data:` URI.
    Inline(String),
    /// Name of an image bundled with the application.
    Asset(String),
}

impl BackgroundSource {
    /// Classify a caller-supplied image reference.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else if lower.starts_with("file://") {
            Self::File(PathBuf::from(&trimmed["file://".len()..]))
        } else if lower.starts_with("data:") {
            let payload = match trimmed.find(";base64,") {
                Some(idx) => &trimmed[idx + ";base64,".len()..],
                None => trimmed.split_once(',').map_or("", |(_, rest)| rest),
            };
            Self::Inline(payload.to_string())
        } else if Path::new(trimmed).is_absolute() {
            Self::File(PathBuf::from(trimmed))
        } else {
            Self::Asset(trimmed.to_string())
        }
    }
}

impl fmt::Display for BackgroundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "url {url}"),
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Inline(payload) => write!(f, "inline image ({} base64 chars)", payload.len()),
            Self::Asset(name) => write!(f, "asset {name}"),
        }
    }
}

/// Turns a [`BackgroundSource`] into decoded RGBA pixels.
///
/// Called from a blocking worker, never while the pipeline lock is held.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, source: &BackgroundSource) -> Result<PixelBuffer>;
}

/// Resolves files, inline data and bundled assets from local storage.
///
/// Remote URLs are not fetched; wire a network-aware resolver for those.
#[derive(Debug, Clone, Default)]
pub struct LocalImageResolver {
    assets_dir: Option<PathBuf>,
    max_dimension: Option<u32>,
}

impl LocalImageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver from the bridge options.
    pub fn from_options(options: &BridgeOptions) -> Self {
        Self {
            assets_dir: options.assets_dir.clone(),
            max_dimension: options.max_background_dimension,
        }
    }

    /// Directory searched for bundled asset names.
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = Some(dir.into());
        self
    }

    /// Downscale images whose longest side exceeds `max`.
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = Some(max);
        self
    }

    fn asset_path(&self, name: &str) -> Result<PathBuf> {
        let dir = self.assets_dir.as_ref().ok_or_else(|| {
            EffectsError::AssetResolutionFailed(format!(
                "no assets directory configured for asset '{name}'"
            ))
        })?;

        let relative = Path::new(name);
        if name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(EffectsError::AssetResolutionFailed(format!(
                "invalid asset name '{name}'"
            )));
        }

        let mut path = dir.join(relative);
        if path.extension().is_none() {
            path.set_extension("jpg");
        }
        Ok(path)
    }

    fn fit(&self, image: PixelBuffer) -> Result<PixelBuffer> {
        match self.max_dimension {
            Some(max) if max > 0 && image.width().max(image.height()) > max => {
                downscale(&image, max)
            }
            _ => Ok(image),
        }
    }
}

impl ImageResolver for LocalImageResolver {
    fn resolve(&self, source: &BackgroundSource) -> Result<PixelBuffer> {
        let jpeg = match source {
            BackgroundSource::Url(url) => {
                return Err(EffectsError::AssetResolutionFailed(format!(
                    "remote backgrounds are not supported by the local resolver: {url}"
                )));
            }
            BackgroundSource::File(path) => read_file(path)?,
            BackgroundSource::Inline(payload) => base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| {
                    EffectsError::AssetResolutionFailed(format!("invalid base64 image data: {e}"))
                })?,
            BackgroundSource::Asset(name) => read_file(&self.asset_path(name)?)?,
        };

        let image = decode_jpeg(&jpeg)?;
        let image = self.fit(image)?;
        tracing::debug!(
            "resolved background {source} to {}x{}",
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        EffectsError::AssetResolutionFailed(format!("failed to read {}: {e}", path.display()))
    })
}

/// Decode JPEG bytes into a packed RGBA buffer.
pub fn decode_jpeg(jpeg: &[u8]) -> Result<PixelBuffer> {
    let image = turbojpeg::decompress(jpeg, turbojpeg::PixelFormat::RGBA)
        .map_err(|e| EffectsError::AssetResolutionFailed(format!("JPEG decode failed: {e}")))?;

    let row_bytes = image.width * 4;
    let pixels = if image.pitch == row_bytes {
        image.pixels
    } else {
        // Strip row padding.
        image
            .pixels
            .chunks(image.pitch)
            .take(image.height)
            .flat_map(|row| row[..row_bytes].iter().copied())
            .collect()
    };

    PixelBuffer::new(
        image.width as u32,
        image.height as u32,
        PixelFormat::Rgba8,
        pixels,
    )
    .map_err(|e| EffectsError::AssetResolutionFailed(e.to_string()))
}

/// Shrink an RGBA image so its longest side is `max` pixels.
fn downscale(image: &PixelBuffer, max: u32) -> Result<PixelBuffer> {
    use fast_image_resize as fr;
    use fr::images::Image;

    let scale = f64::from(max) / f64::from(image.width().max(image.height()));
    let width = ((f64::from(image.width()) * scale).round() as u32).max(1);
    let height = ((f64::from(image.height()) * scale).round() as u32).max(1);

    let src = Image::from_vec_u8(
        image.width(),
        image.height(),
        image.data().to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| EffectsError::AssetResolutionFailed(format!("invalid image buffer: {e}")))?;
    let mut dst = Image::new(width, height, fr::PixelType::U8x4);

    fr::Resizer::new()
        .resize(&src, &mut dst, None)
        .map_err(|e| EffectsError::AssetResolutionFailed(format!("resize failed: {e}")))?;

    PixelBuffer::new(width, height, PixelFormat::Rgba8, dst.into_vec())
        .map_err(|e| EffectsError::AssetResolutionFailed(e.to_string()))
}
