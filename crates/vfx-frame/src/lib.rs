//! Video frame types shared between capture stacks and effect pipelines.
//!
//! A [`VideoFrame`] wraps its pixel data in an `Arc`, so handing a frame to a
//! processor and getting the same frame back costs a reference-count bump
//! rather than a copy of a multi-megabyte buffer.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Frame construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("unsupported rotation: {0} degrees")]
    UnsupportedRotation(i32),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Pixel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
}

impl PixelFormat {
    /// Number of bytes used by a single pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// Packed, unpadded pixel data.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw pixel data, checking that its length matches the dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height, format);
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A buffer with every byte set to zero.
    pub fn zeroed(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; Self::byte_len(width, height, format)],
        }
    }

    fn byte_len(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.bytes_per_pixel()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// True when either dimension is zero. Such buffers carry no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Clockwise rotation the renderer should apply to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse a rotation from degrees. Only right angles are accepted.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(FrameError::UnsupportedRotation(degrees)),
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// A captured video frame: pixel buffer, rotation and capture timestamp.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    buffer: Arc<PixelBuffer>,
    rotation: Rotation,
    timestamp_ns: i64,
}

impl VideoFrame {
    pub fn new(buffer: PixelBuffer, rotation: Rotation, timestamp_ns: i64) -> Self {
        Self {
            buffer: Arc::new(buffer),
            rotation,
            timestamp_ns,
        }
    }

    /// Build a frame carrying `buffer` but this frame's rotation and timestamp.
    pub fn with_buffer(&self, buffer: PixelBuffer) -> Self {
        Self {
            buffer: Arc::new(buffer),
            rotation: self.rotation,
            timestamp_ns: self.timestamp_ns,
        }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    /// True when both frames point at the same pixel allocation.
    pub fn same_buffer(&self, other: &VideoFrame) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}
