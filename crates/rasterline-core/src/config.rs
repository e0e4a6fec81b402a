//! Codec configuration.
//!
//! A [`CodecConfig`] is built once by the caller and passed by reference to
//! [`crate::load`], [`crate::save`], [`crate::decode`] and [`crate::encode`].
//! Nothing in the crate keeps a global copy.

use serde::{Deserialize, Serialize};

/// Default JPEG quality when none is given.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Default zlib compression level for PNG.
pub const DEFAULT_PNG_COMPRESSION: u32 = 6;

/// Chroma subsampling used by the JPEG encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Subsampling {
    /// 4:4:4, chroma at full resolution.
    S444,
    /// 4:2:0, chroma halved on both axes.
    #[default]
    S420,
}

/// Scanline filter selection for the PNG encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PngFilterStrategy {
    /// Every row uses filter type 0.
    #[default]
    None,
    /// Per row, the filter with the smallest sum of absolute residuals.
    Adaptive,
}

/// JPEG encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JpegOptions {
    /// Quality 1-100; out-of-range values are clamped.
    pub quality: u8,
    /// Chroma subsampling.
    pub subsampling: Subsampling,
    /// Restart interval in MCUs (None = no DRI marker).
    pub restart_interval: Option<u16>,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            subsampling: Subsampling::default(),
            restart_interval: None,
        }
    }
}

impl JpegOptions {
    /// Options with the given quality and defaults for everything else.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }
}

/// PNG encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PngOptions {
    pub filter: PngFilterStrategy,
    /// zlib level 0-9.
    pub compression: u32,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            filter: PngFilterStrategy::default(),
            compression: DEFAULT_PNG_COMPRESSION,
        }
    }
}

/// Settings for every codec, passed explicitly to the pipeline entry points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub jpeg: JpegOptions,
    pub png: PngOptions,
    /// Lossy WebP quality (0.0 to 100.0).
    pub webp_quality: f32,
    /// Apply the EXIF orientation of a JPEG while decoding.
    pub auto_orient: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            jpeg: JpegOptions::default(),
            png: PngOptions::default(),
            webp_quality: 75.0,
            auto_orient: true,
        }
    }
}
