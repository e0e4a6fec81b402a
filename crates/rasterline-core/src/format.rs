//! Container format identification by content and by file extension.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::{self, Codec, CODECS};
use crate::error::{CodecError, Result};

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Bmp,
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// Identify a format from the leading bytes of a file.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        codec::sniff(bytes).map(|c| c.format)
    }

    /// Match a file extension, ignoring ASCII case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "bmp" => Some(ImageFormat::Bmp),
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Format implied by a path's extension.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnsupportedFormat` if the path has no extension or
    /// the extension isn't one of bmp, png, jpg, jpeg or webp.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                CodecError::UnsupportedFormat(format!(
                    "No codec for file extension of {}",
                    path.display()
                ))
            })
    }

    /// The codec entry for this format.
    pub fn codec(self) -> &'static Codec {
        match self {
            ImageFormat::Png => &CODECS[0],
            ImageFormat::Jpeg => &CODECS[1],
            ImageFormat::Bmp => &CODECS[2],
            ImageFormat::WebP => &CODECS[3],
        }
    }

    /// Canonical lowercase file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Bmp => "bmp",
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::WebP => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::Bmp => "BMP",
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::WebP => "WebP",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_table_matches_format() {
        for format in [
            ImageFormat::Bmp,
            ImageFormat::Png,
            ImageFormat::Jpeg,
            ImageFormat::WebP,
        ] {
            assert_eq!(format.codec().format, format);
        }
    }

    #[test]
    fn test_sniff() {
        assert_eq!(
            ImageFormat::sniff(b"\x89PNG\r\n\x1a\n\0\0"),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::sniff(b"BM\0\0\0\0"), Some(ImageFormat::Bmp));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8L"),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a"), None);
        assert_eq!(ImageFormat::sniff(&[]), None);
    }

    #[test]
    fn test_from_extension_ignores_case() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("WebP"), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_extension("tiff"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            ImageFormat::from_path(Path::new("out/photo.Png")).unwrap(),
            ImageFormat::Png
        );
        assert!(matches!(
            ImageFormat::from_path(Path::new("notes.txt")),
            Err(CodecError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            ImageFormat::from_path(Path::new("no_extension")),
            Err(CodecError::UnsupportedFormat(_))
        ));
    }
}
