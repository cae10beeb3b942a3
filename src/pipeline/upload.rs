//! Upload validation: decide what the user sent before anything is spent on it.
//!
//! The declared multipart content type is only a hint. Browsers label files
//! from their extension, so the bytes are sniffed (`%PDF` header, image
//! signatures) and the sniffed type wins. Anything that is neither a PDF nor
//! one of the supported image formats is rejected here with a 400.

use crate::error::GraderError;
use image::ImageFormat;
use std::fmt;
use tracing::debug;

/// Image formats the OCR backends accept.
pub const SUPPORTED_IMAGE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// What kind of document an upload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Image(ImageFormat),
}

impl MediaKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Pdf => "application/pdf",
            MediaKind::Image(fmt) => fmt.to_mime_type(),
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, MediaKind::Pdf)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Pdf => f.write_str("PDF"),
            MediaKind::Image(_) => f.write_str("image"),
        }
    }
}

/// A validated upload held in memory.
#[derive(Clone)]
pub struct Upload {
    pub file_name: String,
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("declared_type", &self.declared_type)
            .field("len", &self.bytes.len())
            .field("kind", &self.kind)
            .finish()
    }
}

impl Upload {
    /// Validate raw upload bytes and detect their media kind.
    pub fn new(
        file_name: impl Into<String>,
        declared_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, GraderError> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(GraderError::EmptyFile { file_name });
        }
        let kind = detect_media_kind(declared_type.as_deref(), &bytes)?;
        debug!(
            "Upload '{}': declared {:?}, detected {} ({} bytes)",
            file_name,
            declared_type,
            kind.mime_type(),
            bytes.len()
        );
        Ok(Self {
            file_name,
            declared_type,
            bytes,
            kind,
        })
    }
}

/// Check whether the bytes start with the PDF magic.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == b"%PDF"
}

/// Detect the media kind from the content, falling back to the declared
/// type only for naming the rejection.
pub fn detect_media_kind(declared: Option<&str>, bytes: &[u8]) -> Result<MediaKind, GraderError> {
    if is_pdf(bytes) {
        return Ok(MediaKind::Pdf);
    }

    if let Ok(format) = image::guess_format(bytes) {
        if SUPPORTED_IMAGE_FORMATS.contains(&format) {
            return Ok(MediaKind::Image(format));
        }
        return Err(GraderError::UnsupportedMediaType {
            media_type: format.to_mime_type().to_string(),
        });
    }

    let media_type = declared
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("unknown")
        .to_string();
    Err(GraderError::UnsupportedMediaType { media_type })
}
