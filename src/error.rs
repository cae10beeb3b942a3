//! Error types for the assignment grader.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`GraderError`] — **Fatal**: the request cannot be answered (no file,
//!   unsupported media type, OCR service down, model unreachable). Returned
//!   as `Err(GraderError)` from [`crate::service::AssignmentService::analyze`]
//!   and mapped onto an HTTP status by [`GraderError::status_code`].
//!
//! * [`PageError`] — **Non-fatal**: OCR failed for a single page of a
//!   multi-page document. The page contributes placeholder text and the
//!   error is kept in [`crate::pipeline::extract::ExtractionStats`].
//!
//! * [`ReplyParseError`] — the model answered, but not with a usable JSON
//!   analysis. The orchestrator decides whether that becomes the fallback
//!   analysis or a [`GraderError::UnparseableReply`].

use thiserror::Error;

/// All fatal errors returned by the grader.
#[derive(Debug, Error)]
pub enum GraderError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The multipart form had no `file` field.
    #[error("No file provided")]
    MissingFile,

    /// The `file` field was present but carried zero bytes.
    #[error("The uploaded file '{file_name}' is empty")]
    EmptyFile { file_name: String },

    /// The request body exceeded the configured upload limit.
    #[error("The uploaded file is too large (limit: {limit} bytes)")]
    UploadTooLarge { limit: usize },

    /// The multipart body or the uploaded image data could not be read.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { detail: String },

    /// The file is neither a PDF nor a supported image.
    #[error("Unsupported file type '{media_type}'. Please upload a PDF or an image (PNG, JPEG, GIF, WebP, BMP, TIFF).")]
    UnsupportedMediaType { media_type: String },

    /// The file type is supported in general, but not by the configured strategy.
    #[error("The '{strategy}' extraction strategy cannot read {media_type} files")]
    StrategyMismatch {
        strategy: String,
        media_type: String,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF text-layer extraction or PDF loading failed.
    #[error("Failed to parse PDF: {detail}")]
    PdfParse { detail: String },

    /// Rasterisation (local or via the conversion service) failed.
    #[error("Failed to convert PDF pages to images: {detail}")]
    ConversionFailed { detail: String },

    /// The OCR service failed for a single-image upload.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },

    /// Every page of a multi-page document failed OCR.
    #[error("Text extraction failed on all {total} pages. First error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Extraction succeeded but produced only whitespace.
    #[error("No text could be extracted from the file. Make sure it contains readable text or handwriting.")]
    EmptyText,

    // ── Grading errors ────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call failed after all retries.
    #[error("Grading request failed after {retries} retries: {message}")]
    GradingFailed { retries: u32, message: String },

    /// The model reply could not be parsed and fallback is disabled.
    #[error("The grading model returned an unusable reply: {0}")]
    UnparseableReply(#[source] ReplyParseError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GraderError {
    /// HTTP status for this error.
    ///
    /// Client mistakes (bad upload, nothing to grade) are 400; failures of
    /// the external services are 500, except an unparseable model reply,
    /// which is reported as a bad upstream answer (502).
    pub fn status_code(&self) -> u16 {
        match self {
            GraderError::MissingFile
            | GraderError::EmptyFile { .. }
            | GraderError::MalformedUpload { .. }
            | GraderError::UnsupportedMediaType { .. }
            | GraderError::StrategyMismatch { .. }
            | GraderError::EmptyText => 400,
            GraderError::UploadTooLarge { .. } => 413,
            GraderError::UnparseableReply(_) => 502,
            GraderError::PdfParse { .. }
            | GraderError::ConversionFailed { .. }
            | GraderError::OcrFailed { .. }
            | GraderError::AllPagesFailed { .. }
            | GraderError::ProviderNotConfigured { .. }
            | GraderError::GradingFailed { .. }
            | GraderError::InvalidConfig(_)
            | GraderError::Internal(_) => 500,
        }
    }

    /// Message safe to show to the end user.
    ///
    /// Client errors carry their full message. Server-side failures are
    /// collapsed into one generic sentence per stage; the detail is logged.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            400 | 413 => self.to_string(),
            502 => "The grading model returned an unusable reply".to_string(),
            _ => match self {
                GraderError::PdfParse { .. } => "Failed to parse PDF".to_string(),
                GraderError::ConversionFailed { .. }
                | GraderError::OcrFailed { .. }
                | GraderError::AllPagesFailed { .. } => {
                    "Failed to extract text from the assignment".to_string()
                }
                _ => "Failed to analyze assignment".to_string(),
            },
        }
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The OCR engine returned an error for this page.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The page image could not be encoded for the OCR request.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::OcrFailed { page, .. } | PageError::EncodeFailed { page, .. } => *page,
        }
    }
}

/// Why a model reply could not be turned into an analysis.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReplyParseError {
    /// The reply was empty or whitespace.
    #[error("reply was empty")]
    Empty,

    /// The extracted text is not valid JSON, or does not match the schema.
    #[error("reply is not a valid analysis object: {detail}")]
    InvalidJson { detail: String },
}
