//! Configuration types for the grading service.
//!
//! All behaviour is controlled through [`GraderConfig`], built via its
//! [`GraderConfigBuilder`]. The extraction strategy is an explicit value
//! here rather than a choice between several endpoints, so one deployment
//! runs exactly one strategy and the HTTP surface never changes.

use crate::error::GraderError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default Google Cloud Vision annotate endpoint.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Default ConvertAPI PDF → PNG endpoint.
pub const DEFAULT_CONVERSION_ENDPOINT: &str = "https://v2.convertapi.com/convert/pdf/to/png";

/// Configuration for the grading pipeline.
///
/// # Example
/// ```rust
/// use assignment_grader::{ExtractionStrategy, GraderConfig};
///
/// let config = GraderConfig::builder()
///     .strategy(ExtractionStrategy::TextLayer)
///     .model("gemini-1.5-flash")
///     .provider_name("gemini")
///     .build()
///     .unwrap();
/// assert_eq!(config.strategy, ExtractionStrategy::TextLayer);
/// ```
#[derive(Clone)]
pub struct GraderConfig {
    /// How text is pulled out of the upload. Default: [`ExtractionStrategy::ConvertedPages`].
    pub strategy: ExtractionStrategy,

    /// Which component turns PDFs into page images for
    /// [`ExtractionStrategy::ConvertedPages`]. Default: [`RasterizerKind::Service`].
    pub rasterizer: RasterizerKind,

    /// LLM model identifier used for grading, e.g. "gemini-1.5-flash".
    /// If None, [`crate::service::DEFAULT_MODEL`] is used for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the grading completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate for one analysis. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed grading or vision-model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Timeout for each OCR / conversion HTTP request in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// API key for the cloud vision OCR service.
    pub vision_api_key: Option<String>,

    /// Cloud vision annotate endpoint. Default: [`DEFAULT_VISION_ENDPOINT`].
    pub vision_endpoint: String,

    /// Secret for the PDF conversion service.
    pub conversion_secret: Option<String>,

    /// Conversion service endpoint. Default: [`DEFAULT_CONVERSION_ENDPOINT`].
    pub conversion_endpoint: String,

    /// Explicit path to a pdfium shared library. If None, the system library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Longest edge in pixels of a locally rendered page. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Replace an unparseable model reply with the fixed fallback analysis. Default: true.
    ///
    /// When false the request fails with a 502 instead.
    pub fallback_on_parse_failure: bool,

    /// Largest accepted request body in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategy::default(),
            rasterizer: RasterizerKind::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            ocr_timeout_secs: 60,
            vision_api_key: None,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            conversion_secret: None,
            conversion_endpoint: DEFAULT_CONVERSION_ENDPOINT.to_string(),
            pdfium_lib_path: None,
            max_rendered_pixels: 2000,
            fallback_on_parse_failure: true,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for GraderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraderConfig")
            .field("strategy", &self.strategy)
            .field("rasterizer", &self.rasterizer)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("vision_api_key", &redact(&self.vision_api_key))
            .field("vision_endpoint", &self.vision_endpoint)
            .field("conversion_secret", &redact(&self.conversion_secret))
            .field("conversion_endpoint", &self.conversion_endpoint)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("fallback_on_parse_failure", &self.fallback_on_parse_failure)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl GraderConfig {
    /// Create a new builder for `GraderConfig`.
    pub fn builder() -> GraderConfigBuilder {
        GraderConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GraderConfig`].
#[derive(Debug)]
pub struct GraderConfigBuilder {
    config: GraderConfig,
}

impl GraderConfigBuilder {
    pub fn strategy(mut self, strategy: ExtractionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn rasterizer(mut self, kind: RasterizerKind) -> Self {
        self.config.rasterizer = kind;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn vision_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.vision_api_key = Some(key.into());
        self
    }

    pub fn vision_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.vision_endpoint = url.into();
        self
    }

    pub fn conversion_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.conversion_secret = Some(secret.into());
        self
    }

    pub fn conversion_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.conversion_endpoint = url.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn fallback_on_parse_failure(mut self, v: bool) -> Self {
        self.config.fallback_on_parse_failure = v;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GraderConfig, GraderError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(GraderError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.ocr_timeout_secs == 0 {
            return Err(GraderError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(GraderError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        for (name, url) in [
            ("vision_endpoint", &c.vision_endpoint),
            ("conversion_endpoint", &c.conversion_endpoint),
        ] {
            if reqwest::Url::parse(url).is_err() {
                return Err(GraderError::InvalidConfig(format!(
                    "{name} is not a valid URL: '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Text-extraction strategy. Exactly one is active per deployment.
///
/// | Strategy | PDFs | Images | External services |
/// |----------|------|--------|-------------------|
/// | `text-layer` | text layer only | rejected | none |
/// | `vision-model` | rendered locally, one call per page | one call | LLM vision |
/// | `image-ocr` | rejected | one call | cloud vision OCR |
/// | `converted-pages` | converted, one OCR call per page | one call | conversion + cloud vision OCR |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    /// Read the PDF's embedded text layer.
    TextLayer,
    /// Ask the configured vision-capable LLM to transcribe each image.
    VisionModel,
    /// Send the image to the cloud vision OCR service.
    ImageOcr,
    /// Convert PDF pages to images, then OCR each page. (default)
    #[default]
    ConvertedPages,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::TextLayer => "text-layer",
            ExtractionStrategy::VisionModel => "vision-model",
            ExtractionStrategy::ImageOcr => "image-ocr",
            ExtractionStrategy::ConvertedPages => "converted-pages",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionStrategy {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "text-layer" | "text" => Ok(ExtractionStrategy::TextLayer),
            "vision-model" | "vision" => Ok(ExtractionStrategy::VisionModel),
            "image-ocr" | "ocr" => Ok(ExtractionStrategy::ImageOcr),
            "converted-pages" | "converted" => Ok(ExtractionStrategy::ConvertedPages),
            other => Err(GraderError::InvalidConfig(format!(
                "unknown extraction strategy '{other}' \
                 (expected text-layer, vision-model, image-ocr or converted-pages)"
            ))),
        }
    }
}

/// PDF → page image backend for [`ExtractionStrategy::ConvertedPages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterizerKind {
    /// External conversion service over HTTP. (default)
    #[default]
    Service,
    /// Local rendering through pdfium.
    Pdfium,
}

impl FromStr for RasterizerKind {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "service" => Ok(RasterizerKind::Service),
            "pdfium" => Ok(RasterizerKind::Pdfium),
            other => Err(GraderError::InvalidConfig(format!(
                "unknown rasterizer '{other}' (expected service or pdfium)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = GraderConfig::default();
        assert_eq!(c.strategy, ExtractionStrategy::ConvertedPages);
        assert_eq!(c.rasterizer, RasterizerKind::Service);
        assert!(c.fallback_on_parse_failure);
        assert_eq!(c.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!(
            "text_layer".parse::<ExtractionStrategy>().unwrap(),
            ExtractionStrategy::TextLayer
        );
        assert_eq!(
            "Vision".parse::<ExtractionStrategy>().unwrap(),
            ExtractionStrategy::VisionModel
        );
        assert!("tesseract".parse::<ExtractionStrategy>().is_err());
    }

    #[test]
    fn strategy_display_round_trips_through_from_str() {
        for s in [
            ExtractionStrategy::TextLayer,
            ExtractionStrategy::VisionModel,
            ExtractionStrategy::ImageOcr,
            ExtractionStrategy::ConvertedPages,
        ] {
            assert_eq!(s.to_string().parse::<ExtractionStrategy>().unwrap(), s);
        }
    }

    #[test]
    fn builder_rejects_bad_endpoint() {
        let err = GraderConfig::builder()
            .vision_endpoint("not a url")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("vision_endpoint"));
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = GraderConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = GraderConfig::builder()
            .vision_api_key("AIza-secret")
            .conversion_secret("convert-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("AIza-secret"));
        assert!(!dbg.contains("convert-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
