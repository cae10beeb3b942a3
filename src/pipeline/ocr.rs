//! Image OCR backends.
//!
//! [`OcrEngine`] is the seam between the extraction loop and the external
//! services. Two engines exist:
//!
//! * [`CloudVisionOcr`] — Google Cloud Vision `DOCUMENT_TEXT_DETECTION`,
//!   which handles dense handwriting better than plain `TEXT_DETECTION`.
//! * [`VisionModelOcr`] — asks the configured vision-capable LLM to
//!   transcribe the page.

use crate::config::GraderConfig;
use crate::error::GraderError;
use crate::pipeline::encode;
use crate::pipeline::llm::{self, CallPolicy};
use crate::pipeline::rasterize::{truncate, PageImage};
use crate::prompts::TRANSCRIBE_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Reads the text on one page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Return all text found on `image`. An image without text yields `Ok("")`.
    async fn recognize(&self, image: &PageImage) -> Result<String, GraderError>;
}

// ── Cloud Vision ─────────────────────────────────────────────────────────

/// Google Cloud Vision `images:annotate` client.
pub struct CloudVisionOcr {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: VisionImage,
    features: Vec<VisionFeature>,
}

#[derive(Serialize)]
struct VisionImage {
    content: String,
}

#[derive(Serialize)]
struct VisionFeature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize, Default)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct VisionStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl CloudVisionOcr {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, GraderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GraderError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    fn request_body(image: &PageImage) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: VisionImage {
                    content: encode::to_base64(image),
                },
                features: vec![VisionFeature {
                    kind: "DOCUMENT_TEXT_DETECTION",
                }],
            }],
        }
    }

    fn text_from(body: AnnotateResponse) -> Result<String, GraderError> {
        let first = body.responses.into_iter().next().unwrap_or_default();
        if let Some(err) = first.error {
            return Err(GraderError::OcrFailed {
                detail: format!("vision API error {}: {}", err.code, err.message),
            });
        }
        if let Some(full) = first.full_text_annotation {
            return Ok(full.text);
        }
        Ok(first
            .text_annotations
            .into_iter()
            .next()
            .map(|t| t.description)
            .unwrap_or_default())
    }
}

#[async_trait]
impl OcrEngine for CloudVisionOcr {
    fn name(&self) -> &str {
        "cloud-vision"
    }

    async fn recognize(&self, image: &PageImage) -> Result<String, GraderError> {
        // Key goes in a header so it never shows up in reqwest's URL-bearing errors.
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(image))
            .send()
            .await
            .map_err(|e| GraderError::OcrFailed {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraderError::OcrFailed {
                detail: format!("HTTP {status}: {}", truncate(&body, 200)),
            });
        }

        let body: AnnotateResponse = response.json().await.map_err(|e| GraderError::OcrFailed {
            detail: format!("unreadable response: {e}"),
        })?;

        let text = Self::text_from(body)?;
        debug!(
            "Cloud Vision page {}: {} chars",
            image.page_num,
            text.chars().count()
        );
        Ok(text)
    }
}

// ── Vision LLM ───────────────────────────────────────────────────────────

/// Transcribes pages with a multimodal LLM.
pub struct VisionModelOcr {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    policy: CallPolicy,
}

impl VisionModelOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GraderConfig) -> Self {
        let options = CompletionOptions {
            // Transcription, not creativity.
            temperature: Some(0.0),
            max_tokens: Some(config.max_tokens),
            ..Default::default()
        };
        Self {
            provider,
            options,
            policy: CallPolicy::from(config),
        }
    }
}

#[async_trait]
impl OcrEngine for VisionModelOcr {
    fn name(&self) -> &str {
        "vision-model"
    }

    async fn recognize(&self, image: &PageImage) -> Result<String, GraderError> {
        let page = encode::llm_compatible(image).map_err(|e| GraderError::MalformedUpload {
            detail: format!("page {} is not a readable image: {e}", image.page_num),
        })?;
        let messages = vec![
            ChatMessage::system(TRANSCRIBE_SYSTEM_PROMPT),
            ChatMessage::user_with_images(
                "Transcribe this page.",
                vec![encode::to_image_data(&page)],
            ),
        ];
        let label = format!("OCR page {}", image.page_num);
        llm::chat_with_retry(&self.provider, &messages, &self.options, self.policy, &label)
            .await
            .map_err(|detail| GraderError::OcrFailed { detail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::testing::RecordingProvider;
    use edgequake_llm::ChatRole;
    use serde_json::json;

    #[test]
    fn request_asks_for_document_text_detection() {
        let page = PageImage::new(1, "image/png", vec![1, 2, 3]);
        let v = serde_json::to_value(CloudVisionOcr::request_body(&page)).unwrap();
        assert_eq!(
            v["requests"][0]["features"][0]["type"],
            "DOCUMENT_TEXT_DETECTION"
        );
        assert_eq!(v["requests"][0]["image"]["content"], "AQID");
    }

    #[test]
    fn prefers_full_text_annotation() {
        let body: AnnotateResponse = serde_json::from_value(json!({
            "responses": [{
                "textAnnotations": [{ "description": "short" }],
                "fullTextAnnotation": { "text": "Q1. x = 4\nQ2. y = 2\n" }
            }]
        }))
        .unwrap();
        assert_eq!(CloudVisionOcr::text_from(body).unwrap(), "Q1. x = 4\nQ2. y = 2\n");
    }

    #[test]
    fn falls_back_to_first_text_annotation() {
        let body: AnnotateResponse = serde_json::from_value(json!({
            "responses": [{ "textAnnotations": [{ "description": "hello" }] }]
        }))
        .unwrap();
        assert_eq!(CloudVisionOcr::text_from(body).unwrap(), "hello");
    }

    #[test]
    fn image_without_text_is_empty_not_error() {
        let body: AnnotateResponse = serde_json::from_value(json!({ "responses": [{}] })).unwrap();
        assert_eq!(CloudVisionOcr::text_from(body).unwrap(), "");
    }

    #[test]
    fn per_image_error_is_surfaced() {
        let body: AnnotateResponse = serde_json::from_value(json!({
            "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
        }))
        .unwrap();
        let err = CloudVisionOcr::text_from(body).unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }

    fn vision_config() -> GraderConfig {
        GraderConfig::builder()
            .max_retries(1)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn vision_model_sends_page_with_transcription_prompt() {
        let recording = Arc::new(RecordingProvider::replying("Q1. 42"));
        let ocr = VisionModelOcr::new(recording.clone(), &vision_config());

        let text = ocr
            .recognize(&PageImage::new(2, "image/png", vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(text, "Q1. 42");
        let request = recording.last_request();
        assert_eq!(request.len(), 2);
        assert_eq!(request[0].role, ChatRole::System);
        assert_eq!(request[0].content, TRANSCRIBE_SYSTEM_PROMPT);
        let images = request[1].images.as_ref().expect("page image attached");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "image/png");
        assert_eq!(images[0].data, "AQID");
        assert_eq!(images[0].detail.as_deref(), Some("high"));
    }

    #[tokio::test]
    async fn vision_model_converts_bmp_to_png() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
        let mut bmp = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bmp), image::ImageFormat::Bmp)
            .unwrap();
        let recording = Arc::new(RecordingProvider::replying("x"));
        let ocr = VisionModelOcr::new(recording.clone(), &vision_config());

        ocr.recognize(&PageImage::new(1, "image/bmp", bmp)).await.unwrap();

        let request = recording.last_request();
        let images = request[1].images.as_ref().unwrap();
        assert_eq!(images[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn vision_model_failure_is_ocr_failed() {
        let recording = Arc::new(RecordingProvider::failing_first(5, "never"));
        let ocr = VisionModelOcr::new(recording.clone(), &vision_config());

        let err = ocr
            .recognize(&PageImage::new(1, "image/png", vec![0]))
            .await
            .unwrap_err();

        assert!(matches!(err, GraderError::OcrFailed { .. }));
        assert_eq!(recording.calls(), 2);
    }

    #[tokio::test]
    async fn vision_model_rejects_corrupt_image_without_calling() {
        let recording = Arc::new(RecordingProvider::replying("x"));
        let ocr = VisionModelOcr::new(recording.clone(), &vision_config());

        let err = ocr
            .recognize(&PageImage::new(1, "image/gif", b"GIF89a broken".to_vec()))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(recording.calls(), 0);
    }
}
