//! PDF → page images.
//!
//! Two backends implement [`Rasterizer`]: the external conversion service
//! ([`ConversionServiceRasterizer`], default) and local pdfium rendering
//! ([`crate::pipeline::render::PdfiumRasterizer`]). Both return pages in
//! document order, 1-indexed.

use crate::error::GraderError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// One page of a document as an encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed.
    pub page_num: usize,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PageImage {
    pub fn new(page_num: usize, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            page_num,
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Turns PDF bytes into page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Render every page of `pdf`, in page order.
    async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, GraderError>;
}

// ── Conversion service ───────────────────────────────────────────────────

/// ConvertAPI-style PDF → PNG conversion over HTTP.
pub struct ConversionServiceRasterizer {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertRequest<'a> {
    parameters: Vec<ConvertParameter<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertParameter<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_value: Option<ConvertFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertFile {
    name: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertResponse {
    #[serde(default)]
    files: Vec<ConvertedFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertedFile {
    #[serde(default)]
    file_name: String,
    file_data: String,
}

impl ConversionServiceRasterizer {
    pub fn new(
        endpoint: impl Into<String>,
        secret: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, GraderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GraderError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            secret: secret.into(),
        })
    }

    fn request_body(pdf: &[u8]) -> ConvertRequest<'static> {
        ConvertRequest {
            parameters: vec![
                ConvertParameter {
                    name: "File",
                    file_value: Some(ConvertFile {
                        name: "assignment.pdf".to_string(),
                        data: STANDARD.encode(pdf),
                    }),
                    value: None,
                },
                ConvertParameter {
                    name: "StoreFile",
                    file_value: None,
                    value: Some(serde_json::Value::Bool(false)),
                },
            ],
        }
    }

    fn decode_response(body: ConvertResponse) -> Result<Vec<PageImage>, GraderError> {
        if body.files.is_empty() {
            return Err(GraderError::ConversionFailed {
                detail: "conversion service returned no pages".to_string(),
            });
        }
        body.files
            .into_iter()
            .enumerate()
            .map(|(i, f)| {
                let data = STANDARD
                    .decode(f.file_data.as_bytes())
                    .map_err(|e| GraderError::ConversionFailed {
                        detail: format!("page {} ('{}'): bad base64: {e}", i + 1, f.file_name),
                    })?;
                Ok(PageImage::new(i + 1, "image/png", data))
            })
            .collect()
    }
}

#[async_trait]
impl Rasterizer for ConversionServiceRasterizer {
    fn name(&self) -> &str {
        "conversion-service"
    }

    async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, GraderError> {
        info!("Converting PDF ({} bytes) to page images via conversion service", pdf.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret)
            .json(&Self::request_body(pdf))
            .send()
            .await
            .map_err(|e| GraderError::ConversionFailed {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraderError::ConversionFailed {
                detail: format!("HTTP {status}: {}", truncate(&body, 200)),
            });
        }

        let body: ConvertResponse =
            response
                .json()
                .await
                .map_err(|e| GraderError::ConversionFailed {
                    detail: format!("unreadable response: {e}"),
                })?;

        let pages = Self::decode_response(body)?;
        debug!("Conversion service returned {} pages", pages.len());
        Ok(pages)
    }
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = ConversionServiceRasterizer::request_body(b"%PDF-1.4");
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["Parameters"][0]["Name"], "File");
        assert_eq!(v["Parameters"][0]["FileValue"]["Data"], STANDARD.encode(b"%PDF-1.4"));
        assert!(v["Parameters"][0].get("Value").is_none());
        assert_eq!(v["Parameters"][1]["Name"], "StoreFile");
        assert_eq!(v["Parameters"][1]["Value"], false);
    }

    #[test]
    fn response_pages_keep_service_order() {
        let json = serde_json::json!({
            "ConversionCost": 1,
            "Files": [
                { "FileName": "a-1.png", "FileExt": "png", "FileData": STANDARD.encode([1u8]) },
                { "FileName": "a-2.png", "FileExt": "png", "FileData": STANDARD.encode([2u8]) },
            ]
        });
        let body: ConvertResponse = serde_json::from_value(json).unwrap();
        let pages = ConversionServiceRasterizer::decode_response(body).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], PageImage::new(1, "image/png", vec![1]));
        assert_eq!(pages[1].page_num, 2);
    }

    #[test]
    fn empty_response_is_an_error() {
        let body = ConvertResponse { files: vec![] };
        assert!(matches!(
            ConversionServiceRasterizer::decode_response(body),
            Err(GraderError::ConversionFailed { .. })
        ));
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("héllo", 10), "héllo");
        assert_eq!(truncate("héllo", 2), "hé\u{2026}");
    }
}
