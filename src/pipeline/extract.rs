//! Text extraction: run the configured strategy over an upload.
//!
//! Multi-page documents are processed as a serial loop, one OCR call per
//! page, in page order. A page whose OCR call fails contributes an inline
//! placeholder instead of aborting the document; only when every page fails
//! does extraction fail as a whole.

use crate::config::{ExtractionStrategy, GraderConfig, RasterizerKind};
use crate::error::{GraderError, PageError};
use crate::pipeline::ocr::{CloudVisionOcr, OcrEngine, VisionModelOcr};
use crate::pipeline::rasterize::{ConversionServiceRasterizer, PageImage, Rasterizer};
use crate::pipeline::render::PdfiumRasterizer;
use crate::pipeline::text_layer;
use crate::pipeline::upload::{MediaKind, Upload};
use edgequake_llm::LLMProvider;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Text pulled out of one upload.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub stats: ExtractionStats,
}

/// What happened during extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionStats {
    pub strategy: ExtractionStrategy,
    /// Pages (or single images) looked at; 1 for the text layer.
    pub pages: usize,
    pub failed_pages: usize,
    pub page_errors: Vec<PageError>,
    pub chars: usize,
    pub duration_ms: u64,
}

/// Inline text substituted for a page whose OCR call failed.
pub fn failed_page_placeholder(page_num: usize) -> String {
    format!("[Page {page_num}: text could not be extracted]")
}

/// Runs one [`ExtractionStrategy`] with its backends.
pub struct TextExtractor {
    strategy: ExtractionStrategy,
    ocr: Option<Arc<dyn OcrEngine>>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
}

impl TextExtractor {
    /// Assemble an extractor from explicit backends.
    ///
    /// `ocr` is required by every strategy except `TextLayer`; `rasterizer`
    /// is required to accept PDFs under `VisionModel` and `ConvertedPages`.
    pub fn new(
        strategy: ExtractionStrategy,
        ocr: Option<Arc<dyn OcrEngine>>,
        rasterizer: Option<Arc<dyn Rasterizer>>,
    ) -> Self {
        Self {
            strategy,
            ocr,
            rasterizer,
        }
    }

    /// Build the backends the configured strategy needs.
    ///
    /// `provider` is only consulted by [`ExtractionStrategy::VisionModel`].
    pub fn from_config(
        config: &GraderConfig,
        provider: Option<&Arc<dyn LLMProvider>>,
    ) -> Result<Self, GraderError> {
        let pdfium = || -> Arc<dyn Rasterizer> {
            Arc::new(PdfiumRasterizer::new(
                config.pdfium_lib_path.clone(),
                config.max_rendered_pixels,
            ))
        };
        let cloud_vision = || -> Result<Arc<dyn OcrEngine>, GraderError> {
            let key = config.vision_api_key.as_deref().ok_or_else(|| {
                GraderError::InvalidConfig(format!(
                    "the '{}' strategy needs a cloud vision API key (GOOGLE_VISION_API_KEY)",
                    config.strategy
                ))
            })?;
            Ok(Arc::new(CloudVisionOcr::new(
                &config.vision_endpoint,
                key,
                config.ocr_timeout_secs,
            )?))
        };

        let extractor = match config.strategy {
            ExtractionStrategy::TextLayer => Self::new(config.strategy, None, None),
            ExtractionStrategy::VisionModel => {
                let provider = provider.ok_or_else(|| {
                    GraderError::InvalidConfig(
                        "the 'vision-model' strategy needs an LLM provider".into(),
                    )
                })?;
                Self::new(
                    config.strategy,
                    Some(Arc::new(VisionModelOcr::new(Arc::clone(provider), config))),
                    Some(pdfium()),
                )
            }
            ExtractionStrategy::ImageOcr => Self::new(config.strategy, Some(cloud_vision()?), None),
            ExtractionStrategy::ConvertedPages => {
                let rasterizer: Arc<dyn Rasterizer> = match config.rasterizer {
                    RasterizerKind::Pdfium => pdfium(),
                    RasterizerKind::Service => {
                        let secret = config.conversion_secret.as_deref().ok_or_else(|| {
                            GraderError::InvalidConfig(
                                "the conversion service needs a secret (CONVERTAPI_SECRET)".into(),
                            )
                        })?;
                        Arc::new(ConversionServiceRasterizer::new(
                            &config.conversion_endpoint,
                            secret,
                            config.ocr_timeout_secs,
                        )?)
                    }
                };
                Self::new(config.strategy, Some(cloud_vision()?), Some(rasterizer))
            }
        };

        info!(
            "Extraction strategy: {} (ocr: {}, rasterizer: {})",
            extractor.strategy,
            extractor.ocr.as_ref().map(|o| o.name()).unwrap_or("-"),
            extractor.rasterizer.as_ref().map(|r| r.name()).unwrap_or("-"),
        );
        Ok(extractor)
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    /// Extract the text of `upload` with the configured strategy.
    pub async fn extract(&self, upload: &Upload) -> Result<Extraction, GraderError> {
        let start = Instant::now();
        self.check_supported(upload.kind)?;

        let (text, pages, page_errors) = match self.strategy {
            ExtractionStrategy::TextLayer => {
                (text_layer::extract_text_layer(&upload.bytes).await?, 1, Vec::new())
            }
            ExtractionStrategy::ImageOcr => {
                let page = PageImage::new(1, upload.kind.mime_type(), upload.bytes.clone());
                (self.ocr()?.recognize(&page).await?, 1, Vec::new())
            }
            ExtractionStrategy::VisionModel | ExtractionStrategy::ConvertedPages => {
                let images = self.page_images(upload).await?;
                let n = images.len();
                let (text, errors) = self.ocr_pages(&images).await?;
                (text, n, errors)
            }
        };

        let stats = ExtractionStats {
            strategy: self.strategy,
            pages,
            failed_pages: page_errors.len(),
            page_errors,
            chars: text.chars().count(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Extracted {} chars from {} page(s) with {} ({} failed) in {}ms",
            stats.chars, stats.pages, stats.strategy, stats.failed_pages, stats.duration_ms
        );
        Ok(Extraction { text, stats })
    }

    fn check_supported(&self, kind: MediaKind) -> Result<(), GraderError> {
        let supported = match self.strategy {
            ExtractionStrategy::TextLayer => kind.is_pdf(),
            ExtractionStrategy::ImageOcr => !kind.is_pdf(),
            ExtractionStrategy::VisionModel | ExtractionStrategy::ConvertedPages => true,
        };
        if supported {
            Ok(())
        } else {
            Err(GraderError::StrategyMismatch {
                strategy: self.strategy.to_string(),
                media_type: kind.to_string(),
            })
        }
    }

    fn ocr(&self) -> Result<&Arc<dyn OcrEngine>, GraderError> {
        self.ocr.as_ref().ok_or_else(|| {
            GraderError::InvalidConfig(format!("no OCR engine for the '{}' strategy", self.strategy))
        })
    }

    async fn page_images(&self, upload: &Upload) -> Result<Vec<PageImage>, GraderError> {
        match upload.kind {
            MediaKind::Image(_) => Ok(vec![PageImage::new(
                1,
                upload.kind.mime_type(),
                upload.bytes.clone(),
            )]),
            MediaKind::Pdf => {
                let rasterizer = self.rasterizer.as_ref().ok_or_else(|| {
                    GraderError::InvalidConfig(format!(
                        "no PDF rasterizer for the '{}' strategy",
                        self.strategy
                    ))
                })?;
                let pages = rasterizer.rasterize(&upload.bytes).await?;
                debug!("{} produced {} page images", rasterizer.name(), pages.len());
                if pages.is_empty() {
                    return Err(GraderError::ConversionFailed {
                        detail: "the PDF has no pages".to_string(),
                    });
                }
                Ok(pages)
            }
        }
    }

    /// OCR each page in order, one call per page.
    async fn ocr_pages(
        &self,
        pages: &[PageImage],
    ) -> Result<(String, Vec<PageError>), GraderError> {
        let ocr = self.ocr()?;
        let mut texts = Vec::with_capacity(pages.len());
        let mut errors = Vec::new();
        let mut last_error: Option<GraderError> = None;
        let mut readable = false;

        for page in pages {
            match ocr.recognize(page).await {
                Ok(text) => {
                    readable |= !text.trim().is_empty();
                    texts.push((page.page_num, text));
                }
                Err(e) => {
                    warn!("Page {}: {} failed: {}", page.page_num, ocr.name(), e);
                    errors.push(PageError::OcrFailed {
                        page: page.page_num,
                        detail: e.to_string(),
                    });
                    texts.push((page.page_num, failed_page_placeholder(page.page_num)));
                    last_error = Some(e);
                }
            }
        }

        if errors.len() == pages.len() {
            // A lone image keeps its own error; a document reports the whole.
            if let (1, Some(e)) = (pages.len(), last_error) {
                return Err(e);
            }
            return Err(GraderError::AllPagesFailed {
                total: pages.len(),
                first_error: errors[0].to_string(),
            });
        }

        // Headers and placeholders alone are not assignment text.
        if !readable {
            debug!("No page yielded any text");
            return Ok((String::new(), errors));
        }

        Ok((join_pages(&texts), errors))
    }
}

/// Concatenate page texts in page order.
///
/// A single page is returned as-is; several pages each get a header so the
/// grader can tell where a question continues onto the next sheet.
pub fn join_pages(pages: &[(usize, String)]) -> String {
    match pages {
        [] => String::new(),
        [(_, only)] => only.trim_end().to_string(),
        many => many
            .iter()
            .map(|(n, text)| format!("--- Page {} ---\n{}", n, text.trim_end()))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns "text of page N" and records call order; fails on listed pages.
    struct RecordingOcr {
        calls: Mutex<Vec<usize>>,
        fail_on: Vec<usize>,
    }

    impl RecordingOcr {
        fn new(fail_on: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_on,
            })
        }
    }

    #[async_trait]
    impl OcrEngine for RecordingOcr {
        fn name(&self) -> &str {
            "recording"
        }

        async fn recognize(&self, image: &PageImage) -> Result<String, GraderError> {
            self.calls.lock().unwrap().push(image.page_num);
            if self.fail_on.contains(&image.page_num) {
                return Err(GraderError::OcrFailed {
                    detail: format!("page {} unreadable", image.page_num),
                });
            }
            Ok(format!("text of page {}", image.page_num))
        }
    }

    struct FixedPages(usize);

    #[async_trait]
    impl Rasterizer for FixedPages {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn rasterize(&self, _pdf: &[u8]) -> Result<Vec<PageImage>, GraderError> {
            Ok((1..=self.0)
                .map(|n| PageImage::new(n, "image/png", vec![n as u8]))
                .collect())
        }
    }

    fn pdf_upload() -> Upload {
        Upload::new("hw.pdf", Some("application/pdf".into()), b"%PDF-1.4 fake".to_vec()).unwrap()
    }

    fn png_upload() -> Upload {
        Upload::new("hw.png", None, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec()).unwrap()
    }

    fn extractor(ocr: Arc<RecordingOcr>, pages: usize) -> TextExtractor {
        TextExtractor::new(
            ExtractionStrategy::ConvertedPages,
            Some(ocr as Arc<dyn OcrEngine>),
            Some(Arc::new(FixedPages(pages))),
        )
    }

    #[tokio::test]
    async fn one_ocr_call_per_page_in_order() {
        let ocr = RecordingOcr::new(vec![]);
        let out = extractor(Arc::clone(&ocr), 3)
            .extract(&pdf_upload())
            .await
            .unwrap();

        assert_eq!(*ocr.calls.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(
            out.text,
            "--- Page 1 ---\ntext of page 1\n\n--- Page 2 ---\ntext of page 2\n\n--- Page 3 ---\ntext of page 3"
        );
        assert_eq!(out.stats.pages, 3);
        assert_eq!(out.stats.failed_pages, 0);
    }

    #[tokio::test]
    async fn failed_page_becomes_placeholder() {
        let ocr = RecordingOcr::new(vec![2]);
        let out = extractor(ocr, 3).extract(&pdf_upload()).await.unwrap();

        assert!(out.text.contains("text of page 1"));
        assert!(out.text.contains("[Page 2: text could not be extracted]"));
        assert!(out.text.contains("text of page 3"));
        assert_eq!(out.stats.failed_pages, 1);
        assert_eq!(out.stats.page_errors[0].page(), 2);
    }

    #[tokio::test]
    async fn every_page_failing_is_fatal() {
        let ocr = RecordingOcr::new(vec![1, 2]);
        let err = extractor(ocr, 2).extract(&pdf_upload()).await.unwrap_err();
        assert!(matches!(err, GraderError::AllPagesFailed { total: 2, .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn image_skips_rasterizer() {
        let ocr = RecordingOcr::new(vec![]);
        let ex = TextExtractor::new(
            ExtractionStrategy::ConvertedPages,
            Some(Arc::clone(&ocr) as Arc<dyn OcrEngine>),
            None,
        );
        let out = ex.extract(&png_upload()).await.unwrap();
        assert_eq!(out.text, "text of page 1");
        assert_eq!(*ocr.calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn single_image_failure_keeps_ocr_error() {
        let ocr = RecordingOcr::new(vec![1]);
        let ex = TextExtractor::new(
            ExtractionStrategy::ImageOcr,
            Some(ocr as Arc<dyn OcrEngine>),
            None,
        );
        let err = ex.extract(&png_upload()).await.unwrap_err();
        assert!(matches!(err, GraderError::OcrFailed { .. }));
    }

    #[tokio::test]
    async fn image_ocr_rejects_pdf() {
        let ex = TextExtractor::new(
            ExtractionStrategy::ImageOcr,
            Some(RecordingOcr::new(vec![]) as Arc<dyn OcrEngine>),
            None,
        );
        let err = ex.extract(&pdf_upload()).await.unwrap_err();
        assert!(matches!(err, GraderError::StrategyMismatch { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn text_layer_rejects_image() {
        let ex = TextExtractor::new(ExtractionStrategy::TextLayer, None, None);
        let err = ex.extract(&png_upload()).await.unwrap_err();
        assert!(matches!(err, GraderError::StrategyMismatch { .. }));
    }

    /// Finds nothing but whitespace on every page.
    struct BlankOcr;

    #[async_trait]
    impl OcrEngine for BlankOcr {
        fn name(&self) -> &str {
            "blank"
        }

        async fn recognize(&self, _image: &PageImage) -> Result<String, GraderError> {
            Ok("  \n".to_string())
        }
    }

    #[tokio::test]
    async fn blank_pages_yield_no_text() {
        let ex = TextExtractor::new(
            ExtractionStrategy::ConvertedPages,
            Some(Arc::new(BlankOcr)),
            Some(Arc::new(FixedPages(2))),
        );
        let out = ex.extract(&pdf_upload()).await.unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.stats.pages, 2);
        assert_eq!(out.stats.chars, 0);
    }

    #[tokio::test]
    async fn blank_pages_and_a_failed_page_yield_no_text() {
        // Page 1 fails, pages 2 and 3 come back blank.
        struct FirstFailsRestBlank;

        #[async_trait]
        impl OcrEngine for FirstFailsRestBlank {
            fn name(&self) -> &str {
                "first-fails"
            }

            async fn recognize(&self, image: &PageImage) -> Result<String, GraderError> {
                if image.page_num == 1 {
                    return Err(GraderError::OcrFailed {
                        detail: "smudged".into(),
                    });
                }
                Ok(String::new())
            }
        }

        let ex = TextExtractor::new(
            ExtractionStrategy::ConvertedPages,
            Some(Arc::new(FirstFailsRestBlank)),
            Some(Arc::new(FixedPages(3))),
        );
        let out = ex.extract(&pdf_upload()).await.unwrap();
        assert!(out.text.is_empty());
        assert_eq!(out.stats.failed_pages, 1);
    }

    #[test]
    fn join_single_page_has_no_header() {
        assert_eq!(join_pages(&[(1, "abc\n".into())]), "abc");
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn from_config_needs_credentials() {
        let config = GraderConfig::builder()
            .strategy(ExtractionStrategy::ImageOcr)
            .build()
            .unwrap();
        let err = TextExtractor::from_config(&config, None).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_VISION_API_KEY"));

        let config = GraderConfig::builder()
            .vision_api_key("k")
            .build()
            .unwrap();
        let err = TextExtractor::from_config(&config, None).err().unwrap();
        assert!(err.to_string().contains("CONVERTAPI_SECRET"));

        let config = GraderConfig::builder()
            .strategy(ExtractionStrategy::VisionModel)
            .build()
            .unwrap();
        assert!(TextExtractor::from_config(&config, None).is_err());
    }

    #[test]
    fn from_config_builds_backends() {
        let config = GraderConfig::builder()
            .vision_api_key("k")
            .rasterizer(RasterizerKind::Pdfium)
            .build()
            .unwrap();
        let ex = TextExtractor::from_config(&config, None).unwrap();
        assert_eq!(ex.strategy(), ExtractionStrategy::ConvertedPages);
        assert_eq!(ex.rasterizer.as_ref().unwrap().name(), "pdfium");
        assert_eq!(ex.ocr.as_ref().unwrap().name(), "cloud-vision");

        let text_only = GraderConfig::builder()
            .strategy(ExtractionStrategy::TextLayer)
            .build()
            .unwrap();
        assert!(TextExtractor::from_config(&text_only, None).is_ok());
    }
}
