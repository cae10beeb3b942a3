//! Local PDF rasterisation through pdfium.
//!
//! pdfium keeps thread-local state and blocks, so all work runs inside
//! `spawn_blocking`. The longest edge is capped by `max_rendered_pixels`
//! rather than by DPI: a scanned A3 sheet at 300 DPI would otherwise
//! produce a 5000 px image that no OCR endpoint accepts.

use crate::error::GraderError;
use crate::pipeline::encode;
use crate::pipeline::rasterize::{PageImage, Rasterizer};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Renders PDF pages to PNG with a pdfium shared library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    lib_path: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    /// `lib_path` points at the pdfium shared library; `None` binds the system copy.
    pub fn new(lib_path: Option<PathBuf>, max_pixels: u32) -> Self {
        Self {
            lib_path,
            max_pixels,
        }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    fn name(&self) -> &str {
        "pdfium"
    }

    async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, GraderError> {
        let bytes = pdf.to_vec();
        let lib_path = self.lib_path.clone();
        let max_pixels = self.max_pixels;

        tokio::task::spawn_blocking(move || render_blocking(&bytes, lib_path, max_pixels))
            .await
            .map_err(|e| GraderError::Internal(format!("Render task panicked: {}", e)))?
    }
}

fn bind(lib_path: Option<PathBuf>) -> Result<Pdfium, GraderError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(&path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| GraderError::ConversionFailed {
        detail: format!("cannot load pdfium: {:?}", e),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_blocking(
    pdf: &[u8],
    lib_path: Option<PathBuf>,
    max_pixels: u32,
) -> Result<Vec<PageImage>, GraderError> {
    let pdfium = bind(lib_path)?;

    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| GraderError::PdfParse {
            detail: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| GraderError::ConversionFailed {
                detail: format!("page {page_num}: {:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        let png = encode::encode_png(&image).map_err(|e| GraderError::ConversionFailed {
            detail: format!("page {page_num}: PNG encoding failed: {e}"),
        })?;
        results.push(PageImage::new(page_num, "image/png", png));
    }

    info!("pdfium rendered {} pages", results.len());
    Ok(results)
}
