//! Image encoding: rendered pages → PNG bytes, page images → base64 `ImageData`.
//! Formats vision LLMs reject are converted to PNG first.
//!
//! PNG is used for locally rendered pages because it is lossless; JPEG
//! artefacts around pen strokes make handwriting harder to read.

use crate::pipeline::rasterize::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} page → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Base64 payload of a page image, as the JSON OCR APIs expect it.
pub fn to_base64(page: &PageImage) -> String {
    STANDARD.encode(&page.data)
}

/// Page image formats every vision LLM provider takes as-is.
const LLM_NATIVE_MIME_TYPES: &[&str] = &["image/png", "image/jpeg"];

/// Re-encode a page as PNG unless it is already PNG or JPEG.
///
/// GIF, BMP, TIFF and WebP uploads are decoded and written out again;
/// PNG and JPEG pages are borrowed unchanged.
pub fn llm_compatible(page: &PageImage) -> Result<Cow<'_, PageImage>, image::ImageError> {
    if LLM_NATIVE_MIME_TYPES.contains(&page.mime_type.as_str()) {
        return Ok(Cow::Borrowed(page));
    }
    let img = image::load_from_memory(&page.data)?;
    debug!("Re-encoding page {} from {} to PNG", page.page_num, page.mime_type);
    Ok(Cow::Owned(PageImage::new(
        page.page_num,
        "image/png",
        encode_png(&img)?,
    )))
}

/// Wrap a page image for a multimodal LLM request.
///
/// `detail: "high"` keeps small handwriting legible to GPT-4-class models,
/// which otherwise downscale to a single 512 px tile.
pub fn to_image_data(page: &PageImage) -> ImageData {
    ImageData::new(to_base64(page), page.mime_type.as_str()).with_detail("high")
}
