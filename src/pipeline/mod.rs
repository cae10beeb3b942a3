//! Pipeline stages for grading one uploaded assignment.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ extract ──────────────────────────▶ grade ──▶ reply
//! (sniff)    │ text_layer  (pdf-extract)          (LLM)     (JSON)
//!            │ rasterize   (conversion service)
//!            │ render      (pdfium)
//!            └ ocr         (cloud vision / vision LLM)
//! ```
//!
//! 1. [`upload`]     — validate the bytes and detect PDF vs. image
//! 2. [`extract`]    — run the configured strategy; multi-page documents
//!    are rasterised and OCR'd one page at a time, in order
//! 3. [`grade`]      — send the text with the grading prompt through [`llm`]
//! 4. [`reply`]      — pull the JSON object out of the model's reply

pub mod encode;
pub mod extract;
pub mod grade;
pub mod llm;
pub mod ocr;
pub mod rasterize;
pub mod render;
pub mod reply;
pub mod text_layer;
pub mod upload;
