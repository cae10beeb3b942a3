//! # assignment-grader
//!
//! Grade handwritten assignments: read the text off an uploaded PDF or
//! photo, have an LLM score it against a fixed rubric, and show the result
//! in a chat-style web page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PDF / image)
//!  │
//!  ├─ 1. Upload   sniff the media type, reject anything else (400)
//!  ├─ 2. Extract  one of four strategies (text layer, vision LLM,
//!  │              cloud OCR, converted pages + cloud OCR), one call per page
//!  ├─ 3. Grade    fixed rubric prompt → LLM, with retry/backoff
//!  ├─ 4. Parse    first `{` … last `}` → AnalysisResult
//!  └─ 5. Reply    JSON (+ x-analysis-source header) or an HTML fragment
//! ```
//!
//! A reply that cannot be parsed is replaced by a fixed placeholder analysis
//! tagged [`AnalysisSource::Fallback`], or surfaced as a 502 when
//! [`GraderConfig::fallback_on_parse_failure`] is off.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use assignment_grader::{router, AppState, AssignmentService, GraderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / ...
//!     let config = GraderConfig::builder()
//!         .vision_api_key(std::env::var("GOOGLE_VISION_API_KEY")?)
//!         .conversion_secret(std::env::var("CONVERTAPI_SECRET")?)
//!         .build()?;
//!     let service = AssignmentService::from_config(&config)?;
//!     let app = router(AppState::new(service, config.max_upload_bytes));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `grader-server` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod chat;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod service;
pub mod views;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{fallback_analysis, AnalysisResult, AnalysisSource, QuestionAnalysis, QuestionStatus};
pub use config::{ExtractionStrategy, GraderConfig, GraderConfigBuilder, RasterizerKind};
pub use error::{GraderError, PageError, ReplyParseError};
pub use pipeline::extract::{ExtractionStats, TextExtractor};
pub use pipeline::grade::{AssignmentGrader, LlmGrader};
pub use pipeline::ocr::OcrEngine;
pub use pipeline::rasterize::{PageImage, Rasterizer};
pub use pipeline::reply::parse_reply;
pub use pipeline::upload::Upload;
pub use server::{router, AppState, ANALYSIS_SOURCE_HEADER};
pub use service::{AssignmentService, GradingOutcome};
