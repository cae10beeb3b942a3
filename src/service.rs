//! End-to-end grading of one upload.
//!
//! [`AssignmentService`] ties the stages together:
//!
//! ```text
//! Upload ─▶ TextExtractor ─▶ (empty? 400) ─▶ AssignmentGrader ─▶ parse_reply
//!                                                                 │
//!                                       ok ◀──────────────────────┤
//!                    fallback (or 502) ◀──────────────────────────┘
//! ```
//!
//! The service is built once at startup and shared behind an `Arc`; it holds
//! no per-request state.

use crate::analysis::{fallback_analysis, AnalysisResult, AnalysisSource};
use crate::config::{ExtractionStrategy, GraderConfig};
use crate::error::GraderError;
use crate::pipeline::extract::{ExtractionStats, TextExtractor};
use crate::pipeline::grade::{AssignmentGrader, LlmGrader};
use crate::pipeline::reply::parse_reply;
use crate::pipeline::upload::Upload;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Default grading model when only a provider is known.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Result of grading one upload.
#[derive(Debug, Clone)]
pub struct GradingOutcome {
    pub analysis: AnalysisResult,
    pub source: AnalysisSource,
    pub stats: ExtractionStats,
    pub total_duration_ms: u64,
}

/// Extracts, grades and parses one assignment at a time.
pub struct AssignmentService {
    extractor: TextExtractor,
    grader: Arc<dyn AssignmentGrader>,
    fallback_on_parse_failure: bool,
}

impl AssignmentService {
    /// Assemble a service from explicit parts.
    pub fn new(
        extractor: TextExtractor,
        grader: Arc<dyn AssignmentGrader>,
        fallback_on_parse_failure: bool,
    ) -> Self {
        Self {
            extractor,
            grader,
            fallback_on_parse_failure,
        }
    }

    /// Resolve the LLM provider and build every backend the config asks for.
    pub fn from_config(config: &GraderConfig) -> Result<Self, GraderError> {
        let provider = resolve_provider(config)?;
        let extractor = TextExtractor::from_config(config, Some(&provider))?;
        let grader = Arc::new(LlmGrader::new(provider, config));
        Ok(Self::new(extractor, grader, config.fallback_on_parse_failure))
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.extractor.strategy()
    }

    /// Grade one upload.
    ///
    /// # Errors
    /// Any [`GraderError`]; an unparseable model reply is only an error
    /// when fallback is disabled.
    pub async fn analyze(&self, upload: &Upload) -> Result<GradingOutcome, GraderError> {
        let start = Instant::now();
        info!(
            "Analyzing '{}' ({}, {} bytes)",
            upload.file_name,
            upload.kind.mime_type(),
            upload.bytes.len()
        );

        let extraction = self.extractor.extract(upload).await?;
        if extraction.text.trim().is_empty() {
            return Err(GraderError::EmptyText);
        }

        let reply = self.grader.grade(&extraction.text).await?;

        let (analysis, source) = match parse_reply(&reply) {
            Ok(analysis) => (analysis, AnalysisSource::Model),
            Err(e) if self.fallback_on_parse_failure => {
                warn!(
                    "Unparseable grading reply ({}); returning fallback analysis. Raw reply: {}",
                    e, reply
                );
                (
                    fallback_analysis(),
                    AnalysisSource::Fallback {
                        reason: e.to_string(),
                    },
                )
            }
            Err(e) => {
                warn!("Unparseable grading reply ({}). Raw reply: {}", e, reply);
                return Err(GraderError::UnparseableReply(e));
            }
        };

        let total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Graded '{}': score {} ({}), {}ms",
            upload.file_name,
            analysis.overall_score,
            source.header_value(),
            total_duration_ms
        );

        Ok(GradingOutcome {
            analysis,
            source,
            stats: extraction.stats,
            total_duration_ms,
        })
    }
}

/// Resolve the LLM provider: explicit instance, then name + model, then
/// the environment.
pub fn resolve_provider(config: &GraderConfig) -> Result<Arc<dyn LLMProvider>, GraderError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    // EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL, only when both are set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // OpenAI wins when several provider keys are present.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GraderError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, GraderError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        GraderError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
