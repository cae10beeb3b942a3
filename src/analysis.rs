//! The graded-assignment data model.
//!
//! [`AnalysisResult`] is the wire format of the HTTP API and the shape the
//! model is asked to produce, so field names serialise in camelCase exactly
//! as the prompt spells them.

use serde::{Deserialize, Deserializer, Serialize};

/// Structured evaluation of one assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// 0–100.
    #[serde(deserialize_with = "de_score")]
    pub overall_score: u32,
    #[serde(deserialize_with = "de_count")]
    pub completed_questions: u32,
    #[serde(deserialize_with = "de_count")]
    pub total_questions: u32,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub question_analysis: Vec<QuestionAnalysis>,
    pub general_feedback: String,
}

/// Evaluation of a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalysis {
    pub question: String,
    pub status: QuestionStatus,
    pub feedback: String,
    /// 0–100.
    #[serde(deserialize_with = "de_score")]
    pub score: u32,
}

/// How far a question was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Complete,
    Partial,
    Missing,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Complete => "complete",
            QuestionStatus::Partial => "partial",
            QuestionStatus::Missing => "missing",
        }
    }
}

/// Where an [`AnalysisResult`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnalysisSource {
    /// Parsed from the model's reply.
    Model,
    /// The model reply was unusable; the fixed fallback was substituted.
    Fallback { reason: String },
}

impl AnalysisSource {
    /// Value of the `x-analysis-source` response header.
    pub fn header_value(&self) -> &'static str {
        match self {
            AnalysisSource::Model => "model",
            AnalysisSource::Fallback { .. } => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AnalysisSource::Fallback { .. })
    }
}

/// The fixed analysis returned when the model reply cannot be parsed.
///
/// The values are literals, not computed from the upload. Callers must tag
/// results built from this with [`AnalysisSource::Fallback`].
pub fn fallback_analysis() -> AnalysisResult {
    AnalysisResult {
        overall_score: 75,
        completed_questions: 3,
        total_questions: 5,
        strengths: vec![
            "Assignment was submitted on time".to_string(),
            "Shows effort in attempting the questions".to_string(),
        ],
        improvements: vec![
            "Some questions need more detailed explanations".to_string(),
            "Consider reviewing the concepts covered in class".to_string(),
        ],
        question_analysis: vec![
            QuestionAnalysis {
                question: "Question 1".to_string(),
                status: QuestionStatus::Complete,
                feedback: "Good attempt with correct approach".to_string(),
                score: 85,
            },
            QuestionAnalysis {
                question: "Question 2".to_string(),
                status: QuestionStatus::Partial,
                feedback: "Answer is partially correct but needs more detail".to_string(),
                score: 60,
            },
            QuestionAnalysis {
                question: "Question 3".to_string(),
                status: QuestionStatus::Missing,
                feedback: "This question was not attempted".to_string(),
                score: 0,
            },
        ],
        general_feedback: "The assignment shows understanding of basic concepts but would \
benefit from more detailed explanations and complete answers to all questions."
            .to_string(),
    }
}

// Models occasionally emit `82.5` or `3.0` where an integer was asked for.

fn de_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let n = serde_json::Number::deserialize(deserializer)?;
    n.as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| serde::de::Error::custom("number out of range"))
}

fn de_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_number(deserializer)?.round().clamp(0.0, 100.0) as u32)
}

fn de_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = de_number(deserializer)?;
    if v < 0.0 {
        return Err(serde::de::Error::custom("count must not be negative"));
    }
    Ok(v.round().min(u32::MAX as f64) as u32)
}
