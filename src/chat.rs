//! Chat transcript messages.
//!
//! Messages only live for the duration of a request: the server renders them
//! to HTML and the browser appends them to its transcript. Nothing is stored.

use crate::analysis::AnalysisResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const GREETING: &str = "Hello! I'm your AI assignment evaluator. Upload a PDF of a handwritten assignment and I'll analyze it for you, checking if all questions are properly answered and providing detailed feedback.";

pub const ANALYSIS_INTRO: &str = "I've analyzed the assignment! Here's my detailed evaluation:";

pub const ANALYSIS_ERROR: &str = "Sorry, I encountered an error while analyzing the assignment. Please make sure you've uploaded a clear PDF file and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// One entry in the chat transcript.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub analysis: Option<AnalysisResult>,
    /// Set when `analysis` is the fixed fallback rather than a real grading.
    pub placeholder: bool,
    pub file_name: Option<String>,
}

impl Message {
    fn new(author: Author, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            content: content.into(),
            timestamp: Utc::now(),
            analysis: None,
            placeholder: false,
            file_name: None,
        }
    }

    /// The assistant's opening message.
    pub fn greeting() -> Self {
        Self::new(Author::Assistant, GREETING)
    }

    /// The user's side of an upload.
    pub fn uploaded(file_name: &str) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            ..Self::new(Author::User, format!("Uploaded assignment: {file_name}"))
        }
    }

    /// The assistant's reply carrying an analysis card.
    pub fn analysis(analysis: AnalysisResult, placeholder: bool) -> Self {
        Self {
            analysis: Some(analysis),
            placeholder,
            ..Self::new(Author::Assistant, ANALYSIS_INTRO)
        }
    }

    /// The assistant's reply when grading failed.
    ///
    /// Client errors (bad file type, nothing readable) are worth showing;
    /// anything else gets the generic apology.
    pub fn failure(detail: Option<&str>) -> Self {
        let content = match detail {
            Some(detail) => format!("{ANALYSIS_ERROR} ({detail})"),
            None => ANALYSIS_ERROR.to_string(),
        };
        Self::new(Author::Assistant, content)
    }

    /// Transcript time label (UTC), e.g. "03:07 PM". The page script
    /// replaces it with the reader's local time.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%I:%M %p").to_string()
    }

    /// Machine-readable timestamp for the `<time datetime>` attribute.
    pub fn datetime_attr(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
