//! Turn the grading model's free-text reply into an [`AnalysisResult`].
//!
//! Models wrap JSON in prose or code fences often enough that the reply is
//! never parsed directly. The span from the first `{` to the last `}` is
//! taken (greedy, across newlines); if there is no such span the whole reply
//! is tried instead.

use crate::analysis::AnalysisResult;
use crate::error::ReplyParseError;
use once_cell::sync::Lazy;
use regex::Regex;

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// The candidate JSON text inside `reply`.
pub fn json_candidate(reply: &str) -> &str {
    JSON_OBJECT
        .find(reply)
        .map(|m| m.as_str())
        .unwrap_or(reply)
}

/// Parse a model reply into an [`AnalysisResult`].
pub fn parse_reply(reply: &str) -> Result<AnalysisResult, ReplyParseError> {
    if reply.trim().is_empty() {
        return Err(ReplyParseError::Empty);
    }
    serde_json::from_str(json_candidate(reply)).map_err(|e| ReplyParseError::InvalidJson {
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::QuestionStatus;

    const REPLY: &str = r#"{
  "overallScore": 82,
  "completedQuestions": 4,
  "totalQuestions": 5,
  "strengths": ["Neat working"],
  "improvements": ["Check units"],
  "questionAnalysis": [
    {"question": "Q1", "status": "complete", "feedback": "Correct.", "score": 100},
    {"question": "Q5", "status": "missing", "feedback": "Not attempted.", "score": 0}
  ],
  "generalFeedback": "Solid effort."
}"#;

    #[test]
    fn bare_json() {
        let a = parse_reply(REPLY).unwrap();
        assert_eq!(a.overall_score, 82);
        assert_eq!(a.completed_questions, 4);
        assert_eq!(a.question_analysis[1].status, QuestionStatus::Missing);
        assert_eq!(a.general_feedback, "Solid effort.");
    }

    #[test]
    fn json_wrapped_in_prose_and_fences() {
        let reply = format!("Here is my analysis:\n```json\n{REPLY}\n```\nLet me know!");
        assert_eq!(parse_reply(&reply).unwrap(), parse_reply(REPLY).unwrap());
    }

    #[test]
    fn greedy_span_covers_nested_objects() {
        let reply = format!("prefix {REPLY} suffix");
        assert_eq!(json_candidate(&reply), REPLY);
    }

    #[test]
    fn no_braces_tries_whole_text() {
        assert_eq!(json_candidate("no json here"), "no json here");
        assert!(matches!(
            parse_reply("no json here"),
            Err(ReplyParseError::InvalidJson { .. })
        ));
    }

    #[test]
    fn empty_reply() {
        assert_eq!(parse_reply("  \n"), Err(ReplyParseError::Empty));
    }

    #[test]
    fn missing_fields_are_rejected() {
        assert!(parse_reply(r#"{"overallScore": 50}"#).is_err());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let bad = REPLY.replace("\"missing\"", "\"skipped\"");
        assert!(parse_reply(&bad).is_err());
    }
}
