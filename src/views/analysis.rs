use maud::{html, Markup};

use crate::analysis::{AnalysisResult, QuestionStatus};

/// Colour band for a 0–100 score.
pub fn score_class(score: u32) -> &'static str {
    if score >= 80 {
        "score-high"
    } else if score >= 60 {
        "score-mid"
    } else {
        "score-low"
    }
}

fn status_icon(status: QuestionStatus) -> &'static str {
    match status {
        QuestionStatus::Complete => "✓",
        QuestionStatus::Partial => "◷",
        QuestionStatus::Missing => "✗",
    }
}

/// The analysis card shown under an assistant message.
///
/// `placeholder` marks the fixed fallback analysis so it is never mistaken
/// for a real grading.
pub fn card(analysis: &AnalysisResult, placeholder: bool) -> Markup {
    html! {
        article.analysis {
            @if placeholder {
                p.placeholder-note {
                    strong { "Placeholder analysis. " }
                    "The grading model's reply could not be read, so these are sample values, not a grade for this assignment."
                }
            }
            header {
                h2 style="text-align: center;" { "Assignment Analysis" }
                p class={"overall " (score_class(analysis.overall_score))} {
                    (analysis.overall_score) "%"
                }
                p style="text-align: center;" {
                    (analysis.completed_questions) " of " (analysis.total_questions)
                    " questions properly answered"
                }
            }

            h3 { "Question-by-Question Analysis" }
            @for (index, q) in analysis.question_analysis.iter().enumerate() {
                section.question {
                    div style="display: flex; justify-content: space-between; align-items: center;" {
                        span {
                            (status_icon(q.status)) " "
                            strong { "Question " (index + 1) } " "
                            span class={"badge " (q.status.as_str())} { (q.status.as_str()) }
                        }
                        strong class=(score_class(q.score)) { (q.score) "%" }
                    }
                    p { small { (q.question) } }
                    p { (q.feedback) }
                }
            }

            @if !analysis.strengths.is_empty() {
                h3 { "Strengths" }
                ul {
                    @for s in &analysis.strengths {
                        li { (s) }
                    }
                }
            }

            @if !analysis.improvements.is_empty() {
                h3 { "Areas for Improvement" }
                ul {
                    @for s in &analysis.improvements {
                        li { (s) }
                    }
                }
            }

            footer {
                h3 { "General Feedback" }
                p { (analysis.general_feedback) }
            }
        }
    }
}
