//! Prompts sent to the language model.
//!
//! Every prompt lives here so wording changes touch exactly one place and
//! unit tests can inspect them without a live model.

/// Placeholder replaced by the extracted assignment text.
const TEXT_PLACEHOLDER: &str = "{assignment_text}";

/// Fixed grading prompt. [`grading_prompt`] substitutes the extracted text.
pub const GRADING_PROMPT_TEMPLATE: &str = r#"
You are an expert teacher evaluating a student's handwritten assignment. I'll provide you with the text extracted from the assignment.

Please analyze the assignment and provide a detailed evaluation in the following JSON format:

{
  "overallScore": number (0-100),
  "completedQuestions": number,
  "totalQuestions": number,
  "strengths": string[],
  "improvements": string[],
  "questionAnalysis": [
    {
      "question": "Brief description of the question",
      "status": "complete" | "partial" | "missing",
      "feedback": "Detailed feedback for this specific question",
      "score": number (0-100)
    }
  ],
  "generalFeedback": "Overall feedback and recommendations"
}

Guidelines for evaluation:
1. Identify all questions in the assignment
2. For each question, determine if it's completely answered, partially answered, or missing
3. Provide constructive feedback focusing on:
   - Correctness of answers
   - Completeness of responses
   - Clarity of explanations
   - Understanding of concepts
4. Highlight strengths and areas for improvement
5. Give an overall score based on completion and quality
6. Provide encouraging but honest feedback

Here's the extracted text from the assignment:

{assignment_text}

Please respond with only the JSON object, no additional text.
"#;

/// Build the grading prompt for `text`.
pub fn grading_prompt(text: &str) -> String {
    GRADING_PROMPT_TEMPLATE.replacen(TEXT_PLACEHOLDER, text, 1)
}

/// System prompt for the vision-model OCR strategy.
pub const TRANSCRIBE_SYSTEM_PROMPT: &str = r#"You are an OCR engine for handwritten school work.

Transcribe ALL text visible in the image exactly as written:
- Keep question numbers, sub-parts and the order in which a teacher would read them
- Write mathematical expressions in plain text (e.g. x^2 + 3x = 10)
- Mark illegible words as [illegible]
- Do NOT correct the student's mistakes
- Do NOT add commentary, headings or explanations
- If the image contains no text, output nothing"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_prompt_embeds_text_once() {
        let p = grading_prompt("Q1: 2 + 2 = 4");
        assert!(p.contains("Here's the extracted text from the assignment:\n\nQ1: 2 + 2 = 4\n"));
        assert!(!p.contains(TEXT_PLACEHOLDER));
    }

    #[test]
    fn grading_prompt_does_not_expand_placeholders_inside_student_text() {
        let p = grading_prompt("I wrote {assignment_text} on purpose");
        assert_eq!(p.matches("{assignment_text}").count(), 1);
    }

    #[test]
    fn grading_prompt_lists_every_schema_field() {
        for field in [
            "overallScore",
            "completedQuestions",
            "totalQuestions",
            "strengths",
            "improvements",
            "questionAnalysis",
            "generalFeedback",
        ] {
            assert!(GRADING_PROMPT_TEMPLATE.contains(field), "missing {field}");
        }
    }
}
