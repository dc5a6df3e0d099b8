//! Deterministic prompt assembly for the generation calls.
//!
//! Prompt wording is deliberately plain; quality tuning of generated text is
//! out of scope. What matters here is that the same request always yields the
//! same prompt, and that every outline field the expansion phase depends on
//! (titles, objectives, duration) is present in the leaf prompt.

use std::fmt::Write;

use crate::outline::LessonOutline;
use crate::request::GenerateStructureRequest;

/// Query for the best-effort research sub-call of phase 1.
pub fn research_query(title: &str) -> String {
    format!(
        "Collect current, factual background material for designing an online course titled \
         \"{title}\". Summarize the key topics, common skill gaps, and authoritative sources."
    )
}

/// Prompt driving the structured-outline stream of phase 1.
pub fn outline_prompt(request: &GenerateStructureRequest, research: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(research) = research {
        let _ = writeln!(prompt, "Background research:\n{research}\n");
    }
    let _ = writeln!(
        prompt,
        "Design a complete course outline for a course titled \"{}\".",
        request.title
    );
    if !request.description.trim().is_empty() {
        let _ = writeln!(prompt, "Course description: {}", request.description);
    }
    let _ = writeln!(
        prompt,
        "Produce chapters in teaching order, each with ordered lessons."
    );
    if request.include_objectives {
        let _ = writeln!(
            prompt,
            "Every lesson must list concrete learning objectives."
        );
    }
    if let Some(additional) = request
        .additional_prompt
        .as_deref()
        .filter(|extra| !extra.trim().is_empty())
    {
        let _ = writeln!(prompt, "Additional instructions: {additional}");
    }
    prompt
}

/// Prompt for expanding one (chapter, lesson) leaf into full content.
pub fn lesson_prompt(
    course_title: &str,
    chapter_title: &str,
    chapter_description: &str,
    lesson: &LessonOutline,
    include_quizzes: bool,
    additional_prompt: Option<&str>,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Write the full content for the lesson \"{}\" of the course \"{course_title}\".",
        lesson.title
    );
    let _ = writeln!(prompt, "Chapter: {chapter_title}. {chapter_description}");
    if !lesson.description.trim().is_empty() {
        let _ = writeln!(prompt, "Lesson summary: {}", lesson.description);
    }
    if !lesson.learning_objectives.is_empty() {
        let _ = writeln!(prompt, "Learning objectives:");
        for objective in &lesson.learning_objectives {
            let _ = writeln!(prompt, "- {objective}");
        }
    }
    if lesson.estimated_minutes > 0 {
        let _ = writeln!(
            prompt,
            "Target a reading/working time of about {} minutes.",
            lesson.estimated_minutes
        );
    }
    if include_quizzes {
        let _ = writeln!(
            prompt,
            "End the lesson with a short quiz of 3 to 5 questions with answers."
        );
    }
    if let Some(additional) = additional_prompt.filter(|extra| !extra.trim().is_empty()) {
        let _ = writeln!(prompt, "Additional instructions: {additional}");
    }
    prompt
}
