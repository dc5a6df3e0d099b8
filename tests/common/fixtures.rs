use courseforge::outline::{ChapterOutline, CourseLevel, LessonOutline, OutlineStructure};
use serde_json::{Value, json};

/// Build a well-formed outline with the given shape. Chapter `c` gets
/// `lessons_per_chapter[c]` lessons; titles encode their position.
#[allow(dead_code)]
pub fn outline_with_shape(lessons_per_chapter: &[usize]) -> OutlineStructure {
    let chapters = lessons_per_chapter
        .iter()
        .enumerate()
        .map(|(chapter_index, &lesson_count)| ChapterOutline {
            title: format!("Chapter {}", chapter_index + 1),
            description: format!("Covers part {} of the course", chapter_index + 1),
            order: chapter_index as u32,
            lessons: (0..lesson_count)
                .map(|lesson_index| LessonOutline {
                    title: format!("Lesson {}.{}", chapter_index + 1, lesson_index + 1),
                    description: "A lesson".to_string(),
                    order: lesson_index as u32,
                    learning_objectives: vec!["understand the topic".to_string()],
                    estimated_minutes: 20,
                })
                .collect(),
        })
        .collect();

    OutlineStructure {
        title: "Intro to X".to_string(),
        description: "A full course about X".to_string(),
        short_description: "Learn X".to_string(),
        level: CourseLevel::Beginner,
        duration_in_weeks: 4,
        chapters,
        prerequisites: None,
        target_audience: None,
        key_takeaways: None,
    }
}

/// A loose partial outline as it would arrive mid-stream.
#[allow(dead_code)]
pub fn partial_with_counts(chapter_count: usize, lessons_per_chapter: usize) -> Value {
    let chapters: Vec<Value> = (0..chapter_count)
        .map(|chapter_index| {
            json!({
                "title": format!("Chapter {}", chapter_index + 1),
                "lessons": (0..lessons_per_chapter)
                    .map(|lesson_index| json!({"title": format!("Lesson {lesson_index}")}))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({"title": "Intro to X", "chapters": chapters})
}
