//! End-to-end pipeline walkthrough against an in-memory store and a scripted
//! generator: draft a structure, approve it, then expand every lesson,
//! printing each streamed event as a JSON line.
//!
//! Run with: cargo run --example pipeline_demo

use std::sync::Arc;

use async_trait::async_trait;
use courseforge::events::{PipelineEvent, ProgressChannel};
use courseforge::generation::{
    GeneratedText, GenerationError, GenerationService, OutlineChunk, OutlineStream, TokenStream,
    UsageMetrics,
};
use courseforge::orchestrator::Pipeline;
use courseforge::outline::{ChapterOutline, CourseLevel, LessonOutline, OutlineStructure};
use courseforge::store::MemoryStore;
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::json;

/// Scripted generator standing in for a real provider.
struct ScriptedGenerator;

fn scripted_outline() -> OutlineStructure {
    let lesson = |chapter: usize, index: usize| LessonOutline {
        title: format!("Lesson {chapter}.{}", index + 1),
        description: "What this lesson covers".to_string(),
        order: index as u32,
        learning_objectives: vec!["apply the concept".to_string()],
        estimated_minutes: 25,
    };
    OutlineStructure {
        title: "Practical Rust".to_string(),
        description: "A hands-on introduction to Rust".to_string(),
        short_description: "Learn Rust by building".to_string(),
        level: CourseLevel::Beginner,
        duration_in_weeks: 6,
        chapters: (0..3)
            .map(|chapter_index| ChapterOutline {
                title: format!("Chapter {}", chapter_index + 1),
                description: "Chapter overview".to_string(),
                order: chapter_index as u32,
                lessons: (0..2).map(|i| lesson(chapter_index + 1, i)).collect(),
            })
            .collect(),
        prerequisites: None,
        target_audience: None,
        key_takeaways: None,
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate_once(&self, _prompt: &str) -> Result<GeneratedText, GenerationError> {
        Ok(GeneratedText {
            text: "# Lesson\n\nFull lesson content.".to_string(),
            usage: UsageMetrics::default(),
        })
    }

    async fn stream_tokens(&self, _prompt: &str) -> Result<TokenStream, GenerationError> {
        let chunks = ["# Lesson\n\n", "Full ", "lesson ", "content."]
            .into_iter()
            .map(|chunk| Ok(chunk.to_string()))
            .collect::<Vec<_>>();
        Ok(stream::iter(chunks).boxed())
    }

    async fn stream_structured_outline(
        &self,
        _prompt: &str,
    ) -> Result<OutlineStream, GenerationError> {
        let outline = scripted_outline();
        let partial = json!({
            "title": outline.title,
            "chapters": [{"title": "Chapter 1", "lessons": [{"title": "Lesson 1.1"}]}],
        });
        Ok(stream::iter(vec![
            Ok(OutlineChunk::Partial(partial)),
            Ok(OutlineChunk::Final {
                outline,
                usage: UsageMetrics {
                    prompt_tokens: 120,
                    completion_tokens: 800,
                    total_tokens: 920,
                },
            }),
        ])
        .boxed())
    }
}

async fn run_step(
    pipeline: &Pipeline<ScriptedGenerator, MemoryStore>,
    payload: serde_json::Value,
) -> Vec<PipelineEvent> {
    let (channel, stream) = ProgressChannel::unbounded();
    let printer = tokio::spawn(async move {
        let mut events = Vec::new();
        let mut stream = stream;
        while let Some(event) = stream.recv().await {
            println!("{}", event.to_json_value());
            events.push(event);
        }
        events
    });
    pipeline.dispatch(payload, &channel).await;
    drop(channel);
    printer.await.expect("printer task panicked")
}

#[tokio::main]
async fn main() {
    courseforge::telemetry::init();

    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(Arc::new(ScriptedGenerator), Arc::clone(&store));

    println!("--- phase 1: generate_structure ---");
    let events = run_step(
        &pipeline,
        json!({"step": "generate_structure", "data": {"title": "Practical Rust"}}),
    )
    .await;
    let Some(PipelineEvent::StructureComplete { structure, .. }) = events.last().cloned() else {
        eprintln!("structure generation failed");
        return;
    };

    println!("--- phase 2: approve_structure ---");
    let events = run_step(
        &pipeline,
        json!({"step": "approve_structure", "data": {"structure": structure}}),
    )
    .await;
    let Some(PipelineEvent::CourseCreated { course_id, .. }) = events.last().cloned() else {
        eprintln!("approval failed");
        return;
    };

    println!("--- phase 3: generate_content ---");
    run_step(
        &pipeline,
        json!({
            "step": "generate_content",
            "data": {"courseId": course_id, "structure": structure},
        }),
    )
    .await;

    let course = store.course(course_id).expect("course persisted");
    println!(
        "course {} now links {} lessons across {} chapters",
        course.id,
        course
            .chapters
            .iter()
            .map(|chapter| chapter.lesson_order_ids.len())
            .sum::<usize>(),
        course.chapters.len(),
    );
}
