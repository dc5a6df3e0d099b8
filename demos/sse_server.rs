//! Minimal HTTP front for the pipeline: POST a `{"step", "data"}` envelope to
//! `/generate` and read the event stream back as server-sent events.
//!
//! Run with: cargo run --example sse_server
//!
//! Then, from another terminal:
//!
//! ```text
//! curl -N -X POST localhost:3000/generate \
//!   -H 'content-type: application/json' \
//!   -d '{"step":"generate_structure","data":{"title":"Practical Rust"}}'
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::routing::post;
use axum::{Json, Router};
use courseforge::events::ProgressChannel;
use courseforge::generation::{
    GeneratedText, GenerationError, GenerationService, OutlineChunk, OutlineStream, TokenStream,
    UsageMetrics,
};
use courseforge::orchestrator::Pipeline;
use courseforge::outline::{ChapterOutline, CourseLevel, LessonOutline, OutlineStructure};
use courseforge::store::MemoryStore;
use futures_util::StreamExt;
use futures_util::stream::{self, Stream};
use serde_json::{Value, json};

/// Scripted generator standing in for a real provider.
struct ScriptedGenerator;

fn scripted_outline() -> OutlineStructure {
    OutlineStructure {
        title: "Practical Rust".to_string(),
        description: "A hands-on introduction to Rust".to_string(),
        short_description: "Learn Rust by building".to_string(),
        level: CourseLevel::Beginner,
        duration_in_weeks: 6,
        chapters: (0..2)
            .map(|chapter_index| ChapterOutline {
                title: format!("Chapter {}", chapter_index + 1),
                description: "Chapter overview".to_string(),
                order: chapter_index as u32,
                lessons: (0..2)
                    .map(|lesson_index| LessonOutline {
                        title: format!("Lesson {}.{}", chapter_index + 1, lesson_index + 1),
                        description: "What this lesson covers".to_string(),
                        order: lesson_index as u32,
                        learning_objectives: Vec::new(),
                        estimated_minutes: 25,
                    })
                    .collect(),
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
        let chunks = ["# Lesson\n\n", "Full lesson content."]
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

type AppPipeline = Pipeline<ScriptedGenerator, MemoryStore>;

async fn generate(
    State(pipeline): State<Arc<AppPipeline>>,
    Json(payload): Json<Value>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (channel, events) = ProgressChannel::unbounded();

    tokio::spawn(async move {
        pipeline.dispatch(payload, &channel).await;
    });

    let stream = async_stream::stream! {
        let mut events = events.into_stream();
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            yield Ok(Event::default().data(event.to_json_value().to_string()));
            if terminal {
                break;
            }
        }
    };

    Sse::new(stream)
}

#[tokio::main]
async fn main() {
    courseforge::telemetry::init();

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(ScriptedGenerator),
        Arc::new(MemoryStore::new()),
    ));

    let app = Router::new()
        .route("/generate", post(generate))
        .with_state(pipeline);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("bind 127.0.0.1:3000");
    println!("listening on http://127.0.0.1:3000 (POST /generate)");
    axum::serve(listener, app).await.expect("server error");
}
