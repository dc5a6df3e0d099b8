mod common;

use std::sync::Arc;
use std::time::Duration;

use courseforge::config::PipelineConfig;
use courseforge::control::CancelToken;
use courseforge::events::{PipelineEvent, ProgressChannel};
use courseforge::orchestrator::Pipeline;
use courseforge::outline::OutlineStructure;
use courseforge::phases::plan_leaves;
use courseforge::request::{
    ApproveStructureRequest, GenerateContentRequest, GenerationRequest,
};
use courseforge::store::{CourseId, MemoryStore};

use common::{
    MOCK_CALL_USAGE, MockGenerator, TestPipeline, assert_progress_monotonic,
    assert_single_terminal, outline_with_shape, pipeline_with, run_request, tags,
};

/// Approve `outline` on a fresh pipeline sharing `store`, returning the id.
async fn approved_course(store: &Arc<MemoryStore>, outline: &OutlineStructure) -> CourseId {
    let pipeline = pipeline_with(MockGenerator::new(), Arc::clone(store));
    let (report, events) = run_request(
        &pipeline,
        GenerationRequest::ApproveStructure(ApproveStructureRequest {
            structure: outline.clone(),
        }),
    )
    .await;
    assert!(report.is_success());
    match events.last().unwrap() {
        PipelineEvent::CourseCreated { course_id, .. } => *course_id,
        other => panic!("unexpected event {other:?}"),
    }
}

fn content_request(course_id: CourseId, outline: &OutlineStructure) -> GenerationRequest {
    GenerationRequest::GenerateContent(GenerateContentRequest {
        course_id,
        structure: outline.clone(),
        use_web_search: false,
        include_quizzes: false,
        additional_prompt: None,
    })
}

#[test]
fn leaves_are_planned_left_to_right_with_dense_ordinals() {
    let outline = outline_with_shape(&[2, 0, 3]);
    let leaves = plan_leaves(&outline);
    assert_eq!(leaves.len(), 5);
    for (index, leaf) in leaves.iter().enumerate() {
        assert_eq!(leaf.ordinal, index + 1);
    }
    assert_eq!(leaves[0].chapter_index, 0);
    assert_eq!(leaves[1].chapter_index, 0);
    assert_eq!(leaves[2].chapter_index, 2);
    assert_eq!(leaves[2].lesson_index, 0);
    assert_eq!(leaves[4].lesson_index, 2);
}

#[tokio::test]
async fn expands_every_leaf_and_links_in_visit_order() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[2, 2]);
    let course_id = approved_course(&store, &outline).await;

    let pipeline = pipeline_with(MockGenerator::new(), Arc::clone(&store));
    let (report, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    assert!(report.is_success());
    assert_single_terminal(&events, "complete");
    assert_progress_monotonic(&events);

    let created: Vec<_> = events
        .iter()
        .filter(|event| event.tag() == "lesson-created")
        .collect();
    assert_eq!(created.len(), 4);

    let PipelineEvent::Complete {
        course_id: completed_id,
        results,
        metrics,
        ..
    } = events.last().unwrap()
    else {
        panic!("missing complete");
    };
    assert_eq!(*completed_id, course_id);
    assert_eq!(metrics.succeeded, 4);
    assert_eq!(metrics.failed, 0);
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].title, "Lesson 1.1");
    assert_eq!(results[3].chapter_title, "Chapter 2");

    let course = store.course(course_id).unwrap();
    assert_eq!(course.chapters[0].lesson_order_ids.len(), 2);
    assert_eq!(course.chapters[1].lesson_order_ids.len(), 2);
    // Append order matches visit order: results list the same ids
    // left-to-right as the chapters hold them.
    let linked: Vec<_> = course
        .chapters
        .iter()
        .flat_map(|chapter| chapter.lesson_order_ids.iter().copied())
        .collect();
    let reported: Vec<_> = results.iter().map(|lesson| lesson.lesson_id).collect();
    assert_eq!(linked, reported);

    let lesson = store.lesson(linked[0]).unwrap();
    assert_eq!(lesson.content.body, MockGenerator::expected_leaf_body());
    assert_eq!(lesson.content.format, "markdown");
    assert!(!lesson.published);
    assert!(lesson.requires_enrollment);
}

#[tokio::test]
async fn failed_leaf_is_isolated_and_iteration_continues() {
    let store = Arc::new(MemoryStore::new());
    // Two chapters, three lessons total; leaf 2 fails.
    let outline = outline_with_shape(&[2, 1]);
    let course_id = approved_course(&store, &outline).await;

    let generator = MockGenerator::new().failing_leaf(2);
    let pipeline = pipeline_with(generator, Arc::clone(&store));
    let (report, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    assert!(report.is_success());
    let observed = tags(&events);
    let leaf_events: Vec<_> = observed
        .iter()
        .filter(|tag| **tag == "lesson-created" || **tag == "lesson-error")
        .copied()
        .collect();
    // Events arrive in lesson-visitation order.
    assert_eq!(leaf_events, vec!["lesson-created", "lesson-error", "lesson-created"]);

    let PipelineEvent::Complete { metrics, .. } = events.last().unwrap() else {
        panic!("missing complete");
    };
    assert_eq!(metrics.succeeded, 2);
    assert_eq!(metrics.failed, 1);

    let PipelineEvent::LessonError { lesson_title, error } = events
        .iter()
        .find(|event| event.tag() == "lesson-error")
        .unwrap()
    else {
        panic!("wrong variant");
    };
    assert_eq!(lesson_title, "Lesson 1.2");
    assert!(error.contains("injected failure"));

    // The failed leaf appended nothing.
    let course = store.course(course_id).unwrap();
    assert_eq!(course.chapters[0].lesson_order_ids.len(), 1);
    assert_eq!(course.chapters[1].lesson_order_ids.len(), 1);
    assert_eq!(store.lesson_count(), 2);
}

#[tokio::test]
async fn every_leaf_is_attempted_even_when_the_first_fails() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[1, 1, 1]);
    let course_id = approved_course(&store, &outline).await;

    let generator = MockGenerator::new().failing_leaf(1);
    let pipeline = pipeline_with(generator, Arc::clone(&store));
    let (_, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    let PipelineEvent::Complete { metrics, .. } = events.last().unwrap() else {
        panic!("missing complete");
    };
    assert_eq!(metrics.failed, 1);
    assert_eq!(metrics.succeeded, 2);
}

#[tokio::test]
async fn emits_one_progress_event_per_leaf_with_counters() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[3, 3]);
    let course_id = approved_course(&store, &outline).await;

    let pipeline = pipeline_with(MockGenerator::new(), Arc::clone(&store));
    let (_, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    let progress: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Progress {
                current_lesson: Some(current),
                total_lessons: Some(total),
                progress,
                ..
            } => Some((*current, *total, *progress)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 6);
    for (index, (current, total, value)) in progress.iter().enumerate() {
        assert_eq!(*current, index + 1);
        assert_eq!(*total, 6);
        let expected = 5.0 + ((index + 1) as f64 / 6.0) * 85.0;
        assert!((value - expected).abs() < 1e-9);
    }
}

#[tokio::test]
async fn web_search_mode_uses_single_shot_calls_and_reports_usage() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[2]);
    let course_id = approved_course(&store, &outline).await;

    let pipeline = pipeline_with(MockGenerator::new(), Arc::clone(&store));
    let (report, events) = run_request(
        &pipeline,
        GenerationRequest::GenerateContent(GenerateContentRequest {
            course_id,
            structure: outline.clone(),
            use_web_search: true,
            include_quizzes: true,
            additional_prompt: Some("cite sources".to_string()),
        }),
    )
    .await;

    assert!(report.is_success());
    assert_single_terminal(&events, "complete");
    let mut expected_usage = MOCK_CALL_USAGE;
    expected_usage.add(&MOCK_CALL_USAGE);
    assert_eq!(report.usage, expected_usage);
}

#[tokio::test]
async fn unknown_course_is_one_error_event_with_no_writes() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[1]);

    let pipeline = pipeline_with(MockGenerator::new(), Arc::clone(&store));
    let (report, events) =
        run_request(&pipeline, content_request(CourseId::new(), &outline)).await;

    assert!(!report.is_success());
    assert_single_terminal(&events, "error");
    assert!(report.error.unwrap().contains("not found"));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn chapter_count_mismatch_leaves_the_course_untouched() {
    let store = Arc::new(MemoryStore::new());
    let approved = outline_with_shape(&[1, 1]);
    let course_id = approved_course(&store, &approved).await;
    let writes_after_approval = store.write_count();

    let drifted = outline_with_shape(&[1, 1, 1]);
    let pipeline = pipeline_with(MockGenerator::new(), Arc::clone(&store));
    let (report, events) = run_request(&pipeline, content_request(course_id, &drifted)).await;

    assert!(!report.is_success());
    assert_single_terminal(&events, "error");
    assert_eq!(store.write_count(), writes_after_approval);
    let course = store.course(course_id).unwrap();
    assert!(course.chapters.iter().all(|c| c.lesson_order_ids.is_empty()));
}

#[tokio::test]
async fn final_save_is_retried_once_and_then_succeeds() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[2]);
    let course_id = approved_course(&store, &outline).await;
    store.fail_next_saves(1);

    let config = PipelineConfig {
        save_retry_delay: Duration::from_millis(10),
        ..PipelineConfig::default()
    };
    let pipeline: TestPipeline =
        Pipeline::with_config(Arc::new(MockGenerator::new()), Arc::clone(&store), config);
    let (report, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    assert!(report.is_success());
    assert_single_terminal(&events, "complete");
    let course = store.course(course_id).unwrap();
    assert_eq!(course.chapters[0].lesson_order_ids.len(), 2);
}

#[tokio::test]
async fn exhausted_save_retries_surface_as_the_terminal_error() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[1]);
    let course_id = approved_course(&store, &outline).await;
    store.fail_next_saves(2);

    let config = PipelineConfig {
        save_retry_delay: Duration::from_millis(10),
        ..PipelineConfig::default()
    };
    let pipeline: TestPipeline =
        Pipeline::with_config(Arc::new(MockGenerator::new()), Arc::clone(&store), config);
    let (report, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    assert!(!report.is_success());
    assert_single_terminal(&events, "error");
    // The lesson document exists but was never linked: the orphan gap.
    assert_eq!(store.lesson_count(), 1);
    let course = store.course(course_id).unwrap();
    assert!(course.chapters[0].lesson_order_ids.is_empty());
}

#[tokio::test]
async fn deadline_during_final_save_still_ends_with_one_terminal_event() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[1]);
    let course_id = approved_course(&store, &outline).await;
    // The phase is past its cancel checkpoints once the save starts; the
    // grace window must let it finish without a second terminal event.
    store.delay_saves(Duration::from_millis(300));

    let config = PipelineConfig {
        overall_deadline: Duration::from_millis(100),
        cancel_grace: Duration::from_secs(5),
        ..PipelineConfig::default()
    };
    let pipeline: TestPipeline =
        Pipeline::with_config(Arc::new(MockGenerator::new()), Arc::clone(&store), config);
    let (report, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    assert!(report.is_success());
    assert_single_terminal(&events, "complete");
    assert!(events.iter().all(|event| event.tag() != "error"));
    let course = store.course(course_id).unwrap();
    assert_eq!(course.chapters[0].lesson_order_ids.len(), 1);
}

#[tokio::test]
async fn caller_held_cancel_token_stops_expansion_before_any_leaf() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[2]);
    let course_id = approved_course(&store, &outline).await;

    let pipeline = pipeline_with(MockGenerator::new(), Arc::clone(&store));
    let cancel = CancelToken::new();
    cancel.cancel();

    let (channel, stream) = ProgressChannel::unbounded();
    let consumer = tokio::spawn(stream.collect_all());
    let report = pipeline
        .run_with_cancel(content_request(course_id, &outline), &channel, &cancel)
        .await;
    drop(channel);
    let events = consumer.await.expect("event consumer panicked");

    assert!(!report.is_success());
    assert_single_terminal(&events, "error");
    assert!(report.error.unwrap().contains("cancelled"));
    assert_eq!(store.lesson_count(), 0);
    let course = store.course(course_id).unwrap();
    assert!(course.chapters.iter().all(|c| c.lesson_order_ids.is_empty()));
}

#[tokio::test]
async fn deadline_cancels_between_leaves_and_links_completed_work() {
    let store = Arc::new(MemoryStore::new());
    let outline = outline_with_shape(&[3]);
    let course_id = approved_course(&store, &outline).await;

    let generator = MockGenerator::new().with_leaf_delay(Duration::from_millis(100));
    let config = PipelineConfig {
        overall_deadline: Duration::from_millis(150),
        cancel_grace: Duration::from_secs(5),
        ..PipelineConfig::default()
    };
    let pipeline: TestPipeline =
        Pipeline::with_config(Arc::new(generator), Arc::clone(&store), config);
    let (report, events) = run_request(&pipeline, content_request(course_id, &outline)).await;

    assert!(!report.is_success());
    assert_single_terminal(&events, "error");
    assert!(report.error.unwrap().contains("deadline"));
    assert!(events.iter().all(|event| event.tag() != "complete"));

    // Leaves finished before the trip were still linked by the final save.
    let course = store.course(course_id).unwrap();
    let linked = course.chapters[0].lesson_order_ids.len();
    assert!((1..3).contains(&linked), "expected partial linkage, got {linked}");
}
