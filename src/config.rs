//! Pipeline configuration with environment overrides.

use std::time::Duration;

/// Tunables for a [`Pipeline`](crate::orchestrator::Pipeline) instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Hard bound on one whole pipeline invocation.
    pub overall_deadline: Duration,
    /// Extra time granted after the deadline trips so a phase can link
    /// already-completed work on its way out.
    pub cancel_grace: Duration,
    /// Chapter count the outline progress heuristic treats as typical.
    pub typical_chapter_count: u32,
    /// Pause before the single retry of the final course save.
    pub save_retry_delay: Duration,
    /// Owner recorded on courses created by the approval phase.
    pub default_owner_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overall_deadline: Duration::from_secs(300),
            cancel_grace: Duration::from_secs(5),
            typical_chapter_count: 6,
            save_retry_delay: Duration::from_millis(250),
            default_owner_id: "system".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `COURSEFORGE_*` environment variables (via a
    /// `.env` file when present), falling back to defaults for anything
    /// missing or unparseable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            overall_deadline: env_duration_secs("COURSEFORGE_DEADLINE_SECS")
                .unwrap_or(defaults.overall_deadline),
            cancel_grace: env_duration_secs("COURSEFORGE_CANCEL_GRACE_SECS")
                .unwrap_or(defaults.cancel_grace),
            typical_chapter_count: env_parse("COURSEFORGE_TYPICAL_CHAPTERS")
                .unwrap_or(defaults.typical_chapter_count),
            save_retry_delay: env_duration_millis("COURSEFORGE_SAVE_RETRY_MS")
                .unwrap_or(defaults.save_retry_delay),
            default_owner_id: std::env::var("COURSEFORGE_OWNER_ID")
                .unwrap_or(defaults.default_owner_id),
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.default_owner_id = owner_id.into();
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_duration_secs(key: &str) -> Option<Duration> {
    env_parse(key).map(Duration::from_secs)
}

fn env_duration_millis(key: &str) -> Option<Duration> {
    env_parse(key).map(Duration::from_millis)
}
