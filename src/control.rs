//! Cooperative cancellation for in-flight pipeline invocations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Clonable cancellation flag checked between leaves of the expansion phase.
///
/// Cancellation is cooperative and coarse: the expansion loop polls the token
/// before starting each leaf, never mid-call, so a trip stops further
/// generation while the already-completed leaves still get linked back into
/// the course by the final save.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
