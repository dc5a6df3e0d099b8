use futures_util::stream::Stream;

use super::event::PipelineEvent;

/// Single-producer handle for pushing [`PipelineEvent`]s to one listener.
///
/// Emission is fire-and-forget from the emitting phase's perspective: a
/// listener that has hung up never turns into a phase error, but events from
/// a single phase are delivered in emission order. Dropping the channel (the
/// pipeline function returned) closes the transport and ends the paired
/// [`ProgressStream`].
///
/// # Examples
///
/// ```
/// use courseforge::events::{PipelineEvent, ProgressChannel};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let (channel, mut stream) = ProgressChannel::unbounded();
/// channel.emit(PipelineEvent::error("nope"));
/// drop(channel);
///
/// assert_eq!(stream.recv().await.unwrap().tag(), "error");
/// assert!(stream.recv().await.is_none());
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct ProgressChannel {
    tx: flume::Sender<PipelineEvent>,
}

impl ProgressChannel {
    /// Create a channel/stream pair backed by an unbounded transport.
    pub fn unbounded() -> (Self, ProgressStream) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, ProgressStream { rx })
    }

    /// Push one event to the listener.
    ///
    /// A disconnected listener is logged at `debug` and otherwise ignored;
    /// the pipeline keeps running to completion either way.
    pub fn emit(&self, event: PipelineEvent) {
        if let Err(err) = self.tx.send(event) {
            tracing::debug!(
                tag = err.into_inner().tag(),
                "progress listener disconnected; dropping event"
            );
        }
    }

    /// True while the paired [`ProgressStream`] is still alive.
    pub fn is_open(&self) -> bool {
        !self.tx.is_disconnected()
    }
}

/// Consumer side of a [`ProgressChannel`].
#[derive(Debug)]
pub struct ProgressStream {
    rx: flume::Receiver<PipelineEvent>,
}

impl ProgressStream {
    /// Receive the next event, or `None` once the producer has dropped the
    /// channel and all buffered events are drained.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.rx.recv_async().await.ok()
    }

    /// Non-blocking receive of an already-buffered event.
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        self.rx.try_recv().ok()
    }

    /// Adapt into a [`Stream`] for async consumers (SSE bridges and the like).
    pub fn into_stream(self) -> impl Stream<Item = PipelineEvent> + Send {
        self.rx.into_stream()
    }

    /// Drain every event until the channel closes. Test convenience.
    pub async fn collect_all(mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}
