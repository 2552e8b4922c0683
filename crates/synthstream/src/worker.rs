//! The state machine shared by every producer.
//!
//! A worker owns one [`BufferedDataset`], the latest [`StreamQuery`] and batch
//! request, an optional observer slot and a cancellation token. Producers
//! drive it through [`WorkerCore::append_rows`]; the registry drives it
//! through [`StreamWorker::update`] and [`StreamWorker::unsubscribe`].
//!
//! ```text
//! Initializing ──▶ Streaming ──▶ Done
//!       │              │  └─────▶ Failed
//!       └──────────────┴────────▶ Unsubscribed
//! ```
//!
//! No transition leaves a terminal phase.

use crate::{
    BatchRequest, BufferedDataset, Error, Observer, RegistryConfig, Row, StreamEmission,
    StreamKey, StreamKind, StreamQuery, StreamState, TimeSource,
};
use core::cell::RefCell;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio_util::sync::CancellationToken;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle phase of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerPhase {
    /// Created; the producer has not populated the buffer yet.
    Initializing,
    Streaming,
    /// The source reported end-of-data.
    Done,
    /// The source failed; see the last emission's error.
    Failed,
    Unsubscribed,
}

impl WorkerPhase {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Unsubscribed)
    }
}

struct WorkerState {
    query: StreamQuery,
    request: Arc<BatchRequest>,
    series: Arc<BufferedDataset>,
    phase: WorkerPhase,
    // Cleared before the observer slot, so `update` sees an unsubscribe
    // that is in progress.
    subscribed: bool,
    last_activity: i64,
}

impl WorkerState {
    fn capacity(&self) -> usize {
        self.query.capacity(self.request.max_data_points)
    }

    fn transition(&mut self, next: WorkerPhase) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = next;
        true
    }
}

pub(crate) struct WorkerCore {
    id: u64,
    key: StreamKey,
    kind: StreamKind,
    config: Arc<RegistryConfig>,
    clock: Arc<dyn TimeSource>,
    state: Mutex<WorkerState>,
    // Invocation holds the lock, so clearing waits for an in-flight call.
    // Re-entrant so an observer may unsubscribe its own worker.
    observer: ReentrantMutex<RefCell<Option<Observer>>>,
    cancel: CancellationToken,
}

impl WorkerCore {
    pub(crate) fn new(
        key: StreamKey,
        kind: StreamKind,
        query: StreamQuery,
        request: Arc<BatchRequest>,
        observer: Observer,
        config: Arc<RegistryConfig>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let now = clock.current_millis();
        Self {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            key,
            kind,
            config,
            clock,
            state: Mutex::new(WorkerState {
                query,
                request,
                series: Arc::new(BufferedDataset::default()),
                phase: WorkerPhase::Initializing,
                subscribed: true,
                last_activity: now,
            }),
            observer: ReentrantMutex::new(RefCell::new(Some(observer))),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) const fn key(&self) -> &StreamKey {
        &self.key
    }

    pub(crate) fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.current_millis()
    }

    pub(crate) const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn query(&self) -> StreamQuery {
        self.state.lock().query.clone()
    }

    /// Buffer capacity: the configured buffer size, else the request's row
    /// hint. See [`StreamQuery::capacity`].
    pub(crate) fn capacity(&self) -> usize {
        self.state.lock().capacity()
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    /// True once the observer is gone and the request that created the
    /// stream started longer ago than the orphan timeout.
    pub(crate) fn is_orphaned(&self) -> bool {
        let start_time = {
            let state = self.state.lock();
            if state.subscribed {
                return false;
            }
            state.request.start_time
        };
        self.now() - start_time > self.config.orphan_timeout_ms
    }

    pub(crate) fn update(&self, query: StreamQuery, request: Arc<BatchRequest>) -> bool {
        if query.kind != self.kind.as_str() {
            return false;
        }
        let mut state = self.state.lock();
        if !state.subscribed {
            return false;
        }
        state.query = query;
        state.request = request;
        true
    }

    pub(crate) fn unsubscribe(&self) {
        let _was_subscribed = {
            let mut state = self.state.lock();
            let was_subscribed = core::mem::replace(&mut state.subscribed, false);
            if was_subscribed {
                state.transition(WorkerPhase::Unsubscribed);
            }
            was_subscribed
        };
        self.observer.lock().borrow_mut().take();
        self.cancel.cancel();

        #[cfg(feature = "tracing")]
        {
            if _was_subscribed {
                tracing::debug!(key = %self.key, worker = self.id, "Unsubscribed stream");
            }
        }
    }

    /// Replaces the whole buffer (initial population or a new schema) and
    /// moves the worker to `Streaming`. Nothing is emitted.
    pub(crate) fn set_series(&self, series: BufferedDataset) {
        let now = self.now();
        let mut state = self.state.lock();
        state.series = Arc::new(series);
        if state.phase == WorkerPhase::Initializing {
            state.phase = WorkerPhase::Streaming;
        }
        state.last_activity = now;
    }

    /// Appends `rows`, trims to capacity and emits them as the delta.
    ///
    /// Without an observer the append still happens and the emission is
    /// dropped.
    pub(crate) fn append_rows(&self, rows: Vec<Row>) {
        let now = self.now();
        let series = {
            let mut state = self.state.lock();
            let capacity = state.capacity();
            Arc::make_mut(&mut state.series).append(&rows, capacity);
            state.last_activity = now;
            Arc::clone(&state.series)
        };

        self.notify(StreamEmission {
            key: self.key.clone(),
            state: StreamState::Streaming,
            series,
            delta: rows,
            error: None,
        });
    }

    /// Marks the stream as complete and emits a final `Done` snapshot.
    pub(crate) fn finish(&self) {
        let Some(series) = self.settle(WorkerPhase::Done) else {
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::info!(key = %self.key, rows = series.len(), "Finished stream");

        self.notify(StreamEmission {
            key: self.key.clone(),
            state: StreamState::Done,
            series,
            delta: Vec::new(),
            error: None,
        });
    }

    /// Marks the stream as failed and emits an `Error` snapshot.
    pub(crate) fn fail(&self, error: Error) {
        let Some(series) = self.settle(WorkerPhase::Failed) else {
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::warn!(key = %self.key, "Stream failed: {error}");

        self.notify(StreamEmission {
            key: self.key.clone(),
            state: StreamState::Error,
            series,
            delta: Vec::new(),
            error: Some(error),
        });
    }

    fn settle(&self, phase: WorkerPhase) -> Option<Arc<BufferedDataset>> {
        let now = self.now();
        let mut state = self.state.lock();
        if !state.transition(phase) {
            return None;
        }
        state.last_activity = now;
        Some(Arc::clone(&state.series))
    }

    fn notify(&self, emission: StreamEmission) {
        let slot = self.observer.lock();
        let observer = slot.borrow().clone();
        match observer {
            Some(observer) => observer(emission),
            None => {
                #[cfg(feature = "tracing")]
                tracing::trace!(key = %self.key, "Stream working without any observer");
            }
        }
    }
}

/// Handle to one live stream.
///
/// Cloning the handle does not clone the stream; all clones address the same
/// worker.
#[derive(Clone)]
pub struct StreamWorker {
    core: Arc<WorkerCore>,
}

impl StreamWorker {
    pub(crate) const fn from_core(core: Arc<WorkerCore>) -> Self {
        Self { core }
    }

    /// Process-unique identifier of this worker instance.
    pub fn id(&self) -> u64 {
        self.core.id
    }

    pub fn key(&self) -> &StreamKey {
        &self.core.key
    }

    pub fn kind(&self) -> StreamKind {
        self.core.kind
    }

    pub fn phase(&self) -> WorkerPhase {
        self.core.state.lock().phase
    }

    /// Returns the current buffer.
    pub fn snapshot(&self) -> Arc<BufferedDataset> {
        Arc::clone(&self.core.state.lock().series)
    }

    /// Timestamp (ms since the Unix epoch) of the last buffer change.
    pub fn last_activity(&self) -> i64 {
        self.core.state.lock().last_activity
    }

    /// Returns the configuration the worker is currently running with.
    pub fn query(&self) -> StreamQuery {
        self.core.query()
    }

    pub fn is_subscribed(&self) -> bool {
        self.core.is_subscribed()
    }

    /// Adopts a fresh query and batch request.
    ///
    /// Returns `false` when the worker was unsubscribed or `query` asks for a
    /// different kind; the caller must then replace the worker. On `true` the
    /// buffer is kept and the producer picks up the new options on its next
    /// step.
    pub fn update(&self, query: StreamQuery, request: Arc<BatchRequest>) -> bool {
        self.core.update(query, request)
    }

    /// Clears the observer and cancels the producer task.
    ///
    /// Idempotent. Once this returns, the observer is never invoked again.
    pub fn unsubscribe(&self) {
        self.core.unsubscribe();
    }
}

impl core::fmt::Debug for StreamWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamWorker")
            .field("id", &self.core.id)
            .field("key", &self.core.key)
            .field("kind", &self.core.kind)
            .field("phase", &self.phase())
            .finish()
    }
}
