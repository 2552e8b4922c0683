//! Top-level entry point mapping batch requests onto live workers.
//!
//! A [`StreamRegistry`] belongs to one dashboard-panel session. For every
//! streaming descriptor of a batch it derives a [`StreamKey`] and then:
//!
//! 1. If a worker exists for the key and accepts the new query
//!    ([`StreamWorker::update`]), the worker keeps running with its buffer.
//! 2. Otherwise the old worker is unsubscribed and dropped, and a new worker
//!    of the requested kind is created.
//!
//! Dropping the registry unsubscribes every worker it owns.

use crate::{
    BatchRequest, BatchResponse, Error, MonotonicClock, Observer, QueryDescriptor,
    RegistryConfig, Result, StreamKey, StreamQuery, StreamWorker, TimeSource,
    producer::Producer, worker::WorkerCore,
};
use core::time::Duration;
use std::{collections::HashMap, sync::Arc};
use tokio::runtime::Handle;

pub struct StreamRegistry {
    config: Arc<RegistryConfig>,
    clock: Arc<dyn TimeSource>,
    http: reqwest::Client,
    runtime: Handle,
    workers: HashMap<StreamKey, StreamWorker>,
}

impl StreamRegistry {
    /// Creates a registry that spawns its workers on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HttpClient`] if the HTTP client for fetch streams
    /// cannot be initialized.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Self::with_runtime(config, Handle::current())
    }

    /// Creates a registry that spawns its workers on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HttpClient`] if the HTTP client for fetch streams
    /// cannot be initialized.
    pub fn with_runtime(config: RegistryConfig, runtime: Handle) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.fetch_timeout_ms))
            .build()
            .map_err(|e| Error::HttpClient {
                reason: e.to_string(),
            })?;

        Ok(Self {
            config: Arc::new(config),
            clock: Arc::new(MonotonicClock::new()),
            http,
            runtime,
            workers: HashMap::new(),
        })
    }

    /// Replaces the time source used for row timestamps and orphan checks.
    /// Only affects workers created afterwards.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the HTTP client used by fetch streams.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Reconciles the registry's workers with `request`.
    ///
    /// Descriptors with a foreign scenario identifier are skipped. New workers
    /// report to `observer`; reused workers keep the observer they were
    /// created with.
    ///
    /// Returns an empty [`BatchResponse`] if at least one descriptor was a
    /// streaming descriptor, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Every descriptor is processed even if an earlier one fails. The first
    /// failure (in descriptor order) is returned after the whole batch has
    /// been handled:
    ///
    /// - [`Error::UnknownStreamKind`] for an unrecognized `type`.
    /// - [`Error::CapacityTooLarge`] if the stream's buffer would exceed
    ///   [`RegistryConfig::max_capacity`]. A worker already running for the key
    ///   is left untouched.
    /// - [`Error::MissingSourceUrl`], [`Error::RelativeSourceUrlRejected`] or
    ///   [`Error::InvalidSourceUrl`] for a misconfigured fetch stream.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            skip_all,
            fields(dashboard = request.dashboard_id, panel = request.panel_id)
        )
    )]
    pub fn process(
        &mut self,
        request: BatchRequest,
        observer: Observer,
    ) -> Result<Option<BatchResponse>> {
        let request = Arc::new(request);
        let mut response = None;
        let mut first_error = None;

        for descriptor in &request.targets {
            if descriptor.scenario_id != self.config.scenario_id {
                continue;
            }
            response.get_or_insert_with(BatchResponse::default);

            if let Err(e) = self.apply(descriptor, &request, &observer) {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to create stream: {e}");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(response),
        }
    }

    fn apply(
        &mut self,
        descriptor: &QueryDescriptor,
        request: &Arc<BatchRequest>,
        observer: &Observer,
    ) -> Result<()> {
        let query = StreamQuery::resolve(descriptor.stream.as_ref(), &self.config.defaults);
        let key = StreamKey::new(request, descriptor.ref_id.as_str(), query.bands);

        let capacity = query.capacity(request.max_data_points);
        if capacity > self.config.max_capacity {
            return Err(Error::CapacityTooLarge {
                ref_id: key.ref_id,
                capacity,
                max: self.config.max_capacity,
            });
        }

        if let Some(existing) = self.workers.get(&key) {
            if existing.update(query.clone(), Arc::clone(request)) {
                #[cfg(feature = "tracing")]
                tracing::debug!(%key, worker = existing.id(), "Reuse stream");
                return Ok(());
            }
            existing.unsubscribe();
            self.workers.remove(&key);
        }

        self.spawn_worker(key, query, request, observer)
    }

    fn spawn_worker(
        &mut self,
        key: StreamKey,
        query: StreamQuery,
        request: &Arc<BatchRequest>,
        observer: &Observer,
    ) -> Result<()> {
        let producer = Producer::new(&key.ref_id, &query, &self.http)?;
        let core = Arc::new(WorkerCore::new(
            key.clone(),
            producer.kind(),
            query,
            Arc::clone(request),
            Arc::clone(observer),
            Arc::clone(&self.config),
            Arc::clone(&self.clock),
        ));
        let worker = StreamWorker::from_core(Arc::clone(&core));

        #[cfg(feature = "tracing")]
        tracing::info!(%key, worker = worker.id(), kind = %worker.kind(), "Creating stream");

        producer.spawn(core, &self.runtime);
        self.workers.insert(key, worker);
        Ok(())
    }

    pub fn get(&self, key: &StreamKey) -> Option<&StreamWorker> {
        self.workers.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.workers.keys()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Unsubscribes and forgets the worker for `key`. Returns whether one
    /// existed.
    pub fn unsubscribe(&mut self, key: &StreamKey) -> bool {
        match self.workers.remove(key) {
            Some(worker) => {
                worker.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Unsubscribes every worker and empties the registry.
    pub fn shutdown(&mut self) {
        #[cfg(feature = "tracing")]
        {
            if !self.workers.is_empty() {
                tracing::info!("Shutting down {} streams", self.workers.len());
            }
        }

        for (_, worker) in self.workers.drain() {
            worker.unsubscribe();
        }
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl core::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("config", &self.config)
            .field("workers", &self.workers.len())
            .finish()
    }
}
