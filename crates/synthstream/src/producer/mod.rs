//! Row-generating strategies.
//!
//! [`Producer`] is the closed set of kinds a worker can run. Each variant
//! carries its own state and is moved into the worker's task when the worker
//! is spawned:
//!
//! - [`Producer::Signal`] and [`Producer::Logs`] tick on a timer through the
//!   shared [`TickProducer`] loop.
//! - [`Producer::Fetch`] appends rows as chunks of a remote body arrive.

mod fetch;
mod logs;
mod signal;
mod ticker;

pub use fetch::FetchProducer;
pub use logs::{LogLevel, LogProducer, WORDS};
pub use signal::SignalProducer;
pub use ticker::TickProducer;

use crate::{Error, Result, StreamKind, StreamQuery, worker::WorkerCore};
use std::sync::Arc;
use tokio::runtime::Handle;

#[derive(Debug)]
pub enum Producer {
    Signal(SignalProducer),
    Logs(LogProducer),
    Fetch(FetchProducer),
}

impl Producer {
    /// Builds the producer for `query`'s kind.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownStreamKind`] if the kind is not recognized.
    /// - Any fetch URL validation error, raised before a request is issued.
    pub fn new(ref_id: &str, query: &StreamQuery, http: &reqwest::Client) -> Result<Self> {
        let kind = query
            .stream_kind()
            .ok_or_else(|| Error::UnknownStreamKind {
                ref_id: ref_id.to_string(),
                kind: query.kind.clone(),
            })?;

        Ok(match kind {
            StreamKind::Signal => Self::Signal(SignalProducer::default()),
            StreamKind::Logs => Self::Logs(LogProducer::default()),
            StreamKind::Fetch => Self::Fetch(FetchProducer::new(
                ref_id,
                query.url.as_deref(),
                http.clone(),
            )?),
        })
    }

    pub const fn kind(&self) -> StreamKind {
        match self {
            Self::Signal(_) => StreamKind::Signal,
            Self::Logs(_) => StreamKind::Logs,
            Self::Fetch(_) => StreamKind::Fetch,
        }
    }

    /// Moves the producer into a task on `runtime` that drives `core`.
    pub(crate) fn spawn(self, core: Arc<WorkerCore>, runtime: &Handle) {
        #[cfg(feature = "tracing")]
        let span = tracing::info_span!("stream", key = %core.key(), kind = %self.kind());

        let fut = async move {
            match self {
                Self::Signal(p) => ticker::run(core, p).await,
                Self::Logs(p) => ticker::run(core, p).await,
                Self::Fetch(p) => p.run(core).await,
            }
        };

        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(span)
        };

        runtime.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StreamDefaults, StreamOptions};

    fn query(kind: &str, url: Option<&str>) -> StreamQuery {
        let options = StreamOptions {
            kind: Some(kind.into()),
            url: url.map(str::to_string),
            ..Default::default()
        };
        StreamQuery::resolve(Some(&options), &StreamDefaults::default())
    }

    #[test]
    fn builds_the_matching_variant() {
        let http = reqwest::Client::new();
        for (kind, expected) in [
            ("signal", StreamKind::Signal),
            ("logs", StreamKind::Logs),
            ("fetch", StreamKind::Fetch),
        ] {
            let q = query(kind, Some("http://localhost/x.csv"));
            let p = Producer::new("A", &q, &http).unwrap();
            assert_eq!(p.kind(), expected);
        }
    }

    #[test]
    fn unknown_kind_names_the_ref_id() {
        let err = Producer::new("Q", &query("bogus", None), &reqwest::Client::new()).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownStreamKind {
                ref_id: "Q".into(),
                kind: "bogus".into()
            }
        );
    }
}
