use crate::{BufferedDataset, Error, Row, StreamKey};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Lifecycle state reported with every emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Streaming,
    Done,
    Error,
}

/// A snapshot pushed to the observer after every change to a stream.
///
/// `series` is the whole buffer after the change; `delta` holds only the rows
/// appended by that change, so consumers can process increments without
/// diffing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEmission {
    pub key: StreamKey,
    pub state: StreamState,
    pub series: Arc<BufferedDataset>,
    pub delta: Vec<Row>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Error>,
}

fn serialize_error<S: Serializer>(error: &Option<Error>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

/// Callback receiving every emission of the streams created by one batch.
///
/// The observer runs on the worker's task. It may call
/// [`StreamWorker::unsubscribe`](crate::StreamWorker::unsubscribe) on the
/// worker that invoked it, but should not block.
pub type Observer = Arc<dyn Fn(StreamEmission) + Send + Sync>;
