//! Batch requests, query descriptors and stream options.
//!
//! The JSON names follow the dashboard's query model (`refId`, `scenarioId`,
//! `type`, `speed`, ...) so requests can be deserialized straight from what
//! the dashboard sends.

use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

/// Scenario identifier the registry handles by default.
pub const STREAMING_SCENARIO: &str = "streaming_client";

/// The closed set of producer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Signal,
    Logs,
    Fetch,
}

impl StreamKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Logs => "logs",
            Self::Fetch => "fetch",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(Self::Signal),
            "logs" => Ok(Self::Logs),
            "fetch" => Ok(Self::Fetch),
            _ => Err(()),
        }
    }
}

/// Stream options as supplied by a descriptor. Omitted fields take the
/// registry's [`StreamDefaults`].
///
/// `type` is kept as a raw string: an unknown kind is only an error once the
/// registry tries to create a worker for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamOptions {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Tick interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bands: Option<usize>,
    /// Buffer capacity; unset or zero falls back to the request's
    /// `maxDataPoints`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Minimum generated log line length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_length: Option<usize>,
}

/// Defaults applied to every option a descriptor omits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamDefaults {
    pub kind: StreamKind,
    pub speed: u64,
    pub spread: f64,
    pub noise: f64,
    pub bands: usize,
    pub line_length: usize,
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            kind: StreamKind::Signal,
            speed: 250,
            spread: 3.5,
            noise: 2.2,
            bands: 1,
            line_length: 60,
        }
    }
}

/// Fully resolved stream configuration retained by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamQuery {
    pub kind: String,
    pub speed: u64,
    pub spread: f64,
    pub noise: f64,
    pub bands: usize,
    pub buffer: Option<usize>,
    pub url: Option<String>,
    pub line_length: usize,
}

impl StreamQuery {
    /// Merges `options` over `defaults`.
    pub fn resolve(options: Option<&StreamOptions>, defaults: &StreamDefaults) -> Self {
        let options = options.cloned().unwrap_or_default();
        Self {
            kind: options
                .kind
                .unwrap_or_else(|| defaults.kind.as_str().to_string()),
            speed: options.speed.unwrap_or(defaults.speed),
            spread: options.spread.unwrap_or(defaults.spread),
            noise: options.noise.unwrap_or(defaults.noise),
            bands: options.bands.unwrap_or(defaults.bands),
            buffer: options.buffer,
            url: options.url,
            line_length: options.line_length.unwrap_or(defaults.line_length),
        }
    }

    /// Rows the stream's buffer holds: the configured `buffer`, or
    /// `max_data_points` when it is unset or zero.
    pub fn capacity(&self, max_data_points: usize) -> usize {
        self.buffer.filter(|&b| b > 0).unwrap_or(max_data_points)
    }

    /// Parses the kind string into the closed [`StreamKind`] set.
    pub fn stream_kind(&self) -> Option<StreamKind> {
        self.kind.parse().ok()
    }
}

/// One query of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub ref_id: String,
    pub scenario_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamOptions>,
}

/// A batch of queries issued by one dashboard panel refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub dashboard_id: i64,
    pub panel_id: i64,
    /// Row-count hint used when a stream has no explicit buffer size.
    pub max_data_points: usize,
    /// Request start, in milliseconds since the Unix epoch.
    pub start_time: i64,
    #[serde(default)]
    pub targets: Vec<QueryDescriptor>,
}

/// Synchronous answer to a batch. Streaming data arrives through the
/// observer, so `data` is always empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub data: Vec<crate::BufferedDataset>,
}

/// Identity of one logical stream across repeated batch requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    pub dashboard_id: i64,
    pub panel_id: i64,
    pub ref_id: String,
    pub bands: usize,
}

impl StreamKey {
    pub fn new(request: &BatchRequest, ref_id: impl Into<String>, bands: usize) -> Self {
        Self {
            dashboard_id: request.dashboard_id,
            panel_id: request.panel_id,
            ref_id: ref_id.into(),
            bands,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.dashboard_id, self.panel_id, self.ref_id, self.bands
        )
    }
}

impl Serialize for StreamKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_options_take_defaults() {
        let q = StreamQuery::resolve(None, &StreamDefaults::default());
        assert_eq!(q.kind, "signal");
        assert_eq!(q.speed, 250);
        assert_eq!(q.spread, 3.5);
        assert_eq!(q.noise, 2.2);
        assert_eq!(q.bands, 1);
        assert_eq!(q.buffer, None);
        assert_eq!(q.line_length, 60);
    }

    #[test]
    fn supplied_options_win_over_defaults() {
        let options = StreamOptions {
            kind: Some("logs".into()),
            speed: Some(10),
            bands: Some(3),
            buffer: Some(20),
            ..Default::default()
        };
        let q = StreamQuery::resolve(Some(&options), &StreamDefaults::default());
        assert_eq!(q.stream_kind(), Some(StreamKind::Logs));
        assert_eq!(q.speed, 10);
        assert_eq!(q.spread, 3.5);
        assert_eq!(q.bands, 3);
        assert_eq!(q.buffer, Some(20));
    }

    #[test]
    fn zero_buffer_falls_back_to_the_row_hint() {
        let mut q = StreamQuery::resolve(None, &StreamDefaults::default());
        assert_eq!(q.capacity(20), 20);
        q.buffer = Some(0);
        assert_eq!(q.capacity(20), 20);
        q.buffer = Some(5);
        assert_eq!(q.capacity(20), 5);
    }

    #[test]
    fn unknown_kind_does_not_parse() {
        let options = StreamOptions {
            kind: Some("bogus".into()),
            ..Default::default()
        };
        let q = StreamQuery::resolve(Some(&options), &StreamDefaults::default());
        assert_eq!(q.stream_kind(), None);
    }

    #[test]
    fn request_deserializes_from_dashboard_json() {
        let json = r#"{
            "dashboardId": 7,
            "panelId": 2,
            "maxDataPoints": 500,
            "startTime": 1000,
            "targets": [
                {"refId": "A", "scenarioId": "streaming_client", "stream": {"type": "logs", "speed": 100}},
                {"refId": "B", "scenarioId": "random_walk"}
            ]
        }"#;
        let req: BatchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.targets.len(), 2);
        let stream = req.targets[0].stream.as_ref().unwrap();
        assert_eq!(stream.kind.as_deref(), Some("logs"));
        assert_eq!(stream.speed, Some(100));
        assert!(req.targets[1].stream.is_none());
    }

    #[test]
    fn key_display_matches_dashboard_format() {
        let key = StreamKey {
            dashboard_id: 7,
            panel_id: 2,
            ref_id: "A".into(),
            bands: 1,
        };
        assert_eq!(key.to_string(), "7/2/A@1");
    }
}
