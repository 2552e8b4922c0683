//! Error types for the stream registry and its producers.
//!
//! Every error raised for a descriptor names its reference id, so a dashboard
//! can attach the failure to the right query row.
//!
//! ## Error Cases
//! - `UnknownStreamKind`: the descriptor asked for a producer kind that does
//!   not exist.
//! - `MissingSourceUrl`: a fetch stream was requested without a source URL.
//! - `RelativeSourceUrlRejected`: a fetch stream was given a URL with no
//!   scheme.
//! - `InvalidSourceUrl`: a fetch URL could not be parsed or uses a scheme other
//!   than `http`/`https`.
//! - `CapacityTooLarge`: the requested buffer (or the request's row-count hint)
//!   exceeds the registry's limit.
//! - `Fetch`: the remote source failed while being read.
//! - `HttpClient`: the HTTP client shared by fetch streams could not be built.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for stream creation and streaming failures.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The descriptor's `type` is not one of `signal`, `logs` or `fetch`.
    #[error("Unknown stream type: {kind} (refId {ref_id})")]
    UnknownStreamKind { ref_id: String, kind: String },

    /// A fetch stream was requested without a URL.
    #[error("Missing fetch URL (refId {ref_id})")]
    MissingSourceUrl { ref_id: String },

    /// A fetch stream was given a relative URL.
    #[error("Fetch URL must be absolute: {url} (refId {ref_id})")]
    RelativeSourceUrlRejected { ref_id: String, url: String },

    /// A fetch URL was malformed or used an unsupported scheme.
    #[error("Invalid fetch URL {url}: {reason} (refId {ref_id})")]
    InvalidSourceUrl {
        ref_id: String,
        url: String,
        reason: String,
    },

    /// The stream's buffer capacity is above
    /// [`RegistryConfig::max_capacity`](crate::RegistryConfig::max_capacity).
    #[error("Buffer of {capacity} rows exceeds the limit of {max} (refId {ref_id})")]
    CapacityTooLarge {
        ref_id: String,
        capacity: usize,
        max: usize,
    },

    /// The remote source failed to respond or broke off mid-stream.
    #[error("Fetch failed: {reason} (refId {ref_id})")]
    Fetch { ref_id: String, reason: String },

    /// The registry's HTTP client could not be initialized.
    #[error("Failed to build HTTP client: {reason}")]
    HttpClient { reason: String },
}

impl Error {
    /// Returns the reference id of the query descriptor this error belongs
    /// to, if any.
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            Self::UnknownStreamKind { ref_id, .. }
            | Self::MissingSourceUrl { ref_id }
            | Self::RelativeSourceUrlRejected { ref_id, .. }
            | Self::InvalidSourceUrl { ref_id, .. }
            | Self::CapacityTooLarge { ref_id, .. }
            | Self::Fetch { ref_id, .. } => Some(ref_id),
            Self::HttpClient { .. } => None,
        }
    }
}
