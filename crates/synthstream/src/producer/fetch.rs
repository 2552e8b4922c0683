//! Row stream pulled from a remote CSV document.
//!
//! The body is consumed chunk by chunk: bytes are decoded as UTF-8 (multi-byte
//! sequences split between chunks are carried over), fed to a
//! [`CsvStreamReader`], and every parsed row is appended on its own, so each
//! row produces one emission.

use crate::{
    BufferedDataset, Error, Field, Result, Row,
    delimited::{CsvStreamReader, RecordSink},
    worker::WorkerCore,
};
use core::fmt;
use futures::{Stream, StreamExt};
use std::{pin::pin, sync::Arc};
use url::Url;

/// Fetches and streams rows from an absolute `http`/`https` URL.
#[derive(Debug, Clone)]
pub struct FetchProducer {
    url: Url,
    http: reqwest::Client,
}

impl FetchProducer {
    /// Validates `url` before any network activity.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingSourceUrl`] if no URL was configured.
    /// - [`Error::RelativeSourceUrlRejected`] if the URL has no scheme.
    /// - [`Error::InvalidSourceUrl`] if it cannot be parsed or is not
    ///   `http`/`https`.
    pub fn new(ref_id: &str, url: Option<&str>, http: reqwest::Client) -> Result<Self> {
        let url = validate_url(ref_id, url)?;
        Ok(Self { url, http })
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) async fn run(self, core: Arc<WorkerCore>) {
        let ref_id = core.key().ref_id.clone();
        let token = core.cancel_token().clone();

        let response = tokio::select! {
            biased;
            () = token.cancelled() => return,
            response = self.http.get(self.url.clone()).send() => response,
        };

        match response.and_then(reqwest::Response::error_for_status) {
            Ok(response) => read_body(&core, response.bytes_stream()).await,
            Err(e) => core.fail(Error::Fetch {
                ref_id,
                reason: e.to_string(),
            }),
        }
    }
}

pub(crate) fn validate_url(ref_id: &str, url: Option<&str>) -> Result<Url> {
    let raw = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::MissingSourceUrl {
            ref_id: ref_id.to_string(),
        })?;

    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        Ok(url) => Err(Error::InvalidSourceUrl {
            ref_id: ref_id.to_string(),
            url: raw.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        }),
        Err(url::ParseError::RelativeUrlWithoutBase) => Err(Error::RelativeSourceUrlRejected {
            ref_id: ref_id.to_string(),
            url: raw.to_string(),
        }),
        Err(e) => Err(Error::InvalidSourceUrl {
            ref_id: ref_id.to_string(),
            url: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Drains `body` into the worker until end-of-data, failure, or the worker
/// losing its observer.
pub(crate) async fn read_body<S, B, E>(core: &WorkerCore, body: S)
where
    S: Stream<Item = core::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let mut body = pin!(body);
    let mut decoder = Utf8ChunkDecoder::default();
    let mut reader = CsvStreamReader::new();
    let mut sink = SeriesSink { core };

    loop {
        if !core.is_subscribed() {
            #[cfg(feature = "tracing")]
            tracing::debug!(key = %core.key(), "Abandoned fetch stream");
            return;
        }

        let next = tokio::select! {
            biased;
            () = core.cancel_token().cancelled() => return,
            next = body.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                let text = decoder.decode(chunk.as_ref());
                reader.feed(&text, &mut sink);
            }
            Some(Err(e)) => {
                core.fail(Error::Fetch {
                    ref_id: core.key().ref_id.clone(),
                    reason: e.to_string(),
                });
                return;
            }
            None => {
                let tail = decoder.finish();
                reader.feed(&tail, &mut sink);
                reader.finish(&mut sink);
                core.finish();
                return;
            }
        }
    }
}

struct SeriesSink<'a> {
    core: &'a WorkerCore,
}

impl RecordSink for SeriesSink<'_> {
    fn on_header(&mut self, fields: Vec<Field>) {
        let ref_id = &self.core.key().ref_id;
        self.core.set_series(BufferedDataset {
            name: None,
            ref_id: Some(ref_id.clone()),
            fields,
            rows: Vec::new(),
        });
    }

    fn on_row(&mut self, row: Row) {
        self.core.append_rows(vec![row]);
    }
}

/// UTF-8 decoder that tolerates chunk boundaries inside a character.
#[derive(Debug, Default)]
pub(crate) struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    /// Decodes as much of `pending + chunk` as possible. An incomplete trailing
    /// sequence is kept for the next call; invalid bytes become U+FFFD.
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            match core::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes a dangling incomplete sequence lossily.
    pub(crate) fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
