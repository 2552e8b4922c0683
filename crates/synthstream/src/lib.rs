//! Synthetic live-data streams for dashboard panels.
//!
//! A [`StreamRegistry`] receives batches of panel queries. Every query whose
//! scenario is [`STREAMING_SCENARIO`] is bound to a long-lived
//! [`StreamWorker`] that keeps a bounded [`BufferedDataset`] and pushes a
//! [`StreamEmission`] to the panel's [`Observer`] each time rows are added.
//!
//! Three kinds of streams are built in:
//!
//! - `signal`: a random walk with optional min/max bands.
//! - `logs`: leveled lorem-ipsum log lines at a jittered rate.
//! - `fetch`: rows parsed incrementally from a remote CSV document.
//!
//! Workers are reused across batches as long as their [`StreamKey`] and kind
//! match, so a refreshed panel keeps its buffer.
//!
//! ```no_run
//! use std::sync::Arc;
//! use synthstream::{
//!     BatchRequest, Observer, QueryDescriptor, RegistryConfig, STREAMING_SCENARIO,
//!     StreamOptions, StreamRegistry,
//! };
//!
//! # async fn demo() -> synthstream::Result<()> {
//! let mut registry = StreamRegistry::new(RegistryConfig::default())?;
//! let observer: Observer = Arc::new(|emission| {
//!     println!("{}: {} new rows", emission.key, emission.delta.len());
//! });
//!
//! registry.process(
//!     BatchRequest {
//!         dashboard_id: 1,
//!         panel_id: 2,
//!         max_data_points: 100,
//!         start_time: 0,
//!         targets: vec![QueryDescriptor {
//!             ref_id: "A".into(),
//!             scenario_id: STREAMING_SCENARIO.into(),
//!             stream: Some(StreamOptions {
//!                 kind: Some("logs".into()),
//!                 ..Default::default()
//!             }),
//!         }],
//!     },
//!     observer,
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! With the `tracing` feature enabled, worker lifecycles and failures are
//! reported through [`tracing`](https://docs.rs/tracing).

mod config;
mod dataset;
pub mod delimited;
mod emission;
mod error;
pub mod producer;
mod query;
mod rand;
mod registry;
mod time;
mod worker;

pub use crate::config::*;
pub use crate::dataset::*;
pub use crate::emission::*;
pub use crate::error::*;
pub use crate::query::*;
pub use crate::rand::*;
pub use crate::registry::*;
pub use crate::time::*;
pub use crate::worker::{StreamWorker, WorkerPhase};
