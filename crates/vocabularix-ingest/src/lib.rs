//! Vocabularix Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Streams Google Books n-gram exports into a relational store.
//!
//! Each source is a gzip compressed, tab separated file. Sources are handled
//! one at a time; for each one the destination table is recreated and the
//! file flows through a staged pipeline:
//!
//! - **Fetch**: streaming HTTP download with a progress bar
//! - **Inflate**: gzip decompression, multi-member aware
//! - **Parse**: TSV lines into four-field [`Record`]s
//! - **Batch**: fixed-size multi-row inserts, a bounded number in flight
//! - **Mirror**: every record appended to a local JSON lines file
//!
//! A failing source is recorded and skipped, its partial mirror removed.
//!
//! # Example
//!
//! ```no_run
//! use vocabularix_ingest::{load_sources, IngestConfig, Sequencer, Sink};
//! use vocabularix_ingest::sink::adapter_for;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::default();
//!     let sink = Sink::new(adapter_for(config.sink, 10));
//!     let sources = load_sources(Path::new("assets/google-ngram.json"))?;
//!
//!     let summary = Sequencer::new(config, sink)?.run(&sources).await?;
//!     println!("{} sources ingested", summary.succeeded());
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod config;
pub mod decompress;
pub mod error;
pub mod fetcher;
pub mod mirror;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod sequencer;
pub mod sink;
pub mod source;

pub use config::{ConnectionParams, FetchConfig, IngestConfig, PipelineConfig, SinkKind};
pub use error::{IngestError, Result};
pub use pipeline::SourceStats;
pub use record::{Batch, Record};
pub use sequencer::{RunSummary, Sequencer, SourceReport, SourceStatus};
pub use sink::{Sink, SinkAdapter};
pub use source::{load_sources, Source};
