//! Per-source streaming pipeline
//!
//! ```text
//! fetch -> inflate -> parse -> batch -> sink
//!                                   \-> mirror
//! ```
//!
//! Stages are joined by bounded channels and polled together with
//! `tokio::try_join!`. A full channel suspends its producer, so a slow sink
//! eventually throttles the download. The first stage error ends the join,
//! dropping every other stage, and the partial mirror file is removed.

use crate::batcher;
use crate::config::IngestConfig;
use crate::decompress;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::mirror::{self, MirrorWriter};
use crate::parser;
use crate::progress::Progress;
use crate::sink::Sink;
use crate::source::Source;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Counters for one completed (or partially completed) source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub bytes_received: u64,
    pub bytes_inflated: u64,
    pub records: u64,
    pub batches: u64,
}

/// Stream one source into its table and mirror file
///
/// The destination table must already exist. On error the mirror file is
/// gone when this returns.
pub async fn run_source(
    source: &Source,
    sink: &Sink,
    fetcher: &Fetcher,
    config: &IngestConfig,
) -> Result<SourceStats> {
    let path = source.mirror_path(&config.destination);

    let outcome = run_stages(source, sink, fetcher, config).await;
    if outcome.is_err() {
        mirror::remove_partial(&path).await;
    }
    outcome
}

async fn run_stages(
    source: &Source,
    sink: &Sink,
    fetcher: &Fetcher,
    config: &IngestConfig,
) -> Result<SourceStats> {
    let table = source.table_name();
    let writer = MirrorWriter::create(&source.mirror_path(&config.destination)).await?;
    info!(path = %writer.path().display(), "Destination path");

    let download = fetcher.fetch(source.url()).await?;
    let progress = Progress::new(
        table,
        download.content_length(),
        config.pipeline.show_progress,
    );

    let capacity = config.pipeline.channel_capacity.max(1);
    let (raw_tx, raw_rx) = mpsc::channel(capacity);
    let (text_tx, text_rx) = mpsc::channel(capacity);
    let (record_tx, record_rx) = mpsc::channel(capacity);
    let (mirror_tx, mirror_rx) = mpsc::channel(capacity);

    let joined = tokio::try_join!(
        download.pump(raw_tx, &progress),
        decompress::inflate(raw_rx, text_tx),
        parser::parse(text_rx, record_tx),
        batcher::run(sink, table, record_rx, mirror_tx, &config.pipeline, &progress),
        writer.write_all(mirror_rx),
    );

    let (bytes_received, bytes_inflated, parsed, batched, mirrored) = match joined {
        Ok(counts) => counts,
        Err(e) => {
            progress.abandon();
            return Err(e);
        },
    };
    progress.finish();

    debug!(
        table,
        parsed,
        mirrored,
        rows_written = batched.rows_written,
        "Pipeline drained"
    );

    Ok(SourceStats {
        bytes_received,
        bytes_inflated,
        records: batched.records,
        batches: batched.batches,
    })
}
