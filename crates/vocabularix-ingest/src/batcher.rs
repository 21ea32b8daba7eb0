//! Batch stage
//!
//! Groups parsed records into fixed-size batches and hands each full batch
//! to the sink. Up to `max_in_flight` inserts run at once; at that limit the
//! stage stops reading records, which backs the whole pipeline up to the
//! fetcher. Every record is also forwarded to the mirror writer; a full
//! mirror channel holds back new records but never the inserts already
//! running.

use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use crate::progress::Progress;
use crate::record::{Batch, Record};
use crate::sink::Sink;
use futures::stream::FuturesUnordered;
use futures::{Future, StreamExt};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::debug;

/// What the batch stage did for one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub records: u64,
    pub batches: u64,
    pub rows_written: u64,
}

fn insert<'a>(
    sink: &'a Sink,
    table: &'a str,
    rows: Vec<Record>,
) -> impl Future<Output = Result<u64>> + 'a {
    async move { sink.insert_batch(table, &rows).await }
}

/// Drain `records` into the sink and the mirror channel
pub async fn run(
    sink: &Sink,
    table: &str,
    mut records: mpsc::Receiver<Record>,
    mirror: mpsc::Sender<Record>,
    config: &PipelineConfig,
    progress: &Progress,
) -> Result<BatchStats> {
    let max_in_flight = config.max_in_flight.max(1);
    let mut batch = Batch::new(config.batch_size);
    let mut in_flight = FuturesUnordered::new();
    let mut stats = BatchStats::default();
    let mut upstream_open = true;
    // Records accepted but not yet handed to the mirror
    let mut unmirrored = VecDeque::new();
    let max_unmirrored = config.channel_capacity.max(1);

    loop {
        tokio::select! {
            Some(done) = in_flight.next(), if !in_flight.is_empty() => {
                stats.rows_written += done?;
                stats.batches += 1;
            }
            permit = mirror.reserve(), if !unmirrored.is_empty() => {
                let permit = permit.map_err(|_| IngestError::StageClosed("mirror"))?;
                if let Some(record) = unmirrored.pop_front() {
                    permit.send(record);
                }
            }
            next = records.recv(),
                if upstream_open
                    && in_flight.len() < max_in_flight
                    && unmirrored.len() < max_unmirrored =>
            {
                match next {
                    Some(record) => {
                        unmirrored.push_back(record.clone());
                        progress.add_record();
                        stats.records += 1;

                        batch.push(record);
                        if batch.is_full() {
                            in_flight.push(insert(sink, table, batch.take()));
                        }
                    },
                    None => {
                        upstream_open = false;
                        // The last batch may be partial
                        if !batch.is_empty() {
                            debug!(table, rows = batch.len(), "Flushing trailing batch");
                            in_flight.push(insert(sink, table, batch.take()));
                        }
                    },
                }
            }
            else => break,
        }
    }

    Ok(stats)
}
