//! Source sequencing
//!
//! Sources are processed strictly one after another. A failing source is
//! logged, recorded in the summary and skipped; only configuration and
//! connection problems end the run early.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::fetcher::Fetcher;
use crate::pipeline::{self, SourceStats};
use crate::progress::format_bytes;
use crate::sink::Sink;
use crate::source::Source;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Terminal state of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Succeeded,
    Failed { kind: &'static str, message: String },
    /// Narrated only, nothing was touched
    DryRun,
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: Source,
    pub status: SourceStatus,
    pub stats: SourceStats,
    pub elapsed: Duration,
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, SourceStatus::Succeeded)
    }
}

/// Outcome of a whole run, in source order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<SourceReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, SourceStatus::Failed { .. }))
            .count()
    }

    pub fn total_records(&self) -> u64 {
        self.reports.iter().map(|r| r.stats.records).sum()
    }
}

/// Drives every source of a run through the sink session
pub struct Sequencer {
    config: IngestConfig,
    sink: Sink,
    fetcher: Fetcher,
}

impl Sequencer {
    /// Validates the configuration before anything is touched
    pub fn new(config: IngestConfig, sink: Sink) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config.fetch)?;
        Ok(Self {
            config,
            sink,
            fetcher,
        })
    }

    /// Process all sources in order
    ///
    /// Returns an error only when the sink cannot be reached; per-source
    /// failures end up in the summary.
    pub async fn run(&mut self, sources: &[Source]) -> Result<RunSummary> {
        if self.config.dry_run {
            return Ok(self.narrate(sources));
        }

        self.sink.connect(&self.config.connection).await?;

        let mut summary = RunSummary::default();
        for (index, source) in sources.iter().enumerate() {
            info!(
                source = %source,
                position = index + 1,
                total = sources.len(),
                "Processing source"
            );
            summary.reports.push(self.process(source).await);
        }

        if let Err(e) = self.sink.disconnect().await {
            warn!(error = %e, "Failed to close sink connection");
        }

        info!(
            adapter = self.sink.adapter_name(),
            sources = sources.len(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            records = summary.total_records(),
            "Run complete"
        );
        Ok(summary)
    }

    async fn process(&self, source: &Source) -> SourceReport {
        let started = Instant::now();
        let table = source.table_name();

        let outcome = match self.sink.recreate_table(table).await {
            Ok(()) => pipeline::run_source(source, &self.sink, &self.fetcher, &self.config).await,
            Err(e) => Err(e),
        };

        let elapsed = started.elapsed();
        match outcome {
            Ok(stats) => {
                info!(
                    source = %source,
                    table,
                    records = stats.records,
                    batches = stats.batches,
                    downloaded = %format_bytes(stats.bytes_received),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Source ingested"
                );
                SourceReport {
                    source: source.clone(),
                    status: SourceStatus::Succeeded,
                    stats,
                    elapsed,
                }
            },
            Err(e) => {
                error!(
                    source = %source,
                    table,
                    kind = e.kind(),
                    error = %e,
                    "Source failed, moving on"
                );
                SourceReport {
                    source: source.clone(),
                    status: failed(&e),
                    stats: SourceStats::default(),
                    elapsed,
                }
            },
        }
    }

    fn narrate(&self, sources: &[Source]) -> RunSummary {
        info!(sources = sources.len(), "Dry run, nothing will be written");

        let reports = sources
            .iter()
            .map(|source| {
                let path = source.mirror_path(&self.config.destination);
                info!(table = source.table_name(), "Creating table if not exists");
                info!(url = source.url(), "Downloading");
                info!(path = %path.display(), "Destination path");

                SourceReport {
                    source: source.clone(),
                    status: SourceStatus::DryRun,
                    stats: SourceStats::default(),
                    elapsed: Duration::ZERO,
                }
            })
            .collect();

        RunSummary { reports }
    }
}

fn failed(error: &IngestError) -> SourceStatus {
    SourceStatus::Failed {
        kind: error.kind(),
        message: error.to_string(),
    }
}
