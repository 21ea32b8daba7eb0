//! Vocabularix Ingest - n-gram ingestion tool

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use vocabularix_common::logging::{init_logging, LogConfig, LogLevel};
use vocabularix_ingest::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_IN_FLIGHT,
};
use vocabularix_ingest::sink::adapter_for;
use vocabularix_ingest::{
    load_sources, ConnectionParams, FetchConfig, IngestConfig, PipelineConfig, Sequencer, Sink,
    SinkKind,
};

#[derive(Parser, Debug)]
#[command(name = "vocabularix-ingest")]
#[command(author, version, about = "Load Google Books n-gram exports into a database")]
struct Cli {
    /// JSON file holding the array of source URLs
    #[arg(long, env = "VOCABULARIX_SOURCES", default_value = "assets/google-ngram.json")]
    sources: PathBuf,

    /// Directory receiving the JSON lines mirror of each source
    #[arg(long, env = "VOCABULARIX_DESTINATION", default_value = "assets/google-ngram")]
    destination: PathBuf,

    /// Narrate the run without downloading, writing or connecting
    #[arg(long)]
    dry_run: bool,

    /// Database backing the sink (postgres or mysql)
    #[arg(long, env = "VOCABULARIX_SINK", default_value = "postgres")]
    sink: SinkKind,

    #[arg(long, env = "VOCABULARIX_DB_HOST", default_value = "")]
    db_host: String,

    #[arg(long, env = "VOCABULARIX_DB_PORT")]
    db_port: Option<u16>,

    #[arg(long, env = "VOCABULARIX_DB_USER", default_value = "")]
    db_user: String,

    #[arg(long, env = "VOCABULARIX_DB_PASSWORD", default_value = "", hide_env_values = true)]
    db_password: String,

    /// Database (schema) receiving one table per source
    #[arg(long, env = "VOCABULARIX_DB_SCHEMA", default_value = "")]
    db_schema: String,

    /// Records per insert statement
    #[arg(long, env = "VOCABULARIX_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Inserts allowed in flight per source
    #[arg(long, env = "VOCABULARIX_MAX_IN_FLIGHT", default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Capacity of the channels between pipeline stages
    #[arg(long, env = "VOCABULARIX_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "VOCABULARIX_CONNECT_TIMEOUT_SECS", default_value_t = 30)]
    connect_timeout_secs: u64,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn ingest_config(&self) -> IngestConfig {
        let mut connection = ConnectionParams::new(
            self.db_host.clone(),
            self.db_user.clone(),
            self.db_password.clone(),
            self.db_schema.clone(),
        );
        connection.port = self.db_port;

        IngestConfig {
            dry_run: self.dry_run,
            destination: self.destination.clone(),
            sink: self.sink,
            connection,
            pipeline: PipelineConfig {
                batch_size: self.batch_size,
                max_in_flight: self.max_in_flight,
                channel_capacity: self.channel_capacity,
                show_progress: !self.no_progress,
            },
            fetch: FetchConfig {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                ..FetchConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env_with_defaults(
        LogConfig::default().with_log_file_prefix("vocabularix-ingest"),
    )?;
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    let _guard = init_logging(&log_config)?;

    let config = cli.ingest_config();

    let sources = load_sources(&cli.sources)?;
    info!(
        sources = sources.len(),
        sink = %config.sink,
        dry_run = config.dry_run,
        "Starting n-gram ingestion"
    );

    let max_connections = u32::try_from(config.pipeline.max_in_flight).unwrap_or(u32::MAX);
    let sink = Sink::new(adapter_for(config.sink, max_connections));
    let mut sequencer = Sequencer::new(config, sink)?;

    let summary = sequencer
        .run(&sources)
        .await
        .context("Ingestion aborted")?;

    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "Ingestion complete"
    );
    Ok(())
}
