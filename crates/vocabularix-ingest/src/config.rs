//! Ingestion configuration
//!
//! Everything a run needs besides the source list: where mirror files go,
//! how the pipeline is sized, how the sink is reached.

use crate::error::{IngestError, Result};
use crate::record::FIELD_COUNT;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default number of records per insert statement
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of inserts allowed in flight for one source
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Default capacity of the channels between pipeline stages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Upper bound on bind parameters in one statement (Postgres and MySQL both
/// cap a prepared statement at 65535)
const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;

/// Which relational store backs the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    #[default]
    Postgres,
    Mysql,
}

impl SinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SinkKind::Postgres => "postgres",
            SinkKind::Mysql => "mysql",
        }
    }
}

impl FromStr for SinkKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(SinkKind::Postgres),
            "mysql" | "mariadb" => Ok(SinkKind::Mysql),
            other => Err(IngestError::Configuration(format!("Unknown sink '{}'", other))),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection details for the sink
#[derive(Clone, Default)]
pub struct ConnectionParams {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    /// Database (schema) holding one table per source
    pub schema: String,
}

impl ConnectionParams {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: user.into(),
            password: password.into(),
            schema: schema.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// All four of host, user, password and schema are required
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("host", &self.host),
            ("user", &self.user),
            ("password", &self.password),
            ("schema", &self.schema),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::Configuration(format!(
                "Invalid connection details, missing: {}",
                missing.join(", ")
            )))
        }
    }
}

// The password never reaches logs
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"XXXXXX")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Sizing of the per-source pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub channel_capacity: usize,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::Configuration(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.batch_size * FIELD_COUNT > MAX_BIND_PARAMETERS {
            return Err(IngestError::Configuration(format!(
                "Batch size {} exceeds the {} rows a single insert can bind",
                self.batch_size,
                MAX_BIND_PARAMETERS / FIELD_COUNT
            )));
        }
        if self.max_in_flight == 0 {
            return Err(IngestError::Configuration(
                "In-flight insert limit must be greater than 0".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(IngestError::Configuration(
                "Channel capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("vocabularix-ingest/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Full configuration of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Narrate the run without touching the network, disk or database
    pub dry_run: bool,
    /// Directory receiving one JSON lines mirror per source
    pub destination: PathBuf,
    pub sink: SinkKind,
    pub connection: ConnectionParams,
    pub pipeline: PipelineConfig,
    pub fetch: FetchConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            destination: PathBuf::from("assets/google-ngram"),
            sink: SinkKind::default(),
            connection: ConnectionParams::default(),
            pipeline: PipelineConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Connection details are only required when the sink will be used
    pub fn validate(&self) -> Result<()> {
        if !self.dry_run {
            self.connection.validate()?;
        }
        self.pipeline.validate()?;
        if self.fetch.connect_timeout.is_zero() {
            return Err(IngestError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
