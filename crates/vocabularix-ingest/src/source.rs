//! Remote n-gram sources
//!
//! A source is one compressed export such as
//! `http://storage.googleapis.com/books/ngrams/books/googlebooks-eng-all-1gram-20120701-a.gz`.
//! Its table and mirror file are both named after the last path segment
//! with the `.gz` suffix removed.

use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

const COMPRESSION_SUFFIX: &str = ".gz";
const MIRROR_EXTENSION: &str = "json";

/// One remote dataset to ingest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct Source {
    url: String,
    name: String,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = derive_name(&url);
        Self { url, name }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Destination table name
    pub fn table_name(&self) -> &str {
        &self.name
    }

    /// File name of the local JSON lines mirror
    pub fn mirror_file_name(&self) -> String {
        format!("{}.{}", self.name, MIRROR_EXTENSION)
    }

    pub fn mirror_path(&self, destination: &Path) -> PathBuf {
        destination.join(self.mirror_file_name())
    }
}

impl From<String> for Source {
    fn from(url: String) -> Self {
        Source::new(url)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn derive_name(url: &str) -> String {
    // Query strings and fragments are not part of the file name
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let basename = path.rsplit('/').next().unwrap_or(path);
    basename
        .strip_suffix(COMPRESSION_SUFFIX)
        .unwrap_or(basename)
        .to_string()
}

/// Read the ordered source list, a JSON array of URL strings
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        IngestError::Configuration(format!(
            "Failed to read source list {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_sources(&raw).map_err(|e| {
        IngestError::Configuration(format!(
            "Source list {} is not a JSON array of URLs: {}",
            path.display(),
            e
        ))
    })
}

fn parse_sources(raw: &str) -> serde_json::Result<Vec<Source>> {
    serde_json::from_str(raw)
}
