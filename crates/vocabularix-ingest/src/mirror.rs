//! Local JSON lines mirror
//!
//! Each source gets `<destination>/<name>.json` holding one JSON array per
//! record, in the order records were accepted. The file is only complete
//! once the pipeline succeeded; on failure it is removed.

use crate::error::{IngestError, Result};
use crate::record::Record;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffered writer for one source's mirror file
#[derive(Debug)]
pub struct MirrorWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl MirrorWriter {
    /// Create (or truncate) the mirror file, creating its directory if needed
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::mirror(parent, e))?;
        }

        let file = File::create(path)
            .await
            .map_err(|e| IngestError::mirror(path, e))?;
        debug!(path = %path.display(), "Mirror file created");

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append every record from `rx`, flush, and return the line count
    pub async fn write_all(mut self, mut rx: mpsc::Receiver<Record>) -> Result<u64> {
        let mut written = 0u64;
        let mut line = Vec::with_capacity(128);

        while let Some(record) = rx.recv().await {
            line.clear();
            serde_json::to_writer(&mut line, &record)
                .map_err(|e| IngestError::mirror(&self.path, e.into()))?;
            line.push(b'\n');

            self.writer
                .write_all(&line)
                .await
                .map_err(|e| IngestError::mirror(&self.path, e))?;
            written += 1;
        }

        self.writer
            .flush()
            .await
            .map_err(|e| IngestError::mirror(&self.path, e))?;
        Ok(written)
    }
}

/// Delete a partial mirror file; a file that was never created is fine
pub async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial mirror file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial mirror file"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_one_json_array_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("eng-1gram-a.json");

        let writer = MirrorWriter::create(&path).await.unwrap();
        let (tx, rx) = mpsc::channel(4);
        tx.send(Record::new("cat", "2000", "5", "3")).await.unwrap();
        tx.send(Record::new("dog", "2001", "7", "2")).await.unwrap();
        drop(tx);

        assert_eq!(writer.write_all(rx).await.unwrap(), 2);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "[\"cat\",\"2000\",\"5\",\"3\"]\n[\"dog\",\"2001\",\"7\",\"2\"]\n");
    }

    #[tokio::test]
    async fn test_create_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eng-1gram-b.json");
        std::fs::write(&path, "stale\n").unwrap();

        let writer = MirrorWriter::create(&path).await.unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        assert_eq!(writer.write_all(rx).await.unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_remove_partial_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created.json");
        remove_partial(&path).await;

        std::fs::write(&path, "partial").unwrap();
        remove_partial(&path).await;
        assert!(!path.exists());
    }
}
