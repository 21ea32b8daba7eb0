//! HTTP fetch stage
//!
//! Issues one streaming GET per source and pumps the response body into the
//! pipeline chunk by chunk. A non-success status is treated the same as a
//! failed connection.

use crate::config::FetchConfig;
use crate::error::{IngestError, Result};
use crate::progress::Progress;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// HTTP client shared by every source of a run
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| IngestError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Send the request and wait for the response headers
    pub async fn fetch(&self, url: &str) -> Result<Download> {
        info!(url, "Downloading");
        let response = self.client.get(url).send().await?.error_for_status()?;
        debug!(
            url,
            status = %response.status(),
            content_length = ?response.content_length(),
            "Response received"
        );
        Ok(Download { response })
    }
}

/// An accepted response whose body has not been read yet
#[derive(Debug)]
pub struct Download {
    response: reqwest::Response,
}

impl Download {
    /// Advertised body length, if the server sent one
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Forward the body to `tx`, returning the number of bytes received
    pub async fn pump(self, tx: mpsc::Sender<Bytes>, progress: &Progress) -> Result<u64> {
        let mut stream = self.response.bytes_stream();
        let mut received = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            progress.add_bytes(chunk.len() as u64);

            tx.send(chunk)
                .await
                .map_err(|_| IngestError::StageClosed("decompress"))?;
        }

        Ok(received)
    }
}
