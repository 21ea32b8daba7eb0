//! Gzip inflate stage
//!
//! Compressed chunks are pushed through a write-side `MultiGzDecoder`, so
//! exports made of several concatenated gzip members come out as one
//! continuous stream. Whatever the decoder produced for a chunk is sent on
//! before the next chunk is read.

use crate::error::{IngestError, Result};
use bytes::Bytes;
use flate2::write::MultiGzDecoder;
use std::io::Write;
use tokio::sync::mpsc;

fn decode_error(e: std::io::Error) -> IngestError {
    IngestError::Decode(e.to_string())
}

/// Inflate everything from `rx` into `tx`, returning the inflated size
pub async fn inflate(mut rx: mpsc::Receiver<Bytes>, tx: mpsc::Sender<Bytes>) -> Result<u64> {
    let mut decoder = MultiGzDecoder::new(Vec::new());
    let mut inflated = 0u64;

    while let Some(chunk) = rx.recv().await {
        decoder.write_all(&chunk).map_err(decode_error)?;
        inflated += forward(&mut decoder, &tx).await?;
    }

    // Fails on a truncated member or an empty body
    let rest = decoder.finish().map_err(decode_error)?;
    inflated += send(rest, &tx).await?;

    Ok(inflated)
}

async fn forward(decoder: &mut MultiGzDecoder<Vec<u8>>, tx: &mpsc::Sender<Bytes>) -> Result<u64> {
    send(std::mem::take(decoder.get_mut()), tx).await
}

async fn send(out: Vec<u8>, tx: &mpsc::Sender<Bytes>) -> Result<u64> {
    if out.is_empty() {
        return Ok(0);
    }

    let len = out.len() as u64;
    tx.send(Bytes::from(out))
        .await
        .map_err(|_| IngestError::StageClosed("parse"))?;
    Ok(len)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    async fn run(compressed: Vec<u8>, chunk_size: usize) -> Result<Vec<u8>> {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(4);

        let feed = async move {
            for chunk in compressed.chunks(chunk_size) {
                // The decoder hangs up on corrupt input
                if in_tx.send(Bytes::copy_from_slice(chunk)).await.is_err() {
                    break;
                }
            }
        };
        let collect = async move {
            let mut out = Vec::new();
            while let Some(bytes) = out_rx.recv().await {
                out.extend_from_slice(&bytes);
            }
            out
        };

        let ((), inflated, out) = tokio::join!(feed, inflate(in_rx, out_tx), collect);
        let inflated = inflated?;
        assert_eq!(inflated, out.len() as u64);
        Ok(out)
    }

    #[tokio::test]
    async fn test_inflates_in_small_chunks() {
        let text = b"cat\t2000\t5\t3\ndog\t2001\t7\t2\n".repeat(200);
        let out = run(gzip(&text), 7).await.unwrap();
        assert_eq!(out, text);
    }

    #[tokio::test]
    async fn test_concatenated_members() {
        let mut compressed = gzip(b"cat\t2000\t5\t3\n");
        compressed.extend(gzip(b"dog\t2001\t7\t2\n"));

        let out = run(compressed, 16).await.unwrap();
        assert_eq!(out, b"cat\t2000\t5\t3\ndog\t2001\t7\t2\n");
    }

    #[tokio::test]
    async fn test_corrupt_stream_is_decode_error() {
        let err = run(b"this is not gzip at all".to_vec(), 8).await.unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_decode_error() {
        let mut compressed = gzip(&b"cat\t2000\t5\t3\n".repeat(50));
        compressed.truncate(compressed.len() / 2);

        let err = run(compressed, 32).await.unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }
}
