//! Tab separated record parser
//!
//! The inflated byte stream is read as TSV with `csv-async`. Quote
//! characters are ordinary data in n-gram exports, fields are trimmed, and
//! blank lines are skipped. Every other line must carry exactly four fields.

use crate::error::{IngestError, Result};
use crate::record::{Record, FIELD_COUNT};
use bytes::Bytes;
use csv_async::{AsyncReaderBuilder, Trim};
use futures::{StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Parse lines from `rx` into records sent to `tx`, returning the count
pub async fn parse(rx: mpsc::Receiver<Bytes>, tx: mpsc::Sender<Record>) -> Result<u64> {
    let reader = ReceiverStream::new(rx)
        .map(Ok::<Bytes, std::io::Error>)
        .into_async_read();

    let records = AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .create_reader(reader)
        .into_records();
    tokio::pin!(records);

    let mut parsed = 0u64;
    let mut last_line = 0u64;

    while let Some(row) = records.next().await {
        let row = row.map_err(|e| IngestError::Parse {
            line: last_line + 1,
            message: e.to_string(),
        })?;
        let line = row.position().map_or(last_line + 1, |p| p.line());
        last_line = line;

        // Whitespace-only lines trim down to one empty field
        if row.len() == 1 && row.get(0).is_some_and(str::is_empty) {
            continue;
        }

        let record = Record::from_fields(row.iter()).ok_or_else(|| IngestError::Parse {
            line,
            message: format!("expected {} fields, found {}", FIELD_COUNT, row.len()),
        })?;

        tx.send(record)
            .await
            .map_err(|_| IngestError::StageClosed("batch"))?;
        parsed += 1;
    }

    Ok(parsed)
}
