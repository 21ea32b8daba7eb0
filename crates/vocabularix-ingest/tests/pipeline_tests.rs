//! End-to-end tests for the per-source pipeline
//!
//! A wiremock server publishes gzip TSV exports; the in-memory sink records
//! what was inserted and tempdirs receive the mirror files.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{
    gzip, ngram_lines, read_lines, serve, serve_cut_short, serve_status, test_config,
};
use std::time::Duration;
use vocabularix_ingest::fetcher::Fetcher;
use vocabularix_ingest::pipeline::run_source;
use vocabularix_ingest::sink::MemoryAdapter;
use vocabularix_ingest::{ConnectionParams, IngestError, Record, Sink, Source};
use wiremock::MockServer;

async fn sink_with_table(adapter: &MemoryAdapter, table: &str) -> Sink {
    let mut sink = Sink::new(Box::new(adapter.clone()));
    sink.connect(&ConnectionParams::default()).await.unwrap();
    sink.recreate_table(table).await.unwrap();
    sink
}

#[tokio::test]
async fn test_batches_and_mirror_follow_line_order() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "eng-1gram-a.gz",
        gzip("cat\t2000\t5\t3\ndog\t2001\t7\t2\n"),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.pipeline.batch_size = 1;

    let adapter = MemoryAdapter::new();
    let sink = sink_with_table(&adapter, "eng-1gram-a").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();
    let source = Source::new(url);

    let stats = run_source(&source, &sink, &fetcher, &config).await.unwrap();

    assert_eq!(stats.records, 2);
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.bytes_inflated, 26);
    assert_eq!(adapter.batch_sizes(), vec![1, 1]);
    assert_eq!(
        adapter.rows("eng-1gram-a").unwrap(),
        vec![
            Record::new("cat", "2000", "5", "3"),
            Record::new("dog", "2001", "7", "2"),
        ]
    );
    assert_eq!(
        read_lines(&dir.path().join("eng-1gram-a.json")),
        vec![r#"["cat","2000","5","3"]"#, r#"["dog","2001","7","2"]"#]
    );
}

#[tokio::test]
async fn test_large_source_flushes_trailing_batch() {
    let server = MockServer::start().await;
    let url = serve(&server, "eng-1gram-b.gz", gzip(&ngram_lines(1_234))).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let adapter = MemoryAdapter::new();
    let sink = sink_with_table(&adapter, "eng-1gram-b").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let stats = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap();

    let sizes = adapter.batch_sizes();
    assert_eq!(stats.records, 1_234);
    assert_eq!(sizes.len(), 13);
    assert!(sizes.iter().all(|&size| size <= 100));
    assert_eq!(sizes.iter().sum::<usize>(), 1_234);
    assert_eq!(adapter.rows("eng-1gram-b").unwrap().len(), 1_234);
    assert_eq!(read_lines(&dir.path().join("eng-1gram-b.json")).len(), 1_234);
}

#[tokio::test]
async fn test_blank_lines_do_not_become_records() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "eng-1gram-c.gz",
        gzip("\ncat \t2000\t5\t3\n\n   \ndog\t 2001\t7\t2\n\n"),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let adapter = MemoryAdapter::new();
    let sink = sink_with_table(&adapter, "eng-1gram-c").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let stats = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap();

    assert_eq!(stats.records, 2);
    assert_eq!(
        read_lines(&dir.path().join("eng-1gram-c.json")),
        vec![r#"["cat","2000","5","3"]"#, r#"["dog","2001","7","2"]"#]
    );
}

#[tokio::test]
async fn test_malformed_line_removes_mirror() {
    let server = MockServer::start().await;
    let mut body = ngram_lines(500);
    body.push_str("broken\tline\n");
    let url = serve(&server, "eng-1gram-d.gz", gzip(&body)).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let adapter = MemoryAdapter::new();
    let sink = sink_with_table(&adapter, "eng-1gram-d").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let err = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap_err();

    match err {
        IngestError::Parse { line, .. } => assert_eq!(line, 501),
        other => panic!("expected a parse error, got {other}"),
    }
    assert!(!dir.path().join("eng-1gram-d.json").exists());
}

#[tokio::test]
async fn test_corrupt_gzip_removes_mirror() {
    let server = MockServer::start().await;
    let mut body = gzip(&ngram_lines(200));
    let middle = body.len() / 2;
    body[middle..].iter_mut().for_each(|b| *b = !*b);
    let url = serve(&server, "eng-1gram-e.gz", body).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let adapter = MemoryAdapter::new();
    let sink = sink_with_table(&adapter, "eng-1gram-e").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let err = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap_err();

    assert!(!err.is_fatal());
    assert!(!dir.path().join("eng-1gram-e.json").exists());
}

#[tokio::test]
async fn test_http_error_removes_mirror() {
    let server = MockServer::start().await;
    let url = serve_status(&server, "eng-1gram-f.gz", 503).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let adapter = MemoryAdapter::new();
    let sink = sink_with_table(&adapter, "eng-1gram-f").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let err = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "transport");
    assert!(!dir.path().join("eng-1gram-f.json").exists());
    assert_eq!(adapter.rows("eng-1gram-f"), Some(vec![]));
}

#[tokio::test]
async fn test_connection_dropped_mid_body_removes_mirror() {
    let url = serve_cut_short("eng-1gram-i.gz", gzip(&ngram_lines(20_000))).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let adapter = MemoryAdapter::new();
    let sink = sink_with_table(&adapter, "eng-1gram-i").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let err = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "transport");
    assert!(!dir.path().join("eng-1gram-i.json").exists());
    assert!(adapter.rows("eng-1gram-i").unwrap().len() < 20_000);
}

#[tokio::test]
async fn test_write_failure_removes_mirror() {
    let server = MockServer::start().await;
    let url = serve(&server, "eng-1gram-g.gz", gzip(&ngram_lines(50))).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let adapter = MemoryAdapter::new().fail_inserts("eng-1gram-g");
    let sink = sink_with_table(&adapter, "eng-1gram-g").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let err = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "write");
    assert!(!dir.path().join("eng-1gram-g.json").exists());
}

#[tokio::test]
async fn test_slow_sink_keeps_inserts_bounded() {
    let server = MockServer::start().await;
    let url = serve(&server, "eng-1gram-h.gz", gzip(&ngram_lines(300))).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.pipeline.batch_size = 10;
    config.pipeline.max_in_flight = 4;
    config.pipeline.channel_capacity = 2;

    let adapter = MemoryAdapter::new().with_insert_latency(Duration::from_millis(5));
    let sink = sink_with_table(&adapter, "eng-1gram-h").await;
    let fetcher = Fetcher::new(&config.fetch).unwrap();

    let stats = run_source(&Source::new(url), &sink, &fetcher, &config)
        .await
        .unwrap();

    assert_eq!(stats.records, 300);
    assert_eq!(adapter.rows("eng-1gram-h").unwrap().len(), 300);
    assert!(adapter.max_inserts_in_flight() <= 4);
}
