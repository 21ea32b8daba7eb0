//! Shared helpers for pipeline integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use vocabularix_ingest::{ConnectionParams, IngestConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Gzip a TSV body the way the exports are published
pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// `count` well-formed lines: `w<i> TAB 2000 TAB <i> TAB 1`
pub fn ngram_lines(count: usize) -> String {
    (0..count)
        .map(|i| format!("w{i}\t2000\t{i}\t1\n"))
        .collect()
}

/// Serve `body` at `/<file>` and return the full URL
pub async fn serve(server: &MockServer, file: &str, body: Vec<u8>) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/{file}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
    format!("{}/{}", server.uri(), file)
}

/// Answer `/<file>` with a bare status code
pub async fn serve_status(server: &MockServer, file: &str, status: u16) -> String {
    Mock::given(method("GET"))
        .and(path(format!("/{file}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
    format!("{}/{}", server.uri(), file)
}

/// Serve one request for `/<file>` that advertises all of `body` but hangs up
/// after the first half
pub async fn serve_cut_short(file: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body[..body.len() / 2]).await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{addr}/{file}")
}

/// Config writing mirrors under `destination`, progress bars off
pub fn test_config(destination: &Path) -> IngestConfig {
    let mut config = IngestConfig {
        destination: destination.to_path_buf(),
        connection: ConnectionParams::new("localhost", "ngram", "secret", "vocabularix"),
        ..IngestConfig::default()
    };
    config.pipeline.show_progress = false;
    config
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
