//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::cell::Cell;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use creditpipe::config::{Manifest, PipelineConfig, Relation};
use creditpipe::pipeline::ArchiveSource;
use creditpipe::{PipelineError, Result};
use polars::prelude::*;
use tempfile::TempDir;
use ::zip::write::SimpleFileOptions;
use ::zip::ZipWriter;

/// Config rooted in a fresh temp dir: `<tmp>/raw` and `<tmp>/processed`.
pub fn temp_config() -> (TempDir, PipelineConfig) {
    let temp_dir = TempDir::new().unwrap();
    let config = PipelineConfig::new(
        "http://example.test/home-credit.zip",
        temp_dir.path().join("raw"),
        temp_dir.path().join("processed"),
        Manifest::kaggle_defaults(),
    );
    (temp_dir, config)
}

/// Same as [`temp_config`] with a small relation chain for merge tests.
pub fn temp_merge_config(relations: Vec<Relation>) -> (TempDir, PipelineConfig) {
    let (temp_dir, mut config) = temp_config();
    config.base_file = "base".to_string();
    config.relations = relations;
    (temp_dir, config)
}

/// Write `df` as CSV, creating parent directories.
pub fn write_csv(path: &Path, df: &mut DataFrame) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

/// Write a tiny CSV for every manifest file under `root`.
pub fn populate_tables(config: &PipelineConfig, root: &Path) {
    for name in config.manifest.names() {
        let mut df = df! {
            "SK_ID_CURR" => [1i64, 2],
            "VALUE" => [10.0f64, 20.0],
        }
        .unwrap();
        write_csv(&creditpipe::config::table_path(root, name), &mut df);
    }
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");
    write_csv(&csv_path, df);
    (temp_dir, csv_path)
}

/// Zip archive in memory, members stored uncompressed.
pub fn zip_archive(members: &[(String, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in members {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Archive holding one small CSV per manifest file.
pub fn manifest_archive(config: &PipelineConfig) -> Vec<u8> {
    let members: Vec<(String, String)> = config
        .manifest
        .names()
        .map(|name| (format!("{}.csv", name), "SK_ID_CURR,VALUE\n1,10\n2,20\n".to_string()))
        .collect();
    zip_archive(&members)
}

/// Archive source that serves fixed bytes and counts calls.
pub struct CountingSource {
    body: Vec<u8>,
    pub calls: Cell<usize>,
}

impl CountingSource {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            calls: Cell::new(0),
        }
    }
}

impl ArchiveSource for CountingSource {
    fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.body.clone())
    }
}

/// Archive source that always answers like a failed HTTP request.
pub struct FailingSource {
    pub status: u16,
}

impl ArchiveSource for FailingSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(PipelineError::Download {
            url: url.to_string(),
            reason: format!("HTTP status {}", self.status),
        })
    }
}

/// Serve `response` verbatim to the first connection on a local port.
///
/// Returns the URL to request and the thread serving it.
pub fn serve_once(response: impl Into<Vec<u8>>) -> (String, std::thread::JoinHandle<()>) {
    let response: Vec<u8> = response.into();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/home-credit.zip", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        // Drain the request head before answering
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        let mut stream = stream;
        stream.write_all(&response).unwrap();
        stream.flush().unwrap();
    });
    (url, handle)
}

/// URL of a local port with nothing listening on it.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/home-credit.zip", addr)
}

/// Two well-separated gaussian-ish clusters with a binary target.
///
/// Deterministic: features are built from a fixed linear congruential sequence.
pub fn create_classification_dataframe(rows: usize) -> DataFrame {
    let mut state: u64 = 12345;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
    };

    let mut target = Vec::with_capacity(rows);
    let mut f1 = Vec::with_capacity(rows);
    let mut f2 = Vec::with_capacity(rows);
    let mut noise = Vec::with_capacity(rows);
    for i in 0..rows {
        let label = if i % 3 == 0 { 1i32 } else { 0 };
        let shift = if label == 1 { 1.5 } else { -1.5 };
        target.push(label);
        f1.push(shift + next());
        f2.push(shift * 0.5 + next());
        noise.push(next());
    }

    df! {
        "TARGET" => target,
        "f1" => f1,
        "f2" => f2,
        "noise" => noise,
    }
    .unwrap()
}
