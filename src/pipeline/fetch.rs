//! Dataset archive download and extraction

use std::io::{self, Cursor};
use std::path::Path;
use std::time::Duration;

use zip::ZipArchive;

use crate::config::{table_path, PipelineConfig};
use crate::error::{PipelineError, Result};

/// Something that can hand back the bytes of a zip archive for a URL.
pub trait ArchiveSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP source backed by `reqwest`.
pub struct HttpArchiveSource {
    client: reqwest::blocking::Client,
}

impl HttpArchiveSource {
    pub fn new() -> Result<Self> {
        // The Kaggle archive is large; allow plenty of time for the body.
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60 * 60))
            .build()
            .map_err(|e| PipelineError::Download {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl ArchiveSource for HttpArchiveSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let download_error = |reason: String| PipelineError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP status {}", status)));
        }

        let body = response
            .bytes()
            .map_err(|e| download_error(format!("failed to read response body: {}", e)))?;
        Ok(body.to_vec())
    }
}

/// What the fetch stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every manifest file was already present; nothing was downloaded.
    Cached,
    /// The archive was downloaded and its members extracted.
    Downloaded { members: usize },
}

/// Download and extract the archive unless every expected file already
/// exists under `destination`.
///
/// Extraction is not rolled back on failure: a partially populated
/// directory fails the next existence check and triggers a full download.
pub fn download_extract_zip<'a, S, I>(
    source: &S,
    url: &str,
    destination: &Path,
    expected: I,
) -> Result<FetchOutcome>
where
    S: ArchiveSource + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let missing: Vec<&str> = expected
        .into_iter()
        .filter(|name| !table_path(destination, name).exists())
        .collect();

    if missing.is_empty() {
        tracing::info!(destination = %destination.display(), "Raw files present, skipping download");
        return Ok(FetchOutcome::Cached);
    }

    tracing::info!(url, missing = missing.len(), "Downloading dataset archive");
    let bytes = source.fetch(url)?;
    tracing::debug!(bytes = bytes.len(), "Archive downloaded");

    let members = extract_archive(bytes, destination)?;
    tracing::info!(members, destination = %destination.display(), "Archive extracted");

    Ok(FetchOutcome::Downloaded { members })
}

/// Run the fetch stage for a configured pipeline.
pub fn fetch_dataset<S>(config: &PipelineConfig, source: &S) -> Result<FetchOutcome>
where
    S: ArchiveSource + ?Sized,
{
    download_extract_zip(
        source,
        &config.zip_file_url,
        &config.raw_root,
        config.manifest.names(),
    )
}

/// Verify every member's checksum, then extract all members into `destination`.
fn extract_archive(bytes: Vec<u8>, destination: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::Extraction(format!("unreadable archive: {}", e)))?;

    if let Some(corrupt) = first_corrupt_member(&mut archive)? {
        return Err(PipelineError::Extraction(format!(
            "corrupt archive member '{}'",
            corrupt
        )));
    }

    std::fs::create_dir_all(destination).map_err(|e| PipelineError::io(destination, e))?;

    let members = archive.len();
    archive
        .extract(destination)
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;

    Ok(members)
}

/// Read every member to the end so the CRC32 of each one is checked.
fn first_corrupt_member<R: io::Read + io::Seek>(archive: &mut ZipArchive<R>) -> Result<Option<String>> {
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|e| PipelineError::Extraction(format!("member {}: {}", index, e)))?;
        let name = member.name().to_string();

        if let Err(e) = io::copy(&mut member, &mut io::sink()) {
            tracing::warn!(member = %name, error = %e, "Archive member failed integrity check");
            return Ok(Some(name));
        }
    }
    Ok(None)
}
