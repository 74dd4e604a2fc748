pub mod engine;
pub mod external;
pub mod manager;
pub mod progress;
pub mod torrent;

pub use engine::StreamingFetcher;
pub use external::ExternalProcessFetcher;
pub use manager::{DownloadManager, DownloadOptions};
pub use progress::{BAR_WIDTH, DownloadProgress, ProgressTracker, TransferSnapshot};
pub use torrent::{Sleeper, TokioSleeper, TorrentPoller};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

const MAGNET_PREFIX: &str = "magnet:";

/// A user supplied input, tagged once by prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkItem {
    DirectLink(String),
    Magnet(String),
}

impl LinkItem {
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.starts_with(MAGNET_PREFIX) {
            Self::Magnet(raw)
        } else {
            Self::DirectLink(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DirectLink(link) | Self::Magnet(link) => link,
        }
    }

    pub fn is_magnet(&self) -> bool {
        matches!(self, Self::Magnet(_))
    }
}

/// Everything a fetcher needs to put one file on disk
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub filename: String,
    pub output_dir: PathBuf,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, filename: impl Into<String>, output_dir: &Path) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// File name reduced to its last component so it always lands inside `output_dir`
    pub fn safe_filename(&self) -> Result<String> {
        Path::new(self.filename.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::transfer(&self.url, format!("unusable filename '{}'", self.filename))
            })
    }

    pub fn output_path(&self) -> Result<PathBuf> {
        Ok(self.output_dir.join(self.safe_filename()?))
    }
}

/// Puts the bytes behind a URL into a file
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the number of bytes written
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mpsc::UnboundedSender<DownloadProgress>,
    ) -> Result<u64>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub succeeded: bool,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub item: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: DownloadOutcome) {
        if outcome.succeeded {
            self.succeeded += 1;
            self.bytes_written += outcome.bytes_written;
        } else {
            self.failed += 1;
        }
    }

    pub fn record_failure(&mut self, item: &str, reason: impl Into<String>) {
        self.record(DownloadOutcome {
            succeeded: false,
            bytes_written: 0,
        });
        self.failures.push(Failure {
            item: item.to_string(),
            reason: reason.into(),
        });
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
