use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DownloadProgress, FetchRequest, Fetcher};
use crate::error::{Error, Result};

pub const DEFAULT_CONNECTIONS: u8 = 16;
pub const DEFAULT_MIN_SPLIT_SIZE: &str = "1M";

/// Delegates the transfer to aria2c, which draws its own progress
pub struct ExternalProcessFetcher {
    binary: PathBuf,
    connections: u8,
    min_split_size: String,
    cancel: CancellationToken,
}

impl ExternalProcessFetcher {
    pub fn new(binary: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            binary: binary.into(),
            connections: DEFAULT_CONNECTIONS,
            min_split_size: DEFAULT_MIN_SPLIT_SIZE.to_string(),
            cancel,
        }
    }

    pub fn with_connections(mut self, connections: u8) -> Self {
        self.connections = connections;
        self
    }

    pub fn with_min_split_size(mut self, min_split_size: impl Into<String>) -> Self {
        self.min_split_size = min_split_size.into();
        self
    }

    pub fn arguments(&self, request: &FetchRequest) -> Result<Vec<String>> {
        Ok(vec![
            "--file-allocation=none".to_string(),
            format!("--max-connection-per-server={}", self.connections),
            format!("--split={}", self.connections),
            format!("--min-split-size={}", self.min_split_size),
            "--summary-interval=0".to_string(),
            format!("--dir={}", request.output_dir.display()),
            format!("--out={}", request.safe_filename()?),
            request.url.clone(),
        ])
    }
}

#[async_trait]
impl Fetcher for ExternalProcessFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        _progress: &mpsc::UnboundedSender<DownloadProgress>,
    ) -> Result<u64> {
        let args = self.arguments(request)?;
        debug!("Running {:?} {:?}", self.binary, args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::transfer(
                    &request.url,
                    format!("failed to start {}: {}", self.binary.display(), e),
                )
            })?;

        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(Error::Cancelled);
            }
            status = child.wait() => status
                .map_err(|e| Error::transfer(&request.url, e.to_string()))?,
        };

        if !status.success() {
            return Err(Error::transfer(
                &request.url,
                format!("{} exited with {}", self.binary.display(), status),
            ));
        }

        let bytes = tokio::fs::metadata(request.output_path()?)
            .await
            .map(|metadata| metadata.len())
            .unwrap_or(0);
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "aria2c"
    }
}
