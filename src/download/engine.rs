use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use std::io;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DownloadProgress, FetchRequest, Fetcher, TransferSnapshot};
use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 8192;

/// Built-in downloader: streams the body to disk in fixed chunks
pub struct StreamingFetcher {
    client: Client,
    cancel: CancellationToken,
}

impl StreamingFetcher {
    pub fn new(cancel: CancellationToken) -> Result<Self> {
        // No overall timeout, large files take as long as they take
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(Duration::from_secs(60))
            .user_agent(concat!("rdebrid/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, cancel })
    }
}

#[async_trait]
impl Fetcher for StreamingFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mpsc::UnboundedSender<DownloadProgress>,
    ) -> Result<u64> {
        let output_path = request.output_path()?;
        let filename = request.safe_filename()?;

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(&request.url).send() => response
                .map_err(|e| Error::transfer(&request.url, e.to_string()))?,
        };

        if !response.status().is_success() {
            return Err(Error::transfer(
                &request.url,
                format!("HTTP request failed with status: {}", response.status()),
            ));
        }

        let total_bytes = response.content_length().unwrap_or(0);
        debug!(
            "Streaming {} ({} bytes declared) to {:?}",
            request.url, total_bytes, output_path
        );

        // Truncates any previous file with the same name
        let mut file = File::create(&output_path).await.map_err(|source| Error::Io {
            path: output_path.clone(),
            source,
        })?;

        let mut reader = std::pin::pin!(StreamReader::new(
            response.bytes_stream().map_err(io::Error::other)
        ));
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut downloaded: u64 = 0;

        loop {
            let bytes_read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                read = reader.read(&mut buffer) => read
                    .map_err(|e| Error::transfer(&request.url, e.to_string()))?,
            };
            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read])
                .await
                .map_err(|source| Error::Io {
                    path: output_path.clone(),
                    source,
                })?;
            downloaded += bytes_read as u64;

            let _ = progress.send(DownloadProgress::Transfer {
                filename: filename.clone(),
                snapshot: TransferSnapshot {
                    bytes_downloaded: downloaded,
                    total_bytes,
                },
            });
        }

        file.flush().await.map_err(|source| Error::Io {
            path: output_path.clone(),
            source,
        })?;

        Ok(downloaded)
    }

    fn name(&self) -> &'static str {
        "built-in"
    }
}
