use futures_util::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::torrent::DEFAULT_POLL_INTERVAL;
use super::{
    DownloadOutcome, DownloadProgress, FetchRequest, Fetcher, LinkItem, RunSummary, Sleeper,
    TorrentPoller,
};
use crate::debrid::{TorrentJob, TorrentService, TorrentStatus, UnlockResult, UnlockService};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_directory: PathBuf,
    pub poll_interval: Duration,
    /// Give up on a torrent after this much waiting; `None` waits forever
    pub max_poll_wait: Option<Duration>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_wait: Some(Duration::from_secs(6 * 60 * 60)),
        }
    }
}

/// Runs a batch of links and magnets, one item at a time
pub struct DownloadManager {
    unlocker: Arc<dyn UnlockService>,
    torrents: Arc<dyn TorrentService>,
    fetcher: Arc<dyn Fetcher>,
    poller: TorrentPoller,
    options: DownloadOptions,
    cancel: CancellationToken,
    progress_sender: mpsc::UnboundedSender<DownloadProgress>,
}

impl DownloadManager {
    pub fn new(
        unlocker: Arc<dyn UnlockService>,
        torrents: Arc<dyn TorrentService>,
        fetcher: Arc<dyn Fetcher>,
        sleeper: Arc<dyn Sleeper>,
        options: DownloadOptions,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<DownloadProgress>) {
        let (progress_sender, progress_receiver) = mpsc::unbounded_channel();
        let poller = TorrentPoller::new(Arc::clone(&torrents), sleeper, cancel.clone())
            .with_interval(options.poll_interval)
            .with_max_wait(options.max_poll_wait);

        (
            Self {
                unlocker,
                torrents,
                fetcher,
                poller,
                options,
                cancel,
                progress_sender,
            },
            progress_receiver,
        )
    }

    /// Processes every direct link, then every magnet, each in input order.
    ///
    /// Item failures are recorded in the summary and never stop the batch;
    /// only fatal errors (rejected credentials, cancellation) are returned.
    pub async fn run(&self, inputs: &[String]) -> Result<RunSummary> {
        let (magnets, links): (Vec<LinkItem>, Vec<LinkItem>) = inputs
            .iter()
            .map(|raw| LinkItem::classify(raw.as_str()))
            .partition(LinkItem::is_magnet);

        tokio::fs::create_dir_all(&self.options.output_directory)
            .await
            .map_err(|source| Error::Io {
                path: self.options.output_directory.clone(),
                source,
            })?;

        info!(
            "Processing {} link(s) and {} magnet(s) with the {} downloader",
            links.len(),
            magnets.len(),
            self.fetcher.name()
        );
        self.emit(DownloadProgress::Plan {
            links: links.len(),
            magnets: magnets.len(),
            output_dir: self.options.output_directory.clone(),
        });

        let mut summary = RunSummary::default();

        for link in &links {
            match self.handle_link(link.as_str()).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => self.item_failed(&mut summary, link.as_str(), e)?,
            }
        }

        for magnet in &magnets {
            if let Err(e) = self.handle_magnet(magnet.as_str(), &mut summary).await {
                self.item_failed(&mut summary, magnet.as_str(), e)?;
            }
        }

        self.emit(DownloadProgress::Finished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    async fn handle_link(&self, link: &str) -> Result<DownloadOutcome> {
        self.emit(DownloadProgress::Unlocking {
            link: link.to_string(),
        });
        let unlocked = self.cancellable(self.unlocker.unlock(link)).await?;
        self.fetch(&unlocked).await
    }

    async fn handle_magnet(&self, magnet: &str, summary: &mut RunSummary) -> Result<()> {
        self.emit(DownloadProgress::AddingMagnet {
            magnet: magnet.to_string(),
        });

        let id = self.cancellable(self.torrents.submit_magnet(magnet)).await?;
        self.cancellable(self.torrents.select_all_files(&id)).await?;

        let job = self.wait_for_torrent(&id).await?;
        self.emit(DownloadProgress::TorrentReady {
            id: id.clone(),
            files: job.result_links.len(),
        });

        // One bad result link must not cost the torrent's other files
        for link in &job.result_links {
            match self.handle_link(link).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => self.item_failed(summary, link, e)?,
            }
        }
        Ok(())
    }

    async fn wait_for_torrent(&self, id: &str) -> Result<TorrentJob> {
        let mut snapshots = pin!(self.poller.snapshots(id));
        let mut last = None;

        while let Some(snapshot) = snapshots.next().await {
            let job = snapshot?;
            self.emit(DownloadProgress::TorrentStatus {
                id: job.id.clone(),
                filename: job.filename.clone(),
                status: job.status.clone(),
                progress_percent: job.progress_percent,
                speed_bps: job.speed_bytes_per_sec,
            });
            last = Some(job);
        }

        match last {
            Some(job) if job.status.is_success() => Ok(job),
            Some(job) => Err(Error::TorrentFailed {
                id: id.to_string(),
                status: job.status,
            }),
            None => Err(Error::TorrentFailed {
                id: id.to_string(),
                status: TorrentStatus::Other("unknown".to_string()),
            }),
        }
    }

    async fn fetch(&self, unlocked: &UnlockResult) -> Result<DownloadOutcome> {
        self.emit(DownloadProgress::Downloading {
            filename: unlocked.filename.clone(),
            size_bytes: unlocked.filesize_bytes,
        });

        let request = FetchRequest::new(
            &unlocked.download_url,
            &unlocked.filename,
            &self.options.output_directory,
        );
        let bytes_written = self.fetcher.fetch(&request, &self.progress_sender).await?;

        self.emit(DownloadProgress::Completed {
            filename: unlocked.filename.clone(),
            bytes_written,
        });
        Ok(DownloadOutcome {
            succeeded: true,
            bytes_written,
        })
    }

    /// Records an item failure, or hands a fatal error back to the caller
    fn item_failed(&self, summary: &mut RunSummary, item: &str, error: Error) -> Result<()> {
        if error.is_fatal() {
            return Err(error);
        }
        debug!("{} failed: {:?}", item, error);
        self.emit(DownloadProgress::Failed {
            item: item.to_string(),
            error: error.to_string(),
        });
        summary.record_failure(item, error.to_string());
        Ok(())
    }

    async fn cancellable<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = operation => result,
        }
    }

    fn emit(&self, event: DownloadProgress) {
        // Nobody listening is fine, e.g. in tests
        let _ = self.progress_sender.send(event);
    }
}
