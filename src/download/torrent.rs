use async_trait::async_trait;
use futures_util::Stream;
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::debrid::{TorrentJob, TorrentService};
use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Source of the pause between two status polls
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

enum PollState {
    First,
    Waiting { waited: Duration },
    Done,
}

/// Drives a submitted torrent until the service reports a terminal status
pub struct TorrentPoller {
    service: Arc<dyn TorrentService>,
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
    /// `None` polls forever
    max_wait: Option<Duration>,
    cancel: CancellationToken,
}

impl TorrentPoller {
    pub fn new(
        service: Arc<dyn TorrentService>,
        sleeper: Arc<dyn Sleeper>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            sleeper,
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
            cancel,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    async fn poll_once(&self, id: &str) -> Result<TorrentJob> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            job = self.service.poll(id) => job,
        }
    }

    async fn pause(&self) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = self.sleeper.sleep(self.interval) => Ok(()),
        }
    }

    /// Lazy sequence of status snapshots.
    ///
    /// Yields one item per poll and sleeps once between two non-terminal
    /// snapshots. The stream ends right after the first terminal snapshot or
    /// the first error, so a finished job is never polled again.
    pub fn snapshots<'a>(&'a self, id: &'a str) -> impl Stream<Item = Result<TorrentJob>> + 'a {
        stream::unfold(PollState::First, move |state| async move {
            let waited = match state {
                PollState::Done => return None,
                PollState::First => Duration::ZERO,
                PollState::Waiting { waited } => {
                    let waited = waited + self.interval;
                    if self.max_wait.is_some_and(|max| waited > max) {
                        return Some((
                            Err(Error::PollTimeout {
                                id: id.to_string(),
                                waited: waited - self.interval,
                            }),
                            PollState::Done,
                        ));
                    }
                    if let Err(e) = self.pause().await {
                        return Some((Err(e), PollState::Done));
                    }
                    waited
                }
            };

            match self.poll_once(id).await {
                Ok(job) => {
                    debug!(
                        "Torrent {} is {} ({}%)",
                        id, job.status, job.progress_percent
                    );
                    let next = if job.status.is_terminal() {
                        PollState::Done
                    } else {
                        PollState::Waiting { waited }
                    };
                    Some((Ok(job), next))
                }
                Err(e) => Some((Err(e), PollState::Done)),
            }
        })
    }
}
