use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::debrid::TorrentStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The Real-Debrid API rejected a request
    #[error("API error {status}: {message}")]
    RemoteService { status: u16, message: String },

    /// A magnet reached a failure state on the remote side
    #[error("torrent {id} failed with status '{status}'")]
    TorrentFailed { id: String, status: TorrentStatus },

    #[error("torrent {id} still not ready after {}s", waited.as_secs())]
    PollTimeout { id: String, waited: Duration },

    #[error("transfer of {url} failed: {reason}")]
    Transfer { url: String, reason: String },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("interrupted")]
    Cancelled,
}

impl Error {
    pub fn transfer(url: &str, reason: impl Into<String>) -> Self {
        Self::Transfer {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Fatal errors end the whole run; everything else only fails the current item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authorization(_) | Self::Configuration(_) | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Authorization("bad_token".into()).is_fatal());
        assert!(Error::Configuration("missing".into()).is_fatal());
        assert!(Error::Cancelled.is_fatal());

        assert!(
            !Error::RemoteService {
                status: 403,
                message: "hoster_unavailable".into()
            }
            .is_fatal()
        );
        assert!(!Error::transfer("https://cdn/x", "HTTP 500").is_fatal());
        assert!(
            !Error::TorrentFailed {
                id: "t1".into(),
                status: TorrentStatus::Dead
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_remote_service_message() {
        let err = Error::RemoteService {
            status: 503,
            message: "Unknown".into(),
        };
        assert_eq!(err.to_string(), "API error 503: Unknown");
    }
}
