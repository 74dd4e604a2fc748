pub mod client;
pub mod types;

pub use client::{DEFAULT_BASE_URL, RealDebridClient};
pub use types::{AddMagnetResponse, TorrentJob, TorrentStatus, UnlockResult, User};

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Supplies the bearer token for API calls
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Result<String>;
}

/// A token known up front, e.g. one typed in during setup
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(Error::Authorization("no API token provided".to_string()));
        }
        Ok(self.0.trim().to_string())
    }
}

/// Turns a hoster link (or a torrent result link) into a direct download URL
#[async_trait]
pub trait UnlockService: Send + Sync {
    async fn unlock(&self, link: &str) -> Result<UnlockResult>;
}

/// Remote torrent processing
#[async_trait]
pub trait TorrentService: Send + Sync {
    async fn submit_magnet(&self, magnet: &str) -> Result<String>;

    async fn select_all_files(&self, id: &str) -> Result<()>;

    /// One status snapshot; callers own the polling loop
    async fn poll(&self, id: &str) -> Result<TorrentJob>;
}
