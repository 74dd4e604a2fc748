pub mod config;
pub mod debrid;
pub mod download;
pub mod error;
pub mod probe;

// Re-export commonly used types for easier access in tests
pub use config::{Config, ConfigManager};
pub use debrid::{
    CredentialProvider, RealDebridClient, StaticToken, TorrentJob, TorrentService, TorrentStatus,
    UnlockResult, UnlockService,
};
pub use download::{
    DownloadManager, DownloadOptions, DownloadProgress, ExternalProcessFetcher, FetchRequest,
    Fetcher, LinkItem, RunSummary, Sleeper, StreamingFetcher, TokioSleeper, TorrentPoller,
};
pub use error::{Error, Result};
pub use probe::Aria2Probe;
