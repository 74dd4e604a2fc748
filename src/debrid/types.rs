use serde::{Deserialize, Deserializer};
use std::fmt;

/// Result of unrestricting a hoster link or a torrent result link
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UnlockResult {
    #[serde(rename = "download")]
    pub download_url: String,
    pub filename: String,
    /// Zero when the service did not report a size
    #[serde(rename = "filesize", default)]
    pub filesize_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMagnetResponse {
    pub id: String,
}

/// Account returned by `GET /user`
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: Option<String>,
}

/// One snapshot of a torrent being processed by the service
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TorrentJob {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    pub status: TorrentStatus,
    #[serde(rename = "progress", default, deserialize_with = "percent")]
    pub progress_percent: u8,
    #[serde(rename = "speed", default, deserialize_with = "nullable_u64")]
    pub speed_bytes_per_sec: u64,
    #[serde(rename = "links", default)]
    pub result_links: Vec<String>,
}

fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(value.clamp(0.0, 100.0) as u8)
}

fn nullable_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TorrentStatus {
    MagnetError,
    MagnetConversion,
    WaitingFilesSelection,
    Queued,
    Downloading,
    Downloaded,
    Error,
    Virus,
    Compressing,
    Uploading,
    Dead,
    Other(String),
}

impl TorrentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MagnetError => "magnet_error",
            Self::MagnetConversion => "magnet_conversion",
            Self::WaitingFilesSelection => "waiting_files_selection",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Error => "error",
            Self::Virus => "virus",
            Self::Compressing => "compressing",
            Self::Uploading => "uploading",
            Self::Dead => "dead",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Downloaded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::MagnetError | Self::Error | Self::Virus | Self::Dead
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl From<String> for TorrentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "magnet_error" => Self::MagnetError,
            "magnet_conversion" => Self::MagnetConversion,
            "waiting_files_selection" => Self::WaitingFilesSelection,
            "queued" => Self::Queued,
            "downloading" => Self::Downloading,
            "downloaded" => Self::Downloaded,
            "error" => Self::Error,
            "virus" => Self::Virus,
            "compressing" => Self::Compressing,
            "uploading" => Self::Uploading,
            "dead" => Self::Dead,
            _ => Self::Other(raw),
        }
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
