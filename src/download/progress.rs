use std::path::PathBuf;

use crate::debrid::TorrentStatus;

use super::RunSummary;

/// Cells in the transfer bar
pub const BAR_WIDTH: usize = 40;

const MIB: f64 = 1_048_576.0;

#[derive(Debug, Clone)]
pub enum DownloadProgress {
    Plan {
        links: usize,
        magnets: usize,
        output_dir: PathBuf,
    },
    Unlocking {
        link: String,
    },
    AddingMagnet {
        magnet: String,
    },
    TorrentStatus {
        id: String,
        filename: String,
        status: TorrentStatus,
        progress_percent: u8,
        speed_bps: u64,
    },
    TorrentReady {
        id: String,
        files: usize,
    },
    Downloading {
        filename: String,
        size_bytes: u64,
    },
    Transfer {
        filename: String,
        snapshot: TransferSnapshot,
    },
    Completed {
        filename: String,
        bytes_written: u64,
    },
    Failed {
        item: String,
        error: String,
    },
    Finished {
        summary: RunSummary,
    },
}

/// Running byte count of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSnapshot {
    pub bytes_downloaded: u64,
    /// Zero when the server did not declare a length
    pub total_bytes: u64,
}

impl TransferSnapshot {
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some(self.bytes_downloaded as f64 / self.total_bytes as f64 * 100.0)
    }

    /// `50.0% (0.5/1.0 MB)`, or `None` for an unknown total
    pub fn describe(&self) -> Option<String> {
        let percent = self.percent()?;
        Some(format!(
            "{:.1}% ({:.1}/{:.1} MB)",
            percent,
            self.bytes_downloaded as f64 / MIB,
            self.total_bytes as f64 / MIB
        ))
    }
}

pub struct ProgressTracker;

impl ProgressTracker {
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }

    /// Torrent speeds are always shown in MB/s
    pub fn format_speed(bytes_per_second: u64) -> String {
        format!("{:.1} MB/s", bytes_per_second as f64 / MIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_total_has_no_percentage() {
        let snapshot = TransferSnapshot {
            bytes_downloaded: 4096,
            total_bytes: 0,
        };
        assert_eq!(snapshot.percent(), None);
        assert_eq!(snapshot.describe(), None);
    }

    #[test]
    fn test_half_way_description() {
        let snapshot = TransferSnapshot {
            bytes_downloaded: 524_288,
            total_bytes: 1_048_576,
        };
        assert_eq!(snapshot.percent(), Some(50.0));
        assert_eq!(snapshot.describe().unwrap(), "50.0% (0.5/1.0 MB)");
    }

    #[test]
    fn test_complete_description() {
        let snapshot = TransferSnapshot {
            bytes_downloaded: 1_048_576,
            total_bytes: 1_048_576,
        };
        assert_eq!(snapshot.percent(), Some(100.0));
        assert_eq!(snapshot.describe().unwrap(), "100.0% (1.0/1.0 MB)");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(ProgressTracker::format_bytes(512), "512 B");
        assert_eq!(ProgressTracker::format_bytes(1536), "1.5 KB");
        assert_eq!(ProgressTracker::format_bytes(1_073_741_824), "1.0 GB");
        assert_eq!(ProgressTracker::format_speed(3_145_728), "3.0 MB/s");
        assert_eq!(ProgressTracker::format_speed(0), "0.0 MB/s");
    }
}
