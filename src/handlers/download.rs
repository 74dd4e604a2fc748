use anyhow::{Context, Result};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use rdebrid::download::{BAR_WIDTH, ProgressTracker, TransferSnapshot};
use rdebrid::{
    Aria2Probe, ConfigManager, CredentialProvider, DownloadManager, DownloadProgress,
    ExternalProcessFetcher, Fetcher, RealDebridClient, RunSummary, StreamingFetcher,
    TokioSleeper,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub async fn handle_download(
    config_manager: &ConfigManager,
    links: Vec<String>,
    output_dir: Option<String>,
    force_builtin: bool,
    no_install: bool,
) -> Result<RunSummary> {
    let term = Term::stdout();
    let config = config_manager.config();

    // No token means no call can succeed, so stop before touching anything
    config.api.bearer_token()?;

    let cancel = CancellationToken::new();
    let credentials: Arc<dyn CredentialProvider> = Arc::new(config.api.clone());
    let client = Arc::new(
        RealDebridClient::new(&config.api.base_url, credentials, config.api.timeout())
            .context("Failed to create API client")?,
    );

    let fetcher = select_fetcher(&term, config_manager, force_builtin, no_install, &cancel)?;
    let options = config.download_options(output_dir.as_deref());

    let (manager, progress_receiver) = DownloadManager::new(
        client.clone(),
        client,
        fetcher,
        Arc::new(TokioSleeper),
        options,
        cancel.clone(),
    );

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let renderer = tokio::spawn(render_progress(progress_receiver));
    let result = manager.run(&links).await;

    // Dropping the manager closes the channel and lets the renderer drain
    drop(manager);
    let _ = renderer.await;

    Ok(result?)
}

/// Decided once per run: aria2c when usable, otherwise the built-in streamer
fn select_fetcher(
    term: &Term,
    config_manager: &ConfigManager,
    force_builtin: bool,
    no_install: bool,
    cancel: &CancellationToken,
) -> Result<Arc<dyn Fetcher>> {
    let download = &config_manager.config().download;

    if force_builtin || !download.use_aria2 {
        return Ok(Arc::new(StreamingFetcher::new(cancel.clone())?));
    }

    let probe = Aria2Probe::new(&download.aria2_binary);
    if !probe.detect(download.auto_install_aria2 && !no_install) {
        term.write_line(&format!(
            "{} {} not found, falling back to built-in downloads",
            style("⚠️").yellow(),
            style(probe.binary()).cyan()
        ))?;
        term.write_line(&format!(
            "   {}",
            style(rdebrid::probe::install_hint()).dim()
        ))?;
        term.write_line("")?;
        return Ok(Arc::new(StreamingFetcher::new(cancel.clone())?));
    }

    let binary = probe
        .locate()
        .unwrap_or_else(|| PathBuf::from(probe.binary()));
    Ok(Arc::new(
        ExternalProcessFetcher::new(binary, cancel.clone())
            .with_connections(download.connections)
            .with_min_split_size(&download.min_split_size),
    ))
}

async fn render_progress(mut receiver: mpsc::UnboundedReceiver<DownloadProgress>) {
    let mut renderer = ConsoleRenderer::new();
    while let Some(event) = receiver.recv().await {
        if let Err(e) = renderer.handle(event) {
            debug!("Failed to render progress: {}", e);
        }
    }
    renderer.clear_bars();
}

struct ConsoleRenderer {
    term: Term,
    interactive: bool,
    transfer: Option<ProgressBar>,
    torrent: Option<ProgressBar>,
    announced: Option<String>,
}

impl ConsoleRenderer {
    fn new() -> Self {
        let term = Term::stdout();
        let interactive = term.is_term();
        Self {
            term,
            interactive,
            transfer: None,
            torrent: None,
            announced: None,
        }
    }

    fn handle(&mut self, event: DownloadProgress) -> Result<()> {
        match event {
            DownloadProgress::Plan {
                links,
                magnets,
                output_dir,
            } => {
                self.term.write_line(&format!(
                    "{} Processing {} link(s) and {} magnet(s)",
                    style("📋").cyan(),
                    links,
                    magnets
                ))?;
                if output_dir != PathBuf::from(".") {
                    let shown = std::fs::canonicalize(&output_dir).unwrap_or(output_dir);
                    self.term.write_line(&format!(
                        "{} Downloading to: {}",
                        style("📁").cyan(),
                        style(shown.display()).cyan()
                    ))?;
                }
                self.term.write_line("")?;
            }

            DownloadProgress::Unlocking { link } => {
                self.term.write_line(&format!(
                    "{} Unrestricting: {}",
                    style("🔓").cyan(),
                    style(link).dim()
                ))?;
            }

            DownloadProgress::AddingMagnet { .. } => {
                self.term
                    .write_line(&format!("{} Adding magnet...", style("🧲").cyan()))?;
            }

            DownloadProgress::TorrentStatus {
                id,
                filename,
                status,
                progress_percent,
                speed_bps,
                ..
            } => {
                let line = format!(
                    "Status: {} | {}% | {}",
                    status,
                    progress_percent,
                    ProgressTracker::format_speed(speed_bps)
                );

                if !filename.is_empty() && self.announced.as_deref() != Some(id.as_str()) {
                    self.term.write_line(&format!(
                        "  {} {}",
                        style("📦").cyan(),
                        style(&filename).cyan()
                    ))?;
                    self.announced = Some(id.clone());
                }
                debug!("Torrent {}: {}", id, line);

                if self.interactive {
                    let spinner = self.torrent.get_or_insert_with(|| {
                        let spinner = ProgressBar::new_spinner();
                        spinner.set_style(
                            ProgressStyle::with_template("  {spinner:.blue} {msg}")
                                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                        );
                        spinner.enable_steady_tick(Duration::from_millis(100));
                        spinner
                    });
                    spinner.set_message(line);
                    if status.is_terminal() {
                        spinner.finish();
                        self.torrent = None;
                    }
                } else {
                    self.term.write_line(&format!("  {}", line))?;
                }
            }

            DownloadProgress::TorrentReady { files, .. } => {
                self.term.write_line(&format!(
                    "  {} Ready. {} file(s) to download.",
                    style("✅").green(),
                    files
                ))?;
                self.term.write_line("")?;
            }

            DownloadProgress::Downloading {
                filename,
                size_bytes,
            } => {
                let size = if size_bytes > 0 {
                    ProgressTracker::format_bytes(size_bytes)
                } else {
                    "unknown size".to_string()
                };
                self.term.write_line(&format!(
                    "  {} Downloading: {} ({})",
                    style("⬇️").cyan(),
                    style(filename).cyan().bold(),
                    size
                ))?;
            }

            DownloadProgress::Transfer { snapshot, .. } => self.update_transfer(snapshot),

            DownloadProgress::Completed {
                filename,
                bytes_written,
            } => {
                if let Some(bar) = self.transfer.take() {
                    bar.finish();
                }
                self.term.write_line(&format!(
                    "  {} Saved {} ({})",
                    style("✅").green(),
                    filename,
                    ProgressTracker::format_bytes(bytes_written)
                ))?;
                self.term.write_line("")?;
            }

            DownloadProgress::Failed { item, error } => {
                self.clear_bars();
                self.term.write_line(&format!(
                    "  {} {}",
                    style("❌").red(),
                    style(&error).red()
                ))?;
                self.term
                    .write_line(&format!("     {}", style(item).dim()))?;
                self.term.write_line("")?;
            }

            DownloadProgress::Finished { summary } => {
                self.term.write_line(&format!(
                    "{} Done! {} succeeded, {} failed ({} written)",
                    style("🏁").green(),
                    style(summary.succeeded).green(),
                    if summary.failed > 0 {
                        style(summary.failed).red()
                    } else {
                        style(summary.failed).dim()
                    },
                    ProgressTracker::format_bytes(summary.bytes_written)
                ))?;
                for failure in &summary.failures {
                    self.term.write_line(&format!(
                        "   {} {}: {}",
                        style("•").red(),
                        failure.item,
                        failure.reason
                    ))?;
                }
            }
        }

        Ok(())
    }

    fn update_transfer(&mut self, snapshot: TransferSnapshot) {
        // Piped output gets the final "Saved" line only
        if !self.interactive {
            return;
        }

        let bar = self.transfer.get_or_insert_with(|| {
            if snapshot.total_bytes > 0 {
                let bar = ProgressBar::new(snapshot.total_bytes);
                bar.set_style(
                    ProgressStyle::with_template(&transfer_template())
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#-"),
                );
                bar
            } else {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template("  {spinner:.green} {bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner
            }
        });

        bar.set_position(snapshot.bytes_downloaded);
        if let Some(description) = snapshot.describe() {
            bar.set_message(description);
        }
    }

    fn clear_bars(&mut self) {
        if let Some(bar) = self.transfer.take() {
            bar.abandon();
        }
        if let Some(spinner) = self.torrent.take() {
            spinner.abandon();
        }
    }
}

/// indicatif template for a transfer with a known total
fn transfer_template() -> String {
    format!("  [{{bar:{}}}] {{msg}}", BAR_WIDTH)
}
