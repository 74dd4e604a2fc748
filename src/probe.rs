use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

pub const ARIA2_BINARY: &str = "aria2c";

/// Looks for the external multi-connection downloader
#[derive(Debug, Clone)]
pub struct Aria2Probe {
    binary: String,
}

impl Aria2Probe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Full path of the binary when it is on `PATH`
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.binary).ok()
    }

    pub fn is_available(&self) -> bool {
        self.locate().is_some()
    }

    /// One best-effort install through the platform package manager.
    ///
    /// Never fails; returns whether the binary is usable afterwards.
    pub fn attempt_install(&self) -> bool {
        info!("{} not found, attempting to install it", self.binary);

        let attempted = if cfg!(target_os = "windows") {
            run_quietly(
                "winget",
                &[
                    "install",
                    "aria2.aria2",
                    "--accept-source-agreements",
                    "--accept-package-agreements",
                ],
            )
        } else if cfg!(target_os = "macos") && which::which("brew").is_ok() {
            run_quietly("brew", &["install", "aria2"])
        } else {
            false
        };

        if attempted && self.is_available() {
            info!("{} installed", self.binary);
            return true;
        }

        warn!("Could not install {} automatically", self.binary);
        warn!("{}", install_hint());
        false
    }

    /// Decides once per run whether the external downloader is used
    pub fn detect(&self, allow_install: bool) -> bool {
        if let Some(path) = self.locate() {
            debug!("Using {:?}", path);
            return true;
        }
        allow_install && self.attempt_install()
    }
}

impl Default for Aria2Probe {
    fn default() -> Self {
        Self::new(ARIA2_BINARY)
    }
}

fn run_quietly(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub fn install_hint() -> &'static str {
    if cfg!(target_os = "windows") {
        "Install manually: winget install aria2.aria2 (or choco install aria2)"
    } else if cfg!(target_os = "macos") {
        "Install with: brew install aria2"
    } else {
        "Install with: sudo apt install aria2 (or your package manager)"
    }
}
