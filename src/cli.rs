use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rdebrid")]
#[command(about = "Download links and magnets through Real-Debrid")]
#[command(long_about = "
rdebrid unrestricts hoster links and magnets through Real-Debrid and downloads
the resulting files. aria2c is used for fast multi-connection downloads when it
is installed; otherwise a built-in downloader is used.

Examples:
  rdebrid setup                                 # Store your API token
  rdebrid https://filehost.com/file/abc123
  rdebrid \"magnet:?xt=urn:btih:...\"
  rdebrid -d ~/Downloads link1 link2            # Download to a directory
")]
#[command(version)]
pub struct Cli {
    /// Links and magnets to download
    #[arg(value_name = "LINK")]
    pub links: Vec<String>,

    /// Download directory override
    #[arg(short, long, value_name = "DIR")]
    #[arg(help = "Download to the specified directory (created if missing)")]
    pub dir: Option<String>,

    /// Never use aria2c
    #[arg(long)]
    #[arg(help = "Use the built-in downloader even if aria2c is available")]
    pub builtin: bool,

    /// Do not try to install aria2c
    #[arg(long)]
    #[arg(help = "Skip the automatic aria2c install attempt")]
    pub no_install: bool,

    /// Override config file path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure your API token
    Setup {
        /// Token to store (prompted for when omitted)
        #[arg(short, long, value_name = "TOKEN")]
        #[arg(help = "API token from https://real-debrid.com/apitoken")]
        token: Option<String>,
    },

    /// Manage configuration
    #[command(visible_alias = "cfg")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration (token masked)
    Show,

    /// Print the config file location
    Path,

    /// Validate configuration
    #[command(visible_alias = "check")]
    Validate,
}

impl Cli {
    /// Validate CLI arguments and show helpful error messages
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_none() && self.links.is_empty() {
            return Err(
                "No links given. Usage: rdebrid [OPTIONS] <LINK>... (see --help)".to_string(),
            );
        }

        if self.command.is_some() && !self.links.is_empty() {
            return Err("Links cannot be combined with a subcommand".to_string());
        }

        if self.links.iter().any(|link| link.trim().is_empty()) {
            return Err("Links cannot be empty".to_string());
        }

        if let Some(dir) = &self.dir {
            if dir.trim().is_empty() {
                return Err("--dir requires a path argument".to_string());
            }
        }

        Ok(())
    }

    /// Only downloads need a stored token
    pub fn requires_token(&self) -> bool {
        self.command.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_links_parsing() {
        let cli = Cli::try_parse_from([
            "rdebrid",
            "https://host/file",
            "magnet:?xt=urn:btih:AAA",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.links.len(), 2);
        assert!(cli.validate().is_ok());
        assert!(cli.requires_token());
    }

    #[test]
    fn test_dir_option() {
        let cli =
            Cli::try_parse_from(["rdebrid", "-d", "/tmp/out", "https://host/a", "https://host/b"])
                .unwrap();
        assert_eq!(cli.dir.as_deref(), Some("/tmp/out"));
        assert_eq!(cli.links, vec!["https://host/a", "https://host/b"]);

        let cli = Cli::try_parse_from(["rdebrid", "--dir", "out", "--builtin", "https://host/a"])
            .unwrap();
        assert_eq!(cli.dir.as_deref(), Some("out"));
        assert!(cli.builtin);
        assert!(!cli.no_install);
    }

    #[test]
    fn test_dir_without_value_is_rejected() {
        assert!(Cli::try_parse_from(["rdebrid", "https://host/a", "--dir"]).is_err());

        let cli = Cli::try_parse_from(["rdebrid", "--dir", "", "https://host/a"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_setup_subcommand() {
        let cli = Cli::try_parse_from(["rdebrid", "setup", "--token", "abc"]).unwrap();
        if let Some(Commands::Setup { token }) = &cli.command {
            assert_eq!(token.as_deref(), Some("abc"));
        } else {
            panic!("Expected Setup command");
        }
        assert!(cli.validate().is_ok());
        assert!(!cli.requires_token());
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from(["rdebrid", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));

        let cli = Cli::try_parse_from(["rdebrid", "cfg", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Validate
            })
        ));
    }

    #[test]
    fn test_validation() {
        let cli = Cli::try_parse_from(["rdebrid"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["rdebrid", "  "]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["rdebrid", "-v", "https://host/a"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.validate().is_ok());
    }
}
