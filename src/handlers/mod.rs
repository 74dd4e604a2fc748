pub mod config;
pub mod download;
pub mod setup;

use crate::cli::{Commands, ConfigAction};

// Re-export all handlers
pub use config::handle_config;
pub use download::handle_download;
pub use setup::handle_setup;

/// Check if config validation should be skipped for certain commands
pub fn should_skip_config_validation(command: &Option<Commands>) -> bool {
    matches!(
        command,
        Some(Commands::Setup { .. })
            | Some(Commands::Config {
                action: ConfigAction::Validate | ConfigAction::Path
            })
    )
}
