//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Edit, pull, push and apply dbus-serialbattery driver configs
#[derive(Parser, Debug)]
#[command(name = "sbc", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// State directory holding the connection profile and pull cache
    /// (default: ~/.dbus-serialbattery-gui)
    #[arg(long, global = true, env = "SBC_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Seconds allowed for connecting and authenticating
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,

    /// Command that restarts the driver on the device
    #[arg(long, global = true, env = "SBC_RESTART_COMMAND")]
    pub restart_command: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the fields of a config file, grouped by section
    Show {
        /// Config file to read
        file: PathBuf,
    },

    /// Print the value of one field
    Get {
        /// Config file to read
        file: PathBuf,

        /// Field name
        key: String,
    },

    /// Change fields and save the file
    Set(SetArgs),

    /// Manage the remote connection profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Download the remote config into the local cache
    Pull {
        /// Show the pulled fields
        #[arg(long)]
        show: bool,
    },

    /// Upload a local config to the device, overwriting the remote file
    Push {
        /// Local file to upload (default: the pull cache)
        file: Option<PathBuf>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Restart the driver on the device so it picks up the config
    Apply {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Interactive editing session
    Shell,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Config file to edit
    pub file: PathBuf,

    /// Assignments of the form KEY=VALUE
    #[arg(required = true, value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Show the stored profile (password masked)
    Show,

    /// Create or update the stored profile; omitted fields keep their value
    Set {
        /// Hostname or address, optionally host:port
        #[arg(long)]
        host: Option<String>,

        /// SSH username
        #[arg(long)]
        user: Option<String>,

        /// SSH password
        #[arg(long, conflicts_with = "password_stdin")]
        password: Option<String>,

        /// Read the SSH password from the first line of stdin
        #[arg(long)]
        password_stdin: bool,

        /// Path of the driver config on the device
        #[arg(long)]
        remote_path: Option<String>,
    },

    /// Delete the stored profile
    Clear,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
