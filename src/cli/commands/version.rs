//! Version command.

use crate::config::DEFAULT_RESTART_COMMAND;
use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    name: &'a str,
    version: &'a str,
    build: &'a str,
    default_restart_command: &'a str,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };

    if json {
        let output = VersionOutput {
            name: env!("CARGO_PKG_NAME"),
            version,
            build,
            default_restart_command: DEFAULT_RESTART_COMMAND,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("sbc version {version} ({build})");
    Ok(())
}
