//! Remote commands: pull, push, apply.

use std::path::Path;

use super::edit::print_session;
use super::{Context, confirm};
use crate::error::{Error, Result};
use crate::session::EditSession;

/// Execute `pull`.
///
/// # Errors
///
/// Returns an error if the profile is missing or the transfer fails.
pub fn pull(show: bool, ctx: &Context) -> Result<()> {
    let profile = ctx.active_profile()?;
    let engine = ctx.engine()?;
    let mut session = EditSession::new();
    let report = engine.pull(&profile, &mut session)?;

    if ctx.json && !show {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }
    if !ctx.json {
        println!(
            "Remote config downloaded from {} to {} ({} fields)",
            report.remote_path,
            report.local_path.display(),
            report.fields
        );
    }
    if show {
        print_session(&session, ctx.json)?;
    }
    Ok(())
}

/// Execute `push` for `file`, or the pull cache when no file is given.
///
/// # Errors
///
/// Returns an error if the profile is missing, the file is missing,
/// confirmation is declined, or the transfer fails.
pub fn push(file: Option<&Path>, yes: bool, ctx: &Context) -> Result<()> {
    let profile = ctx.active_profile()?;
    let engine = ctx.engine()?;
    let local_path = file.map_or_else(|| ctx.settings.cache_path(), Path::to_path_buf);

    let mut session = EditSession::new();
    if local_path.is_file() {
        session.load(&local_path)?;
    }
    let report = engine
        .push(&profile, &session, |prompt| confirm(prompt, yes))
        .map_err(|e| match e {
            Error::MissingLocalFile { .. } => Error::MissingLocalFile { path: local_path.clone() },
            other => other,
        })?;

    if ctx.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "Local config pushed to remote location at {}",
            report.remote_path
        );
    }
    Ok(())
}

/// Execute `apply`.
///
/// # Errors
///
/// Returns an error if the profile is missing, confirmation is declined,
/// or the command cannot be dispatched.
pub fn apply(yes: bool, ctx: &Context) -> Result<()> {
    let profile = ctx.active_profile()?;
    let engine = ctx.engine()?;
    let report = engine.apply(&profile, |prompt| confirm(prompt, yes))?;

    if ctx.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("Config has been applied on {}.", report.host);
    }
    Ok(())
}
