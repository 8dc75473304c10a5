//! Local document commands: show, get, set.

use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use super::Context;
use crate::document::{ConfigDocument, Section};
use crate::error::{Error, Result};
use crate::session::{EditSession, SaveOutcome};

#[derive(Serialize)]
struct ShowOutput<'a> {
    path: &'a Path,
    state: crate::session::SessionState,
    sections: Vec<Section>,
}

/// Write a document grouped by section.
///
/// Headers without fields under them are comments in practice and are
/// printed dimmed.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn render(out: &mut impl Write, document: &ConfigDocument) -> std::io::Result<()> {
    for section in document.sections() {
        match (&section.title, section.fields.is_empty()) {
            (Some(title), _) if title.is_empty() => {}
            (Some(title), false) => writeln!(out, "{}", title.cyan().bold())?,
            (Some(title), true) => writeln!(out, "{}", title.dimmed())?,
            (None, _) => {}
        }
        for (name, value) in &section.fields {
            writeln!(out, "  {} = {}", name.bold(), value)?;
        }
    }
    Ok(())
}

/// Render a session as JSON or text on stdout.
///
/// # Errors
///
/// Returns an error if nothing is loaded or output fails.
pub fn print_session(session: &EditSession, json: bool) -> Result<()> {
    let (Some(document), Some(path)) = (session.document(), session.source_path()) else {
        return Err(Error::NothingLoaded);
    };

    if json {
        let output = ShowOutput {
            path,
            state: session.state(),
            sections: document.sections(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        render(&mut std::io::stdout().lock(), document)?;
    }
    Ok(())
}

fn open(file: &Path) -> Result<EditSession> {
    let mut session = EditSession::new();
    session.load(file)?;
    Ok(session)
}

/// Execute `show`.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded.
pub fn show(file: &Path, ctx: &Context) -> Result<()> {
    print_session(&open(file)?, ctx.json)
}

/// Execute `get`.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or has no such field.
pub fn get(file: &Path, key: &str, ctx: &Context) -> Result<()> {
    let session = open(file)?;
    let value = session
        .document()
        .and_then(|d| d.get(key))
        .ok_or_else(|| Error::UnknownField {
            name: key.to_string(),
        })?;

    if ctx.json {
        println!("{}", serde_json::json!({ "key": key, "value": value }));
    } else {
        println!("{value}");
    }
    Ok(())
}

/// Split `KEY=VALUE`, trimming both sides.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if there is no `=` or the key is empty.
pub fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(Error::InvalidArgument(format!(
            "expected KEY=VALUE, got '{assignment}'"
        ))),
    }
}

/// Execute `set`: load, apply every assignment, save.
///
/// All assignments are validated before anything is written; one bad
/// assignment leaves the file untouched.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded, an assignment is
/// malformed or names an unknown field, or the file cannot be written.
pub fn set(file: &Path, assignments: &[String], ctx: &Context) -> Result<()> {
    let mut session = open(file)?;
    let mut changed = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        session.set_field(key, value)?;
        changed.push(key);
    }

    let outcome = session.save()?;
    if ctx.json {
        let saved = matches!(outcome, SaveOutcome::Saved { .. });
        println!(
            "{}",
            serde_json::json!({ "path": file, "saved": saved, "fields": changed })
        );
    } else {
        match outcome {
            SaveOutcome::Saved { path, .. } => {
                println!("Saved {} field(s) to {}", changed.len(), path.display());
            }
            SaveOutcome::NothingToDo => println!("No changes have been made to the configuration."),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("A=1").unwrap(), ("A", "1"));
        assert_eq!(parse_assignment(" A = 1 ").unwrap(), ("A", "1"));
        assert_eq!(parse_assignment("A=").unwrap(), ("A", ""));
        assert!(parse_assignment("A").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_render_groups_by_section() {
        colored::control::set_override(false);
        let doc = ConfigDocument::parse(";General\nfoo = 1\n;\n; just a comment\n;Limits\nbar = 2\n");
        let mut out = Vec::new();
        render(&mut out, &doc).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "General\n  foo = 1\njust a comment\nLimits\n  bar = 2\n"
        );
    }
}
