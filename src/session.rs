//! Edit session: one loaded document plus its save state.
//!
//! ```text
//!   Empty ──load──▶ Loaded ──set_field──▶ Modified
//!     ▲               ▲                      │
//!     └────clear──────┴─────────save─────────┘
//! ```
//!
//! Any `set_field` call marks the session modified, even if the value is
//! unchanged. Only a successful `save` (or a fresh `load`) makes it clean.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::document::ConfigDocument;
use crate::error::{Error, Result};
use crate::file::atomic_write;

/// Where an [`EditSession`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing loaded.
    Empty,
    /// Document in memory matches the file on disk.
    Loaded,
    /// Document has edits that are not yet saved.
    Modified,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Loaded => "loaded",
            Self::Modified => "modified",
        })
    }
}

/// Result of [`EditSession::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The document was written to `path`.
    Saved { path: PathBuf, bytes: usize },
    /// There were no unsaved changes; nothing was written.
    NothingToDo,
}

/// A config document being edited, bound to the file it came from.
#[derive(Debug, Default)]
pub struct EditSession {
    document: Option<ConfigDocument>,
    source_path: Option<PathBuf>,
    dirty: bool,
}

impl EditSession {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse the file at `path`, replacing any current document.
    ///
    /// Unsaved changes in the current document are discarded; prompting the
    /// user beforehand is up to the caller. On failure the current document
    /// is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`]
    /// if it is not valid UTF-8 text.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: format!("not valid UTF-8 text ({e})"),
        })?;

        let document = ConfigDocument::parse(&text);
        info!(
            path = %path.display(),
            fields = document.len(),
            lines = document.line_count(),
            "loaded config"
        );

        self.document = Some(document);
        self.source_path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    /// Set a field of the loaded document and mark the session modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingLoaded`] for an empty session, otherwise
    /// whatever [`ConfigDocument::set_field`] rejects. A rejected write
    /// leaves the dirty flag as it was.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        let document = self.document.as_mut().ok_or(Error::NothingLoaded)?;
        document.set_field(name, value)?;
        debug!(field = name, value, "field updated");
        self.dirty = true;
        Ok(())
    }

    /// Write the document back to the file it was loaded from.
    ///
    /// Reports [`SaveOutcome::NothingToDo`] when there are no unsaved
    /// changes. A failed write keeps the session modified so the edits are
    /// not lost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save(&mut self) -> Result<SaveOutcome> {
        if !self.dirty {
            return Ok(SaveOutcome::NothingToDo);
        }
        let (Some(document), Some(path)) = (&self.document, &self.source_path) else {
            return Ok(SaveOutcome::NothingToDo);
        };

        let text = document.serialize();
        atomic_write(path, text.as_bytes())?;
        self.dirty = false;

        info!(path = %path.display(), bytes = text.len(), "saved config");
        Ok(SaveOutcome::Saved {
            path: path.clone(),
            bytes: text.len(),
        })
    }

    /// Drop the document and return to the empty state.
    pub fn clear(&mut self) {
        self.document = None;
        self.source_path = None;
        self.dirty = false;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match (&self.document, self.dirty) {
            (None, _) => SessionState::Empty,
            (Some(_), false) => SessionState::Loaded,
            (Some(_), true) => SessionState::Modified,
        }
    }

    /// Whether there are unsaved edits.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The loaded document, if any.
    #[must_use]
    pub fn document(&self) -> Option<&ConfigDocument> {
        self.document.as_ref()
    }

    /// Path the document was loaded from and will be saved to.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}
