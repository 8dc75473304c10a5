//! Line-oriented driver config documents.
//!
//! The dbus-serialbattery `config.ini` dialect is flat: lines starting with
//! `;` are headers/comments, `key = value` lines are fields, and everything
//! else passes through untouched. A [`ConfigDocument`] keeps every original
//! line so that serializing an unedited document reproduces the input byte
//! for byte; edits only ever replace the value portion of a field line.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Marker that starts a section header (or comment) line.
pub const SECTION_MARKER: char = ';';

/// Separator between a field name and its value.
pub const FIELD_SEPARATOR: char = '=';

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    /// Header line; carries the display label.
    Section(String),
    /// Authoritative assignment line; index into `ConfigDocument::fields`.
    Field(usize),
    /// Blank, malformed, or duplicate-assignment line.
    Inert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    /// Line content without its terminator.
    text: String,
    /// `"\n"`, `"\r\n"`, or empty for a final unterminated line.
    ending: String,
    kind: LineKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    /// Value as read from the file.
    original: String,
    /// Current (possibly edited) value.
    value: String,
}

/// A group of fields under one header, in file order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Section {
    /// Header label with the marker stripped; `None` for fields that appear
    /// before the first header.
    pub title: Option<String>,
    /// `(name, value)` pairs in file order.
    pub fields: Vec<(String, String)>,
}

/// Parsed config file with lossless layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<Line>,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

/// Split a raw line into `(name, value)` if it is a field assignment.
///
/// A field line contains exactly one separator once trimmed; both sides are
/// trimmed. Lines with an empty name are not fields.
fn split_assignment(trimmed: &str) -> Option<(&str, &str)> {
    let mut parts = trimmed.split(FIELD_SEPARATOR);
    let name = parts.next()?.trim();
    let value = parts.next()?.trim();
    if parts.next().is_some() || name.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Split text into `(content, ending)` pairs, keeping `\r\n` vs `\n`.
fn split_lines(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.split_inclusive('\n').map(|raw| {
        if let Some(body) = raw.strip_suffix("\r\n") {
            (body, "\r\n")
        } else if let Some(body) = raw.strip_suffix('\n') {
            (body, "\n")
        } else {
            (raw, "")
        }
    })
}

impl ConfigDocument {
    /// Parse config text.
    ///
    /// Never fails: anything that is neither a header nor a field is kept as
    /// an inert line. When a field name occurs more than once, the first
    /// occurrence is the editable one and later ones stay inert.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::default();

        for (body, ending) in split_lines(text) {
            let trimmed = body.trim();
            let kind = if trimmed.starts_with(SECTION_MARKER) {
                LineKind::Section(trimmed.trim_start_matches(SECTION_MARKER).trim().to_string())
            } else if let Some((name, value)) = split_assignment(trimmed) {
                if doc.index.contains_key(name) {
                    tracing::debug!(field = name, "duplicate field kept as inert line");
                    LineKind::Inert
                } else {
                    let idx = doc.fields.len();
                    doc.fields.push(Field {
                        name: name.to_string(),
                        original: value.to_string(),
                        value: value.to_string(),
                    });
                    doc.index.insert(name.to_string(), idx);
                    LineKind::Field(idx)
                }
            } else {
                LineKind::Inert
            };

            doc.lines.push(Line {
                text: body.to_string(),
                ending: ending.to_string(),
                kind,
            });
        }

        doc
    }

    /// Current value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.fields[i].value.as_str())
    }

    /// Whether `name` is an editable field of this document.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Set the value of an existing field.
    ///
    /// Only the in-memory value changes; the raw lines are untouched until
    /// [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] if `name` is not a field of this
    /// document, and [`Error::InvalidArgument`] if the value contains a line
    /// break or a `=`, either of which would change the line structure.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        let Some(&idx) = self.index.get(name) else {
            return Err(Error::UnknownField {
                name: name.to_string(),
            });
        };
        if value.contains(['\n', '\r']) {
            return Err(Error::InvalidArgument(format!(
                "value for '{name}' must be a single line"
            )));
        }
        if value.contains(FIELD_SEPARATOR) {
            return Err(Error::InvalidArgument(format!(
                "value for '{name}' must not contain '{FIELD_SEPARATOR}'"
            )));
        }
        self.fields[idx].value = value.trim().to_string();
        Ok(())
    }

    /// Render the document back to text.
    ///
    /// Field lines whose value changed are rewritten as `name = value`
    /// (keeping the original line ending); every other line is emitted
    /// exactly as read.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.text.len() + 2).sum());
        for line in &self.lines {
            match line.kind {
                LineKind::Field(idx) if self.fields[idx].value != self.fields[idx].original => {
                    let field = &self.fields[idx];
                    out.push_str(&field.name);
                    out.push_str(" = ");
                    out.push_str(&field.value);
                }
                _ => out.push_str(&line.text),
            }
            out.push_str(&line.ending);
        }
        out
    }

    /// Fields grouped under their headers, for display.
    ///
    /// Every header line opens a new group, even when no fields follow it.
    #[must_use]
    pub fn sections(&self) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();
        for line in &self.lines {
            match &line.kind {
                LineKind::Section(title) => sections.push(Section {
                    title: Some(title.clone()),
                    fields: Vec::new(),
                }),
                LineKind::Field(idx) => {
                    let field = &self.fields[*idx];
                    let pair = (field.name.clone(), field.value.clone());
                    match sections.last_mut() {
                        Some(section) => section.fields.push(pair),
                        None => sections.push(Section {
                            title: None,
                            fields: vec![pair],
                        }),
                    }
                }
                LineKind::Inert => {}
            }
        }
        sections
    }

    /// `(name, value)` pairs of all editable fields in file order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.value.as_str()))
    }

    /// Number of editable fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no editable fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of raw lines, fields or not.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}
