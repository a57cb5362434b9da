//! Compiler errors, the shared diagnostic log, and position rendering.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::ssa::model::ir::{PosFile, PosHash};

#[derive(Debug, Error)]
pub enum CompileError {
    /// An instruction, type or constant with no defined translation.
    #[error("{pos}: unsupported construct: {message}")]
    Unsupported { pos: String, message: String },

    /// A defect in the compiler itself; the run cannot continue.
    #[error("internal compiler error: {0}")]
    Internal(String),

    #[error("malformed SSA in {func}: {message}")]
    Verify { func: String, message: String },

    #[error("compilation failed with {errors} error(s); no output generated")]
    Failed { errors: usize },

    #[error("IO error: {0}")]
    Io(PathBuf, std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(message.into())
    }

    /// Internal errors abort the run; everything else is scoped to one function.
    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::Internal(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub pos: PosHash,
    /// Rendered `file:offset` form of `pos`.
    pub location: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{} {}: {}", self.location, label, self.message)
    }
}

/// Accumulated warnings and errors for one compilation run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Warning => tracing::warn!(location = %diag.location, "{}", diag.message),
            Severity::Error => tracing::error!(location = %diag.location, "{}", diag.message),
        }
        self.entries.push(diag);
    }

    pub fn error(&mut self, positions: &PosTable, pos: PosHash, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Error,
            pos,
            location: positions.describe(pos),
            message: message.into(),
        });
    }

    pub fn warning(&mut self, positions: &PosTable, pos: PosHash, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            pos,
            location: positions.describe(pos),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps position hashes back to `file:offset` strings.
#[derive(Debug, Clone, Default)]
pub struct PosTable {
    files: Vec<PosFile>,
}

impl PosTable {
    pub fn new(mut files: Vec<PosFile>) -> Self {
        files.sort_by_key(|file| file.base);
        Self { files }
    }

    pub fn files(&self) -> &[PosFile] {
        &self.files
    }

    /// Renders a position hash. Negative hashes are approximate positions.
    pub fn describe(&self, pos: PosHash) -> String {
        if pos == PosHash::NONE {
            return "(No File Position Hash)".to_string();
        }
        let (prefix, hash) = if pos.0 < 0 {
            ("near ", pos.0.saturating_neg())
        } else {
            ("", pos.0)
        };
        match self.files.iter().rev().find(|file| hash > file.base) {
            Some(file) => format!("{}{}:{}", prefix, file.file, hash - file.base),
            None => format!("(invalid File Position Hash:{})", pos.0),
        }
    }
}

#[cfg(test)]
#[path = "tests/t_diag.rs"]
mod tests;
