//! Application error type for `ci-prep`.
//!
//! [`PrepError`] covers everything outside the pure engine: the settings
//! file, the source and output files, and profile lookup. Each message says
//! what went wrong and how to fix it, so a CI log is enough to act on.

use std::fmt;
use std::path::PathBuf;

use ci_prep_engine::SelectError;

// ---------------------------------------------------------------------------
// PrepError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum PrepError {
    /// The settings file could not be loaded or parsed.
    ConfigError {
        path: PathBuf,
        detail: String,
    },

    /// The master test file could not be read.
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The derived file could not be written. The previous file, if any, is untouched.
    OutputUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `--profile` named a profile the settings file does not declare.
    UnknownProfile {
        name: String,
        /// Profiles the settings file does declare.
        available: Vec<String>,
    },

    /// A selection pass was malformed.
    Selection(SelectError),

    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for PrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { path, detail } => {
                write!(
                    f,
                    "settings error in '{}': {detail}\n  To fix: edit the settings file and correct the issue.",
                    path.display()
                )
            }
            Self::SourceUnreadable { path, source } => {
                write!(
                    f,
                    "cannot read test file '{}': {source}\n  To fix: run from the regression directory or pass --source <file>.",
                    path.display()
                )
            }
            Self::OutputUnwritable { path, source } => {
                write!(
                    f,
                    "cannot write '{}': {source}\n  To fix: check directory permissions or pass --output <file>.",
                    path.display()
                )
            }
            Self::UnknownProfile { name, available } => {
                write!(f, "unknown selection profile '{name}'.")?;
                if available.is_empty() {
                    write!(
                        f,
                        "\n  To fix: declare it under [[profile]] in the settings file."
                    )
                } else {
                    write!(
                        f,
                        "\n  To fix: use one of: {}",
                        available.join(", ")
                    )
                }
            }
            Self::Selection(err) => {
                write!(
                    f,
                    "invalid selection: {err}\n  To fix: correct the profile definition."
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for PrepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceUnreadable { source, .. } | Self::OutputUnwritable { source, .. } => {
                Some(source)
            }
            Self::Selection(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<std::io::Error> for PrepError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<crate::config::ConfigError> for PrepError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::ConfigError {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}

impl From<SelectError> for PrepError {
    fn from(err: SelectError) -> Self {
        Self::Selection(err)
    }
}
