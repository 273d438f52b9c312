//! Settings file (`.ci-prep.toml`).
//!
//! Holds what the environment flags do not: file locations, the reference
//! directory baked into the master test file, union de-duplication, and
//! custom selection profiles. Missing fields use defaults; a missing file
//! means all defaults (no error).
//!
//! ```toml
//! [paths]
//! source = "WarpX-tests.ini"
//! output = "ci-tests.ini"
//!
//! [selection]
//! dedupe_union = false
//!
//! [[profile]]
//! name = "psatd-only"
//! passes = [{ keep = true, matches = ["psatd.update_with_rho"] }]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use ci_prep_engine::CustomProfile;
use ci_prep_engine::flags::{DEFAULT_REFERENCE_DIR, DEFAULT_REGRESSION_SUFFIX};
use serde::Deserialize;

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".ci-prep.toml";
pub const DEFAULT_SOURCE_FILE: &str = "WarpX-tests.ini";
pub const DEFAULT_OUTPUT_FILE: &str = "ci-tests.ini";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrepConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    /// Custom profiles, activated by name with `--profile`.
    #[serde(default, rename = "profile")]
    pub profiles: Vec<CustomProfile>,
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Master test file (default: `WarpX-tests.ini`).
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Derived CI file (default: `ci-tests.ini`).
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Directory hard-coded in the master file, replaced by the test directory.
    #[serde(default = "default_reference_dir")]
    pub reference_dir: String,

    /// Stripped from the working directory to get the test directory.
    #[serde(default = "default_regression_suffix")]
    pub regression_suffix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            reference_dir: default_reference_dir(),
            regression_suffix: default_regression_suffix(),
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_FILE)
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

fn default_reference_dir() -> String {
    DEFAULT_REFERENCE_DIR.to_owned()
}

fn default_regression_suffix() -> String {
    DEFAULT_REGRESSION_SUFFIX.to_owned()
}

// ---------------------------------------------------------------------------
// SelectionConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    /// Drop blocks selected twice by the `rz-or-nompi` union.
    #[serde(default)]
    pub dedupe_union: bool,
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A settings file could not be read or parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// `None` when parsing a string that did not come from a file.
    pub path: Option<PathBuf>,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{}: {}", p.display(), self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl PrepConfig {
    /// Load from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse settings from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, a non-boolean
    /// `keep`, or two profiles sharing a name.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;

        for (i, profile) in config.profiles.iter().enumerate() {
            if config.profiles[..i].iter().any(|p| p.name == profile.name) {
                return Err(ConfigError {
                    path: None,
                    message: format!("duplicate profile name '{}'", profile.name),
                });
            }
        }
        Ok(config)
    }

    /// Names of the declared custom profiles.
    #[must_use]
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }
}
