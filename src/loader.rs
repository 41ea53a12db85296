//! Script loader.
//!
//! Loads and parses test scripts from disk, and rejects structurally
//! invalid scripts before anything runs.

use crate::schema::Script;
use std::path::Path;

/// Error type for script loading operations.
///
/// Every variant is a structural error: it means the script itself is
/// broken, so the whole run is aborted before any test executes.
#[derive(Debug)]
pub enum LoadError {
    /// Failed to read the file.
    Io(std::io::Error),
    /// Failed to parse YAML.
    Yaml(serde_yaml::Error),
    /// Failed to parse TOML.
    Toml(toml::de::Error),
    /// Unsupported file extension.
    UnsupportedFormat(String),
    /// A test declared an empty command.
    MissingCommand {
        /// 1-based position of the offending test.
        index: usize,
        /// The offending test's id.
        id: String,
    },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "failed to read file: {e}"),
            LoadError::Yaml(e) => write!(f, "invalid YAML: {e}"),
            LoadError::Toml(e) => write!(f, "invalid TOML: {e}"),
            LoadError::UnsupportedFormat(ext) => {
                write!(
                    f,
                    "unsupported file format: {ext} (expected .yaml, .yml, or .toml)"
                )
            }
            LoadError::MissingCommand { index, id } => {
                write!(f, "test {index} ({id}): command must not be empty")
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Load a test script from a file path.
///
/// The format is chosen by extension. The returned script has already
/// passed structural validation.
pub fn load_script(path: &Path) -> Result<Script, LoadError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let contents = std::fs::read_to_string(path).map_err(LoadError::Io)?;

    let script: Script = match ext {
        "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(LoadError::Yaml)?,
        "toml" => toml::from_str(&contents).map_err(LoadError::Toml)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    validate(&script)?;
    Ok(script)
}

/// Structural checks beyond what deserialization enforces.
///
/// A missing `command` field is already a parse error; this catches the
/// present-but-empty case.
fn validate(script: &Script) -> Result<(), LoadError> {
    for (index, test) in script.tests.iter().enumerate() {
        if test.command.trim().is_empty() {
            return Err(LoadError::MissingCommand {
                index: index + 1,
                id: test.id.clone(),
            });
        }
    }
    Ok(())
}
