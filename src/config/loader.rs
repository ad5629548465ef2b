// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ProjectConfig, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks languages, encode profiles and runtime intervals.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ProjectConfig::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the config for a project.
///
/// An explicit path must exist. Without one, `Bdpipe.toml` in the project
/// root is used when present and defaults apply otherwise.
pub fn load_for_project(root: &Path, explicit: Option<&Path>) -> Result<ProjectConfig> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let path = default_config_path(root);
    if path.is_file() {
        load_and_validate(&path)
    } else {
        debug!(path = %path.display(), "no project config file; using defaults");
        ProjectConfig::try_from(RawConfigFile::default())
    }
}

/// Default config location inside a project root.
pub fn default_config_path(root: &Path) -> PathBuf {
    root.join("Bdpipe.toml")
}
