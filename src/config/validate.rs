// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ProfileOptions, ProjectConfig, RawConfigFile};
use crate::errors::{PipelineError, Result};

impl TryFrom<RawConfigFile> for ProjectConfig {
    type Error = crate::errors::PipelineError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        if let Some(episodes) = raw.project.episodes.as_mut() {
            episodes.sort_unstable();
            episodes.dedup();
        }
        Ok(ProjectConfig::new_unchecked(
            raw.project,
            raw.profiles,
            raw.runtime,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_languages(cfg)?;
    validate_profile("normal", &cfg.profiles.normal)?;
    validate_profile("hardsub", &cfg.profiles.hardsub)?;
    validate_runtime(cfg)?;
    Ok(())
}

fn validate_languages(cfg: &RawConfigFile) -> Result<()> {
    let langs = &cfg.project.languages;
    if langs.is_empty() {
        return Err(PipelineError::ConfigError(
            "[project].languages must list at least one language".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for lang in langs {
        if !seen.insert(*lang) {
            return Err(PipelineError::ConfigError(format!(
                "[project].languages lists '{lang}' more than once"
            )));
        }
    }
    Ok(())
}

/// Options every encode profile must carry a value for.
const REQUIRED_PROFILE_OPTIONS: [&str; 2] = ["crf", "preset"];

pub(crate) fn validate_profile(name: &str, opts: &ProfileOptions) -> Result<()> {
    for key in REQUIRED_PROFILE_OPTIONS {
        match opts.get(key) {
            Some(value) if !value.is_empty() => {}
            _ => {
                return Err(PipelineError::ConfigError(format!(
                    "[profiles.{name}].{key} must be set to a non-empty value"
                )));
            }
        }
    }

    for key in opts.keys() {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PipelineError::ConfigError(format!(
                "[profiles.{name}] has invalid option name '{key}'"
            )));
        }
    }
    Ok(())
}

fn validate_runtime(cfg: &RawConfigFile) -> Result<()> {
    let rt = &cfg.runtime;
    for (key, value) in [
        ("poll_interval_ms", rt.poll_interval_ms),
        ("drain_interval_ms", rt.drain_interval_ms),
        ("stop_grace_secs", rt.stop_grace_secs),
    ] {
        if value == 0 {
            return Err(PipelineError::ConfigError(format!(
                "[runtime].{key} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}
