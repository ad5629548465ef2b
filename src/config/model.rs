// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{EpisodeId, Lang};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [project]
/// languages = ["chs", "cht"]
/// episodes = [1, 2, 3]
///
/// [profiles.normal]
/// crf = 16
/// tune = "lp"
/// preset = "slower"
///
/// [runtime]
/// poll_interval_ms = 1000
/// ```
///
/// All sections are optional and have reasonable defaults. This is the
/// unvalidated shape; the rest of the crate only sees [`ProjectConfig`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub profiles: ProfilesSection,

    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so holders of a `ProjectConfig` can rely on its invariants.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub profiles: ProfilesSection,
    pub runtime: RuntimeSection,
}

impl ProjectConfig {
    pub(crate) fn new_unchecked(
        project: ProjectSection,
        profiles: ProfilesSection,
        runtime: RuntimeSection,
    ) -> Self {
        Self {
            project,
            profiles,
            runtime,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self::new_unchecked(
            ProjectSection::default(),
            ProfilesSection::default(),
            RuntimeSection::default(),
        )
    }
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Languages that get a hardsub encode + merge branch.
    #[serde(default = "default_languages")]
    pub languages: Vec<Lang>,

    /// Explicit episode list. When absent, the root is scanned for `E<nn>`
    /// directories.
    #[serde(default)]
    pub episodes: Option<Vec<EpisodeId>>,
}

fn default_languages() -> Vec<Lang> {
    Lang::ALL.to_vec()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            episodes: None,
        }
    }
}

/// A single encoder option value as written in TOML.
///
/// `crf = 16` and `crf = "16"` are equivalent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, OptionValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Float(v) => write!(f, "{v}"),
            OptionValue::Text(v) => f.write_str(v.trim()),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

/// Option name → value mapping handed to the encoder.
pub type ProfileOptions = BTreeMap<String, OptionValue>;

/// `[profiles.normal]` / `[profiles.hardsub]`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesSection {
    #[serde(default = "default_normal_profile")]
    pub normal: ProfileOptions,

    #[serde(default = "default_hardsub_profile")]
    pub hardsub: ProfileOptions,
}

pub fn default_normal_profile() -> ProfileOptions {
    profile(16)
}

pub fn default_hardsub_profile() -> ProfileOptions {
    profile(17)
}

fn profile(crf: i64) -> ProfileOptions {
    let mut opts = ProfileOptions::new();
    opts.insert("crf".to_string(), OptionValue::Int(crf));
    opts.insert("tune".to_string(), "lp".into());
    opts.insert("preset".to_string(), "slower".into());
    opts
}

impl Default for ProfilesSection {
    fn default() -> Self {
        Self {
            normal: default_normal_profile(),
            hardsub: default_hardsub_profile(),
        }
    }
}

/// `[runtime]` section: polling cadences and the stop grace period.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// How often the run-all walk re-checks the task it is waiting on.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Period of the shared output drain loop.
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    /// How long `stop` waits after the terminate signal before killing.
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_drain_interval_ms() -> u64 {
    100
}

fn default_stop_grace_secs() -> u64 {
    5
}

impl RuntimeSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            drain_interval_ms: default_drain_interval_ms(),
            stop_grace_secs: default_stop_grace_secs(),
        }
    }
}
