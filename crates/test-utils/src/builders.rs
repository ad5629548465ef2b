#![allow(dead_code)]

use bdpipe::config::{OptionValue, ProjectConfig, RawConfigFile};
use bdpipe::types::{EpisodeId, Lang};

/// Builder for `ProjectConfig` to simplify test setup.
///
/// Runtime intervals default to values suited for tests (fast polling, short
/// stop grace period).
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.runtime.poll_interval_ms = 20;
        config.runtime.drain_interval_ms = 10;
        config.runtime.stop_grace_secs = 1;
        Self { config }
    }

    pub fn languages(mut self, langs: &[Lang]) -> Self {
        self.config.project.languages = langs.to_vec();
        self
    }

    pub fn episodes(mut self, episodes: &[EpisodeId]) -> Self {
        self.config.project.episodes = Some(episodes.to_vec());
        self
    }

    pub fn normal_option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.config
            .profiles
            .normal
            .insert(key.to_string(), value.into());
        self
    }

    pub fn stop_grace_secs(mut self, secs: u64) -> Self {
        self.config.runtime.stop_grace_secs = secs;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ProjectConfig {
        ProjectConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
