// src/dag/layout.rs

//! On-disk naming convention for one episode.
//!
//! The layout is shared by the completion predicates and the default stage
//! commands so both always agree on where an artifact lives.

use std::path::{Path, PathBuf};

use crate::types::{EpisodeId, Lang};

/// Directory holding the organized final outputs of every episode.
pub const RESULTS_DIR: &str = "result";

/// Subset fonts produced by subtitle processing.
pub const SUBSET_FONTS_DIR: &str = "subsetted_fonts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeLayout {
    root: PathBuf,
    episode: EpisodeId,
}

impl EpisodeLayout {
    pub fn new(root: impl Into<PathBuf>, episode: EpisodeId) -> Self {
        Self {
            root: root.into(),
            episode,
        }
    }

    pub fn episode(&self) -> EpisodeId {
        self.episode
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Zero-padded episode number, e.g. `07`.
    pub fn number(&self) -> String {
        format!("{:02}", self.episode)
    }

    /// Directory name, e.g. `E07`.
    pub fn tag(&self) -> String {
        format!("E{:02}", self.episode)
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(self.tag())
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    /// Shared font library the subtitle tool subsets from.
    pub fn fonts_library(&self) -> PathBuf {
        self.root.join("fonts")
    }

    pub fn source(&self) -> PathBuf {
        self.dir().join("source.m2ts")
    }

    pub fn video_script(&self) -> PathBuf {
        self.dir().join(format!("{}.vpy", self.number()))
    }

    pub fn subset_fonts(&self) -> PathBuf {
        self.dir().join(SUBSET_FONTS_DIR)
    }

    pub fn renamed_subtitle(&self, lang: Lang) -> PathBuf {
        self.dir()
            .join(format!("{}.{lang}_jpn.rename.ass", self.number()))
    }

    pub fn audio_wav(&self) -> PathBuf {
        self.dir().join(format!("audio{}.wav", self.number()))
    }

    pub fn audio_flac(&self) -> PathBuf {
        self.dir().join(format!("output{}.flac", self.number()))
    }

    pub fn audio_aac(&self) -> PathBuf {
        self.dir().join(format!("audio{}.aac", self.number()))
    }

    pub fn video(&self) -> PathBuf {
        self.dir().join("video.mkv")
    }

    pub fn merged(&self) -> PathBuf {
        self.dir().join("final_output.mkv")
    }

    pub fn muxed(&self) -> PathBuf {
        self.dir().join("final_with_subs.mkv")
    }

    pub fn mux_temp(&self) -> PathBuf {
        self.dir().join("temp")
    }

    pub fn hardsub_script(&self, lang: Lang) -> PathBuf {
        self.dir().join(format!("{lang}.vpy"))
    }

    pub fn hardsub_video(&self, lang: Lang) -> PathBuf {
        self.dir().join(format!("{lang}.mkv"))
    }

    pub fn hardsub_final(&self, lang: Lang) -> PathBuf {
        self.dir().join(format!("final_{lang}.mkv"))
    }

    pub fn result_complete(&self) -> PathBuf {
        self.results_dir()
            .join(format!("{}_complete.mkv", self.tag()))
    }

    pub fn result_hardsub(&self, lang: Lang) -> PathBuf {
        self.results_dir()
            .join(format!("{}_{lang}.mkv", self.tag()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_zero_padded() {
        let layout = EpisodeLayout::new("/proj", 3);
        assert_eq!(layout.dir(), PathBuf::from("/proj/E03"));
        assert_eq!(layout.audio_flac(), PathBuf::from("/proj/E03/output03.flac"));
        assert_eq!(
            layout.result_hardsub(Lang::Cht),
            PathBuf::from("/proj/result/E03_cht.mkv")
        );
        assert_eq!(
            EpisodeLayout::new("/proj", 112).tag(),
            "E112"
        );
    }
}
