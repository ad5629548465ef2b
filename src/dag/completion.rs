// src/dag/completion.rs

//! Resume detection: has a stage already produced its output artifact?
//!
//! Predicates only test for existence; they never read file contents and
//! never fail. A probe error counts as "not completed". A truncated artifact
//! left behind by a killed process is indistinguishable from a finished one.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dag::layout::EpisodeLayout;
use crate::fs::FileSystem;
use crate::types::{Lang, StageKind};

#[derive(Debug, Clone)]
pub struct CompletionDetector {
    fs: Arc<dyn FileSystem>,
    langs: Vec<Lang>,
}

impl CompletionDetector {
    pub fn new(fs: Arc<dyn FileSystem>, langs: Vec<Lang>) -> Self {
        Self { fs, langs }
    }

    /// Whether `stage` of the episode described by `layout` already finished.
    pub fn is_completed(&self, stage: StageKind, layout: &EpisodeLayout) -> bool {
        let done = match stage {
            StageKind::SubtitleProcess => self.exists(&layout.subset_fonts()),
            StageKind::SubtitleCleanup => {
                self.exists(&layout.subset_fonts()) && self.raw_subtitles_removed(layout)
            }
            StageKind::Audio => self.exists(&layout.audio_flac()),
            StageKind::Video => self.exists(&layout.video()),
            StageKind::Merge => self.exists(&layout.merged()),
            StageKind::Mux => self.exists(&layout.muxed()),
            StageKind::Hardsub(lang) => self.exists(&layout.hardsub_video(lang)),
            StageKind::HardsubMerge(lang) => self.exists(&layout.hardsub_final(lang)),
            StageKind::Organize => {
                self.exists(&layout.result_complete())
                    && self
                        .langs
                        .iter()
                        .all(|&lang| self.exists(&layout.result_hardsub(lang)))
            }
        };

        debug!(
            episode = layout.episode(),
            stage = %stage,
            done,
            "completion probe"
        );
        done
    }

    fn exists(&self, path: &Path) -> bool {
        match self.fs.try_exists(path) {
            Ok(exists) => exists,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "completion probe failed; treating stage as not completed"
                );
                false
            }
        }
    }

    /// Cleanup is done once no subtitle other than the renamed outputs is
    /// left in the episode directory.
    fn raw_subtitles_removed(&self, layout: &EpisodeLayout) -> bool {
        let dir = layout.dir();
        match self.fs.read_dir(&dir) {
            Ok(entries) => !entries.iter().any(|p| is_raw_subtitle(p)),
            Err(err) => {
                warn!(
                    path = %dir.display(),
                    error = %err,
                    "listing episode directory failed; treating cleanup as not completed"
                );
                false
            }
        }
    }
}

fn is_raw_subtitle(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".ass") && !name.ends_with(".rename.ass")
}
