use std::sync::Arc;

use proptest::prelude::*;

use bdpipe::config::ProjectConfig;
use bdpipe::dag::{lock_task, EpisodeLayout, Project};
use bdpipe::exec::ShellStageCommands;
use bdpipe::fs::mock::MockFileSystem;
use bdpipe::types::{Lang, StageKind, TaskKey, TaskStatus};

/// The file whose presence alone marks `stage` done (organize and cleanup
/// need more and are handled separately).
fn single_artifact(layout: &EpisodeLayout, stage: StageKind) -> Option<std::path::PathBuf> {
    match stage {
        StageKind::Audio => Some(layout.audio_flac()),
        StageKind::Video => Some(layout.video()),
        StageKind::Merge => Some(layout.merged()),
        StageKind::Mux => Some(layout.muxed()),
        StageKind::Hardsub(lang) => Some(layout.hardsub_video(lang)),
        StageKind::HardsubMerge(lang) => Some(layout.hardsub_final(lang)),
        _ => None,
    }
}

fn stage_strategy() -> impl Strategy<Value = StageKind> {
    prop::sample::select(StageKind::template(&Lang::ALL))
}

proptest! {
    /// Whatever subset of artifacts exists, a task is completed at creation
    /// exactly when its artifact is present, and then with start == end.
    #[test]
    fn completed_at_creation_iff_artifact_exists(
        episodes in prop::collection::btree_set(1u32..40, 1..4),
        present in prop::collection::vec((0usize..4, stage_strategy()), 0..12),
    ) {
        let fs = MockFileSystem::new();
        let episodes: Vec<u32> = episodes.into_iter().collect();
        for &ep in &episodes {
            fs.add_dir(EpisodeLayout::new("/p", ep).dir());
        }

        let mut expected_done = Vec::new();
        for (idx, stage) in present {
            let ep = episodes[idx % episodes.len()];
            let layout = EpisodeLayout::new("/p", ep);
            if let Some(path) = single_artifact(&layout, stage) {
                fs.add_file(path);
                expected_done.push(TaskKey::new(ep, stage));
            }
        }

        let project = Project::build(
            "/p",
            &ProjectConfig::default(),
            Arc::new(fs.clone()),
            &ShellStageCommands,
        ).unwrap();

        for key in project.ordered_keys() {
            let t = lock_task(project.task(key).unwrap());
            if expected_done.contains(&key) {
                prop_assert_eq!(t.status(), TaskStatus::Completed);
                prop_assert!(t.started_at().is_some());
                prop_assert_eq!(t.started_at(), t.ended_at());
            } else if single_artifact(&EpisodeLayout::new("/p", key.episode), key.stage).is_some() {
                prop_assert_eq!(t.status(), TaskStatus::Pending);
                prop_assert!(t.ended_at().is_none());
            }
        }
    }

    /// Probe failures never surface as errors and never mark anything done.
    #[test]
    fn broken_probes_mean_pending(stage in stage_strategy()) {
        let fs = MockFileSystem::new();
        let layout = EpisodeLayout::new("/p", 1);
        fs.add_dir(layout.dir());
        if let Some(path) = single_artifact(&layout, stage) {
            fs.add_file(&path);
            fs.break_path(&path);
        }

        let project = Project::build(
            "/p",
            &ProjectConfig::default(),
            Arc::new(fs.clone()),
            &ShellStageCommands,
        ).unwrap();
        prop_assert_eq!(
            project.status(TaskKey::new(1, stage)).unwrap(),
            TaskStatus::Pending
        );
    }
}
