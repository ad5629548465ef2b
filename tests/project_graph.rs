use std::sync::Arc;

use bdpipe::config::OptionValue;
use bdpipe::dag::lock_task;
use bdpipe::exec::{CommandSpec, ProfileKind, ShellStageCommands};
use bdpipe::types::{Lang, StageKind, TaskKey, TaskStatus};
use bdpipe_test_utils::builders::ConfigBuilder;
use bdpipe_test_utils::fixtures::ProjectFixture;
use bdpipe_test_utils::init_tracing;
use bdpipe_test_utils::observer::RecordingObserver;

#[test]
fn one_episode_yields_full_template() {
    init_tracing();
    let fx = ProjectFixture::new(&[1]);
    fx.touch("E01/source.m2ts");
    fx.touch("E01/01.vpy");
    let project = fx.project(&ConfigBuilder::new().build(), &ShellStageCommands);

    let names: Vec<String> = project
        .ordered_keys()
        .iter()
        .map(|k| k.stage.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "subtitle_process",
            "subtitle_cleanup",
            "audio",
            "video",
            "merge",
            "mux",
            "hardsub_chs",
            "hardsub_cht",
            "hardsub_chs_merge",
            "hardsub_cht_merge",
            "organize",
        ]
    );

    let prereqs = |stage| {
        lock_task(project.task(TaskKey::new(1, stage)).unwrap())
            .prerequisites()
            .to_vec()
    };
    assert_eq!(prereqs(StageKind::SubtitleCleanup), vec![StageKind::SubtitleProcess]);
    assert_eq!(prereqs(StageKind::Merge), vec![StageKind::Audio, StageKind::Video]);
    assert_eq!(
        prereqs(StageKind::Mux),
        vec![StageKind::SubtitleProcess, StageKind::Merge]
    );
    assert_eq!(prereqs(StageKind::Hardsub(Lang::Cht)), vec![StageKind::Merge]);
    assert_eq!(
        prereqs(StageKind::HardsubMerge(Lang::Chs)),
        vec![StageKind::Hardsub(Lang::Chs)]
    );
    assert_eq!(
        prereqs(StageKind::Organize),
        vec![
            StageKind::Mux,
            StageKind::HardsubMerge(Lang::Chs),
            StageKind::HardsubMerge(Lang::Cht),
        ]
    );
    assert!(prereqs(StageKind::Audio).is_empty());

    for key in project.ordered_keys() {
        assert_eq!(project.status(key).unwrap(), TaskStatus::Pending, "{key}");
    }
}

#[test]
fn existing_video_is_completed_at_creation() {
    init_tracing();
    let fx = ProjectFixture::new(&[1, 2]);
    fx.touch("E01/video.mkv");
    let project = fx.project(&ConfigBuilder::new().build(), &ShellStageCommands);

    let video = project.task(TaskKey::new(1, StageKind::Video)).unwrap();
    {
        let t = lock_task(video);
        assert_eq!(t.status(), TaskStatus::Completed);
        assert!(t.started_at().is_some());
        assert_eq!(t.started_at(), t.ended_at());
        assert!(!t.has_process());
        assert!(t.dispatched_command().is_none());
    }
    assert_eq!(
        project.status(TaskKey::new(2, StageKind::Video)).unwrap(),
        TaskStatus::Pending
    );
    assert_eq!(
        project
            .unmet_prerequisites(TaskKey::new(1, StageKind::Merge))
            .unwrap(),
        vec![StageKind::Audio]
    );
}

#[test]
fn organize_resumes_only_with_every_result() {
    let fx = ProjectFixture::new(&[3]);
    fx.touch("result/E03_complete.mkv");
    fx.touch("result/E03_chs.mkv");
    let cfg = ConfigBuilder::new().build();
    let key = TaskKey::new(3, StageKind::Organize);

    let project = fx.project(&cfg, &ShellStageCommands);
    assert_eq!(project.status(key).unwrap(), TaskStatus::Pending);

    // With a single configured language the two files are enough.
    let project = fx.project(
        &ConfigBuilder::new().languages(&[Lang::Chs]).build(),
        &ShellStageCommands,
    );
    assert_eq!(project.status(key).unwrap(), TaskStatus::Completed);
    assert_eq!(project.ordered_keys().len(), 9);
}

#[test]
fn explicit_episode_list_wins_over_scan() {
    let fx = ProjectFixture::new(&[1, 2, 3]);
    let project = fx.project(
        &ConfigBuilder::new().episodes(&[2]).build(),
        &ShellStageCommands,
    );
    assert_eq!(project.episodes(), &[2]);
    assert!(project.task(TaskKey::new(1, StageKind::Audio)).is_err());
}

#[test]
fn encode_commands_follow_profile_edits() {
    let fx = ProjectFixture::new(&[1]);
    let project = fx.project(
        &ConfigBuilder::new().normal_option("crf", OptionValue::Int(18)).build(),
        &ShellStageCommands,
    );
    let key = TaskKey::new(1, StageKind::Video);

    let spec = lock_task(project.task(key).unwrap()).command().clone();
    assert!(matches!(spec, CommandSpec::Encode { .. }));
    assert!(project.resolve_command(key).unwrap().contains("--crf=18"));

    project
        .set_profile_option(ProfileKind::Normal, "crf", OptionValue::Int(20))
        .unwrap();
    assert!(project.resolve_command(key).unwrap().contains("--crf=20"));

    project.reset_profile(ProfileKind::Normal);
    assert!(project.resolve_command(key).unwrap().contains("--crf=18"));
}

#[test]
fn engine_can_drop_optional_profile_options() {
    let fx = ProjectFixture::new(&[1]);
    let engine = fx.engine(
        &ConfigBuilder::new().build(),
        &ShellStageCommands,
        Arc::new(RecordingObserver::new()),
    );
    let key = TaskKey::new(1, StageKind::Video);
    assert!(engine.project().resolve_command(key).unwrap().contains("--tune=lp"));

    engine.remove_profile_option(ProfileKind::Normal, "tune").unwrap();
    assert!(!engine.project().resolve_command(key).unwrap().contains("--tune"));
    assert!(engine.remove_profile_option(ProfileKind::Normal, "preset").is_err());
    assert_eq!(
        engine.profile(ProfileKind::Normal).get("preset"),
        Some(&OptionValue::from("slower"))
    );
}
