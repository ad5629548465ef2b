use std::sync::Arc;

use bdpipe::types::{StageKind, TaskKey, TaskStatus};
use bdpipe::dag::lock_task;
use bdpipe_test_utils::builders::ConfigBuilder;
use bdpipe_test_utils::fixtures::{ProjectFixture, ScriptedCommands};
use bdpipe_test_utils::observer::RecordingObserver;
use bdpipe_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn concurrent_tasks_keep_their_own_order() {
    init_tracing();
    let fx = ProjectFixture::new(&[1]);
    let observer = Arc::new(RecordingObserver::new());
    let commands = ScriptedCommands::new()
        .with(StageKind::Audio, "for i in $(seq 1 300); do echo \"a$i\"; done")
        .with(StageKind::Video, "for i in $(seq 1 300); do echo \"v$i\" >&2; done");
    let engine = fx.engine(&ConfigBuilder::new().build(), &commands, observer.clone());
    let drain = engine.spawn_drain_loop();

    let audio = TaskKey::new(1, StageKind::Audio);
    let video = TaskKey::new(1, StageKind::Video);
    engine.start(1, StageKind::Audio).unwrap();
    engine.start(1, StageKind::Video).unwrap();

    assert_eq!(
        with_timeout(engine.wait_until_settled(audio)).await.unwrap(),
        TaskStatus::Completed
    );
    assert_eq!(
        with_timeout(engine.wait_until_settled(video)).await.unwrap(),
        TaskStatus::Completed
    );
    with_timeout(engine.flush_output()).await;
    drain.abort();

    let expected_audio: Vec<String> = (1..=300).map(|i| format!("a{i}")).collect();
    let expected_video: Vec<String> = (1..=300).map(|i| format!("v{i}")).collect();
    assert_eq!(observer.lines_for(audio), expected_audio);
    assert_eq!(observer.lines_for(video), expected_video);

    // The task keeps exactly what the observer saw.
    assert_eq!(
        lock_task(engine.project().task(audio).unwrap()).output(),
        expected_audio.as_slice()
    );
    assert_eq!(engine.output(video).unwrap(), expected_video);
}

#[tokio::test]
async fn carriage_return_progress_becomes_lines() {
    init_tracing();
    let fx = ProjectFixture::new(&[1]);
    let observer = Arc::new(RecordingObserver::new());
    let commands = ScriptedCommands::new().with(
        StageKind::Video,
        r"printf 'frame 1\rframe 2\r\n\nencoded 2 frames'",
    );
    let engine = fx.engine(&ConfigBuilder::new().build(), &commands, observer.clone());
    let key = TaskKey::new(1, StageKind::Video);

    engine.start(1, StageKind::Video).unwrap();
    with_timeout(engine.wait_until_settled(key)).await.unwrap();
    with_timeout(engine.flush_output()).await;

    assert_eq!(
        observer.lines_for(key),
        vec!["frame 1", "frame 2", "encoded 2 frames"]
    );
    assert_eq!(observer.finished(), vec![(key, TaskStatus::Completed)]);
}
