#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use bdpipe::config::ProjectConfig;
use bdpipe::dag::{EpisodeLayout, Project};
use bdpipe::engine::Engine;
use bdpipe::exec::{CommandSpec, StageCommands, TaskObserver};
use bdpipe::fs::RealFileSystem;
use bdpipe::types::{EpisodeId, Lang, StageKind};

/// Stage commands for tests: a fixed shell command per stage, `true` for
/// anything not configured.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCommands {
    commands: HashMap<StageKind, String>,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: StageKind, cmd: &str) -> Self {
        self.commands.insert(stage, cmd.to_string());
        self
    }
}

impl StageCommands for ScriptedCommands {
    fn command_for(&self, _layout: &EpisodeLayout, stage: StageKind, _langs: &[Lang]) -> CommandSpec {
        CommandSpec::shell(
            self.commands
                .get(&stage)
                .cloned()
                .unwrap_or_else(|| "true".to_string()),
        )
    }
}

/// A temporary project root with `E<nn>` episode directories.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new(episodes: &[EpisodeId]) -> Self {
        let dir = TempDir::new().expect("create temp project root");
        for &ep in episodes {
            fs::create_dir_all(dir.path().join(format!("E{ep:02}")))
                .expect("create episode dir");
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self, episode: EpisodeId) -> EpisodeLayout {
        EpisodeLayout::new(self.root(), episode)
    }

    /// Create an empty file (and its parent directories).
    pub fn touch(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, b"").expect("write fixture file");
        path
    }

    pub fn project(&self, config: &ProjectConfig, commands: &dyn StageCommands) -> Project {
        Project::build(self.root(), config, Arc::new(RealFileSystem), commands)
            .expect("build project")
    }

    pub fn engine(
        &self,
        config: &ProjectConfig,
        commands: &dyn StageCommands,
        observer: Arc<dyn TaskObserver>,
    ) -> Engine {
        Engine::new(self.project(config, commands), config, observer)
    }
}
