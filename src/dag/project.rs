// src/dag/project.rs

//! The task graph of a project folder.
//!
//! Built once per root: one task per (episode, stage), ordered episode-major
//! then by stage priority. Tasks are never removed, only transitioned; a
//! different root means a new [`Project`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use chrono::Local;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::model::{OptionValue, ProfileOptions, ProjectConfig};
use crate::dag::completion::CompletionDetector;
use crate::dag::graph::StageGraph;
use crate::dag::layout::EpisodeLayout;
use crate::dag::task::{lock_task, SharedTask, Task};
use crate::errors::{PipelineError, Result};
use crate::exec::command::{EncodeProfiles, ProfileKind};
use crate::exec::stage_commands::StageCommands;
use crate::fs::FileSystem;
use crate::types::{EpisodeId, Lang, StageKind, TaskKey, TaskStatus};

#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    langs: Vec<Lang>,
    episodes: Vec<EpisodeId>,
    graph: StageGraph,
    tasks: Vec<SharedTask>,
    index: HashMap<TaskKey, usize>,
    profiles: RwLock<EncodeProfiles>,
    detector: CompletionDetector,
}

impl Project {
    /// Discover episodes, instantiate the stage template for each and apply
    /// the completion predicates to every new task.
    pub fn build(
        root: impl Into<PathBuf>,
        config: &ProjectConfig,
        fs: Arc<dyn FileSystem>,
        commands: &dyn StageCommands,
    ) -> Result<Self> {
        let root = root.into();
        let langs = config.project.languages.clone();
        let graph = StageGraph::for_languages(&langs)?;

        let episodes = match &config.project.episodes {
            Some(list) => list.clone(),
            None => discover_episodes(&root, fs.as_ref())?,
        };
        if episodes.is_empty() {
            warn!(root = %root.display(), "no episodes found");
        }

        let detector = CompletionDetector::new(fs, langs.clone());
        let now = Local::now();
        let mut tasks = Vec::with_capacity(episodes.len() * graph.stages().len());
        let mut index = HashMap::new();
        let mut resumed = 0usize;

        for &episode in &episodes {
            let layout = EpisodeLayout::new(&root, episode);
            for &stage in graph.stages() {
                let key = TaskKey::new(episode, stage);
                let mut task = Task::new(
                    key,
                    commands.command_for(&layout, stage, &langs),
                    graph.prerequisites_of(stage),
                    layout.dir(),
                );
                if detector.is_completed(stage, &layout) && task.mark_already_done(now) {
                    resumed += 1;
                }
                index.insert(key, tasks.len());
                tasks.push(Arc::new(Mutex::new(task)));
            }
        }

        info!(
            root = %root.display(),
            episodes = episodes.len(),
            tasks = tasks.len(),
            already_completed = resumed,
            "project graph built"
        );

        Ok(Self {
            root,
            langs,
            episodes,
            graph,
            tasks,
            index,
            profiles: RwLock::new(EncodeProfiles::new(&config.profiles)),
            detector,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn languages(&self) -> &[Lang] {
        &self.langs
    }

    pub fn episodes(&self) -> &[EpisodeId] {
        &self.episodes
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// All tasks in run-all order.
    pub fn tasks(&self) -> &[SharedTask] {
        &self.tasks
    }

    pub fn ordered_keys(&self) -> Vec<TaskKey> {
        self.tasks.iter().map(|t| lock_task(t).key()).collect()
    }

    pub fn task(&self, key: TaskKey) -> Result<&SharedTask> {
        self.index
            .get(&key)
            .map(|&idx| &self.tasks[idx])
            .ok_or(PipelineError::TaskNotFound(key))
    }

    pub fn status(&self, key: TaskKey) -> Result<TaskStatus> {
        Ok(lock_task(self.task(key)?).status())
    }

    /// Prerequisites of `key` (same episode) that are not `completed`.
    pub fn unmet_prerequisites(&self, key: TaskKey) -> Result<Vec<StageKind>> {
        let prerequisites = lock_task(self.task(key)?).prerequisites().to_vec();
        let mut missing = Vec::new();
        for stage in prerequisites {
            let dep = TaskKey::new(key.episode, stage);
            if self.status(dep)? != TaskStatus::Completed {
                missing.push(stage);
            }
        }
        Ok(missing)
    }

    /// Command line for starting `key` now, using the current profiles.
    pub fn resolve_command(&self, key: TaskKey) -> Result<String> {
        let spec = lock_task(self.task(key)?).command().clone();
        Ok(spec.resolve(&self.read_profiles()))
    }

    /// Re-apply the completion predicates to `pending` tasks. Returns how
    /// many became `completed`.
    pub fn refresh(&self) -> usize {
        let now = Local::now();
        let mut newly_done = 0;
        for task in &self.tasks {
            let mut t = lock_task(task);
            if t.status() != TaskStatus::Pending {
                continue;
            }
            let key = t.key();
            let layout = EpisodeLayout::new(&self.root, key.episode);
            if self.detector.is_completed(key.stage, &layout) && t.mark_already_done(now) {
                debug!(task = %key, "artifact found; marked completed");
                newly_done += 1;
            }
        }
        newly_done
    }

    pub fn profile(&self, kind: ProfileKind) -> ProfileOptions {
        self.read_profiles().get(kind).clone()
    }

    pub fn set_profile_option(
        &self,
        kind: ProfileKind,
        key: &str,
        value: OptionValue,
    ) -> Result<()> {
        self.write_profiles().set_option(kind, key, value)?;
        info!(profile = %kind, option = key, "encode profile updated");
        Ok(())
    }

    pub fn remove_profile_option(&self, kind: ProfileKind, key: &str) -> Result<()> {
        self.write_profiles().remove_option(kind, key)
    }

    pub fn reset_profile(&self, kind: ProfileKind) {
        self.write_profiles().reset(kind);
    }

    fn read_profiles(&self) -> RwLockReadGuard<'_, EncodeProfiles> {
        self.profiles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_profiles(&self) -> RwLockWriteGuard<'_, EncodeProfiles> {
        self.profiles.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Episode ids from the `E<digits>` directories directly under `root`,
/// sorted and de-duplicated (`E1` and `E01` are the same episode).
pub fn discover_episodes(root: &Path, fs: &dyn FileSystem) -> Result<Vec<EpisodeId>> {
    let re = Regex::new(r"^E(\d+)$").map_err(anyhow::Error::from)?;
    let entries = fs.read_dir(root).map_err(|err| {
        PipelineError::ConfigError(format!(
            "cannot scan project root {}: {err:#}",
            root.display()
        ))
    })?;

    let mut episodes: Vec<EpisodeId> = entries
        .iter()
        .filter(|path| fs.is_dir(path))
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            re.captures(name)?.get(1)?.as_str().parse().ok()
        })
        .collect();
    episodes.sort_unstable();
    episodes.dedup();
    Ok(episodes)
}
