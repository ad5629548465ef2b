use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Numeric episode identifier (`E01` on disk is episode `1`).
pub type EpisodeId = u32;

/// Subtitle language a hardsub branch is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// Simplified Chinese + Japanese.
    Chs,
    /// Traditional Chinese + Japanese.
    Cht,
}

impl Lang {
    pub const ALL: [Lang; 2] = [Lang::Chs, Lang::Cht];

    pub fn as_str(self) -> &'static str {
        match self {
            Lang::Chs => "chs",
            Lang::Cht => "cht",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chs" => Ok(Lang::Chs),
            "cht" => Ok(Lang::Cht),
            other => Err(format!(
                "invalid language: {other} (expected \"chs\" or \"cht\")"
            )),
        }
    }
}

/// One step of the per-episode pipeline.
///
/// Hardsub stages carry their language as data; nothing in the crate ever
/// classifies a stage by looking inside its rendered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    SubtitleProcess,
    SubtitleCleanup,
    Audio,
    Video,
    Merge,
    Mux,
    Hardsub(Lang),
    HardsubMerge(Lang),
    Organize,
}

impl StageKind {
    /// Sort key used for listing and for the run-all walk.
    ///
    /// Hardsub encodes for every language come before any hardsub merge, in
    /// language order.
    pub fn priority(self) -> (u8, u8) {
        match self {
            StageKind::SubtitleProcess => (1, 0),
            StageKind::SubtitleCleanup => (2, 0),
            StageKind::Audio => (3, 0),
            StageKind::Video => (4, 0),
            StageKind::Merge => (5, 0),
            StageKind::Mux => (6, 0),
            StageKind::Hardsub(lang) => (7, lang as u8),
            StageKind::HardsubMerge(lang) => (8, lang as u8),
            StageKind::Organize => (9, 0),
        }
    }

    /// Stages of the same episode that must be `completed` before this one
    /// may start.
    pub fn prerequisites(self, langs: &[Lang]) -> Vec<StageKind> {
        match self {
            StageKind::SubtitleProcess | StageKind::Audio | StageKind::Video => Vec::new(),
            StageKind::SubtitleCleanup => vec![StageKind::SubtitleProcess],
            StageKind::Merge => vec![StageKind::Audio, StageKind::Video],
            StageKind::Mux => vec![StageKind::Merge, StageKind::SubtitleProcess],
            StageKind::Hardsub(_) => vec![StageKind::Merge],
            StageKind::HardsubMerge(lang) => vec![StageKind::Hardsub(lang)],
            StageKind::Organize => {
                let mut deps = vec![StageKind::Mux];
                deps.extend(langs.iter().map(|&l| StageKind::HardsubMerge(l)));
                deps
            }
        }
    }

    /// Every stage of the template for the given languages, in priority order.
    pub fn template(langs: &[Lang]) -> Vec<StageKind> {
        let mut stages = vec![
            StageKind::SubtitleProcess,
            StageKind::SubtitleCleanup,
            StageKind::Audio,
            StageKind::Video,
            StageKind::Merge,
            StageKind::Mux,
        ];
        stages.extend(langs.iter().map(|&l| StageKind::Hardsub(l)));
        stages.extend(langs.iter().map(|&l| StageKind::HardsubMerge(l)));
        stages.push(StageKind::Organize);
        stages.sort_by_key(|s| s.priority());
        stages
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::SubtitleProcess => f.write_str("subtitle_process"),
            StageKind::SubtitleCleanup => f.write_str("subtitle_cleanup"),
            StageKind::Audio => f.write_str("audio"),
            StageKind::Video => f.write_str("video"),
            StageKind::Merge => f.write_str("merge"),
            StageKind::Mux => f.write_str("mux"),
            StageKind::Hardsub(lang) => write!(f, "hardsub_{lang}"),
            StageKind::HardsubMerge(lang) => write!(f, "hardsub_{lang}_merge"),
            StageKind::Organize => f.write_str("organize"),
        }
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let kind = match s.as_str() {
            "subtitle_process" => StageKind::SubtitleProcess,
            "subtitle_cleanup" => StageKind::SubtitleCleanup,
            "audio" => StageKind::Audio,
            "video" => StageKind::Video,
            "merge" => StageKind::Merge,
            "mux" => StageKind::Mux,
            "organize" => StageKind::Organize,
            other => {
                let rest = other
                    .strip_prefix("hardsub_")
                    .ok_or_else(|| format!("unknown stage: {other}"))?;
                match rest.strip_suffix("_merge") {
                    Some(lang) => StageKind::HardsubMerge(lang.parse()?),
                    None => StageKind::Hardsub(rest.parse()?),
                }
            }
        };
        Ok(kind)
    }
}

/// Address of one task: the episode plus the stage applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub episode: EpisodeId,
    pub stage: StageKind,
}

impl TaskKey {
    pub fn new(episode: EpisodeId, stage: StageKind) -> Self {
        Self { episode, stage }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:02}:{}", self.episode, self.stage)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl TaskStatus {
    /// Terminal for the current run; the end timestamp is set exactly in
    /// these states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Stopped
        )
    }

    /// A live process group exists for the task.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Paused)
    }

    /// An explicit start is accepted from here (failed/stopped re-enter
    /// through `pending`).
    pub fn is_startable(self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::Failed | TaskStatus::Stopped
        )
    }

    /// Whether the lifecycle allows moving from `self` to `to`.
    pub fn can_transition(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Pending, Completed)
                | (Running, Paused)
                | (Paused, Running)
                | (Running | Paused, Completed | Failed | Stopped)
                | (Failed | Stopped, Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_parse_back() {
        for stage in StageKind::template(&Lang::ALL) {
            let parsed: StageKind = stage.to_string().parse().unwrap();
            assert_eq!(parsed, stage);
        }
        assert_eq!(
            "hardsub_cht_merge".parse::<StageKind>().unwrap(),
            StageKind::HardsubMerge(Lang::Cht)
        );
        assert!("hardsub_jpn".parse::<StageKind>().is_err());
        assert!("encode".parse::<StageKind>().is_err());
    }

    #[test]
    fn template_follows_fixed_priority() {
        let names: Vec<String> = StageKind::template(&Lang::ALL)
            .iter()
            .map(|s| s.to_string())
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
    }

    #[test]
    fn organize_waits_for_every_language() {
        let deps = StageKind::Organize.prerequisites(&[Lang::Cht]);
        assert_eq!(deps, vec![StageKind::Mux, StageKind::HardsubMerge(Lang::Cht)]);
    }

    #[test]
    fn completed_has_no_restart_edge() {
        assert!(!TaskStatus::Completed.can_transition(TaskStatus::Pending));
        assert!(TaskStatus::Stopped.can_transition(TaskStatus::Pending));
        assert!(!TaskStatus::Pending.can_transition(TaskStatus::Paused));
        assert!(TaskStatus::Paused.can_transition(TaskStatus::Stopped));
    }
}
