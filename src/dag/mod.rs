// src/dag/mod.rs

//! Task graph representation.
//!
//! - [`graph`] holds the per-episode stage template as a DAG.
//! - [`layout`] names every artifact of an episode on disk.
//! - [`completion`] decides whether a stage already produced its output.
//! - [`task`] is one stage instance and its lifecycle state machine.
//! - [`project`] instantiates the template for every episode of a root.

pub mod completion;
pub mod graph;
pub mod layout;
pub mod project;
pub mod task;

pub use completion::CompletionDetector;
pub use graph::StageGraph;
pub use layout::EpisodeLayout;
pub use project::Project;
pub use task::{lock_task, SharedTask, Task};
