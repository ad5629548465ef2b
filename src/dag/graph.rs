// src/dag/graph.rs

//! The fixed per-episode stage template as a directed acyclic graph.
//!
//! Edge direction: prerequisite -> stage. For `merge` (after `audio` and
//! `video`) there are edges `audio -> merge` and `video -> merge`.

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{PipelineError, Result};
use crate::types::{Lang, StageKind};

#[derive(Debug, Clone)]
pub struct StageGraph {
    graph: DiGraphMap<StageKind, ()>,
    /// Stages in fixed priority order.
    order: Vec<StageKind>,
}

impl StageGraph {
    /// Build the template for the given hardsub languages.
    ///
    /// Fails if the template is cyclic or if the priority order would start a
    /// stage before one of its prerequisites.
    pub fn for_languages(langs: &[Lang]) -> Result<Self> {
        let order = StageKind::template(langs);
        let mut graph: DiGraphMap<StageKind, ()> = DiGraphMap::new();

        for &stage in &order {
            graph.add_node(stage);
        }
        for &stage in &order {
            for dep in stage.prerequisites(langs) {
                graph.add_edge(dep, stage, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(PipelineError::ConfigError(format!(
                "cycle detected in stage template involving '{}'",
                cycle.node_id()
            )));
        }

        for (idx, stage) in order.iter().enumerate() {
            for dep in graph.neighbors_directed(*stage, Direction::Incoming) {
                if !order[..idx].contains(&dep) {
                    return Err(PipelineError::ConfigError(format!(
                        "stage '{stage}' is ordered before its prerequisite '{dep}'"
                    )));
                }
            }
        }

        Ok(Self { graph, order })
    }

    /// Stages in priority order.
    pub fn stages(&self) -> &[StageKind] {
        &self.order
    }

    /// Direct prerequisites of `stage`, in priority order.
    pub fn prerequisites_of(&self, stage: StageKind) -> Vec<StageKind> {
        self.sorted(self.graph.neighbors_directed(stage, Direction::Incoming))
    }

    /// Stages that list `stage` as a direct prerequisite, in priority order.
    pub fn dependents_of(&self, stage: StageKind) -> Vec<StageKind> {
        self.sorted(self.graph.neighbors_directed(stage, Direction::Outgoing))
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn sorted(&self, it: impl Iterator<Item = StageKind>) -> Vec<StageKind> {
        let mut v: Vec<StageKind> = it.collect();
        v.sort_by_key(|s| s.priority());
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_edges_match_prerequisites() {
        let g = StageGraph::for_languages(&Lang::ALL).unwrap();
        assert_eq!(g.stages().len(), 11);

        assert_eq!(
            g.prerequisites_of(StageKind::Mux),
            vec![StageKind::SubtitleProcess, StageKind::Merge]
        );
        assert_eq!(
            g.dependents_of(StageKind::Merge),
            vec![
                StageKind::Mux,
                StageKind::Hardsub(Lang::Chs),
                StageKind::Hardsub(Lang::Cht),
            ]
        );
        assert_eq!(
            g.prerequisites_of(StageKind::Organize),
            vec![
                StageKind::Mux,
                StageKind::HardsubMerge(Lang::Chs),
                StageKind::HardsubMerge(Lang::Cht),
            ]
        );
        // 1 + 2 + 2 + 2 + 2 + 3 edges
        assert_eq!(g.edge_count(), 12);
    }

    #[test]
    fn single_language_template() {
        let g = StageGraph::for_languages(&[Lang::Chs]).unwrap();
        assert_eq!(g.stages().len(), 9);
        assert!(!g.stages().contains(&StageKind::Hardsub(Lang::Cht)));
    }
}
