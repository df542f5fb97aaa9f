//! Per-target search statistics.
//!
//! A plain data struct plus a `summary()` string builder, tracking the
//! quantities `stats.csv` actually reports for one target's search.

use std::time::Duration;

use crate::output::TargetStatsRow;
use crate::tree::StopReason;

/// Statistics collected for a single target's search.
#[derive(Debug, Clone)]
pub struct SearchStatistics {
    /// The target's canonical SMILES.
    pub target_smiles: String,
    /// Number of completed iterations.
    pub iterations: u32,
    /// Total time spent searching.
    pub total_time: Duration,
    /// Total number of nodes in the tree.
    pub tree_size: u32,
    /// Number of distinct nodes touched by any descent.
    pub visited_nodes: usize,
    /// Number of winning nodes found.
    pub routes_found: usize,
    /// Why the search stopped.
    pub stop_reason: Option<StopReason>,
}

impl SearchStatistics {
    /// Creates a new, empty statistics object for `target_smiles`.
    pub fn new(target_smiles: impl Into<String>) -> Self {
        SearchStatistics {
            target_smiles: target_smiles.into(),
            iterations: 0,
            total_time: Duration::from_secs(0),
            tree_size: 1,
            visited_nodes: 0,
            routes_found: 0,
            stop_reason: None,
        }
    }

    /// Returns the number of iterations per second.
    pub fn iterations_per_second(&self) -> f64 {
        if self.total_time.as_secs_f64() <= 0.0 {
            return 0.0;
        }
        self.iterations as f64 / self.total_time.as_secs_f64()
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Search statistics for {}:\n\
             - Iterations: {}\n\
             - Total time: {:.3} seconds\n\
             - Tree size: {} nodes\n\
             - Visited nodes: {}\n\
             - Routes found: {}\n\
             - Iterations per second: {:.1}\n\
             - Stop reason: {:?}",
            self.target_smiles,
            self.iterations,
            self.total_time.as_secs_f64(),
            self.tree_size,
            self.visited_nodes,
            self.routes_found,
            self.iterations_per_second(),
            self.stop_reason,
        )
    }

    /// Builds the `stats.csv` row for this target, given the pre-rendered
    /// Newick tree/metadata and an arbitrary debug note.
    pub fn to_csv_row(&self, newick_tree: String, newick_meta: String, debug_info: String) -> TargetStatsRow {
        TargetStatsRow {
            target_smiles: self.target_smiles.clone(),
            num_routes: self.routes_found,
            num_nodes: self.tree_size,
            num_iter: self.iterations,
            search_time: self.total_time.as_secs_f32(),
            newick_tree,
            newick_meta,
            debug_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_statistics_start_at_one_node() {
        let stats = SearchStatistics::new("M");
        assert_eq!(stats.tree_size, 1);
        assert_eq!(stats.iterations_per_second(), 0.0);
    }

    #[test]
    fn iterations_per_second_is_nonzero_with_elapsed_time() {
        let mut stats = SearchStatistics::new("M");
        stats.iterations = 100;
        stats.total_time = Duration::from_secs(2);
        assert!((stats.iterations_per_second() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn summary_mentions_target_and_route_count() {
        let mut stats = SearchStatistics::new("M");
        stats.routes_found = 3;
        let summary = stats.summary();
        assert!(summary.contains("M"));
        assert!(summary.contains("Routes found: 3"));
    }
}
