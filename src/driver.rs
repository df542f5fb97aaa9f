//! The search driver: runs one `Tree` search per target, in parallel.

use std::collections::HashSet;
use std::sync::Arc;

use log::{error, info};
use rayon::prelude::*;

use crate::chem::{ChemKernel, Molecule};
use crate::config::{EvaluationType, TreeConfig};
use crate::error::{MctsError, Result};
use crate::output::{Reaction, RouteNode, TargetStatsRow};
use crate::policy::evaluation::{FixedEstimator, RandomEstimator, RolloutEstimator, ValueEstimator};
use crate::policy::expansion::ExpansionPolicy;
use crate::stats::SearchStatistics;
use crate::tree::{StopReason, Tree};

/// The outcome of searching a single target.
pub struct TargetResult<M: Molecule> {
    /// The target molecule searched.
    pub target: M,
    /// Per-target search statistics.
    pub stats: SearchStatistics,
    /// The best-scoring route found, if any.
    pub best_route: Option<Vec<Reaction<M>>>,
    /// Newick rendering of the search tree, or empty if no tree was built.
    pub newick_tree: String,
    /// Per-node `(id, value, synthesizability, visits)` metadata paired with
    /// `newick_tree`, or empty if no tree was built.
    pub newick_meta: String,
}

/// A function that builds a fresh `ValueEstimator` for one target's tree.
///
/// Boxed rather than a bare `Arc<dyn ValueEstimator>` because `Rollout`
/// estimators carry per-target state (the stock copy) and `Gcn` estimators
/// wrap non-cloneable closures; each target gets its own instance.
pub type EstimatorFactory<M, Rule> =
    dyn Fn(&TreeConfig) -> Result<Box<dyn ValueEstimator<M, Rule>>> + Send + Sync;

/// Drives MCTS searches for a stream of targets, fanning them out across a
/// `rayon` thread pool. `ChemKernel` and `ExpansionPolicy` are shared
/// read-only across targets; building-block stock is cloned per target.
pub struct SearchDriver<M: Molecule, Rule> {
    kernel: Arc<dyn ChemKernel<M, Rule>>,
    expansion_policy: Arc<dyn ExpansionPolicy<M, Rule>>,
    building_blocks: HashSet<String>,
    config: TreeConfig,
    estimator_factory: Arc<EstimatorFactory<M, Rule>>,
}

impl<M: Molecule, Rule: Send + Sync + 'static> SearchDriver<M, Rule> {
    /// Creates a driver with the default estimator construction for
    /// `config.evaluation_type` (`Random`, `Fixed`, `Rollout`). Building a
    /// driver configured for `EvaluationType::Gcn` with this constructor
    /// fails fast with `MctsError::InvalidConfiguration`, since no network
    /// scorer has been supplied; use `with_estimator_factory` to plug one in.
    pub fn new(
        kernel: Arc<dyn ChemKernel<M, Rule>>,
        expansion_policy: Arc<dyn ExpansionPolicy<M, Rule>>,
        building_blocks: HashSet<String>,
        config: TreeConfig,
    ) -> Result<Self> {
        if config.evaluation_type == EvaluationType::Gcn {
            return Err(MctsError::InvalidConfiguration(
                "evaluation_type = gcn requires a network scorer; use with_estimator_factory"
                    .to_string(),
            ));
        }

        let kernel_for_factory = Arc::clone(&kernel);
        let policy_for_factory = Arc::clone(&expansion_policy);
        let stock_for_factory = building_blocks.clone();

        let factory: Arc<EstimatorFactory<M, Rule>> = Arc::new(move |config: &TreeConfig| {
            let estimator: Box<dyn ValueEstimator<M, Rule>> = match config.evaluation_type {
                EvaluationType::Random => Box::new(RandomEstimator),
                EvaluationType::Fixed => Box::new(FixedEstimator::new(config.fixed_value)),
                EvaluationType::Rollout => Box::new(RolloutEstimator::new(
                    Arc::clone(&policy_for_factory),
                    Arc::clone(&kernel_for_factory),
                    stock_for_factory.clone(),
                    config.min_mol_size,
                    config.max_depth,
                )),
                EvaluationType::Gcn => {
                    return Err(MctsError::InvalidConfiguration(
                        "evaluation_type = gcn requires a network scorer".to_string(),
                    ))
                }
            };
            Ok(estimator)
        });

        Ok(SearchDriver {
            kernel,
            expansion_policy,
            building_blocks,
            config,
            estimator_factory: factory,
        })
    }

    /// Creates a driver with a caller-supplied estimator factory, e.g. to
    /// wire in a `LearnedNetworkEstimator` for `EvaluationType::Gcn`.
    pub fn with_estimator_factory(
        kernel: Arc<dyn ChemKernel<M, Rule>>,
        expansion_policy: Arc<dyn ExpansionPolicy<M, Rule>>,
        building_blocks: HashSet<String>,
        config: TreeConfig,
        estimator_factory: Arc<EstimatorFactory<M, Rule>>,
    ) -> Self {
        SearchDriver {
            kernel,
            expansion_policy,
            building_blocks,
            config,
            estimator_factory,
        }
    }

    /// Runs one search per target, in parallel, and returns one
    /// `TargetResult` per target in input order. A target whose search
    /// cannot even start (estimator construction failure) still produces a
    /// `TargetResult` with empty statistics and `best_route = None`; it does
    /// not abort the batch.
    pub fn run_all(&self, targets: Vec<M>) -> Vec<TargetResult<M>>
    where
        Rule: Clone,
    {
        targets
            .into_par_iter()
            .map(|target| self.run_one(target))
            .collect()
    }

    fn run_one(&self, target: M) -> TargetResult<M>
    where
        Rule: Clone,
    {
        let smiles = target.smiles();
        let estimator = match (self.estimator_factory)(&self.config) {
            Ok(e) => e,
            Err(err) => {
                error!("target {smiles}: {err}");
                return TargetResult {
                    target,
                    stats: SearchStatistics::new(smiles),
                    best_route: None,
                    newick_tree: String::new(),
                    newick_meta: String::new(),
                };
            }
        };

        let mut tree = Tree::new(
            target.clone(),
            self.config.clone(),
            Box::new(ClonedKernel(Arc::clone(&self.kernel))),
            Box::new(ClonedPolicy(Arc::clone(&self.expansion_policy))),
            estimator,
            self.building_blocks.clone(),
        );

        let stop_reason = tree.search();

        let mut stats = SearchStatistics::new(smiles.clone());
        stats.iterations = tree.iterations();
        stats.total_time = tree.elapsed();
        stats.tree_size = tree.len();
        stats.visited_nodes = tree.visited_count();
        stats.routes_found = tree.winning_nodes().len();

        let best_route = tree
            .winning_nodes()
            .iter()
            .map(|&id| (id, tree.score(id)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| tree.route(id));

        let (newick_tree, newick_meta_table) = tree.newick(0);
        let newick_meta = format!("{newick_meta_table:?}");

        match &stop_reason {
            StopReason::TargetIsBuildingBlock => {
                info!("target {smiles}: already a building block");
            }
            StopReason::PolicyEvaluationFailed(msg) => {
                let err = MctsError::PolicyEvaluationFailed(msg.clone());
                error!("target {smiles}: {err}");
            }
            _ => {
                info!(
                    "target {smiles}: {} iterations, {} routes found ({stop_reason:?})",
                    stats.iterations, stats.routes_found
                );
            }
        }

        stats.stop_reason = Some(stop_reason);

        TargetResult {
            target,
            stats,
            best_route,
            newick_tree,
            newick_meta,
        }
    }

    /// Builds the `stats.csv` row and, if a route was found, the
    /// `routes.json` descriptor for one target's result.
    pub fn to_output(&self, result: &TargetResult<M>) -> (TargetStatsRow, Option<RouteNode>) {
        let route_node = result
            .best_route
            .as_ref()
            .map(|reactions| RouteNode::from_route(&result.target, reactions));

        let row = result.stats.to_csv_row(
            result.newick_tree.clone(),
            result.newick_meta.clone(),
            format!("{:?}", result.stats.stop_reason),
        );

        (row, route_node)
    }
}

/// Wraps a shared `Arc<dyn ChemKernel>` so it can be passed to `Tree::new`,
/// which expects an owned `Box`.
struct ClonedKernel<M, Rule>(Arc<dyn ChemKernel<M, Rule>>);

impl<M: Molecule, Rule> ChemKernel<M, Rule> for ClonedKernel<M, Rule> {
    fn apply<'a>(&'a self, molecule: &'a M, rule: &'a Rule) -> Box<dyn Iterator<Item = Vec<M>> + 'a> {
        self.0.apply(molecule, rule)
    }
}

struct ClonedPolicy<M, Rule>(Arc<dyn ExpansionPolicy<M, Rule>>);

impl<M: Molecule, Rule: Clone + 'static> ExpansionPolicy<M, Rule> for ClonedPolicy<M, Rule> {
    fn predict<'a>(
        &'a self,
        retron: &'a crate::retron::Retron<M>,
    ) -> std::result::Result<Box<dyn Iterator<Item = (f32, Rule, u32)> + 'a>, String> {
        self.0.predict(retron)
    }

    fn clone_box(&self) -> Box<dyn ExpansionPolicy<M, Rule>> {
        Box::new(ClonedPolicy(Arc::clone(&self.0)))
    }
}
