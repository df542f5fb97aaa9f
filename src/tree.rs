//! The search tree: dense node storage and the core MCTS iteration loop.
//!
//! Nodes are stored in parallel `Vec`s indexed by `NodeId` rather than in an
//! owned tree of children, so that back-propagation and selection can touch
//! arbitrary ancestors/descendants by index without borrow-checker fights.
//! Index 0 is an unused sentinel; the root is always id 1.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;

use crate::chem::{ChemKernel, Molecule};
use crate::config::{BackpropType, EvaluationAgg, SearchStrategy, TreeConfig, UcbType};
use crate::node::Node;
use crate::output::Reaction;
use crate::policy::evaluation::ValueEstimator;
use crate::policy::expansion::ExpansionPolicy;
use crate::retron::{intersects_ancestors, Retron};

/// Dense node identifier; 0 is the unused sentinel, the root is 1.
pub type NodeId = u32;

const ROOT: NodeId = 1;

/// The result of a single `Tree::step` call.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// One or more nodes were newly solved this iteration.
    Found(Vec<NodeId>),
    /// No node was solved; carries the last node touched on the descent.
    NotFound(NodeId),
}

/// Why the search loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The target itself is a building block; the search never starts.
    TargetIsBuildingBlock,
    /// `max_iterations` was reached.
    IterationsExceeded,
    /// `max_tree_size` was reached.
    TreeSizeExceeded,
    /// `max_time` elapsed.
    TimeExceeded,
    /// The expansion policy could not be evaluated for a retron on the
    /// descent path; the search aborts rather than expanding blind.
    PolicyEvaluationFailed(String),
}

/// One Monte-Carlo tree search over a single target molecule.
pub struct Tree<M: Molecule, Rule> {
    config: TreeConfig,
    kernel: Box<dyn ChemKernel<M, Rule>>,
    expansion_policy: Box<dyn ExpansionPolicy<M, Rule>>,
    value_estimator: Box<dyn ValueEstimator<M, Rule>>,
    building_blocks: HashSet<String>,

    nodes: Vec<Option<Node<M>>>,
    parent: Vec<NodeId>,
    children: Vec<Vec<NodeId>>,
    visits: Vec<u32>,
    prior: Vec<f32>,
    rule_id: Vec<Option<u32>>,
    depth: Vec<u32>,
    initial_value: Vec<f32>,
    total_value: Vec<f32>,

    winning_nodes: Vec<NodeId>,
    visited: HashSet<NodeId>,
    expanded: HashSet<NodeId>,

    current_iteration: u32,
    current_tree_size: u32,
    start_time: Instant,
    current_time: Duration,
}

impl<M: Molecule, Rule> Tree<M, Rule> {
    /// Builds a fresh tree for `target`. The target's own canonical SMILES
    /// is removed from `building_blocks`'s per-tree copy, so a target can
    /// never trivially solve against itself.
    pub fn new(
        target: M,
        config: TreeConfig,
        kernel: Box<dyn ChemKernel<M, Rule>>,
        expansion_policy: Box<dyn ExpansionPolicy<M, Rule>>,
        value_estimator: Box<dyn ValueEstimator<M, Rule>>,
        mut building_blocks: HashSet<String>,
    ) -> Self {
        building_blocks.remove(&target.smiles());

        let root_retron = Retron::root(target);
        let root_node = Node::new(vec![root_retron.clone()], vec![root_retron]);

        let mut nodes = vec![None, None];
        nodes[ROOT as usize] = Some(root_node);

        Tree {
            config,
            kernel,
            expansion_policy,
            value_estimator,
            building_blocks,
            nodes,
            parent: vec![0, 0],
            children: vec![Vec::new(), Vec::new()],
            visits: vec![0, 0],
            prior: vec![0.0, 0.0],
            rule_id: vec![None, None],
            depth: vec![0, 0],
            initial_value: vec![0.0, 0.0],
            total_value: vec![0.0, 0.0],
            winning_nodes: Vec::new(),
            visited: HashSet::new(),
            expanded: HashSet::new(),
            current_iteration: 0,
            current_tree_size: 2,
            start_time: Instant::now(),
            current_time: Duration::ZERO,
        }
    }

    /// Number of nodes currently in the tree (the root counts as one).
    pub fn len(&self) -> u32 {
        self.current_tree_size - 1
    }

    /// Always `false`: a tree always has at least its root node.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of completed iterations.
    pub fn iterations(&self) -> u32 {
        self.current_iteration
    }

    /// Wall-clock time elapsed since the first `step` call.
    pub fn elapsed(&self) -> Duration {
        self.current_time
    }

    /// Ids of nodes found solved, in discovery order.
    pub fn winning_nodes(&self) -> &[NodeId] {
        &self.winning_nodes
    }

    /// Number of distinct nodes touched by any descent.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// The number of times a descent has passed through `node_id`.
    pub fn visits(&self, node_id: NodeId) -> u32 {
        self.visits[node_id as usize]
    }

    fn node(&self, node_id: NodeId) -> &Node<M> {
        self.nodes[node_id as usize]
            .as_ref()
            .expect("node id within current_tree_size must be populated")
    }

    fn root_is_building_block(&self) -> bool {
        self.node(ROOT)
            .current_retron()
            .map(|r| r.is_building_block(&self.building_blocks, self.config.min_mol_size))
            .unwrap_or(false)
    }

    /// Runs the search to completion, driving `step` until a stop condition
    /// is hit, and returns why it stopped.
    pub fn search(&mut self) -> StopReason {
        loop {
            if let Err(reason) = self.step() {
                return reason;
            }
        }
    }

    /// Runs a single iteration: one root-to-leaf descent, possibly expanding
    /// a node and back-propagating a value.
    pub fn step(&mut self) -> Result<StepOutcome, StopReason> {
        if self.root_is_building_block() {
            return Err(StopReason::TargetIsBuildingBlock);
        }
        if self.current_iteration >= self.config.max_iterations {
            return Err(StopReason::IterationsExceeded);
        }
        if self.current_tree_size >= self.config.max_tree_size {
            return Err(StopReason::TreeSizeExceeded);
        }
        self.current_time = self.start_time.elapsed();
        if self.current_time >= self.config.max_time {
            return Err(StopReason::TimeExceeded);
        }

        self.current_iteration += 1;

        let mut node_id = ROOT;
        let mut current_depth = 0u32;

        loop {
            self.visited.insert(node_id);

            if self.visits[node_id as usize] > 0 {
                if self.children[node_id as usize].is_empty() {
                    debug!("search: node {node_id} is dead (no children)");
                    self.update_visits(node_id);
                    return Ok(StepOutcome::NotFound(node_id));
                }
                node_id = self.select_child(node_id);
                current_depth += 1;
                continue;
            }

            if self.node(node_id).is_solved() {
                self.update_visits(node_id);
                self.winning_nodes.push(node_id);
                return Ok(StepOutcome::Found(vec![node_id]));
            }

            if current_depth < self.config.max_depth {
                if let Err(msg) = self.expand(node_id) {
                    return Err(StopReason::PolicyEvaluationFailed(msg));
                }

                let value = if self.children[node_id as usize].is_empty() {
                    debug!("search: node {node_id} produced no children on expansion");
                    -1.0
                } else {
                    self.expanded.insert(node_id);
                    match self.config.search_strategy {
                        SearchStrategy::EvaluationFirst => {
                            let values: Vec<f32> = self.children[node_id as usize]
                                .iter()
                                .map(|&c| self.initial_value[c as usize])
                                .collect();
                            match self.config.evaluation_agg {
                                EvaluationAgg::Max => {
                                    values.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
                                }
                                EvaluationAgg::Mean => {
                                    values.iter().sum::<f32>() / values.len() as f32
                                }
                            }
                        }
                        SearchStrategy::ExpansionFirst => self.evaluate_node(node_id),
                    }
                };

                self.backpropagate(node_id, value);
                self.update_visits(node_id);

                let mut found = Vec::new();
                for &child_id in &self.children[node_id as usize] {
                    if self.node(child_id).is_solved() {
                        found.push(child_id);
                        self.winning_nodes.push(child_id);
                    }
                }
                if !found.is_empty() {
                    return Ok(StepOutcome::Found(found));
                }
                return Ok(StepOutcome::NotFound(node_id));
            } else {
                let value = self.total_value[node_id as usize];
                self.backpropagate(node_id, value);
                self.update_visits(node_id);
                return Ok(StepOutcome::NotFound(node_id));
            }
        }
    }

    fn ucb(&self, node_id: NodeId) -> f32 {
        let prob = self.prior[node_id as usize];
        let visit = self.visits[node_id as usize] as f32;
        let parent_visits = self.visits[self.parent[node_id as usize] as usize] as f32;

        match self.config.ucb_type {
            UcbType::Puct => {
                let u = self.config.c_ucb * prob * parent_visits.sqrt() / (visit + 1.0);
                self.total_value[node_id as usize] + u
            }
            UcbType::Uct => {
                let u = self.config.c_ucb * parent_visits.sqrt() / (visit + 1.0);
                self.total_value[node_id as usize] + u
            }
            UcbType::Value => self.initial_value[node_id as usize] / (visit + 1.0),
        }
    }

    /// Picks a child by UCB score, ties broken by first-encountered (not
    /// random) for reproducibility.
    fn select_child(&self, node_id: NodeId) -> NodeId {
        if self.config.epsilon > 0.0 {
            let roll: f32 = rand::thread_rng().gen_range(0.0..1.0);
            if roll < self.config.epsilon {
                let children = &self.children[node_id as usize];
                let idx = rand::thread_rng().gen_range(0..children.len());
                return children[idx];
            }
        }

        let mut best_score = f32::NEG_INFINITY;
        let mut best_child = None;
        for &child_id in &self.children[node_id as usize] {
            let score = self.ucb(child_id);
            if score > best_score {
                best_score = score;
                best_child = Some(child_id);
            }
        }
        best_child.expect("select_child called on a node with at least one child")
    }

    fn expand(&mut self, node_id: NodeId) -> Result<(), String> {
        let current_retron = match self.node(node_id).current_retron() {
            Some(r) => r.clone(),
            None => return Ok(()),
        };
        let ancestors = current_retron.ancestors().clone();
        let deferred: Vec<Retron<M>> = self.node(node_id).deferred().to_vec();

        let mut seen_products: HashSet<M> = HashSet::new();
        let mut to_add: Vec<(Node<M>, f32, u32)> = Vec::new();

        let candidates = self.expansion_policy.predict(&current_retron)?;

        for (prob, rule, id) in candidates {
            for products in self.kernel.apply(current_retron.molecule(), &rule) {
                if products.is_empty() || products.iter().all(|p| seen_products.contains(p)) {
                    continue;
                }
                for p in &products {
                    seen_products.insert(p.clone());
                }

                let new_retrons: Vec<Retron<M>> = products
                    .iter()
                    .map(|p| Retron::child_of(p.clone(), &ancestors))
                    .collect();

                if intersects_ancestors(ancestors.as_slice(), &new_retrons) {
                    continue;
                }

                let scaled_prob = prob
                    * products
                        .iter()
                        .filter(|p| p.size() > self.config.min_mol_size)
                        .count() as f32;

                let mut retrons_to_expand = deferred.clone();
                for r in &new_retrons {
                    if !r.is_building_block(&self.building_blocks, self.config.min_mol_size) {
                        retrons_to_expand.push(r.clone());
                    }
                }

                let child_node = Node::new(retrons_to_expand, new_retrons);
                to_add.push((child_node, scaled_prob, id));
            }
        }

        for (child_node, scaled_prob, rule_id) in to_add {
            self.add_node(node_id, child_node, scaled_prob, rule_id);
        }
        Ok(())
    }

    fn add_node(&mut self, parent_id: NodeId, node: Node<M>, prior_prob: f32, rule_id: u32) {
        let new_id = self.current_tree_size;

        self.nodes.push(Some(node));
        self.parent.push(parent_id);
        self.children.push(Vec::new());
        self.visits.push(0);
        self.prior.push(prior_prob);
        self.rule_id.push(Some(rule_id));
        self.depth.push(self.depth[parent_id as usize] + 1);
        self.initial_value.push(0.0);
        self.total_value.push(0.0);
        self.current_tree_size += 1;

        let value = match self.config.search_strategy {
            SearchStrategy::EvaluationFirst => self.evaluate_node(new_id),
            SearchStrategy::ExpansionFirst => self.config.init_node_value,
        };
        self.initial_value[new_id as usize] = value;
        self.total_value[new_id as usize] = value;

        self.children[parent_id as usize].push(new_id);
    }

    fn evaluate_node(&self, node_id: NodeId) -> f32 {
        let node = self.node(node_id);
        let depth = self.depth[node_id as usize];
        self.value_estimator.evaluate(&node.new_retrons, depth)
    }

    fn backpropagate(&mut self, mut node_id: NodeId, value: f32) {
        while node_id != 0 {
            let idx = node_id as usize;
            match self.config.backprop_type {
                BackpropType::Muzero => {
                    let v = self.visits[idx] as f32;
                    self.total_value[idx] = (self.total_value[idx] * v + value) / (v + 1.0);
                }
                BackpropType::Cumulative => {
                    self.total_value[idx] += value;
                }
            }
            node_id = self.parent[idx];
        }
    }

    fn update_visits(&mut self, mut node_id: NodeId) {
        while node_id != 0 {
            self.visits[node_id as usize] += 1;
            node_id = self.parent[node_id as usize];
        }
    }

    /// The chain of node ids from the root to `node_id`, root first.
    pub fn path_to(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut n = node_id;
        while n != 0 {
            ids.push(n);
            n = self.parent[n as usize];
        }
        ids.reverse();
        ids
    }

    /// Reconstructs the sequence of reactions along the route to `node_id`,
    /// root-to-leaf order.
    pub fn route(&self, node_id: NodeId) -> Vec<Reaction<M>> {
        let path = self.path_to(node_id);
        let mut reactions = Vec::with_capacity(path.len().saturating_sub(1));
        for pair in path.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            let before_node = self.node(before);
            let after_node = self.node(after);
            let reactants: Vec<M> = after_node
                .new_retrons
                .iter()
                .map(|r| r.molecule().clone())
                .collect();
            let products: Vec<M> = before_node
                .current_retron()
                .map(|r| vec![r.molecule().clone()])
                .unwrap_or_default();
            let rule_id = self.rule_id[after as usize].unwrap_or(0);
            reactions.push(Reaction {
                reactants,
                products,
                rule_id,
            });
        }
        reactions
    }

    /// Ranks a winning node's route; the `path_length²` denominator favors
    /// shorter routes but is otherwise undocumented upstream.
    pub fn score(&self, node_id: NodeId) -> f32 {
        let mut cumulated = 0.0f32;
        let mut path_length = 0u32;
        let mut n = node_id;
        while n != 0 {
            path_length += 1;
            cumulated += self.total_value[n as usize];
            n = self.parent[n as usize];
        }
        cumulated / (path_length as f32).powi(2)
    }

    /// A human-readable one-paragraph summary of the tree's state.
    pub fn report(&self) -> String {
        format!(
            "Tree for: {:?}\nNumber of nodes: {}\nNumber of visited nodes: {}\nNumber of found routes: {}\nNumber of iterations: {}\nTime: {:.1} seconds",
            self.node(ROOT).current_retron(),
            self.len(),
            self.visited.len(),
            self.winning_nodes.len(),
            self.current_iteration,
            self.current_time.as_secs_f32(),
        )
    }

    /// Newick serialization of the tree, including only subtrees whose
    /// visit count is at least `visits_threshold`, plus a per-node metadata
    /// table of `(total_value, rounded initial_value, visits)`.
    pub fn newick(&self, visits_threshold: u32) -> (String, Vec<(NodeId, f32, f32, u32)>) {
        let mut visited = HashSet::new();
        let newick_string = self.newick_render(ROOT, visits_threshold, &mut visited) + ";";

        let mut meta: Vec<(NodeId, f32, f32, u32)> = visited
            .iter()
            .map(|&id| {
                let value = (self.total_value[id as usize] * 1000.0).round() / 1000.0;
                let synthesisability = self.initial_value[id as usize].round();
                (id, value, synthesisability, self.visits[id as usize])
            })
            .collect();
        meta.sort_by_key(|t| t.0);

        (newick_string, meta)
    }

    fn newick_render(&self, node_id: NodeId, threshold: u32, visited: &mut HashSet<NodeId>) -> String {
        assert!(!visited.contains(&node_id), "the tree must not be circular");
        visited.insert(node_id);

        let node_visits = self.visits[node_id as usize];
        let rendered: Vec<String> = self.children[node_id as usize]
            .iter()
            .filter(|&&c| self.visits[c as usize] >= threshold)
            .map(|&c| self.newick_render(c, threshold, visited))
            .collect();

        if rendered.is_empty() {
            format!("{node_id}:{node_visits}")
        } else {
            format!("({}){}:{}", rendered.join(","), node_id, node_visits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::{TestChemKernel, TestMolecule, TestRule};
    use crate::policy::evaluation::FixedEstimator;
    use crate::policy::expansion::FixedTablePolicy;

    fn stock(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn make_tree(
        target: &str,
        stock_names: &[&str],
        policy: FixedTablePolicy<TestRule>,
        config: TreeConfig,
    ) -> Tree<TestMolecule, TestRule> {
        Tree::new(
            TestMolecule::new(target, 20),
            config,
            Box::new(TestChemKernel),
            Box::new(policy),
            Box::new(FixedEstimator::new(0.5)),
            stock(stock_names),
        )
    }

    #[test]
    fn target_already_building_block_stops_immediately() {
        let mut tree = make_tree(
            "M0",
            &["M0"],
            FixedTablePolicy::new(),
            TreeConfig::default().with_max_iterations(10),
        );
        let reason = tree.step().unwrap_err();
        assert_eq!(reason, StopReason::TargetIsBuildingBlock);
        assert_eq!(tree.iterations(), 0);
        assert!(tree.winning_nodes().is_empty());
    }

    #[test]
    fn one_step_route_is_found_and_routed() {
        let rule = TestRule::new(
            "M",
            vec![vec![TestMolecule::new("A", 20), TestMolecule::new("B", 20)]],
        );
        let policy = FixedTablePolicy::new().with_rule("M", vec![(0.9, rule, 1)]);
        let config = TreeConfig::default()
            .with_max_iterations(10)
            .with_max_depth(3)
            .with_epsilon(0.0);
        let mut tree = make_tree("M", &["A", "B"], policy, config);

        let reason = tree.search();
        assert_eq!(reason, StopReason::IterationsExceeded);
        assert!(!tree.winning_nodes().is_empty());

        let winner = tree.winning_nodes()[0];
        let route = tree.route(winner);
        assert_eq!(route.len(), 1);
        let mut reactant_smiles: Vec<String> =
            route[0].reactants.iter().map(|m| m.smiles()).collect();
        reactant_smiles.sort();
        assert_eq!(reactant_smiles, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(route[0].products[0].smiles(), "M");
    }

    #[test]
    fn loop_rule_never_produces_a_child() {
        let m = TestMolecule::new("M", 20);
        let x = TestMolecule::new("X", 20);
        let rule = TestRule::new("M", vec![vec![m.clone(), x.clone()]]);
        let policy = FixedTablePolicy::new().with_rule("M", vec![(1.0, rule, 1)]);
        let config = TreeConfig::default().with_max_iterations(5);
        let mut tree = make_tree("M", &["X"], policy, config);

        tree.search();
        assert!(tree.winning_nodes().is_empty());
    }

    #[test]
    fn zero_iterations_yields_no_winners() {
        let mut tree = make_tree(
            "M",
            &[],
            FixedTablePolicy::new(),
            TreeConfig::default().with_max_iterations(0),
        );
        let reason = tree.step().unwrap_err();
        assert_eq!(reason, StopReason::IterationsExceeded);
        assert!(tree.winning_nodes().is_empty());
    }

    #[test]
    fn newick_output_has_no_cycles_and_starts_at_root() {
        let rule = TestRule::new(
            "M",
            vec![vec![TestMolecule::new("A", 20), TestMolecule::new("B", 20)]],
        );
        let policy = FixedTablePolicy::new().with_rule("M", vec![(0.9, rule, 1)]);
        let mut tree = make_tree(
            "M",
            &["A", "B"],
            policy,
            TreeConfig::default().with_max_iterations(3),
        );
        tree.search();
        let (newick, _meta) = tree.newick(0);
        assert!(newick.ends_with(';'));
        assert!(newick.contains("1:"));
    }
}
