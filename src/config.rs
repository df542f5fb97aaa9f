//! Configuration for the MCTS search.
//!
//! Builder-style structs with `with_*` setters, one field per tunable option.

use std::time::Duration;

/// UCB child-selection formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UcbType {
    /// `Q + c * p * sqrt(N) / (v + 1)` — AlphaZero-style, prior-weighted.
    Puct,
    /// `Q + c * sqrt(N) / (v + 1)` — classic UCT, no prior.
    Uct,
    /// `V0 / (v + 1)` — raw initial-value decay, no exploitation term.
    Value,
}

/// Back-propagation aggregation formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpropType {
    /// Running average: `(total * visits + value) / (visits + 1)`.
    Muzero,
    /// Running sum: `total + value`.
    Cumulative,
}

/// When the value estimator is invoked relative to expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Back-propagate an aggregate of the freshly expanded children's initial values.
    EvaluationFirst,
    /// Back-propagate a fresh evaluation of the expanded node itself.
    ExpansionFirst,
}

/// Aggregation used with `SearchStrategy::EvaluationFirst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationAgg {
    /// Take the maximum child initial value.
    Max,
    /// Take the mean child initial value.
    Mean,
}

/// Which `ValueEstimator` variant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationType {
    /// Uniform random value in `[0, 1)`.
    Random,
    /// Forward rollout simulation.
    Rollout,
    /// Learned value network (requires an injected scorer).
    Gcn,
    /// A fixed configured constant.
    Fixed,
}

/// Configuration for a single `Tree` search.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Hard cap on iterations.
    pub max_iterations: u32,
    /// Hard cap on node count.
    pub max_tree_size: u32,
    /// Wall-clock budget per target.
    pub max_time: Duration,
    /// Maximum tree depth.
    pub max_depth: u32,
    /// UCB formula.
    pub ucb_type: UcbType,
    /// UCB exploration weight.
    pub c_ucb: f32,
    /// Back-propagation formula.
    pub backprop_type: BackpropType,
    /// When the evaluator is invoked.
    pub search_strategy: SearchStrategy,
    /// Which `ValueEstimator` variant the driver should construct by default.
    pub evaluation_type: EvaluationType,
    /// Aggregation used with `SearchStrategy::EvaluationFirst`.
    pub evaluation_agg: EvaluationAgg,
    /// Constant used to seed new nodes with `SearchStrategy::ExpansionFirst`.
    pub init_node_value: f32,
    /// Value returned by the `Fixed` evaluator.
    pub fixed_value: f32,
    /// Epsilon-greedy exploration probability in `SelectChild`.
    pub epsilon: f32,
    /// Building-block size threshold; also used in rule filtering.
    pub min_mol_size: u32,
    /// Suppress progress reporting.
    pub silent: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            max_iterations: 100,
            max_tree_size: 10_000,
            max_time: Duration::from_secs(120),
            max_depth: 9,
            ucb_type: UcbType::Puct,
            c_ucb: 0.1,
            backprop_type: BackpropType::Muzero,
            search_strategy: SearchStrategy::ExpansionFirst,
            evaluation_type: EvaluationType::Random,
            evaluation_agg: EvaluationAgg::Max,
            init_node_value: 0.5,
            fixed_value: 0.5,
            epsilon: 0.0,
            min_mol_size: 6,
            silent: true,
        }
    }
}

impl TreeConfig {
    /// Sets the hard cap on iterations.
    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    /// Sets the hard cap on node count.
    pub fn with_max_tree_size(mut self, n: u32) -> Self {
        self.max_tree_size = n;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_max_time(mut self, d: Duration) -> Self {
        self.max_time = d;
        self
    }

    /// Sets the maximum tree depth.
    pub fn with_max_depth(mut self, n: u32) -> Self {
        self.max_depth = n;
        self
    }

    /// Sets the UCB formula.
    pub fn with_ucb_type(mut self, t: UcbType) -> Self {
        self.ucb_type = t;
        self
    }

    /// Sets the UCB exploration weight.
    pub fn with_c_ucb(mut self, c: f32) -> Self {
        self.c_ucb = c;
        self
    }

    /// Sets the back-propagation formula.
    pub fn with_backprop_type(mut self, t: BackpropType) -> Self {
        self.backprop_type = t;
        self
    }

    /// Sets when the evaluator is invoked.
    pub fn with_search_strategy(mut self, s: SearchStrategy) -> Self {
        self.search_strategy = s;
        self
    }

    /// Sets the `ValueEstimator` variant to construct by default.
    pub fn with_evaluation_type(mut self, t: EvaluationType) -> Self {
        self.evaluation_type = t;
        self
    }

    /// Sets the evaluation-first aggregation.
    pub fn with_evaluation_agg(mut self, a: EvaluationAgg) -> Self {
        self.evaluation_agg = a;
        self
    }

    /// Sets the expansion-first constant seed value.
    pub fn with_init_node_value(mut self, v: f32) -> Self {
        self.init_node_value = v;
        self
    }

    /// Sets the constant returned by the `Fixed` evaluator.
    pub fn with_fixed_value(mut self, v: f32) -> Self {
        self.fixed_value = v;
        self
    }

    /// Sets the epsilon-greedy exploration probability.
    pub fn with_epsilon(mut self, e: f32) -> Self {
        self.epsilon = e.clamp(0.0, 1.0);
        self
    }

    /// Sets the building-block size threshold.
    pub fn with_min_mol_size(mut self, n: u32) -> Self {
        self.min_mol_size = n;
        self
    }

    /// Sets whether progress reporting is suppressed.
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Configuration for an `ExpansionPolicy` adapter.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionConfig {
    /// Top-K cutoff on the ranked candidate rule list.
    pub top_rules: usize,
    /// Minimum probability a candidate rule must clear to be yielded.
    pub rule_prob_threshold: f32,
    /// Blend factor between applicability and priority scores, `[0, 1]`.
    pub priority_rules_fraction: f32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        ExpansionConfig {
            top_rules: 50,
            rule_prob_threshold: 0.0,
            priority_rules_fraction: 0.0,
        }
    }
}

impl ExpansionConfig {
    /// Sets the top-K cutoff.
    pub fn with_top_rules(mut self, n: usize) -> Self {
        self.top_rules = n;
        self
    }

    /// Sets the probability threshold.
    pub fn with_rule_prob_threshold(mut self, t: f32) -> Self {
        self.rule_prob_threshold = t;
        self
    }

    /// Sets the priority/applicability blend factor.
    pub fn with_priority_rules_fraction(mut self, a: f32) -> Self {
        self.priority_rules_fraction = a.clamp(0.0, 1.0);
        self
    }
}
