//! # retrosynth-mcts
//!
//! A Monte Carlo Tree Search engine for retrosynthetic route discovery.
//!
//! Given a target molecule, a chemistry kernel capable of applying reaction
//! rules in the retrosynthetic direction, an expansion policy that ranks
//! candidate rules, and a building-block stock, this crate searches a tree of
//! molecule decompositions ("retrons") for routes that bottom out in
//! purchasable starting materials.
//!
//! ## Basic usage
//!
//! ```
//! use std::collections::HashSet;
//! use retrosynth_mcts::chem::{TestChemKernel, TestMolecule, TestRule};
//! use retrosynth_mcts::config::TreeConfig;
//! use retrosynth_mcts::policy::evaluation::FixedEstimator;
//! use retrosynth_mcts::policy::expansion::FixedTablePolicy;
//! use retrosynth_mcts::tree::Tree;
//!
//! let rule = TestRule::new(
//!     "M",
//!     vec![vec![TestMolecule::new("A", 20), TestMolecule::new("B", 20)]],
//! );
//! let policy = FixedTablePolicy::new().with_rule("M", vec![(0.9, rule, 1)]);
//!
//! let mut stock = HashSet::new();
//! stock.insert("A".to_string());
//! stock.insert("B".to_string());
//!
//! let mut tree = Tree::new(
//!     TestMolecule::new("M", 20),
//!     TreeConfig::default().with_max_iterations(10),
//!     Box::new(TestChemKernel),
//!     Box::new(policy),
//!     Box::new(FixedEstimator::new(0.5)),
//!     stock,
//! );
//!
//! tree.search();
//! assert!(!tree.winning_nodes().is_empty());
//! ```
//!
//! ## How it works
//!
//! Each iteration of the search:
//!
//! 1. **Select** a path from the root down to an unvisited node, by UCB score.
//! 2. **Expand** that node: apply the expansion policy's ranked candidate
//!    rules through the chemistry kernel, producing child nodes, each holding
//!    the fresh retrons the rule produced.
//! 3. **Evaluate** the expanded node (or its children, depending on
//!    `search_strategy`) with the configured `ValueEstimator`.
//! 4. **Back-propagate** that value up to the root, and bump visit counts.
//!
//! A node is solved when it has nothing left to decompose — every retron it
//! still held has bottomed out in a building block.
//!
//! ## Pluggable components
//!
//! `ChemKernel`, `ExpansionPolicy` and `ValueEstimator` are all trait objects
//! generic over an opaque `Molecule` type and rule handle, so the search
//! itself never needs to know how rules are represented or how molecules are
//! canonicalized. See [`chem`], [`policy::expansion`] and
//! [`policy::evaluation`].

pub mod chem;
pub mod compose;
pub mod config;
pub mod driver;
pub mod error;
pub mod node;
pub mod output;
pub mod policy;
pub mod retron;
pub mod stats;
pub mod tree;

pub use chem::{ChemKernel, Molecule};
pub use config::{ExpansionConfig, TreeConfig};
pub use driver::{SearchDriver, TargetResult};
pub use error::{MctsError, Result};
pub use node::Node;
pub use output::{Reaction, RouteNode};
pub use policy::{ExpansionPolicy, ValueEstimator};
pub use retron::Retron;
pub use stats::SearchStatistics;
pub use tree::{NodeId, StepOutcome, StopReason, Tree};
