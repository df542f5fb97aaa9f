//! Route and statistics output formats: `routes.json` and `stats.csv`.

use std::io;
use std::path::Path;

use serde::Serialize;

use crate::chem::Molecule;

/// A single reaction step along a reconstructed route: one or more reactants
/// combining into one or more products, tagged with the rule that produced it.
#[derive(Clone, Debug)]
pub struct Reaction<M> {
    /// The new retrons' molecules, i.e. what the reaction consumes.
    pub reactants: Vec<M>,
    /// The molecule(s) the reaction produces (usually a single parent retron).
    pub products: Vec<M>,
    /// The id of the expansion-policy rule that produced this reaction.
    pub rule_id: u32,
}

/// A node in a serialized route tree: either a molecule or a reaction,
/// alternating from the target down to its building blocks.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum RouteNode {
    /// A molecule node.
    #[serde(rename = "mol")]
    Mol {
        /// The molecule's canonical structural string.
        smiles: String,
        /// Whether this molecule terminates the route (a purchasable building block).
        in_stock: bool,
        /// The reaction(s) that produce this molecule, if it is not a leaf.
        children: Vec<RouteNode>,
    },
    /// A reaction node.
    #[serde(rename = "reaction")]
    Reaction {
        /// The rule id that produced this reaction.
        rule_id: u32,
        /// The reactant molecule nodes this reaction consumes.
        children: Vec<RouteNode>,
    },
}

impl RouteNode {
    /// Builds a `mol` node for a leaf (in-stock) building block.
    pub fn leaf<M: Molecule>(molecule: &M) -> Self {
        RouteNode::Mol {
            smiles: molecule.smiles(),
            in_stock: true,
            children: Vec::new(),
        }
    }

    /// Builds a `mol` node from `reactions` (root-to-leaf order), recursively
    /// nesting each reaction's reactants as children of the product molecule.
    pub fn from_route<M: Molecule>(target: &M, reactions: &[Reaction<M>]) -> Self {
        build_mol_node(target, reactions)
    }
}

fn build_mol_node<M: Molecule>(molecule: &M, reactions: &[Reaction<M>]) -> RouteNode {
    match reactions.split_first() {
        None => RouteNode::Mol {
            smiles: molecule.smiles(),
            in_stock: true,
            children: Vec::new(),
        },
        Some((step, rest)) => {
            let reactant_nodes = step
                .reactants
                .iter()
                .map(|r| build_mol_node(r, rest))
                .collect();
            RouteNode::Mol {
                smiles: molecule.smiles(),
                in_stock: false,
                children: vec![RouteNode::Reaction {
                    rule_id: step.rule_id,
                    children: reactant_nodes,
                }],
            }
        }
    }
}

/// One row of `stats.csv`: the per-target search summary.
#[derive(Clone, Debug, Serialize)]
pub struct TargetStatsRow {
    /// The canonical SMILES of the target molecule.
    pub target_smiles: String,
    /// Number of winning nodes found.
    pub num_routes: usize,
    /// Number of nodes in the tree at the end of the search.
    pub num_nodes: u32,
    /// Number of completed iterations.
    pub num_iter: u32,
    /// Wall-clock search time, in seconds.
    pub search_time: f32,
    /// Newick-format tree serialization.
    pub newick_tree: String,
    /// Newick metadata table, serialized as a flat string.
    pub newick_meta: String,
    /// Free-form debug info (e.g. the stop reason, or an error message).
    pub debug_info: String,
}

/// Writes `rows` to `path` as `stats.csv`, in `stats.csv`'s fixed column order.
pub fn write_stats_csv(path: impl AsRef<Path>, rows: &[TargetStatsRow]) -> io::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }
    writer.flush()
}

/// Writes `routes` (one route-tree descriptor per target) to `path` as `routes.json`.
pub fn write_routes_json(path: impl AsRef<Path>, routes: &[RouteNode]) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, routes)?;
    Ok(())
}
