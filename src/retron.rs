//! The retron: a single intermediate molecule carrying its ancestor chain.
//!
//! Ancestors are tracked by molecule value, not by pointer to a parent
//! `Retron`, to avoid cyclic ownership.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::chem::Molecule;

/// A single intermediate molecule in a retrosynthetic analysis.
///
/// `Retron` equality and hashing delegate entirely to the wrapped molecule;
/// two retrons with the same molecule but different ancestor chains compare
/// equal.
#[derive(Clone)]
pub struct Retron<M: Molecule> {
    molecule: M,
    /// Molecules on the path that produced this retron, self first.
    ancestors: Arc<Vec<M>>,
}

impl<M: Molecule> Retron<M> {
    /// Creates a root retron: its own ancestor chain contains only itself.
    pub fn root(molecule: M) -> Self {
        let ancestors = Arc::new(vec![molecule.clone()]);
        Retron {
            molecule,
            ancestors,
        }
    }

    /// Creates a retron produced by decomposing `parent`, extending its ancestor chain.
    pub fn child_of(molecule: M, parent_ancestors: &Arc<Vec<M>>) -> Self {
        let mut ancestors = Vec::with_capacity(parent_ancestors.len() + 1);
        ancestors.push(molecule.clone());
        ancestors.extend(parent_ancestors.iter().cloned());
        Retron {
            molecule,
            ancestors: Arc::new(ancestors),
        }
    }

    /// The wrapped molecule.
    pub fn molecule(&self) -> &M {
        &self.molecule
    }

    /// The ancestor chain (self first), shared cheaply across clones.
    pub fn ancestors(&self) -> &Arc<Vec<M>> {
        &self.ancestors
    }

    /// True if this retron is purchasable: either small enough to assume
    /// trivially available, or present in the building-block stock.
    pub fn is_building_block(&self, stock: &HashSet<String>, min_size: u32) -> bool {
        self.molecule.size() <= min_size || stock.contains(&self.molecule.smiles())
    }
}

impl<M: Molecule> PartialEq for Retron<M> {
    fn eq(&self, other: &Self) -> bool {
        self.molecule == other.molecule
    }
}

impl<M: Molecule> Eq for Retron<M> {}

impl<M: Molecule> Hash for Retron<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.molecule.hash(state);
    }
}

impl<M: Molecule> fmt::Debug for Retron<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.molecule.smiles())
    }
}

/// True if `new_retrons`' molecules intersect `ancestor_molecules` by value.
///
/// Used by `Tree::expand` to reject a candidate child whose new retrons would
/// reintroduce a molecule already on the path to the root (a loop).
pub fn intersects_ancestors<M: Molecule>(ancestor_molecules: &[M], new_retrons: &[Retron<M>]) -> bool {
    new_retrons
        .iter()
        .any(|r| ancestor_molecules.iter().any(|a| a == r.molecule()))
}
