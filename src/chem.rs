//! The chemistry kernel seam.
//!
//! Molecule canonicalization, aromaticity handling and reaction-rule
//! application are treated as an external capability (`ChemKernel`). This
//! module defines the trait contracts the rest of the crate is generic over,
//! plus a small deterministic test double used by the crate's own test suite
//! and doctest examples.

use std::fmt::Debug;
use std::hash::Hash;

/// A canonical molecule, opaque to the search engine beyond what this trait exposes.
///
/// All molecules entering the engine are assumed to already be in canonical
/// form; the engine never re-canonicalizes.
pub trait Molecule: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Number of atoms in the molecule.
    fn size(&self) -> u32;

    /// Canonical structural (SMILES-like) string form, used for stock lookups
    /// and route serialization.
    fn smiles(&self) -> String;
}

/// Applies a single reaction rule (in the retrosynthetic direction) to a molecule.
///
/// `Rule` is an opaque handle; only implementations of this trait interpret
/// it. Enumeration is lazy and pull-based: callers should not assume the
/// iterator is cheap to exhaust, and should stop pulling as soon as they have
/// what they need (top-K / threshold cutoffs happen upstream, in the
/// expansion policy).
pub trait ChemKernel<M: Molecule, Rule>: Send + Sync {
    /// Applies `rule` to `molecule`, yielding zero or more candidate product
    /// multisets. An empty iterator means the rule does not apply.
    ///
    /// A rule application that would otherwise panic/error inside a real
    /// kernel implementation is expected to be caught by the implementation
    /// and turned into "no products for this one candidate", not propagated —
    /// a single bad rule must never abort the search.
    fn apply<'a>(
        &'a self,
        molecule: &'a M,
        rule: &'a Rule,
    ) -> Box<dyn Iterator<Item = Vec<M>> + 'a>;
}

/// A minimal in-memory molecule used by tests and the bundled example.
///
/// Modeled as a named "formula" with an atom count, since the real chemistry
/// kernel is out of scope for this crate; this is enough to exercise
/// equality, hashing, size thresholds, and building-block stock lookups.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestMolecule {
    smiles: String,
    size: u32,
}

impl TestMolecule {
    /// Creates a new test molecule with the given canonical SMILES-like name and atom count.
    pub fn new(smiles: impl Into<String>, size: u32) -> Self {
        TestMolecule {
            smiles: smiles.into(),
            size,
        }
    }
}

impl Molecule for TestMolecule {
    fn size(&self) -> u32 {
        self.size
    }

    fn smiles(&self) -> String {
        self.smiles.clone()
    }
}

/// A deterministic test-double reaction rule: rewrites one named molecule
/// into a fixed list of product multisets.
#[derive(Clone, Debug)]
pub struct TestRule {
    /// The molecule this rule is keyed on (by SMILES).
    pub reactant_smiles: String,
    /// The product multisets this rule yields, in enumeration order.
    pub products: Vec<Vec<TestMolecule>>,
}

impl TestRule {
    /// Creates a new rule decomposing `reactant_smiles` into `products`.
    pub fn new(reactant_smiles: impl Into<String>, products: Vec<Vec<TestMolecule>>) -> Self {
        TestRule {
            reactant_smiles: reactant_smiles.into(),
            products,
        }
    }
}

/// A deterministic test-double chemistry kernel keyed purely on molecule SMILES.
#[derive(Clone, Debug, Default)]
pub struct TestChemKernel;

impl ChemKernel<TestMolecule, TestRule> for TestChemKernel {
    fn apply<'a>(
        &'a self,
        molecule: &'a TestMolecule,
        rule: &'a TestRule,
    ) -> Box<dyn Iterator<Item = Vec<TestMolecule>> + 'a> {
        if rule.reactant_smiles != molecule.smiles {
            return Box::new(std::iter::empty());
        }
        Box::new(rule.products.clone().into_iter())
    }
}
