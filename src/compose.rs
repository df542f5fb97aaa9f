//! Retron composition for value prediction.
//!
//! A learned value network scores a single molecule, so the retrons still
//! pending in a node must first be composed into one molecule — the
//! disjoint union of their atoms and bonds. Since `Molecule` is an opaque
//! trait here (the chemistry kernel owns atom/bond composition), this module
//! exposes the *selection* logic (which retrons survive the `exclude_small`
//! filter) and leaves the actual disjoint-union construction to an injected
//! composer function.

use crate::chem::Molecule;
use crate::retron::Retron;

/// Picks which retrons participate in composition, applying the
/// `exclude_small` filter.
///
/// If a single retron is given, it is always selected (composition is a
/// no-op — the retron's own molecule is used directly by the caller). If
/// `exclude_small` would leave nothing, all retrons are kept instead.
pub fn select_for_composition<'a, M: Molecule>(
    retrons: &'a [Retron<M>],
    exclude_small: bool,
    min_size: u32,
) -> Vec<&'a Retron<M>> {
    if retrons.len() <= 1 {
        return retrons.iter().collect();
    }

    if exclude_small {
        let big: Vec<&Retron<M>> = retrons
            .iter()
            .filter(|r| r.molecule().size() > min_size)
            .collect();
        if !big.is_empty() {
            return big;
        }
    }

    retrons.iter().collect()
}

/// Composes a node's pending retrons into a single molecule for value
/// prediction, using `composer` as the disjoint-union construction (a
/// chemistry-kernel capability).
///
/// Returns `None` if `retrons` is empty; a single retron returns its own
/// molecule without invoking `composer`.
pub fn compose<M: Molecule>(
    retrons: &[Retron<M>],
    exclude_small: bool,
    min_size: u32,
    composer: impl FnOnce(&[&Retron<M>]) -> Option<M>,
) -> Option<M> {
    if retrons.is_empty() {
        return None;
    }
    if retrons.len() == 1 {
        return Some(retrons[0].molecule().clone());
    }
    let selected = select_for_composition(retrons, exclude_small, min_size);
    composer(&selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::TestMolecule;

    fn retron(name: &str, size: u32) -> Retron<TestMolecule> {
        Retron::root(TestMolecule::new(name, size))
    }

    #[test]
    fn single_retron_short_circuits() {
        let retrons = vec![retron("A", 3)];
        let result = compose(&retrons, true, 6, |_| panic!("composer should not run"));
        assert_eq!(result.unwrap().smiles(), "A");
    }

    #[test]
    fn excludes_small_retrons_when_big_ones_remain() {
        let retrons = vec![retron("small", 2), retron("big", 20)];
        let selected = select_for_composition(&retrons, true, 6);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].molecule().smiles(), "big");
    }

    #[test]
    fn keeps_everything_when_all_are_small() {
        let retrons = vec![retron("a", 1), retron("b", 2)];
        let selected = select_for_composition(&retrons, true, 6);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn empty_retrons_compose_to_none() {
        let retrons: Vec<Retron<TestMolecule>> = vec![];
        let result = compose(&retrons, true, 6, |_| panic!("composer should not run"));
        assert!(result.is_none());
    }
}
