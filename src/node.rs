//! Tree node payload: what remains to expand, and what was just produced.
//!
//! Per-node search statistics (visits, reward) live in the `Tree`'s parallel
//! arrays rather than on the node itself; `Node` is purely the retron
//! payload.

use crate::chem::Molecule;
use crate::retron::Retron;

/// A tree node: retrons still to be decomposed, plus the retrons the parent
/// edge just produced.
#[derive(Clone)]
pub struct Node<M: Molecule> {
    /// Index 0 is the current retron to decompose next; the rest is the deferred queue.
    pub retrons_to_expand: Vec<Retron<M>>,
    /// The retrons freshly produced by the edge into this node, used for evaluation.
    pub new_retrons: Vec<Retron<M>>,
}

impl<M: Molecule> Node<M> {
    /// Creates a new node from its retron payload.
    pub fn new(retrons_to_expand: Vec<Retron<M>>, new_retrons: Vec<Retron<M>>) -> Self {
        Node {
            retrons_to_expand,
            new_retrons,
        }
    }

    /// The retron to decompose next, or `None` if the node is solved.
    pub fn current_retron(&self) -> Option<&Retron<M>> {
        self.retrons_to_expand.first()
    }

    /// The retrons still waiting behind the current one.
    pub fn deferred(&self) -> &[Retron<M>] {
        if self.retrons_to_expand.is_empty() {
            &[]
        } else {
            &self.retrons_to_expand[1..]
        }
    }

    /// A node is solved when there is nothing left to expand.
    pub fn is_solved(&self) -> bool {
        self.retrons_to_expand.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::TestMolecule;

    fn retron(name: &str, size: u32) -> Retron<TestMolecule> {
        Retron::root(TestMolecule::new(name, size))
    }

    #[test]
    fn solved_node_has_no_current_retron() {
        let node: Node<TestMolecule> = Node::new(vec![], vec![retron("A", 3)]);
        assert!(node.is_solved());
        assert!(node.current_retron().is_none());
        assert!(node.deferred().is_empty());
    }

    #[test]
    fn unsolved_node_splits_current_and_deferred() {
        let node = Node::new(
            vec![retron("M", 20), retron("I", 10)],
            vec![retron("M", 20), retron("I", 10)],
        );
        assert!(!node.is_solved());
        assert_eq!(node.current_retron().unwrap().molecule().smiles(), "M");
        assert_eq!(node.deferred().len(), 1);
        assert_eq!(node.deferred()[0].molecule().smiles(), "I");
    }
}
