//! Value estimators: scoring a freshly expanded node's new retrons.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;

use crate::chem::{ChemKernel, Molecule};
use crate::compose;
use crate::policy::expansion::ExpansionPolicy;
use crate::policy::rollout;
use crate::retron::Retron;

/// Given the retrons freshly produced by an edge, estimates the value of the
/// node they belong to.
pub trait ValueEstimator<M: Molecule, Rule>: Send + Sync {
    /// Estimates a value in roughly `[-1, 1]` (or a large negative sentinel
    /// on failure) for a node whose newest retrons are `new_retrons`.
    fn evaluate(&self, new_retrons: &[Retron<M>], current_depth: u32) -> f32;

    /// Create a boxed clone of this estimator.
    fn clone_box(&self) -> Box<dyn ValueEstimator<M, Rule>>;
}

impl<M: Molecule, Rule> ValueEstimator<M, Rule> for Box<dyn ValueEstimator<M, Rule>> {
    fn evaluate(&self, new_retrons: &[Retron<M>], current_depth: u32) -> f32 {
        (**self).evaluate(new_retrons, current_depth)
    }

    fn clone_box(&self) -> Box<dyn ValueEstimator<M, Rule>> {
        (**self).clone_box()
    }
}

/// Uniform random value in `[0, 1)`, ignoring the node entirely.
#[derive(Clone, Debug, Default)]
pub struct RandomEstimator;

impl<M: Molecule, Rule: Send + Sync + 'static> ValueEstimator<M, Rule> for RandomEstimator {
    fn evaluate(&self, _new_retrons: &[Retron<M>], _current_depth: u32) -> f32 {
        rand::thread_rng().gen_range(0.0..1.0)
    }

    fn clone_box(&self) -> Box<dyn ValueEstimator<M, Rule>> {
        Box::new(self.clone())
    }
}

/// A constant value, independent of the node.
#[derive(Clone, Debug)]
pub struct FixedEstimator {
    value: f32,
}

impl FixedEstimator {
    /// Creates an estimator that always returns `value`.
    pub fn new(value: f32) -> Self {
        FixedEstimator { value }
    }
}

impl<M: Molecule, Rule: Send + Sync + 'static> ValueEstimator<M, Rule> for FixedEstimator {
    fn evaluate(&self, _new_retrons: &[Retron<M>], _current_depth: u32) -> f32 {
        self.value
    }

    fn clone_box(&self) -> Box<dyn ValueEstimator<M, Rule>> {
        Box::new(self.clone())
    }
}

/// Scores a node by rolling each of its new retrons forward and aggregating.
///
/// When a node has more than one new retron, the worst-case retron (the one
/// least likely to be solvable) determines the node's value, so the minimum
/// reward across retrons is taken.
pub struct RolloutEstimator<M: Molecule, Rule> {
    policy: Arc<dyn ExpansionPolicy<M, Rule>>,
    kernel: Arc<dyn ChemKernel<M, Rule>>,
    stock: HashSet<String>,
    min_mol_size: u32,
    max_depth: u32,
}

impl<M: Molecule, Rule> RolloutEstimator<M, Rule> {
    /// Creates a rollout-backed estimator.
    pub fn new(
        policy: Arc<dyn ExpansionPolicy<M, Rule>>,
        kernel: Arc<dyn ChemKernel<M, Rule>>,
        stock: HashSet<String>,
        min_mol_size: u32,
        max_depth: u32,
    ) -> Self {
        RolloutEstimator {
            policy,
            kernel,
            stock,
            min_mol_size,
            max_depth,
        }
    }
}

impl<M: Molecule, Rule: Send + Sync + 'static> ValueEstimator<M, Rule>
    for RolloutEstimator<M, Rule>
{
    fn evaluate(&self, new_retrons: &[Retron<M>], current_depth: u32) -> f32 {
        let budget = self.max_depth.saturating_sub(current_depth);
        new_retrons
            .iter()
            .map(|r| {
                rollout::rollout(
                    r,
                    &self.stock,
                    self.min_mol_size,
                    budget,
                    self.policy.as_ref(),
                    self.kernel.as_ref(),
                )
            })
            .fold(f32::INFINITY, f32::min)
            .min(1.0)
    }

    fn clone_box(&self) -> Box<dyn ValueEstimator<M, Rule>> {
        Box::new(RolloutEstimator {
            policy: Arc::clone(&self.policy),
            kernel: Arc::clone(&self.kernel),
            stock: self.stock.clone(),
            min_mol_size: self.min_mol_size,
            max_depth: self.max_depth,
        })
    }
}

/// Scores a node with an injected learned-network featurizer, composing its
/// new retrons into one molecule first.
///
/// Returns a large negative sentinel (`-1e6`) if composition or featurization
/// fails, so a broken value network degrades a node's priority without
/// aborting the search.
pub struct LearnedNetworkEstimator<M: Molecule> {
    exclude_small: bool,
    min_mol_size: u32,
    composer: Box<dyn Fn(&[&Retron<M>]) -> Option<M> + Send + Sync>,
    featurizer: Box<dyn Fn(&M) -> Option<f32> + Send + Sync>,
}

const LEARNED_NETWORK_FAILURE_SENTINEL: f32 = -1e6;

impl<M: Molecule> LearnedNetworkEstimator<M> {
    /// Creates a learned-network estimator from a composer (disjoint-union of
    /// retron molecules) and a featurizer (network forward pass).
    pub fn new(
        exclude_small: bool,
        min_mol_size: u32,
        composer: impl Fn(&[&Retron<M>]) -> Option<M> + Send + Sync + 'static,
        featurizer: impl Fn(&M) -> Option<f32> + Send + Sync + 'static,
    ) -> Self {
        LearnedNetworkEstimator {
            exclude_small,
            min_mol_size,
            composer: Box::new(composer),
            featurizer: Box::new(featurizer),
        }
    }
}

impl<M: Molecule, Rule: Send + Sync + 'static> ValueEstimator<M, Rule>
    for LearnedNetworkEstimator<M>
{
    fn evaluate(&self, new_retrons: &[Retron<M>], _current_depth: u32) -> f32 {
        let composed = compose::compose(new_retrons, self.exclude_small, self.min_mol_size, |sel| {
            (self.composer)(sel)
        });
        match composed {
            Some(m) => (self.featurizer)(&m).unwrap_or(LEARNED_NETWORK_FAILURE_SENTINEL),
            None => LEARNED_NETWORK_FAILURE_SENTINEL,
        }
    }

    fn clone_box(&self) -> Box<dyn ValueEstimator<M, Rule>> {
        panic!("LearnedNetworkEstimator wraps non-cloneable closures; construct a fresh instance instead")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::{TestChemKernel, TestMolecule, TestRule};
    use crate::policy::expansion::FixedTablePolicy;

    fn retron(name: &str, size: u32) -> Retron<TestMolecule> {
        Retron::root(TestMolecule::new(name, size))
    }

    #[test]
    fn random_estimator_stays_in_unit_range() {
        let est: RandomEstimator = RandomEstimator;
        for _ in 0..20 {
            let v: f32 = ValueEstimator::<TestMolecule, TestRule>::evaluate(&est, &[retron("A", 3)], 0);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn fixed_estimator_ignores_node() {
        let est = FixedEstimator::new(0.42);
        let v: f32 = ValueEstimator::<TestMolecule, TestRule>::evaluate(&est, &[], 0);
        assert!((v - 0.42).abs() < 1e-6);
    }

    #[test]
    fn rollout_estimator_takes_worst_of_several_retrons() {
        let policy: Arc<dyn ExpansionPolicy<TestMolecule, TestRule>> =
            Arc::new(FixedTablePolicy::<TestRule>::new());
        let kernel: Arc<dyn ChemKernel<TestMolecule, TestRule>> = Arc::new(TestChemKernel);
        let mut stock = HashSet::new();
        stock.insert("A".to_string());
        let est = RolloutEstimator::new(policy, kernel, stock, 0, 5);

        // "A" is a building block (reward 1.0), "B" has no applicable rule
        // (reward -1.0); the worse of the two should win.
        let new_retrons = vec![retron("A", 3), retron("B", 20)];
        let v = est.evaluate(&new_retrons, 0);
        assert_eq!(v, -1.0);
    }

    #[test]
    fn learned_network_estimator_returns_sentinel_on_featurization_failure() {
        let est = LearnedNetworkEstimator::new(
            false,
            6,
            |sel: &[&Retron<TestMolecule>]| sel.first().map(|r| r.molecule().clone()),
            |_m: &TestMolecule| None,
        );
        let v: f32 = ValueEstimator::<TestMolecule, TestRule>::evaluate(
            &est,
            &[retron("A", 20)],
            0,
        );
        assert_eq!(v, LEARNED_NETWORK_FAILURE_SENTINEL);
    }

    #[test]
    fn learned_network_estimator_returns_sentinel_on_empty_composition() {
        let est = LearnedNetworkEstimator::new(
            false,
            6,
            |_sel: &[&Retron<TestMolecule>]| None,
            |_m: &TestMolecule| Some(1.0),
        );
        let v: f32 = ValueEstimator::<TestMolecule, TestRule>::evaluate(&est, &[], 0);
        assert_eq!(v, LEARNED_NETWORK_FAILURE_SENTINEL);
    }
}
