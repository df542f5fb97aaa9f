//! Rollout simulation backing the `Rollout` value estimator.
//!
//! Unlike a game-playing rollout (random play to a terminal state), a
//! retrosynthetic rollout greedily takes the *first* applicable rule at each
//! step rather than a random one, since any valid decomposition is as good
//! as another for the purpose of estimating "can this plausibly be solved".

use std::collections::{HashSet, VecDeque};

use crate::chem::{ChemKernel, Molecule};
use crate::policy::expansion::ExpansionPolicy;
use crate::retron::Retron;

/// Runs a rollout from `start`, returning a reward in `{-1.0, -0.5, 1.0}`.
///
/// `budget` is the number of decomposition steps remaining
/// (`max_depth - current_depth`).
pub fn rollout<M: Molecule, Rule>(
    start: &Retron<M>,
    stock: &HashSet<String>,
    min_mol_size: u32,
    budget: u32,
    policy: &dyn ExpansionPolicy<M, Rule>,
    kernel: &dyn ChemKernel<M, Rule>,
) -> f32 {
    if start.is_building_block(stock, min_mol_size) {
        return 1.0;
    }

    let mut queue: VecDeque<Retron<M>> = VecDeque::new();
    queue.push_back(start.clone());
    let mut seen: HashSet<M> = HashSet::new();
    seen.insert(start.molecule().clone());
    let mut steps = 0u32;

    while let Some(head) = queue.pop_front() {
        if steps >= budget {
            return -0.5;
        }

        let candidates = match policy.predict(&head) {
            Ok(candidates) => candidates,
            Err(_) => return -1.0,
        };

        let mut products: Option<Vec<M>> = None;
        'rules: for (_, rule, _) in candidates {
            for candidate in kernel.apply(head.molecule(), &rule) {
                if !candidate.is_empty() {
                    products = Some(candidate);
                    break 'rules;
                }
            }
        }

        let products = match products {
            Some(p) => p,
            None => return -1.0,
        };

        if products.iter().any(|m| seen.contains(m)) {
            return -1.0;
        }

        steps += 1;
        for m in &products {
            seen.insert(m.clone());
        }
        for m in products {
            let r = Retron::root(m);
            if !r.is_building_block(stock, min_mol_size) {
                queue.push_back(r);
            }
        }
    }

    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::{TestChemKernel, TestMolecule, TestRule};
    use crate::policy::expansion::FixedTablePolicy;

    fn stock(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    struct FailingPolicy;

    impl<M: crate::chem::Molecule, Rule> ExpansionPolicy<M, Rule> for FailingPolicy {
        fn predict<'a>(
            &'a self,
            _retron: &'a Retron<M>,
        ) -> Result<Box<dyn Iterator<Item = (f32, Rule, u32)> + 'a>, String> {
            Err("scorer unavailable".to_string())
        }

        fn clone_box(&self) -> Box<dyn ExpansionPolicy<M, Rule>> {
            Box::new(FailingPolicy)
        }
    }

    #[test]
    fn policy_failure_returns_negative_reward() {
        let start = Retron::root(TestMolecule::new("M", 20));
        let policy = FailingPolicy;
        let kernel = TestChemKernel;
        let reward = rollout::<TestMolecule, TestRule>(&start, &stock(&[]), 0, 5, &policy, &kernel);
        assert_eq!(reward, -1.0);
    }

    #[test]
    fn building_block_start_returns_positive_reward() {
        let start = Retron::root(TestMolecule::new("A", 3));
        let policy = FixedTablePolicy::<TestRule>::new();
        let kernel = TestChemKernel;
        let reward = rollout(&start, &stock(&["A"]), 0, 5, &policy, &kernel);
        assert_eq!(reward, 1.0);
    }

    #[test]
    fn no_applicable_rule_returns_negative_reward() {
        let start = Retron::root(TestMolecule::new("M", 20));
        let policy = FixedTablePolicy::<TestRule>::new();
        let kernel = TestChemKernel;
        let reward = rollout(&start, &stock(&[]), 0, 5, &policy, &kernel);
        assert_eq!(reward, -1.0);
    }

    #[test]
    fn fully_decomposable_into_building_blocks_returns_positive_reward() {
        let a = TestMolecule::new("A", 20);
        let b = TestMolecule::new("B", 20);
        let rule = TestRule::new("M", vec![vec![a.clone(), b.clone()]]);
        let policy = FixedTablePolicy::<TestRule>::new().with_rule("M", vec![(1.0, rule, 1)]);
        let kernel = TestChemKernel;
        let start = Retron::root(TestMolecule::new("M", 20));
        let reward = rollout(&start, &stock(&["A", "B"]), 0, 5, &policy, &kernel);
        assert_eq!(reward, 1.0);
    }

    #[test]
    fn loop_in_products_returns_negative_reward() {
        // M -> {M, X}: an identity-containing rule immediately reintroduces M.
        let m = TestMolecule::new("M", 20);
        let x = TestMolecule::new("X", 20);
        let rule = TestRule::new("M", vec![vec![m.clone(), x.clone()]]);
        let policy = FixedTablePolicy::<TestRule>::new().with_rule("M", vec![(1.0, rule, 1)]);
        let kernel = TestChemKernel;
        let start = Retron::root(m);
        let reward = rollout(&start, &stock(&["X"]), 0, 5, &policy, &kernel);
        assert_eq!(reward, -1.0);
    }

    #[test]
    fn budget_exhaustion_returns_partial_credit() {
        // A chain of distinct non-building-block molecules that never
        // terminates within the rollout's step budget.
        let m0 = TestMolecule::new("M0", 20);
        let m1 = TestMolecule::new("M1", 20);
        let m2 = TestMolecule::new("M2", 20);
        let m3 = TestMolecule::new("M3", 20);
        let policy = FixedTablePolicy::<TestRule>::new()
            .with_rule("M0", vec![(1.0, TestRule::new("M0", vec![vec![m1.clone()]]), 1)])
            .with_rule("M1", vec![(1.0, TestRule::new("M1", vec![vec![m2.clone()]]), 2)])
            .with_rule("M2", vec![(1.0, TestRule::new("M2", vec![vec![m3.clone()]]), 3)]);
        let kernel = TestChemKernel;
        let start = Retron::root(m0);
        let reward = rollout(&start, &stock(&[]), 0, 2, &policy, &kernel);
        assert_eq!(reward, -0.5);
    }
}
