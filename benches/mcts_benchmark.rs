#[macro_use]
extern crate criterion;

use std::collections::HashSet;
use std::time::Duration;

use criterion::{black_box, BenchmarkId, Criterion};
use retrosynth_mcts::chem::{Molecule, TestChemKernel, TestMolecule, TestRule};
use retrosynth_mcts::config::TreeConfig;
use retrosynth_mcts::policy::evaluation::RandomEstimator;
use retrosynth_mcts::policy::expansion::FixedTablePolicy;
use retrosynth_mcts::tree::Tree;

/// Builds a synthetic rule table for a complete `branching_factor`-ary
/// decomposition tree of the given depth, rooted at "M0".
fn synthetic_policy(branching_factor: usize, depth: usize) -> (FixedTablePolicy<TestRule>, HashSet<String>) {
    let mut policy = FixedTablePolicy::new();
    let mut next_id = 1u64;
    let mut frontier = vec!["M0".to_string()];
    let mut leaves = HashSet::new();

    for level in 0..depth {
        let mut next_frontier = Vec::new();
        for parent in &frontier {
            let products: Vec<TestMolecule> = (0..branching_factor)
                .map(|_| {
                    let name = format!("M{next_id}");
                    next_id += 1;
                    next_frontier.push(name.clone());
                    TestMolecule::new(name, 20)
                })
                .collect();
            if level == depth - 1 {
                for p in &products {
                    leaves.insert(p.smiles());
                }
            }
            let rule = TestRule::new(parent.clone(), vec![products]);
            policy = policy.with_rule(parent.clone(), vec![(0.9, rule, next_id as u32)]);
        }
        frontier = next_frontier;
    }

    (policy, leaves)
}

fn bench_mcts_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("retrosynthesis_search");
    group.measurement_time(Duration::from_secs(10));

    for bf in [2, 3, 5].iter() {
        let max_depth = 4;
        let (policy, stock) = synthetic_policy(*bf, max_depth);

        group.bench_with_input(BenchmarkId::new("branching_factor", bf), bf, |b, &_| {
            b.iter(|| {
                let mut tree = Tree::new(
                    TestMolecule::new("M0", 20),
                    TreeConfig::default()
                        .with_max_iterations(1000)
                        .with_max_depth(max_depth as u32),
                    Box::new(TestChemKernel),
                    Box::new(policy.clone()),
                    Box::new(RandomEstimator),
                    stock.clone(),
                );
                black_box(tree.search())
            })
        });
    }

    let iterations = [100, 1000, 5000];
    for &iter_count in &iterations {
        let (policy, stock) = synthetic_policy(2, 4);

        group.bench_with_input(
            BenchmarkId::new("iterations", iter_count),
            &iter_count,
            |b, &_| {
                b.iter(|| {
                    let mut tree = Tree::new(
                        TestMolecule::new("M0", 20),
                        TreeConfig::default()
                            .with_max_iterations(iter_count)
                            .with_max_depth(4),
                        Box::new(TestChemKernel),
                        Box::new(policy.clone()),
                        Box::new(RandomEstimator),
                        stock.clone(),
                    );
                    black_box(tree.search())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_mcts_search);
criterion_main!(benches);
