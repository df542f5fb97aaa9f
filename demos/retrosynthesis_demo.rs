//! Runs a small retrosynthetic search against an in-memory rule table and
//! prints the best route found.
//!
//! ```bash
//! cargo run --example retrosynthesis_demo
//! ```

use std::collections::HashSet;

use retrosynth_mcts::chem::{Molecule, TestChemKernel, TestMolecule, TestRule};
use retrosynth_mcts::config::TreeConfig;
use retrosynth_mcts::policy::evaluation::RolloutEstimator;
use retrosynth_mcts::policy::expansion::FixedTablePolicy;
use retrosynth_mcts::tree::Tree;
use std::sync::Arc;

fn main() {
    env_logger::init();

    // A toy retrosynthesis: target "Aspirin" decomposes into "SalicylicAcid"
    // and "AceticAnhydride"; "SalicylicAcid" further decomposes into two
    // purchasable precursors.
    let aspirin_rule = TestRule::new(
        "Aspirin",
        vec![vec![
            TestMolecule::new("SalicylicAcid", 13),
            TestMolecule::new("AceticAnhydride", 10),
        ]],
    );
    let salicylic_rule = TestRule::new(
        "SalicylicAcid",
        vec![vec![
            TestMolecule::new("Phenol", 7),
            TestMolecule::new("CO2", 3),
        ]],
    );

    let policy = FixedTablePolicy::new()
        .with_rule("Aspirin", vec![(0.95, aspirin_rule, 1)])
        .with_rule("SalicylicAcid", vec![(0.8, salicylic_rule, 2)]);

    let stock: HashSet<String> = ["AceticAnhydride", "Phenol", "CO2"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let config = TreeConfig::default()
        .with_max_iterations(200)
        .with_max_depth(6);

    let kernel = Arc::new(TestChemKernel);
    let policy_arc: Arc<dyn retrosynth_mcts::ExpansionPolicy<TestMolecule, TestRule>> =
        Arc::new(policy.clone());

    let value_estimator = RolloutEstimator::new(
        Arc::clone(&policy_arc),
        Arc::clone(&kernel) as Arc<dyn retrosynth_mcts::ChemKernel<TestMolecule, TestRule>>,
        stock.clone(),
        config.min_mol_size,
        config.max_depth,
    );

    let mut tree = Tree::new(
        TestMolecule::new("Aspirin", 20),
        config,
        Box::new(TestChemKernel),
        Box::new(policy),
        Box::new(value_estimator),
        stock,
    );

    let stop_reason = tree.search();
    println!("{}", tree.report());
    println!("stopped: {stop_reason:?}");

    if let Some(&winner) = tree.winning_nodes().first() {
        println!("\nBest route:");
        for reaction in tree.route(winner) {
            let reactants: Vec<String> = reaction.reactants.iter().map(|m| m.smiles()).collect();
            let products: Vec<String> = reaction.products.iter().map(|m| m.smiles()).collect();
            println!(
                "  rule {}: {} -> {}",
                reaction.rule_id,
                products.join(" + "),
                reactants.join(" + ")
            );
        }
    } else {
        println!("\nNo route found.");
    }
}
