//! Expansion policies: ranking candidate reaction rules for a retron.
//!
//! Unlike a game-playing expansion policy that picks one unexpanded action
//! per call, this one yields a ranked, lazily-pulled sequence of candidates,
//! while keeping the familiar `Box<dyn ...>` + `clone_box` shape.

use crate::chem::Molecule;
use crate::config::ExpansionConfig;
use crate::retron::Retron;

/// Given a retron, yields a ranked lazy sequence of
/// `(probability, rule, rule_id)` triples, sorted by descending probability.
///
/// Implementations are expected to apply their own top-K and threshold
/// cutoffs before yielding — the caller (`Tree::expand`) does not re-filter.
/// `predict` itself can fail (e.g. a network-backed scorer timing out); a
/// failure aborts that target's search rather than expanding against a
/// silently empty candidate list.
pub trait ExpansionPolicy<M: Molecule, Rule>: Send + Sync {
    /// Predicts candidate reaction rules for `retron`, most probable first.
    fn predict<'a>(
        &'a self,
        retron: &'a Retron<M>,
    ) -> Result<Box<dyn Iterator<Item = (f32, Rule, u32)> + 'a>, String>;

    /// Create a boxed clone of this policy.
    fn clone_box(&self) -> Box<dyn ExpansionPolicy<M, Rule>>;
}

impl<M: Molecule, Rule> ExpansionPolicy<M, Rule> for Box<dyn ExpansionPolicy<M, Rule>> {
    fn predict<'a>(
        &'a self,
        retron: &'a Retron<M>,
    ) -> Result<Box<dyn Iterator<Item = (f32, Rule, u32)> + 'a>, String> {
        (**self).predict(retron)
    }

    fn clone_box(&self) -> Box<dyn ExpansionPolicy<M, Rule>> {
        (**self).clone_box()
    }
}

/// A raw scored candidate, as produced by an external ranking/filtering
/// model before softmax normalization and cutoffs are applied. This is the
/// seam where a real graph neural network would plug in; `score` stands in
/// for the network's per-rule logit (ranking variant) or applicability score
/// (filtering variant).
#[derive(Debug, Clone)]
pub struct ScoredRule<Rule> {
    /// Index into the backing rule table, also used as the returned `rule_id`.
    pub rule_id: u32,
    /// The opaque rule handle.
    pub rule: Rule,
    /// Raw model score for this rule against the query retron.
    pub score: f32,
    /// Priority score used only by the filtering variant's blend.
    pub priority: f32,
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 {
        return vec![0.0; scores.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// The "learned (ranking)" expansion policy variant.
///
/// Runs an injected scorer over the retron's molecule, takes the top-K
/// logits, softmax-normalizes them, and filters entries below `threshold`.
pub struct RankingPolicy<M: Molecule, Rule> {
    config: ExpansionConfig,
    scorer: Box<dyn Fn(&M) -> Result<Vec<ScoredRule<Rule>>, String> + Send + Sync>,
}

impl<M: Molecule, Rule: Clone> RankingPolicy<M, Rule> {
    /// Creates a ranking policy backed by `scorer`, which should return one
    /// `ScoredRule` per candidate rule applicable in principle to the query
    /// molecule, in no particular order, or an error describing why scoring
    /// could not be performed.
    pub fn new(
        config: ExpansionConfig,
        scorer: impl Fn(&M) -> Result<Vec<ScoredRule<Rule>>, String> + Send + Sync + 'static,
    ) -> Self {
        RankingPolicy {
            config,
            scorer: Box::new(scorer),
        }
    }
}

impl<M: Molecule, Rule: Clone + Send + Sync + 'static> ExpansionPolicy<M, Rule>
    for RankingPolicy<M, Rule>
{
    fn predict<'a>(
        &'a self,
        retron: &'a Retron<M>,
    ) -> Result<Box<dyn Iterator<Item = (f32, Rule, u32)> + 'a>, String> {
        let mut candidates = (self.scorer)(retron.molecule())?;
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.config.top_rules);

        let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
        let probs = softmax(&scores);

        let threshold = self.config.rule_prob_threshold;
        let triples: Vec<(f32, Rule, u32)> = candidates
            .into_iter()
            .zip(probs)
            .filter(|(_, prob)| *prob > threshold)
            .map(|(c, prob)| (prob, c.rule, c.rule_id))
            .collect();

        Ok(Box::new(triples.into_iter()))
    }

    fn clone_box(&self) -> Box<dyn ExpansionPolicy<M, Rule>> {
        panic!("RankingPolicy wraps a non-cloneable scorer closure; construct a fresh instance instead")
    }
}

/// The "learned (filtering)" expansion policy variant.
///
/// Blends an applicability score and a priority score via
/// `priority_rules_fraction` before the top-K/threshold cutoffs.
pub struct FilteringPolicy<M: Molecule, Rule> {
    config: ExpansionConfig,
    scorer: Box<dyn Fn(&M) -> Result<Vec<ScoredRule<Rule>>, String> + Send + Sync>,
}

impl<M: Molecule, Rule: Clone> FilteringPolicy<M, Rule> {
    /// Creates a filtering policy backed by `scorer`.
    pub fn new(
        config: ExpansionConfig,
        scorer: impl Fn(&M) -> Result<Vec<ScoredRule<Rule>>, String> + Send + Sync + 'static,
    ) -> Self {
        FilteringPolicy {
            config,
            scorer: Box::new(scorer),
        }
    }
}

impl<M: Molecule, Rule: Clone + Send + Sync + 'static> ExpansionPolicy<M, Rule>
    for FilteringPolicy<M, Rule>
{
    fn predict<'a>(
        &'a self,
        retron: &'a Retron<M>,
    ) -> Result<Box<dyn Iterator<Item = (f32, Rule, u32)> + 'a>, String> {
        let alpha = self.config.priority_rules_fraction;
        let mut candidates = (self.scorer)(retron.molecule())?;
        for c in &mut candidates {
            c.score = (1.0 - alpha) * c.score + alpha * c.priority;
        }
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.config.top_rules);

        let threshold = self.config.rule_prob_threshold;
        let triples: Vec<(f32, Rule, u32)> = candidates
            .into_iter()
            .filter(|c| c.score > threshold)
            .map(|c| (c.score, c.rule, c.rule_id))
            .collect();

        Ok(Box::new(triples.into_iter()))
    }

    fn clone_box(&self) -> Box<dyn ExpansionPolicy<M, Rule>> {
        panic!("FilteringPolicy wraps a non-cloneable scorer closure; construct a fresh instance instead")
    }
}

/// A deterministic, fixed-table expansion policy test double.
///
/// Always yields the same ranked candidate list for a given molecule,
/// regardless of ancestry — useful for deterministic, reproducible tests.
#[derive(Clone)]
pub struct FixedTablePolicy<Rule: Clone> {
    table: std::collections::HashMap<String, Vec<(f32, Rule, u32)>>,
}

impl<Rule: Clone> FixedTablePolicy<Rule> {
    /// Creates an empty fixed-table policy; populate it with `with_rule`.
    pub fn new() -> Self {
        FixedTablePolicy {
            table: std::collections::HashMap::new(),
        }
    }

    /// Registers the candidate rule list for a molecule's SMILES, in the
    /// exact order it should be yielded (most probable first).
    pub fn with_rule(mut self, smiles: impl Into<String>, candidates: Vec<(f32, Rule, u32)>) -> Self {
        self.table.insert(smiles.into(), candidates);
        self
    }
}

impl<Rule: Clone> Default for FixedTablePolicy<Rule> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Molecule, Rule: Clone + Send + Sync + 'static> ExpansionPolicy<M, Rule>
    for FixedTablePolicy<Rule>
{
    fn predict<'a>(
        &'a self,
        retron: &'a Retron<M>,
    ) -> Result<Box<dyn Iterator<Item = (f32, Rule, u32)> + 'a>, String> {
        match self.table.get(&retron.molecule().smiles()) {
            Some(candidates) => Ok(Box::new(candidates.iter().cloned())),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn clone_box(&self) -> Box<dyn ExpansionPolicy<M, Rule>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::TestMolecule;

    fn retron(name: &str) -> Retron<TestMolecule> {
        Retron::root(TestMolecule::new(name, 20))
    }

    #[test]
    fn fixed_table_returns_registered_order() {
        let policy = FixedTablePolicy::<&'static str>::new()
            .with_rule("M", vec![(0.9, "rule-a", 1), (0.1, "rule-b", 2)]);
        let r = retron("M");
        let got: Vec<_> = policy.predict(&r).unwrap().collect();
        assert_eq!(got, vec![(0.9, "rule-a", 1), (0.1, "rule-b", 2)]);
    }

    #[test]
    fn fixed_table_unregistered_molecule_is_empty() {
        let policy = FixedTablePolicy::<&'static str>::new();
        let r = retron("unknown");
        assert_eq!(policy.predict(&r).unwrap().count(), 0);
    }

    #[test]
    fn ranking_policy_applies_topk_softmax_and_threshold() {
        let config = ExpansionConfig::default()
            .with_top_rules(2)
            .with_rule_prob_threshold(0.1);
        let policy: RankingPolicy<TestMolecule, u32> = RankingPolicy::new(config, |_m| {
            Ok(vec![
                ScoredRule { rule_id: 0, rule: 0, score: 3.0, priority: 0.0 },
                ScoredRule { rule_id: 1, rule: 1, score: 2.0, priority: 0.0 },
                ScoredRule { rule_id: 2, rule: 2, score: -5.0, priority: 0.0 },
            ])
        });
        let r = retron("M");
        let got: Vec<_> = policy.predict(&r).unwrap().collect();
        // top_rules=2 keeps only rule_id 0 and 1; softmax over {3.0, 2.0}
        // keeps both above a 0.1 threshold, descending by probability.
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].2, 0);
        assert!(got[0].0 > got[1].0);
    }

    #[test]
    fn ranking_policy_propagates_scorer_failure() {
        let config = ExpansionConfig::default();
        let policy: RankingPolicy<TestMolecule, u32> =
            RankingPolicy::new(config, |_m| Err("network unreachable".to_string()));
        let r = retron("M");
        match policy.predict(&r) {
            Err(e) => assert_eq!(e, "network unreachable"),
            Ok(_) => panic!("expected predict to fail"),
        };
    }

    #[test]
    fn filtering_policy_blends_priority_and_applicability() {
        let config = ExpansionConfig::default().with_priority_rules_fraction(1.0);
        let policy: FilteringPolicy<TestMolecule, u32> = FilteringPolicy::new(config, |_m| {
            Ok(vec![ScoredRule { rule_id: 0, rule: 0, score: 0.1, priority: 0.9 }])
        });
        let r = retron("M");
        let got: Vec<_> = policy.predict(&r).unwrap().collect();
        // priority_rules_fraction = 1.0 means the score is entirely priority.
        assert!((got[0].0 - 0.9).abs() < 1e-6);
    }
}
