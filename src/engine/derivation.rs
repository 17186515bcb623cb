//! Derivation driver.
//!
//! This module is the operational core of the engine: it threads word records
//! through a [`CompiledRules`] set in either direction.
//!
//! ## Synthesis
//!
//! ```text
//! (1) morphological rules, grammar order   gate (trigger.rs) then apply
//! (2) phonological rules, grammar order    apply to every live candidate
//! (3) resolve                              environments + allomorph choice
//! ```
//!
//! A rule that does not apply to a candidate leaves it unchanged. A rule that
//! applies replaces the candidate with its outputs, so an affix rule with
//! several conditioned allomorphs fans out into several candidates that only
//! resolution narrows down again.
//!
//! ## Analysis
//!
//! ```text
//! (1) phonological rules, reverse order    keep input + every unapplication
//! (2) morphological rules, reverse order   keep input + every unapplication
//! ```
//!
//! Unapplication is optional at every step (the surface form may not have
//! gone through the rule), so each input survives next to its candidates.
//! `SEARCHED` markers are cleared before every rule and candidates are
//! deduplicated with the keep-longer policy of `dedup.rs` after it.
//!
//! The output should remain deterministic given the same word and rules.

use super::compiled_rules::{CompiledRules, RuleId};
use super::dedup::dedup_keep_longer;
use super::metrics::{RuleMetrics, RunMetrics, RunResult};
use super::resolve::resolve_surface;
use super::trigger::TriggerInfo;
use super::word::{WordAnalysis, WordSynthesis};
use crate::rule::RuleEnv;
use std::time::Instant;
use tracing::debug;

/// Runs a compiled rule set forwards or backwards.
///
/// Usage: create with `Derivation::new(&compiled)` then call `synthesize` or
/// `analyze` as often as needed.
#[derive(Debug, Clone, Copy)]
pub struct Derivation<'a> {
    compiled: &'a CompiledRules,
}

impl<'a> Derivation<'a> {
    pub fn new(compiled: &'a CompiledRules) -> Self {
        Self { compiled }
    }

    /// Names of the rules the gates admit for `word` as given.
    pub fn active_rule_names(&self, word: &WordSynthesis) -> Vec<&'a str> {
        let trigger = TriggerInfo::scan(word);
        let index = &self.compiled.index;
        index
            .morphological
            .iter()
            .filter(|&&id| trigger.admits(&self.compiled.metas[id]))
            .chain(&index.phonological)
            .map(|&id| self.compiled.name(id))
            .collect()
    }

    pub fn synthesize(&self, word: WordSynthesis, env: &mut RuleEnv<'_>) -> RunResult<WordSynthesis> {
        let total_start = Instant::now();
        let mut metrics = RunMetrics::default();
        let mut words = vec![word];

        let order = self.compiled.index.morphological.iter().chain(&self.compiled.index.phonological);
        for &id in order {
            let (next, rule_metrics) = self.apply_rule(id, words, env);
            metrics.rules.push(rule_metrics);
            words = next;
        }

        let resolve_start = Instant::now();
        let words = resolve_surface(words);
        metrics.resolve = resolve_start.elapsed();
        metrics.total = total_start.elapsed();
        RunResult { words, metrics }
    }

    fn apply_rule(&self, id: RuleId, words: Vec<WordSynthesis>, env: &mut RuleEnv<'_>) -> (Vec<WordSynthesis>, RuleMetrics) {
        let start = Instant::now();
        let meta = &self.compiled.metas[id];
        let rule = &self.compiled.rules[id].synthesis;
        let mut metrics = RuleMetrics { rule: meta.name.clone(), ..RuleMetrics::default() };

        let mut next = Vec::with_capacity(words.len());
        for word in words {
            if !TriggerInfo::scan(&word).admits(meta) {
                next.push(word);
                continue;
            }
            metrics.attempted += 1;
            let out = rule.apply(&word, env);
            if out.is_empty() {
                next.push(word);
            } else {
                metrics.applied += 1;
                next.extend(out);
            }
        }

        metrics.duration = start.elapsed();
        metrics.candidates = next.len();
        debug!(rule = %meta.name, attempted = metrics.attempted, applied = metrics.applied, "synthesis step");
        (next, metrics)
    }

    pub fn analyze(&self, word: WordAnalysis, env: &mut RuleEnv<'_>) -> RunResult<WordAnalysis> {
        let total_start = Instant::now();
        let mut metrics = RunMetrics::default();
        let mut words = vec![word];

        let order = self.compiled.index.phonological.iter().rev().chain(self.compiled.index.morphological.iter().rev());
        for &id in order {
            let (next, rule_metrics) = self.unapply_rule(id, words, env);
            metrics.rules.push(rule_metrics);
            words = next;
        }

        for word in &mut words {
            word.shape.clear_searched();
        }
        metrics.total = total_start.elapsed();
        RunResult { words, metrics }
    }

    fn unapply_rule(&self, id: RuleId, words: Vec<WordAnalysis>, env: &mut RuleEnv<'_>) -> (Vec<WordAnalysis>, RuleMetrics) {
        let start = Instant::now();
        let meta = &self.compiled.metas[id];
        let rule = &self.compiled.rules[id].analysis;
        let mut metrics = RuleMetrics { rule: meta.name.clone(), ..RuleMetrics::default() };

        let mut next = Vec::with_capacity(words.len());
        for mut word in words {
            word.shape.clear_searched();
            metrics.attempted += 1;
            let out = rule.unapply(&word, env);
            if !out.is_empty() {
                metrics.applied += 1;
            }
            next.push(word);
            next.extend(out);
        }
        let next = dedup_keep_longer(next);

        metrics.duration = start.elapsed();
        metrics.candidates = next.len();
        debug!(rule = %meta.name, attempted = metrics.attempted, applied = metrics.applied, "analysis step");
        (next, metrics)
    }
}
