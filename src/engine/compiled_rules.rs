//! Rule compilation and indexing.
//!
//! This module holds the *static* side of the engine: everything derived once
//! from a [`Grammar`] so that a derivation only has to walk prepared data.
//!
//! A derivation is split into two phases:
//!
//! 1. **Compile/index rules** (this module): validate every rule, build both
//!    runtime directions (`SynthesisRule` + `AnalysisRule`) once, and derive
//!    coarse per-rule metadata (`RuleMeta`).
//! 2. **Run** (see `derivation.rs`): thread word records through the compiled
//!    rules, consulting the gates in `trigger.rs` before each affix rule.
//!
//! ```text
//! Grammar ──▶ CompiledRules::new
//!               ├─ rules:  [CompiledRule { synthesis, analysis }]
//!               ├─ metas:  [RuleMeta { traits, required_mpr, pos }]
//!               └─ index:  morphological ids ++ phonological ids
//! ```
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `CompiledRules::rules` and `CompiledRules::metas`.
//!   Those vectors must stay aligned.
//! - Every id appears in exactly one of `RuleIndex::morphological` and
//!   `RuleIndex::phonological`, in grammar order.
//! - Compilation errors surface here; a constructed `CompiledRules` never
//!   fails at run time.

use crate::api::{Grammar, Options};
use crate::error::Result;
use crate::rule::{AnalysisRule, CompileRule, Rule, SynthesisRule};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Rule identifier (index into the rules vector).
pub(crate) type RuleId = usize;

bitflags::bitflags! {
    /// Coarse classification of a compiled rule.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleTraits: u8 {
        const MORPHOLOGICAL = 1 << 0;
        const REWRITE       = 1 << 1;
        const METATHESIS    = 1 << 2;
        const AFFIX         = 1 << 3;
        /// At least one allomorph is conditioned on its surface environment.
        const CONDITIONED   = 1 << 4;
    }
}

/// Metadata derived from a rule for gating and reporting.
#[derive(Clone, Debug)]
pub struct RuleMeta {
    pub name: String,
    pub traits: RuleTraits,
    /// MPR features every subrule requires (AND logic).
    pub required_mpr: BTreeSet<String>,
    /// Parts of speech some subrule accepts (OR logic); empty means any.
    pub pos: BTreeSet<String>,
}

impl RuleMeta {
    fn from_rule(rule: &Rule, morphological: bool) -> Self {
        let mut traits = RuleTraits::empty();
        traits.set(RuleTraits::MORPHOLOGICAL, morphological);
        let mut required_mpr = BTreeSet::new();
        let mut pos = BTreeSet::new();

        match rule {
            Rule::Rewrite(_) => traits |= RuleTraits::REWRITE,
            Rule::Metathesis(_) => traits |= RuleTraits::METATHESIS,
            Rule::Affix(affix) => {
                traits |= RuleTraits::AFFIX;
                if affix.subrules.iter().any(|s| s.env.is_some()) {
                    traits |= RuleTraits::CONDITIONED;
                }
                let mut subrules = affix.subrules.iter();
                if let Some(first) = subrules.next() {
                    required_mpr = first.required_mpr.clone();
                    for sub in subrules {
                        required_mpr.retain(|f| sub.required_mpr.contains(f));
                    }
                }
                if affix.subrules.iter().all(|s| !s.required_pos.is_empty()) {
                    pos = affix.subrules.iter().flat_map(|s| s.required_pos.iter().cloned()).collect();
                }
            }
        }

        RuleMeta { name: rule.name().to_string(), traits, required_mpr, pos }
    }
}

#[derive(Default, Debug)]
pub struct RuleIndex {
    /// Morphological rules, in application order.
    pub morphological: Vec<RuleId>,
    /// Phonological rules, in application order.
    pub phonological: Vec<RuleId>,
}

/// Both runtime directions of one rule.
pub struct CompiledRule {
    pub synthesis: Box<dyn SynthesisRule>,
    pub analysis: Box<dyn AnalysisRule>,
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule").field("name", &self.synthesis.name()).finish()
    }
}

/// Pre-compiled rule set with metadata and indexes.
#[derive(Debug)]
pub struct CompiledRules {
    pub rules: Vec<CompiledRule>,
    pub metas: Vec<RuleMeta>,
    pub index: RuleIndex,
    pub options: Options,
}

impl CompiledRules {
    /// Compile every rule of `grammar` in both directions.
    pub fn new(grammar: &Grammar, options: &Options) -> Result<Self> {
        let layers = [(true, &grammar.morphological), (false, &grammar.phonological)];

        let mut rules = Vec::new();
        let mut metas = Vec::new();
        let mut index = RuleIndex::default();

        for (morphological, list) in layers {
            for rule in list {
                let id = rules.len();
                rules.push(CompiledRule {
                    synthesis: rule.compile_synthesis(options)?,
                    analysis: rule.compile_analysis(options)?,
                });
                metas.push(RuleMeta::from_rule(rule, morphological));
                if morphological {
                    index.morphological.push(id);
                } else {
                    index.phonological.push(id);
                }
            }
        }

        debug!(
            morphological = index.morphological.len(),
            phonological = index.phonological.len(),
            "compiled rules"
        );
        Ok(CompiledRules { rules, metas, index, options: options.clone() })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn name(&self, id: RuleId) -> &str {
        &self.metas[id].name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::rules::demo;
    use crate::{AffixRule, AffixSubrule, OutputAction, RewriteRule};

    #[test]
    fn indexes_follow_grammar_order() {
        let compiled = demo::compiled();
        let morph: Vec<_> = compiled.index.morphological.iter().map(|&id| compiled.name(id)).collect();
        let phon: Vec<_> = compiled.index.phonological.iter().map(|&id| compiled.name(id)).collect();
        assert_eq!(morph, ["plural"]);
        assert_eq!(phon, ["voicing", "lowering", "cluster-metathesis"]);
        assert_eq!(compiled.len(), compiled.metas.len());
    }

    #[test]
    fn metadata_reflects_rule_kind() {
        let compiled = demo::compiled();
        let plural = &compiled.metas[compiled.index.morphological[0]];
        assert!(plural.traits.contains(RuleTraits::MORPHOLOGICAL | RuleTraits::AFFIX | RuleTraits::CONDITIONED));
        assert!(plural.pos.contains("noun"));

        let voicing = &compiled.metas[compiled.index.phonological[0]];
        assert_eq!(voicing.traits, RuleTraits::REWRITE);
        assert!(voicing.pos.is_empty());
    }

    #[test]
    fn required_mpr_is_shared_by_all_subrules() {
        let stem = || demo::stem();
        let rule = AffixRule::new("gated")
            .subrule(AffixSubrule::new("a", vec![stem()], vec![OutputAction::Copy(0)]).requires_mpr("F1").requires_mpr("F2"))
            .subrule(AffixSubrule::new("b", vec![stem()], vec![OutputAction::Copy(0)]).requires_mpr("F1"));
        let compiled = CompiledRules::new(&Grammar::new().morphological(rule), &Options::default()).unwrap();
        assert_eq!(compiled.metas[0].required_mpr, BTreeSet::from(["F1".to_string()]));
    }

    #[test]
    fn compilation_errors_surface() {
        let bad = RewriteRule::new("empty", Vec::new());
        let err = CompiledRules::new(&Grammar::new().phonological(bad), &Options::default()).unwrap_err();
        assert_eq!(err, RuleError::EmptyTarget("empty".into()));
    }
}
