//! Trigger scanning (rule pre-gating).
//!
//! Before an affix rule is tried on a word, the word's coarse properties are
//! compared against the rule's [`RuleMeta`]. A rule whose every subrule would
//! fail its MPR or part-of-speech gate is skipped without compiling a match.
//!
//! ```text
//! WordSynthesis ── TriggerInfo::scan ──▶ { mpr, pos }
//!                                          │
//!   RuleMeta { required_mpr (AND), pos (OR) } ──▶ admits?
//! ```
//!
//! ## Design notes
//!
//! - This is a *coarse* check. False positives are fine because each subrule
//!   still runs its own gates; false negatives are not.
//! - Phonological rules carry no gates and are always admitted.
//! - Analysis is not gated: MPR features there are requirements being
//!   collected, not properties of the input.

use super::compiled_rules::RuleMeta;
use super::word::WordSynthesis;
use std::collections::BTreeSet;
use tracing::trace;

/// Word characteristics relevant to rule activation.
#[derive(Debug, Clone)]
pub struct TriggerInfo<'w> {
    pub mpr: &'w BTreeSet<String>,
    pub pos: &'w str,
}

impl<'w> TriggerInfo<'w> {
    pub fn scan(word: &'w WordSynthesis) -> Self {
        TriggerInfo { mpr: &word.mpr, pos: &word.pos }
    }

    /// Whether some subrule of the rule described by `meta` could pass its gates.
    pub fn admits(&self, meta: &RuleMeta) -> bool {
        // Required MPR features (AND logic - all must be present)
        if !meta.required_mpr.is_subset(self.mpr) {
            trace!(rule = %meta.name, required = ?meta.required_mpr, "gated out by MPR features");
            return false;
        }

        // Parts of speech (OR logic - one must match)
        if !meta.pos.is_empty() && !meta.pos.contains(self.pos) {
            trace!(rule = %meta.name, pos = %self.pos, "gated out by part of speech");
            return false;
        }

        true
    }
}
