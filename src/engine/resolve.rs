//! Surface resolution of synthesized candidates.
//!
//! Affix subrules with environments are applied optimistically (see
//! `affix.rs`): the environment refers to the *surface* form, which only exists
//! once every phonological rule has run. Resolution is the step that checks
//! them and then picks one allomorph per derivation.
//!
//! ```text
//! candidates ──▶ environment check ──▶ disjunctive selection ──▶ forms
//!                 (drop candidates       (per rule sequence, keep the
//!                  whose allomorph        earliest subrules)
//!                  environments fail)
//! ```
//!
//! Two candidates compete when they went through the same rules in the same
//! order. The winner is the one whose subrule indices compare lowest, so an
//! allomorph listed first in a rule beats later ones whenever both fit.

use super::word::WordSynthesis;
use crate::shape::{Direction, NodeId};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Environment check plus disjunctive allomorph selection.
pub(crate) fn resolve_surface(candidates: Vec<WordSynthesis>) -> Vec<WordSynthesis> {
    let mut kept: Vec<WordSynthesis> = Vec::new();
    let mut by_sequence: HashMap<Vec<String>, usize> = HashMap::new();

    for candidate in candidates {
        if !environments_hold(&candidate) {
            continue;
        }
        let sequence: Vec<String> = candidate.rule_sequence().into_iter().map(str::to_string).collect();
        match by_sequence.get(&sequence) {
            Some(&at) => {
                if subrule_key(&candidate) < subrule_key(&kept[at]) {
                    kept[at] = candidate;
                }
            }
            None => {
                by_sequence.insert(sequence, kept.len());
                kept.push(candidate);
            }
        }
    }

    debug!(forms = kept.len(), "resolved surface forms");
    kept
}

fn subrule_key(word: &WordSynthesis) -> Vec<usize> {
    word.allomorphs.iter().map(|a| a.subrule).collect()
}

/// Every conditioned allomorph must find its environment around its own nodes.
fn environments_hold(word: &WordSynthesis) -> bool {
    word.allomorphs.iter().enumerate().all(|(morph, allomorph)| {
        let Some(env) = &allomorph.environment else { return true };
        let nodes: Vec<NodeId> = word
            .shape
            .iter(Direction::LeftToRight)
            .filter(|&id| word.shape.node(id).annotation().morph == Some(morph))
            .collect();
        // An allomorph that left no surface material is not checked.
        let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else { return true };
        let holds = env.is_satisfied(&word.shape, first, last);
        if !holds {
            trace!(rule = %allomorph.rule, allomorph = %allomorph.id, "surface environment failed");
        }
        holds
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AffixRule, AffixSubrule, Environment, NoTrace, OutputAction};
    use crate::api::Options;
    use crate::pattern::Pattern;
    use crate::rule::{CompileRule, NoBlocking, RuleEnv};
    use crate::rules::demo;
    use crate::test_support::{fs, system, word};

    fn plural() -> AffixRule {
        let sys = system();
        let s = demo::inventory().segment("s").cloned().unwrap();
        let e = demo::inventory().segment("e").cloned().unwrap();
        let after_vowel = Environment::new(Pattern::segments([fs(&sys, "[type:vowel]")]), Pattern::empty());
        AffixRule::new("plural")
            .subrule(
                AffixSubrule::new("s", vec![demo::stem()], vec![OutputAction::Copy(0), OutputAction::Insert(vec![s.clone()])])
                    .environment(after_vowel),
            )
            .subrule(AffixSubrule::new("es", vec![demo::stem()], vec![OutputAction::Copy(0), OutputAction::Insert(vec![e, s])]))
    }

    fn candidates(text: &str) -> Vec<WordSynthesis> {
        let compiled = plural().compile_synthesis(&Options::default()).unwrap();
        let mut trace = NoTrace;
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        compiled.apply(&WordSynthesis::new(word(text), "noun"), &mut env)
    }

    fn forms(words: &[WordSynthesis]) -> Vec<String> {
        words.iter().map(|w| demo::inventory().render(&w.shape)).collect()
    }

    #[test]
    fn earlier_allomorph_wins_when_its_environment_holds() {
        let raw = candidates("pa");
        assert_eq!(forms(&raw), ["pas", "paes"]);
        assert_eq!(forms(&resolve_surface(raw)), ["pas"]);
    }

    #[test]
    fn failed_environment_falls_back_to_the_next_allomorph() {
        let raw = candidates("tak");
        assert_eq!(forms(&resolve_surface(raw)), ["takes"]);
    }

    #[test]
    fn different_rule_sequences_do_not_compete() {
        let bare = WordSynthesis::new(word("tak"), "noun");
        let mut raw = candidates("tak");
        raw.push(bare);
        assert_eq!(forms(&resolve_surface(raw)), ["takes", "tak"]);
    }
}
