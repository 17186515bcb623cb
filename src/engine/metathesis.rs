//! Metathesis: reorder adjacent named groups.
//!
//! ```text
//! groups:      [c: C] [v: V]        order: v c
//! synthesis:   k a t   ──▶  a k t
//! analysis:    a k t   ──▶  k a t   (match v c right-to-left, relink as c v)
//! ```
//!
//! A match relinks every group or nothing: if any group is missing from the
//! match the position is skipped.

use super::matcher::Matcher;
use super::rewrite::{LEFT_ENV, RIGHT_ENV};
use super::trace::{TraceDirection, TraceEvent};
use super::word::{WordAnalysis, WordSynthesis};
use crate::api::Options;
use crate::error::{Result, RuleError};
use crate::feature::VariableBindings;
use crate::pattern::{MatchLimits, MatchMode, Pattern, PatternNode, Span};
use crate::rule::{AnalysisRule, CompileRule, RuleEnv, SynthesisRule};
use crate::shape::{Direction, NodeId, Shape};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MetathesisRule {
    pub name: String,
    /// Named groups in underlying (left-to-right) order.
    pub groups: Vec<(String, Pattern)>,
    /// Surface order of the groups.
    pub group_order: Vec<String>,
    pub left_env: Pattern,
    pub right_env: Pattern,
    pub direction: Direction,
}

impl MetathesisRule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            groups: Vec::new(),
            group_order: Vec::new(),
            left_env: Pattern::empty(),
            right_env: Pattern::empty(),
            direction: Direction::LeftToRight,
        }
    }

    pub fn group(mut self, name: &str, pattern: Pattern) -> Self {
        self.groups.push((name.to_string(), pattern));
        self
    }

    pub fn order(mut self, order: &[&str]) -> Self {
        self.group_order = order.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn left(mut self, env: Pattern) -> Self {
        self.left_env = env;
        self
    }

    pub fn right(mut self, env: Pattern) -> Self {
        self.right_env = env;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|(name, _)| name.clone()).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(RuleError::EmptyTarget(self.name.clone()));
        }
        let mut declared = self.group_names();
        let mut order = self.group_order.clone();
        declared.sort();
        order.sort();
        let unique = declared.windows(2).all(|w| w[0] != w[1]);
        if declared != order || !unique {
            return Err(RuleError::InvalidGroupOrder {
                rule: self.name.clone(),
                groups: self.group_names(),
                order: self.group_order.clone(),
            });
        }
        Ok(())
    }

    /// Compile with the groups laid out in `matched` order.
    fn compile(&self, matched: &[String], target: &[String], mode: MatchMode, options: &Options) -> Result<Metathesis> {
        self.validate()?;
        let mut nodes = vec![PatternNode::group(LEFT_ENV, self.left_env.nodes().to_vec())];
        for name in matched {
            if let Some((_, pattern)) = self.groups.iter().find(|(n, _)| n == name) {
                nodes.push(PatternNode::group(name.clone(), pattern.nodes().to_vec()));
            }
        }
        nodes.push(PatternNode::group(RIGHT_ENV, self.right_env.nodes().to_vec()));

        let direction = match mode {
            MatchMode::Synthesis => self.direction,
            MatchMode::Analysis => self.direction.opposite(),
        };
        Ok(Metathesis {
            name: self.name.clone(),
            pattern: Pattern::new(nodes)?,
            matched: matched.to_vec(),
            target: target.to_vec(),
            direction,
            mode,
            limits: options.limits,
        })
    }
}

impl CompileRule for MetathesisRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn compile_synthesis(&self, options: &Options) -> Result<Box<dyn SynthesisRule>> {
        Ok(Box::new(self.compile(&self.group_names(), &self.group_order, MatchMode::Synthesis, options)?))
    }

    fn compile_analysis(&self, options: &Options) -> Result<Box<dyn AnalysisRule>> {
        Ok(Box::new(self.compile(&self.group_order, &self.group_names(), MatchMode::Analysis, options)?))
    }

    fn traverse(&self, visit: &mut dyn FnMut(&Pattern)) {
        visit(&self.left_env);
        self.groups.iter().for_each(|(_, p)| visit(p));
        visit(&self.right_env);
    }
}

struct Metathesis {
    name: String,
    pattern: Pattern,
    /// Group names in the order the pattern lists them (left to right).
    matched: Vec<String>,
    /// Order to relink the groups into.
    target: Vec<String>,
    direction: Direction,
    mode: MatchMode,
    limits: MatchLimits,
}

impl Metathesis {
    fn run(&self, shape: &mut Shape) -> usize {
        let matcher = Matcher::new(&self.pattern, self.direction, self.mode).with_limits(self.limits);
        let mut starts = vec![shape.begin(self.direction)];
        starts.extend(shape.iter(self.direction));

        let mut moved: HashSet<NodeId> = HashSet::new();
        let mut count = 0;
        for start in starts {
            let Some(m) = matcher.first_at(shape, start, &VariableBindings::new()) else { continue };
            let Some(spans) = self.matched.iter().map(|g| m.group(g)).collect::<Option<Vec<Span>>>() else { continue };
            let (Some(first), Some(last)) = (spans.first(), spans.last()) else { continue };

            let by_group: Vec<(&String, Vec<NodeId>)> =
                self.matched.iter().zip(&spans).map(|(name, span)| (name, shape.span_nodes(span.start, span.end))).collect();
            if by_group.iter().flat_map(|(_, ids)| ids).any(|id| moved.contains(id)) {
                continue;
            }
            let (Some(left), Some(right)) =
                (shape.next(first.start, Direction::RightToLeft), shape.next(last.end, Direction::LeftToRight))
            else {
                continue;
            };

            let order: Vec<NodeId> = self
                .target
                .iter()
                .filter_map(|name| by_group.iter().find(|(n, _)| *n == name))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect();
            shape.relink(left, &order, right);
            moved.extend(order);
            count += 1;
        }
        count
    }

    fn event(&self, direction: TraceDirection, input: &Shape, output: &Shape) -> TraceEvent {
        TraceEvent {
            rule: self.name.clone(),
            direction,
            input: input.clone(),
            output: Some(output.clone()),
            allomorph: None,
        }
    }
}

impl SynthesisRule for Metathesis {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, word: &WordSynthesis, env: &mut RuleEnv<'_>) -> Vec<WordSynthesis> {
        let mut out = word.clone();
        if self.run(&mut out.shape) == 0 {
            return Vec::new();
        }
        debug!(rule = %self.name, "metathesis applied");
        if env.trace.enabled() {
            env.trace.record(self.event(TraceDirection::Synthesis, &word.shape, &out.shape));
        }
        vec![out]
    }
}

impl AnalysisRule for Metathesis {
    fn name(&self) -> &str {
        &self.name
    }

    fn unapply(&self, word: &WordAnalysis, env: &mut RuleEnv<'_>) -> Vec<WordAnalysis> {
        let mut out = word.clone();
        if self.run(&mut out.shape) == 0 {
            return Vec::new();
        }
        debug!(rule = %self.name, "metathesis unapplied");
        out.record_unapplication(&self.name);
        if env.trace.enabled() {
            env.trace.record(self.event(TraceDirection::Analysis, &word.shape, &out.shape));
        }
        vec![out]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoTrace;
    use crate::rule::NoBlocking;
    use crate::rules::demo;
    use crate::test_support::{fs, system, word};

    fn swap() -> MetathesisRule {
        let sys = system();
        MetathesisRule::new("swap")
            .group("c", Pattern::segments([fs(&sys, "[type:consonant]")]))
            .group("v", Pattern::segments([fs(&sys, "[type:vowel]")]))
            .order(&["v", "c"])
    }

    fn synthesize(rule: &MetathesisRule, text: &str) -> Option<String> {
        let compiled = rule.compile_synthesis(&Options::default()).unwrap();
        let mut trace = NoTrace;
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        let out = compiled.apply(&WordSynthesis::new(word(text), "noun"), &mut env);
        out.first().map(|w| demo::inventory().render(&w.shape))
    }

    fn analyze(rule: &MetathesisRule, text: &str) -> Option<String> {
        let compiled = rule.compile_analysis(&Options::default()).unwrap();
        let mut trace = NoTrace;
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        let out = compiled.unapply(&WordAnalysis::new(word(text)), &mut env);
        out.first().map(|w| demo::inventory().render(&w.shape))
    }

    #[test]
    fn swaps_consonant_and_vowel() {
        assert_eq!(synthesize(&swap(), "ka").as_deref(), Some("ak"));
        assert_eq!(analyze(&swap(), "ak").as_deref(), Some("ka"));
    }

    #[test]
    fn reversed_links_stay_consistent() {
        let compiled = swap().compile_synthesis(&Options::default()).unwrap();
        let mut trace = NoTrace;
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        let out = compiled.apply(&WordSynthesis::new(word("ka"), "noun"), &mut env);
        let shape = &out[0].shape;
        let ltr: Vec<_> = shape.iter(Direction::LeftToRight).collect();
        let mut rtl: Vec<_> = shape.iter(Direction::RightToLeft).collect();
        rtl.reverse();
        assert_eq!(ltr, rtl);
    }

    #[test]
    fn environments_restrict_the_swap() {
        let sys = system();
        let rule = MetathesisRule::new("cluster")
            .group("dorsal", Pattern::segments([fs(&sys, "[place:dorsal]")]))
            .group("fricative", Pattern::segments([fs(&sys, "[manner:fricative]")]))
            .order(&["fricative", "dorsal"])
            .right(Pattern::new(vec![PatternNode::anchor()]).unwrap());
        assert_eq!(synthesize(&rule, "taks").as_deref(), Some("task"));
        assert_eq!(synthesize(&rule, "taksa"), None);
        assert_eq!(analyze(&rule, "task").as_deref(), Some("taks"));
    }

    #[test]
    fn group_order_must_be_a_permutation() {
        let bad = swap().order(&["v", "v"]);
        assert!(matches!(bad.compile_synthesis(&Options::default()), Err(RuleError::InvalidGroupOrder { .. })));
        let missing = swap().order(&["v"]);
        assert!(matches!(missing.compile_analysis(&Options::default()), Err(RuleError::InvalidGroupOrder { .. })));
        assert!(matches!(MetathesisRule::new("none").compile_synthesis(&Options::default()), Err(RuleError::EmptyTarget(_))));
    }

    #[test]
    fn non_matching_words_are_untouched() {
        assert_eq!(synthesize(&swap(), "aa"), None);
    }
}
