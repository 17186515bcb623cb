//! Phonological rewrite rules: `lhs -> rhs / leftEnv _ rightEnv`.
//!
//! One left-hand side is shared by every subrule; each subrule has its own
//! right-hand side and environments and they are tried in order at each
//! position. Every rule compiles to one pattern per subrule:
//!
//! ```text
//! [leftEnv: ...] [target: [target0: lhs0] [target1: lhs1] ...] [rightEnv: ...]
//! ```
//!
//! ## Synthesis
//!
//! Each target node is rewritten to `node ◁ rhs_i` (priority union, so the
//! output value overwrites the input one), with alpha variables instantiated
//! from the match.
//!
//! - *Iterative*: positions are visited in rule direction and each rewrite is
//!   visible to later matches.
//! - *Simultaneous*: all matches are found on the unmodified shape, then
//!   written; a node is rewritten at most once.
//!
//! ## Analysis
//!
//! The rule runs in the opposite direction against a target that describes
//! the *output* (`lhs_i ← rhs_i`, not yet searched). Each target node gets
//!
//! ```text
//! value_i = ¬rhs_i − ¬lhs_i        e.g. ¬[height:mid] − ¬[vowel high] = [height:high|low]
//! ```
//!
//! written into it, which widens the node back to everything that could have
//! produced it. The unapplication is kept only if the widened node still
//! unifies with the LHS, the surface node unifies with the RHS and something
//! actually changed. Matched nodes are then marked `SEARCHED`, so a second
//! pass over the result finds nothing new.

use super::matcher::Matcher;
use super::trace::{TraceDirection, TraceEvent};
use super::word::{WordAnalysis, WordSynthesis};
use crate::api::Options;
use crate::error::{Result, RuleError};
use crate::feature::{FeatureStruct, VariableBindings};
use crate::pattern::{Constraint, ConstraintKind, MatchLimits, MatchMode, Pattern, PatternMatch, PatternNode};
use crate::rule::{AnalysisRule, CompileRule, RuleEnv, SynthesisRule};
use crate::shape::{Direction, NodeId, Shape};
use std::collections::HashSet;
use tracing::{debug, trace};

pub(crate) const LEFT_ENV: &str = "leftEnv";
pub(crate) const RIGHT_ENV: &str = "rightEnv";
pub(crate) const TARGET: &str = "target";

pub(crate) fn target_name(i: usize) -> String {
    format!("{TARGET}{i}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Application {
    Simultaneous,
    Iterative,
}

/// Whether a simultaneous rule can feed its own environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReapplyType {
    Normal,
    SelfOpaquing,
}

#[derive(Debug, Clone)]
pub struct RewriteSubrule {
    pub rhs: Vec<FeatureStruct>,
    pub left_env: Pattern,
    pub right_env: Pattern,
}

impl RewriteSubrule {
    pub fn new(rhs: Vec<FeatureStruct>) -> Self {
        Self { rhs, left_env: Pattern::empty(), right_env: Pattern::empty() }
    }

    pub fn left(mut self, env: Pattern) -> Self {
        self.left_env = env;
        self
    }

    pub fn right(mut self, env: Pattern) -> Self {
        self.right_env = env;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RewriteRule {
    pub name: String,
    pub lhs: Vec<FeatureStruct>,
    pub subrules: Vec<RewriteSubrule>,
    pub direction: Direction,
    pub application: Application,
}

impl RewriteRule {
    pub fn new(name: &str, lhs: Vec<FeatureStruct>) -> Self {
        Self {
            name: name.to_string(),
            lhs,
            subrules: Vec::new(),
            direction: Direction::LeftToRight,
            application: Application::Simultaneous,
        }
    }

    pub fn subrule(mut self, subrule: RewriteSubrule) -> Self {
        self.subrules.push(subrule);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn application(mut self, application: Application) -> Self {
        self.application = application;
        self
    }

    /// A simultaneous rule is self-opaquing when none of its output segments
    /// could also satisfy both of its environments.
    pub fn reapply_type(&self) -> ReapplyType {
        if self.application != Application::Simultaneous {
            return ReapplyType::Normal;
        }
        let fits = |env: &Pattern, rhs: &FeatureStruct| {
            env.constraints()
                .iter()
                .filter(|c| c.kind == ConstraintKind::Segment)
                .all(|c| c.fs.unifiable(rhs, &mut VariableBindings::new()))
        };
        let transparent =
            self.subrules.iter().any(|sub| sub.rhs.iter().any(|rhs| fits(&sub.left_env, rhs) && fits(&sub.right_env, rhs)));
        if transparent { ReapplyType::Normal } else { ReapplyType::SelfOpaquing }
    }

    fn validate(&self) -> Result<()> {
        if self.lhs.is_empty() {
            return Err(RuleError::EmptyTarget(self.name.clone()));
        }
        if self.subrules.is_empty() {
            return Err(RuleError::NoSubrules(self.name.clone()));
        }
        for (i, sub) in self.subrules.iter().enumerate() {
            if sub.rhs.len() != self.lhs.len() {
                return Err(RuleError::ArityMismatch {
                    rule: self.name.clone(),
                    subrule: i,
                    lhs: self.lhs.len(),
                    rhs: sub.rhs.len(),
                });
            }
        }
        Ok(())
    }
}

/// `[leftEnv] [target: target0 ...] [rightEnv]`
pub(crate) fn rule_pattern(left: &Pattern, targets: Vec<PatternNode>, right: &Pattern) -> Result<Pattern> {
    Pattern::new(vec![
        PatternNode::group(LEFT_ENV, left.nodes().to_vec()),
        PatternNode::group(TARGET, targets),
        PatternNode::group(RIGHT_ENV, right.nodes().to_vec()),
    ])
}

fn targets(constraints: impl IntoIterator<Item = Constraint>) -> Vec<PatternNode> {
    constraints
        .into_iter()
        .enumerate()
        .map(|(i, c)| PatternNode::group(target_name(i), vec![PatternNode::Constraint(c)]))
        .collect()
}

/// Start positions in `dir` order, margins included.
fn positions(shape: &Shape, dir: Direction) -> Vec<NodeId> {
    let mut out = vec![shape.begin(dir)];
    out.extend(shape.iter(dir));
    out.push(shape.end(dir));
    out
}

impl CompileRule for RewriteRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn compile_synthesis(&self, options: &Options) -> Result<Box<dyn SynthesisRule>> {
        self.validate()?;
        let subrules = self
            .subrules
            .iter()
            .map(|sub| {
                let pattern =
                    rule_pattern(&sub.left_env, targets(self.lhs.iter().cloned().map(Constraint::segment)), &sub.right_env)?;
                Ok(SynthesisSubrule { rhs: sub.rhs.clone(), pattern })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(RewriteSynthesis {
            name: self.name.clone(),
            subrules,
            direction: self.direction,
            application: self.application,
            limits: options.limits,
        }))
    }

    fn compile_analysis(&self, options: &Options) -> Result<Box<dyn AnalysisRule>> {
        self.validate()?;
        let subrules = self
            .subrules
            .iter()
            .map(|sub| {
                let surface = self.lhs.iter().zip(&sub.rhs).map(|(lhs, rhs)| Constraint::segment(lhs.replace(rhs)).not_searched());
                let pattern = rule_pattern(&sub.left_env, targets(surface), &sub.right_env)?;
                let values =
                    self.lhs.iter().zip(&sub.rhs).map(|(lhs, rhs)| rhs.negation().subtract(&lhs.negation())).collect();
                Ok(AnalysisSubrule { rhs: sub.rhs.clone(), values, pattern })
            })
            .collect::<Result<Vec<_>>>()?;
        let reapply = self.reapply_type();
        debug!(rule = %self.name, ?reapply, "compiled rewrite analysis");
        Ok(Box::new(RewriteAnalysis {
            name: self.name.clone(),
            lhs: self.lhs.clone(),
            subrules,
            direction: self.direction.opposite(),
            iterative: self.application == Application::Iterative || reapply == ReapplyType::SelfOpaquing,
            reapply,
            limits: options.limits,
        }))
    }

    fn traverse(&self, visit: &mut dyn FnMut(&Pattern)) {
        visit(&Pattern::segments(self.lhs.iter().cloned()));
        for sub in &self.subrules {
            visit(&sub.left_env);
            visit(&sub.right_env);
        }
    }
}

// --- Synthesis ---------------------------------------------------------------

struct SynthesisSubrule {
    rhs: Vec<FeatureStruct>,
    pattern: Pattern,
}

struct RewriteSynthesis {
    name: String,
    subrules: Vec<SynthesisSubrule>,
    direction: Direction,
    application: Application,
    limits: MatchLimits,
}

impl RewriteSynthesis {
    fn find_at(&self, shape: &Shape, start: NodeId) -> Option<(usize, PatternMatch)> {
        self.subrules.iter().enumerate().find_map(|(i, sub)| {
            Matcher::new(&sub.pattern, self.direction, MatchMode::Synthesis)
                .with_limits(self.limits)
                .first_at(shape, start, &VariableBindings::new())
                .map(|m| (i, m))
        })
    }

    /// Write the subrule's outputs; returns the target nodes and whether any changed.
    fn rewrite(&self, shape: &mut Shape, sub: &SynthesisSubrule, m: &PatternMatch) -> (Vec<NodeId>, bool) {
        let mut nodes = Vec::new();
        let mut changed = false;
        for (i, rhs) in sub.rhs.iter().enumerate() {
            let Some(span) = m.group(&target_name(i)) else { continue };
            let ann = shape.annotation_mut(span.start);
            let out = ann.fs.priority_union(rhs, &m.bindings);
            changed |= out != ann.fs;
            ann.fs = out;
            nodes.push(span.start);
        }
        (nodes, changed)
    }

    fn apply_iterative(&self, shape: &mut Shape) -> usize {
        let mut count = 0;
        let mut cursor = Some(shape.begin(self.direction));
        while let Some(start) = cursor {
            if let Some((i, m)) = self.find_at(shape, start) {
                if self.rewrite(shape, &self.subrules[i], &m).1 {
                    count += 1;
                }
            }
            cursor = shape.next(start, self.direction);
        }
        count
    }

    fn apply_simultaneous(&self, shape: &mut Shape) -> usize {
        let found: Vec<_> = positions(shape, self.direction).into_iter().filter_map(|start| self.find_at(shape, start)).collect();
        let mut rewritten = HashSet::new();
        let mut count = 0;
        for (i, m) in found {
            let sub = &self.subrules[i];
            let taken = (0..sub.rhs.len()).filter_map(|k| m.group(&target_name(k))).any(|s| rewritten.contains(&s.start));
            if taken {
                continue;
            }
            let (nodes, changed) = self.rewrite(shape, sub, &m);
            rewritten.extend(nodes);
            if changed {
                count += 1;
            }
        }
        count
    }
}

impl SynthesisRule for RewriteSynthesis {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, word: &WordSynthesis, env: &mut RuleEnv<'_>) -> Vec<WordSynthesis> {
        let mut shape = word.shape.clone();
        let count = match self.application {
            Application::Iterative => self.apply_iterative(&mut shape),
            Application::Simultaneous => self.apply_simultaneous(&mut shape),
        };
        if count == 0 {
            trace!(rule = %self.name, "rewrite did not apply");
            return Vec::new();
        }
        debug!(rule = %self.name, count, "rewrite applied");

        let mut out = word.clone();
        out.shape = shape;
        if env.trace.enabled() {
            env.trace.record(TraceEvent {
                rule: self.name.clone(),
                direction: TraceDirection::Synthesis,
                input: word.shape.clone(),
                output: Some(out.shape.clone()),
                allomorph: None,
            });
        }
        vec![out]
    }
}

// --- Analysis ----------------------------------------------------------------

struct AnalysisSubrule {
    rhs: Vec<FeatureStruct>,
    /// Per target: what to write back into the surface node.
    values: Vec<FeatureStruct>,
    pattern: Pattern,
}

struct RewriteAnalysis {
    name: String,
    lhs: Vec<FeatureStruct>,
    subrules: Vec<AnalysisSubrule>,
    direction: Direction,
    iterative: bool,
    reapply: ReapplyType,
    limits: MatchLimits,
}

/// Writes for one unapplication, plus the span to mark searched.
struct Unapplication {
    writes: Vec<(NodeId, FeatureStruct)>,
    searched: (NodeId, NodeId),
}

impl RewriteAnalysis {
    fn find_at(&self, shape: &Shape, start: NodeId) -> Option<Unapplication> {
        self.subrules.iter().find_map(|sub| {
            let matcher = Matcher::new(&sub.pattern, self.direction, MatchMode::Analysis).with_limits(self.limits);
            let m = matcher.first_at(shape, start, &VariableBindings::new())?;
            self.unapplication(shape, sub, &m)
        })
    }

    fn unapplication(&self, shape: &Shape, sub: &AnalysisSubrule, m: &PatternMatch) -> Option<Unapplication> {
        let mut writes = Vec::new();
        let mut changed = false;
        for (i, value) in sub.values.iter().enumerate() {
            let span = m.group(&target_name(i))?;
            let surface = shape.node(span.start).fs();
            let underlying = surface.priority_union(value, &m.bindings);
            if !self.lhs[i].unifiable(&underlying, &mut VariableBindings::new())
                || !sub.rhs[i].unifiable(surface, &mut m.bindings.clone())
            {
                trace!(rule = %self.name, node = %surface, "unapplication rejected");
                return None;
            }
            changed |= &underlying != surface;
            writes.push((span.start, underlying));
        }
        if !changed {
            trace!(rule = %self.name, "vacuous unapplication pruned");
            return None;
        }

        let span = m.span?;
        let first = m.group(&target_name(0))?;
        let last = m.group(&target_name(sub.values.len() - 1))?;
        let searched = match self.direction {
            Direction::LeftToRight => (span.start, last.end),
            Direction::RightToLeft => (first.start, span.end),
        };
        Some(Unapplication { writes, searched })
    }

    fn commit(shape: &mut Shape, u: Unapplication) {
        for (id, fs) in u.writes {
            shape.annotation_mut(id).fs = fs;
        }
        shape.mark_searched(u.searched.0, u.searched.1);
    }

    fn unapply_iterative(&self, shape: &mut Shape) -> usize {
        let mut count = 0;
        let mut cursor = Some(shape.begin(self.direction));
        while let Some(start) = cursor {
            if let Some(u) = self.find_at(shape, start) {
                Self::commit(shape, u);
                count += 1;
            }
            cursor = shape.next(start, self.direction);
        }
        count
    }

    /// Self-opaquing rules restore the environments of their own earlier
    /// outputs, so passes repeat until one unapplies nothing. Searched
    /// targets never match again, which bounds the loop.
    fn unapply_until_stable(&self, shape: &mut Shape) -> usize {
        let mut count = 0;
        loop {
            let pass = self.unapply_iterative(shape);
            if pass == 0 {
                return count;
            }
            trace!(rule = %self.name, pass, "self-opaquing pass");
            count += pass;
        }
    }

    fn unapply_simultaneous(&self, shape: &mut Shape) -> usize {
        let found: Vec<_> = positions(shape, self.direction).into_iter().filter_map(|start| self.find_at(shape, start)).collect();
        let mut written = HashSet::new();
        let mut count = 0;
        for u in found {
            if u.writes.iter().any(|(id, _)| written.contains(id)) {
                continue;
            }
            written.extend(u.writes.iter().map(|(id, _)| *id));
            Self::commit(shape, u);
            count += 1;
        }
        count
    }
}

impl AnalysisRule for RewriteAnalysis {
    fn name(&self) -> &str {
        &self.name
    }

    fn unapply(&self, word: &WordAnalysis, env: &mut RuleEnv<'_>) -> Vec<WordAnalysis> {
        let mut shape = word.shape.clone();
        let count = match (self.reapply, self.iterative) {
            (ReapplyType::SelfOpaquing, _) => self.unapply_until_stable(&mut shape),
            (ReapplyType::Normal, true) => self.unapply_iterative(&mut shape),
            (ReapplyType::Normal, false) => self.unapply_simultaneous(&mut shape),
        };
        if count == 0 {
            return Vec::new();
        }
        debug!(rule = %self.name, count, "rewrite unapplied");

        let mut out = word.clone();
        out.shape = shape;
        out.record_unapplication(&self.name);
        if env.trace.enabled() {
            env.trace.record(TraceEvent {
                rule: self.name.clone(),
                direction: TraceDirection::Analysis,
                input: word.shape.clone(),
                output: Some(out.shape.clone()),
                allomorph: None,
            });
        }
        vec![out]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TraceLog;
    use crate::rule::NoBlocking;
    use crate::rules::demo;
    use crate::test_support::{fs, system, word};

    fn lowering() -> RewriteRule {
        let sys = system();
        RewriteRule::new("lowering", vec![fs(&sys, "[type:vowel height:high]")])
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[height:mid]")]))
    }

    fn voicing(application: Application) -> RewriteRule {
        let sys = system();
        let left = Pattern::segments([fs(&sys, "[type:consonant voice:@v]")]);
        RewriteRule::new("voicing", vec![fs(&sys, "[type:consonant]")])
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[voice:@v]")]).left(left))
            .application(application)
    }

    fn synthesize(rule: &RewriteRule, text: &str) -> Vec<String> {
        let compiled = rule.compile_synthesis(&Options::default()).unwrap();
        let mut trace = TraceLog::default();
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        compiled.apply(&WordSynthesis::new(word(text), "noun"), &mut env).iter().map(|w| demo::inventory().render(&w.shape)).collect()
    }

    fn analyze(rule: &RewriteRule, analysis: &WordAnalysis) -> Vec<WordAnalysis> {
        let compiled = rule.compile_analysis(&Options::default()).unwrap();
        let mut trace = TraceLog::default();
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        compiled.unapply(analysis, &mut env)
    }

    #[test]
    fn vowel_lowering_synthesis() {
        assert_eq!(synthesize(&lowering(), "pik"), ["pek"]);
        // Nothing high to lower.
        assert!(synthesize(&lowering(), "pak").is_empty());
    }

    #[test]
    fn vowel_lowering_analysis_widens_the_height() {
        let sys = system();
        let out = analyze(&lowering(), &WordAnalysis::new(word("pek")));
        assert_eq!(out.len(), 1);
        let vowel = out[0].shape.iter(Direction::LeftToRight).nth(1).unwrap();
        assert_eq!(out[0].shape.node(vowel).fs().symbol_names("height"), Some(vec!["high", "low"]));
        assert!(fs(&sys, "[type:vowel height:high]").unifiable(out[0].shape.node(vowel).fs(), &mut VariableBindings::new()));
        assert_eq!(demo::inventory().render(&out[0].shape), "pik");
        assert_eq!(out[0].rules_unapplied, ["lowering"]);
    }

    #[test]
    fn vowel_lowering_rejects_low_vowels() {
        assert!(analyze(&lowering(), &WordAnalysis::new(word("pak"))).is_empty());
    }

    #[test]
    fn round_trip_recovers_the_underlying_form() {
        let rule = voicing(Application::Simultaneous);
        let surface = synthesize(&rule, "abs");
        assert_eq!(surface, ["abz"]);
        let out = analyze(&rule, &WordAnalysis::new(word("abz")));
        assert_eq!(out.len(), 1);
        assert_eq!(demo::inventory().render(&out[0].shape), "abs");
    }

    #[test]
    fn unapplying_twice_finds_nothing_new() {
        let first = analyze(&lowering(), &WordAnalysis::new(word("pek")));
        assert_eq!(first.len(), 1);
        let vowel = first[0].shape.iter(Direction::LeftToRight).nth(1).unwrap();
        assert!(first[0].shape.node(vowel).annotation().is_searched());
        assert!(analyze(&lowering(), &first[0]).is_empty());
    }

    #[test]
    fn iterative_application_feeds_later_matches() {
        assert_eq!(synthesize(&voicing(Application::Simultaneous), "bkt"), ["bgt"]);
        assert_eq!(synthesize(&voicing(Application::Iterative), "bkt"), ["bgd"]);
    }

    #[test]
    fn right_to_left_rules_scan_from_the_right() {
        let sys = system();
        let right = Pattern::segments([fs(&sys, "[type:consonant voice:@v]")]);
        let rule = RewriteRule::new("regressive", vec![fs(&sys, "[type:consonant]")])
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[voice:@v]")]).right(right))
            .direction(Direction::RightToLeft)
            .application(Application::Iterative);
        assert_eq!(synthesize(&rule, "tkb"), ["dgb"]);
    }

    #[test]
    fn subrules_are_tried_in_order() {
        let sys = system();
        let rule = RewriteRule::new("fronting", vec![fs(&sys, "[type:vowel]")])
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[height:mid backness:front]")]).right(Pattern::segments([fs(&sys, "[place:coronal]")])))
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[height:mid round:+]")]));
        assert_eq!(synthesize(&rule, "kat"), ["ket"]);
        assert_eq!(synthesize(&rule, "pak"), ["pok"]);
    }

    #[test]
    fn arity_mismatch_is_a_compile_error() {
        let sys = system();
        let rule = RewriteRule::new("broken", vec![fs(&sys, "[type:vowel]"), fs(&sys, "[type:consonant]")])
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[height:mid]")]));
        assert_eq!(
            rule.compile_synthesis(&Options::default()).err(),
            Some(RuleError::ArityMismatch { rule: "broken".into(), subrule: 0, lhs: 2, rhs: 1 })
        );
        assert!(matches!(RewriteRule::new("empty", vec![]).compile_analysis(&Options::default()), Err(RuleError::EmptyTarget(_))));
    }

    #[test]
    fn self_opacity_is_detected_from_the_environments() {
        let sys = system();
        let opaque = RewriteRule::new("rounding", vec![fs(&sys, "[type:vowel]")])
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[round:+]")]).left(Pattern::segments([fs(&sys, "[round:-]")])));
        assert_eq!(opaque.reapply_type(), ReapplyType::SelfOpaquing);
        assert_eq!(voicing(Application::Simultaneous).reapply_type(), ReapplyType::Normal);
        assert_eq!(lowering().reapply_type(), ReapplyType::Normal);
        assert_eq!(voicing(Application::Iterative).reapply_type(), ReapplyType::Normal);
    }

    #[test]
    fn self_opaquing_rules_unapply_until_stable() {
        let sys = system();
        let rule = RewriteRule::new("rounding", vec![fs(&sys, "[type:vowel]")])
            .subrule(RewriteSubrule::new(vec![fs(&sys, "[round:+ backness:back]")]).left(Pattern::segments([fs(&sys, "[round:-]")])));
        assert_eq!(rule.reapply_type(), ReapplyType::SelfOpaquing);
        assert_eq!(synthesize(&rule, "eee"), ["eoo"]);

        // The last vowel's environment only reappears once the middle one is unapplied.
        let out = analyze(&rule, &WordAnalysis::new(word("eoo")));
        assert_eq!(out.len(), 1);
        assert_eq!(demo::inventory().render(&out[0].shape), "eee");
        assert!(analyze(&rule, &out[0]).is_empty());
    }

    #[test]
    fn trace_records_applications() {
        let compiled = lowering().compile_synthesis(&Options::default()).unwrap();
        let mut trace = TraceLog::default();
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        compiled.apply(&WordSynthesis::new(word("pik"), "noun"), &mut env);
        assert_eq!(trace.events.len(), 1);
        assert_eq!(trace.events[0].rule, "lowering");
        assert_eq!(trace.events[0].direction, TraceDirection::Synthesis);
    }
}
