//! Affixal morphological rules.
//!
//! An [`AffixRule`] is an ordered list of allomorphs ([`AffixSubrule`]s). Each
//! subrule describes its input as a sequence of *partitions* (patterns that,
//! together and anchored at both word edges, cover the whole stem) and its
//! output as a list of actions over those partitions:
//!
//! ```text
//! lhs:  [p0: C* V] [p1: C]                      rhs: Copy(0) Insert(i) Copy(1)
//! tak   ─────▶  p0 = ta, p1 = k   ─────▶  ta i k
//!
//! Copy(i)       copy partition i unchanged
//! Insert(segs)  insert new segments (tagged with the application's morph index)
//! Modify(i, fs) copy partition i, overwriting each node with fs
//! ```
//!
//! Reduplication is just `Copy(0) Copy(0)`.
//!
//! ## Gates
//!
//! Before matching, a subrule checks the word's MPR features (required all,
//! excluded none), its part of speech, how often the rule already applied and
//! whether the required head and foot structures unify. After building the
//! output, obligatory head features must be present and the [`Blocker`] may
//! veto or replace the result.
//!
//! ## Allomorph selection
//!
//! Subrules are tried in order. A subrule with an [`Environment`] cannot be
//! checked until the surface form exists, so its output is kept *and* the
//! next subrule is tried; the first successful subrule without an environment
//! ends the search. The driver later drops candidates whose environments fail
//! on the surface.
//!
//! ## Analysis
//!
//! The output actions are turned into an anchored template and matched
//! exhaustively. Every match rebuilds one underlying shape: copied partitions
//! come back as they are, modified partitions have the modified features reset
//! to the input constraint, and partitions the output dropped come back as
//! `OPTIONAL` nodes built from their constraints. Duplicate candidates are
//! merged, keeping the longer one (see `dedup.rs`).

use super::dedup::dedup_keep_longer;
use super::matcher::Matcher;
use super::trace::{TraceDirection, TraceEvent};
use super::word::{AppliedAllomorph, WordAnalysis, WordSynthesis};
use crate::api::Options;
use crate::error::{Result, RuleError};
use crate::feature::{FeatureStruct, VariableBindings};
use crate::pattern::{
    Constraint, ConstraintKind, Group, MatchLimits, MatchMode, Pattern, PatternMatch, PatternNode,
};
use crate::rule::{AnalysisRule, Blocker, CompileRule, RuleEnv, SynthesisRule};
use crate::shape::{Annotation, Direction, NodeFlags, NodeId, NodeKind, Shape};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
pub enum OutputAction {
    Copy(usize),
    Insert(Vec<FeatureStruct>),
    Modify(usize, FeatureStruct),
}

/// Surface context an allomorph requires around its own segments.
#[derive(Debug, Clone)]
pub struct Environment {
    pub left: Pattern,
    pub right: Pattern,
}

impl Environment {
    pub fn new(left: Pattern, right: Pattern) -> Self {
        Self { left, right }
    }

    /// Check the environment around the nodes `first..=last`.
    pub fn is_satisfied(&self, shape: &Shape, first: NodeId, last: NodeId) -> bool {
        let bindings = VariableBindings::new();
        let fits = |pattern: &Pattern, from: NodeId, dir: Direction| {
            pattern.is_empty()
                || shape
                    .next(from, dir)
                    .is_some_and(|start| Matcher::new(pattern, dir, MatchMode::Synthesis).first_at(shape, start, &bindings).is_some())
        };
        fits(&self.left, first, Direction::RightToLeft) && fits(&self.right, last, Direction::LeftToRight)
    }
}

#[derive(Debug, Clone)]
pub struct AffixSubrule {
    /// Allomorph id.
    pub id: String,
    pub lhs: Vec<Pattern>,
    pub rhs: Vec<OutputAction>,
    pub required_mpr: BTreeSet<String>,
    pub excluded_mpr: BTreeSet<String>,
    pub output_mpr: BTreeSet<String>,
    pub required_head: FeatureStruct,
    pub output_head: FeatureStruct,
    pub required_foot: FeatureStruct,
    pub output_foot: FeatureStruct,
    /// Empty means any part of speech.
    pub required_pos: BTreeSet<String>,
    pub output_pos: Option<String>,
    /// Head feature ids that must be present after application.
    pub obligatory_head: Vec<String>,
    pub env: Option<Arc<Environment>>,
    pub max_apps: usize,
}

impl AffixSubrule {
    pub fn new(id: &str, lhs: Vec<Pattern>, rhs: Vec<OutputAction>) -> Self {
        Self {
            id: id.to_string(),
            lhs,
            rhs,
            required_mpr: BTreeSet::new(),
            excluded_mpr: BTreeSet::new(),
            output_mpr: BTreeSet::new(),
            required_head: FeatureStruct::new(),
            output_head: FeatureStruct::new(),
            required_foot: FeatureStruct::new(),
            output_foot: FeatureStruct::new(),
            required_pos: BTreeSet::new(),
            output_pos: None,
            obligatory_head: Vec::new(),
            env: None,
            max_apps: 1,
        }
    }

    pub fn requires_mpr(mut self, feature: &str) -> Self {
        self.required_mpr.insert(feature.to_string());
        self
    }

    pub fn excludes_mpr(mut self, feature: &str) -> Self {
        self.excluded_mpr.insert(feature.to_string());
        self
    }

    pub fn outputs_mpr(mut self, feature: &str) -> Self {
        self.output_mpr.insert(feature.to_string());
        self
    }

    pub fn requires_head(mut self, head: FeatureStruct) -> Self {
        self.required_head = head;
        self
    }

    pub fn outputs_head(mut self, head: FeatureStruct) -> Self {
        self.output_head = head;
        self
    }

    pub fn requires_foot(mut self, foot: FeatureStruct) -> Self {
        self.required_foot = foot;
        self
    }

    pub fn outputs_foot(mut self, foot: FeatureStruct) -> Self {
        self.output_foot = foot;
        self
    }

    pub fn requires_pos(mut self, pos: &str) -> Self {
        self.required_pos.insert(pos.to_string());
        self
    }

    pub fn outputs_pos(mut self, pos: &str) -> Self {
        self.output_pos = Some(pos.to_string());
        self
    }

    pub fn obligatory(mut self, feature: &str) -> Self {
        self.obligatory_head.push(feature.to_string());
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.env = Some(Arc::new(env));
        self
    }

    pub fn max_apps(mut self, max: usize) -> Self {
        self.max_apps = max;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AffixRule {
    pub name: String,
    pub subrules: Vec<AffixSubrule>,
}

impl AffixRule {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), subrules: Vec::new() }
    }

    pub fn subrule(mut self, subrule: AffixSubrule) -> Self {
        self.subrules.push(subrule);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.subrules.is_empty() {
            return Err(RuleError::NoSubrules(self.name.clone()));
        }
        for sub in &self.subrules {
            for action in &sub.rhs {
                if let OutputAction::Copy(i) | OutputAction::Modify(i, _) = action {
                    if *i >= sub.lhs.len() {
                        return Err(RuleError::PartitionOutOfRange {
                            rule: self.name.clone(),
                            index: *i,
                            count: sub.lhs.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn partition_name(i: usize) -> String {
    format!("p{i}")
}

fn action_name(k: usize) -> String {
    format!("a{k}")
}

fn anchored(groups: Vec<PatternNode>) -> Result<Pattern> {
    let mut nodes = Vec::with_capacity(groups.len() + 2);
    nodes.push(PatternNode::anchor());
    nodes.extend(groups);
    nodes.push(PatternNode::anchor());
    Pattern::new(nodes)
}

/// The same nodes with every segment constraint overwritten by `fs`.
fn modified(nodes: &[PatternNode], fs: &FeatureStruct) -> Vec<PatternNode> {
    nodes
        .iter()
        .map(|node| match node {
            PatternNode::Constraint(c) if c.kind == ConstraintKind::Segment => {
                PatternNode::Constraint(Constraint { fs: c.fs.replace(fs), ..c.clone() })
            }
            PatternNode::Group(g) => PatternNode::Group(Group { children: modified(&g.children, fs), ..g.clone() }),
            other => other.clone(),
        })
        .collect()
}

/// `fs` restricted to the features `keys` mentions.
fn only(fs: &FeatureStruct, keys: &FeatureStruct) -> FeatureStruct {
    fs.without(&fs.without(keys))
}

fn group_nodes(shape: &Shape, m: &PatternMatch, name: &str) -> Vec<NodeId> {
    m.group(name).map(|s| shape.span_nodes(s.start, s.end)).unwrap_or_default()
}

impl CompileRule for AffixRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn compile_synthesis(&self, options: &Options) -> Result<Box<dyn SynthesisRule>> {
        self.validate()?;
        let subrules = self
            .subrules
            .iter()
            .map(|sub| {
                let groups =
                    sub.lhs.iter().enumerate().map(|(i, p)| PatternNode::group(partition_name(i), p.nodes().to_vec())).collect();
                Ok((sub.clone(), anchored(groups)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(AffixSynthesis { name: self.name.clone(), subrules, limits: options.limits }))
    }

    fn compile_analysis(&self, options: &Options) -> Result<Box<dyn AnalysisRule>> {
        self.validate()?;
        let subrules = self
            .subrules
            .iter()
            .map(|sub| {
                let groups = sub
                    .rhs
                    .iter()
                    .enumerate()
                    .map(|(k, action)| {
                        let children = match action {
                            OutputAction::Copy(i) => sub.lhs[*i].nodes().to_vec(),
                            OutputAction::Modify(i, fs) => modified(sub.lhs[*i].nodes(), fs),
                            OutputAction::Insert(segs) => segs.iter().cloned().map(PatternNode::segment).collect(),
                        };
                        PatternNode::group(action_name(k), children)
                    })
                    .collect();
                Ok((sub.clone(), anchored(groups)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(AffixAnalysis { name: self.name.clone(), subrules, limits: options.limits }))
    }

    fn traverse(&self, visit: &mut dyn FnMut(&Pattern)) {
        for sub in &self.subrules {
            for partition in &sub.lhs {
                visit(partition);
            }
            if let Some(env) = &sub.env {
                visit(&env.left);
                visit(&env.right);
            }
        }
    }
}

// --- Synthesis ---------------------------------------------------------------

struct AffixSynthesis {
    name: String,
    subrules: Vec<(AffixSubrule, Pattern)>,
    limits: MatchLimits,
}

impl AffixSynthesis {
    fn apply_subrule(&self, index: usize, word: &WordSynthesis, blocker: &dyn Blocker) -> Option<WordSynthesis> {
        let (sub, lhs) = &self.subrules[index];
        if !sub.required_mpr.is_subset(&word.mpr) || !sub.excluded_mpr.is_disjoint(&word.mpr) {
            trace!(rule = %self.name, allomorph = %sub.id, mpr = ?word.mpr, "MPR gate failed");
            return None;
        }
        if !sub.required_pos.is_empty() && !sub.required_pos.contains(&word.pos) {
            trace!(rule = %self.name, allomorph = %sub.id, pos = %word.pos, "part of speech gate failed");
            return None;
        }
        if word.applications_of(&self.name) >= sub.max_apps {
            return None;
        }

        let mut bindings = VariableBindings::new();
        let head = word.head.merge(&sub.required_head, &mut bindings)?;
        let foot = word.foot.merge(&sub.required_foot, &mut bindings)?;
        let m = Matcher::new(lhs, Direction::LeftToRight, MatchMode::Synthesis)
            .with_limits(self.limits)
            .first_at(&word.shape, NodeId::LEFT_MARGIN, &bindings)?;

        let morph = word.allomorphs.len();
        let mut shape = Shape::new();
        for action in &sub.rhs {
            match action {
                OutputAction::Copy(i) => {
                    for id in group_nodes(&word.shape, &m, &partition_name(*i)) {
                        let node = word.shape.node(id);
                        shape.push(node.kind(), node.annotation().clone());
                    }
                }
                OutputAction::Insert(segs) => {
                    for fs in segs {
                        let annotation = Annotation { morph: Some(morph), ..Annotation::new(fs.instantiate(&m.bindings)) };
                        shape.push(NodeKind::Segment, annotation);
                    }
                }
                OutputAction::Modify(i, fs) => {
                    for id in group_nodes(&word.shape, &m, &partition_name(*i)) {
                        let node = word.shape.node(id);
                        let mut annotation = node.annotation().clone();
                        annotation.fs = annotation.fs.priority_union(fs, &m.bindings);
                        shape.push(node.kind(), annotation);
                    }
                }
            }
        }

        let mut out = word.clone();
        out.shape = shape;
        out.head = head.priority_union(&sub.output_head, &m.bindings);
        out.foot = foot.priority_union(&sub.output_foot, &m.bindings);
        if let Some(pos) = &sub.output_pos {
            out.pos = pos.clone();
        }
        if let Some(missing) = sub.obligatory_head.iter().find(|f| !out.head.contains(f)) {
            trace!(rule = %self.name, allomorph = %sub.id, feature = %missing, "obligatory head feature missing");
            return None;
        }
        out.mpr.extend(sub.output_mpr.iter().cloned());
        *out.applications.entry(self.name.clone()).or_default() += 1;
        out.allomorphs.push(AppliedAllomorph {
            rule: self.name.clone(),
            subrule: index,
            id: sub.id.clone(),
            environment: sub.env.clone(),
        });

        blocker.check_blocking(&self.name, out)
    }
}

impl SynthesisRule for AffixSynthesis {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, word: &WordSynthesis, env: &mut RuleEnv<'_>) -> Vec<WordSynthesis> {
        let mut out = Vec::new();
        for (index, (sub, _)) in self.subrules.iter().enumerate() {
            let Some(result) = self.apply_subrule(index, word, env.blocker) else { continue };
            debug!(rule = %self.name, allomorph = %sub.id, "affix applied");
            if env.trace.enabled() {
                env.trace.record(TraceEvent {
                    rule: self.name.clone(),
                    direction: TraceDirection::Synthesis,
                    input: word.shape.clone(),
                    output: Some(result.shape.clone()),
                    allomorph: Some(sub.id.clone()),
                });
            }
            out.push(result);
            if sub.env.is_none() {
                break;
            }
        }
        out
    }
}

// --- Analysis ----------------------------------------------------------------

struct AffixAnalysis {
    name: String,
    subrules: Vec<(AffixSubrule, Pattern)>,
    limits: MatchLimits,
}

impl AffixAnalysis {
    fn unapply_subrule(&self, sub: &AffixSubrule, template: &Pattern, word: &WordAnalysis) -> Vec<WordAnalysis> {
        if !sub.excluded_mpr.is_disjoint(&word.mpr) {
            trace!(rule = %self.name, allomorph = %sub.id, mpr = ?word.mpr, "MPR gate failed");
            return Vec::new();
        }
        if let Some(pos) = &sub.output_pos {
            if !word.pos.is_empty() && !word.pos.contains(pos) {
                return Vec::new();
            }
        }
        if word.unapplications_of(&self.name) >= sub.max_apps {
            return Vec::new();
        }

        let mut bindings = VariableBindings::new();
        if !sub.output_head.unifiable(&word.head, &mut bindings) || !sub.output_foot.unifiable(&word.foot, &mut bindings) {
            return Vec::new();
        }
        let Some(head) = word.head.without(&sub.output_head).merge(&sub.required_head, &mut bindings) else {
            return Vec::new();
        };
        let Some(foot) = word.foot.without(&sub.output_foot).merge(&sub.required_foot, &mut bindings) else {
            return Vec::new();
        };

        let matcher = Matcher::new(template, Direction::LeftToRight, MatchMode::Analysis).with_limits(self.limits);
        let mut out = Vec::new();
        for m in matcher.is_match(&word.shape, NodeId::LEFT_MARGIN, &VariableBindings::new()) {
            if !Self::copies_agree(sub, &word.shape, &m) {
                continue;
            }
            let mut candidate = word.clone();
            candidate.shape = Self::rebuild(sub, &word.shape, &m);
            candidate.head = head.clone();
            candidate.foot = foot.clone();
            if !sub.required_pos.is_empty() {
                candidate.pos = sub.required_pos.clone();
            } else if sub.output_pos.is_some() {
                candidate.pos.clear();
            }
            candidate.mpr.retain(|f| !sub.output_mpr.contains(f));
            candidate.mpr.extend(sub.required_mpr.iter().cloned());
            candidate.record_unapplication(&self.name);
            out.push(candidate);
        }
        out
    }

    /// Every copy of a reduplicated partition must cover the same material.
    fn copies_agree(sub: &AffixSubrule, shape: &Shape, m: &PatternMatch) -> bool {
        (0..sub.lhs.len()).all(|i| {
            let copies: Vec<Vec<NodeId>> = sub
                .rhs
                .iter()
                .enumerate()
                .filter(|(_, a)| matches!(a, OutputAction::Copy(j) if *j == i))
                .map(|(k, _)| group_nodes(shape, m, &action_name(k)))
                .collect();
            copies.windows(2).all(|pair| {
                pair[0].len() == pair[1].len()
                    && pair[0].iter().zip(&pair[1]).all(|(a, b)| shape.node(*a).fs() == shape.node(*b).fs())
            })
        })
    }

    fn rebuild(sub: &AffixSubrule, shape: &Shape, m: &PatternMatch) -> Shape {
        let mut out = Shape::new();
        for (i, partition) in sub.lhs.iter().enumerate() {
            let source = sub.rhs.iter().enumerate().find_map(|(k, action)| match action {
                OutputAction::Copy(j) if *j == i => Some((k, None)),
                OutputAction::Modify(j, fs) if *j == i => Some((k, Some(fs))),
                _ => None,
            });

            let Some((k, modify)) = source else {
                // Deleted by the rule: reconstruct as optional material.
                for c in partition.constraints() {
                    let kind = match c.kind {
                        ConstraintKind::Segment => NodeKind::Segment,
                        ConstraintKind::Boundary => NodeKind::Boundary,
                        ConstraintKind::Anchor => continue,
                    };
                    out.push(kind, Annotation::new(c.fs.instantiate(&m.bindings)).optional());
                }
                continue;
            };

            let nodes = group_nodes(shape, m, &action_name(k));
            let constraints: Vec<&Constraint> =
                partition.constraints().into_iter().filter(|c| c.kind == ConstraintKind::Segment).collect();
            let aligned = constraints.len() == nodes.len();
            for (n, id) in nodes.into_iter().enumerate() {
                let node = shape.node(id);
                let mut annotation = node.annotation().clone();
                annotation.flags.remove(NodeFlags::SEARCHED);
                annotation.morph = None;
                if let Some(fs) = modify {
                    let reset = annotation.fs.without(fs);
                    annotation.fs = match aligned.then(|| constraints[n]) {
                        Some(c) => reset.priority_union(&only(&c.fs, fs), &m.bindings),
                        None => reset,
                    };
                }
                out.push(node.kind(), annotation);
            }
        }
        out
    }
}

impl AnalysisRule for AffixAnalysis {
    fn name(&self) -> &str {
        &self.name
    }

    fn unapply(&self, word: &WordAnalysis, env: &mut RuleEnv<'_>) -> Vec<WordAnalysis> {
        let mut candidates = Vec::new();
        for (sub, template) in &self.subrules {
            for candidate in self.unapply_subrule(sub, template, word) {
                if env.trace.enabled() {
                    env.trace.record(TraceEvent {
                        rule: self.name.clone(),
                        direction: TraceDirection::Analysis,
                        input: word.shape.clone(),
                        output: Some(candidate.shape.clone()),
                        allomorph: Some(sub.id.clone()),
                    });
                }
                candidates.push(candidate);
            }
        }
        let before = candidates.len();
        let kept = dedup_keep_longer(candidates);
        debug!(rule = %self.name, candidates = before, kept = kept.len(), "affix unapplied");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NoTrace, TraceLog};
    use crate::pattern::Quantifier;
    use crate::rule::NoBlocking;
    use crate::rules::demo;
    use crate::test_support::{fs, system, word};

    fn stem() -> Pattern {
        Pattern::new(vec![PatternNode::repeat(None, vec![PatternNode::segment(FeatureStruct::new())], Quantifier::STAR)]).unwrap()
    }

    fn segment(symbol: &str) -> FeatureStruct {
        demo::inventory().segment(symbol).cloned().unwrap()
    }

    fn suffix(id: &str, text: &str) -> AffixSubrule {
        let segs = text.chars().map(|c| segment(&c.to_string())).collect();
        AffixSubrule::new(id, vec![stem()], vec![OutputAction::Copy(0), OutputAction::Insert(segs)])
    }

    fn synthesize(rule: &AffixRule, input: WordSynthesis) -> Vec<WordSynthesis> {
        let compiled = rule.compile_synthesis(&Options::default()).unwrap();
        let mut trace = NoTrace;
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        compiled.apply(&input, &mut env)
    }

    fn analyze(rule: &AffixRule, input: WordAnalysis) -> Vec<WordAnalysis> {
        let compiled = rule.compile_analysis(&Options::default()).unwrap();
        let mut trace = NoTrace;
        let mut env = RuleEnv::new(&mut trace, &NoBlocking);
        compiled.unapply(&input, &mut env)
    }

    fn render(shape: &Shape) -> String {
        demo::inventory().render(shape)
    }

    #[test]
    fn suffix_applies_and_tags_inserted_nodes() {
        let rule = AffixRule::new("plural").subrule(suffix("pl", "s"));
        let out = synthesize(&rule, WordSynthesis::new(word("tak"), "noun"));
        assert_eq!(out.len(), 1);
        assert_eq!(render(&out[0].shape), "taks");
        assert_eq!(out[0].applications_of("plural"), 1);
        assert_eq!(out[0].rule_sequence(), ["plural"]);
        let morphs: Vec<_> = out[0].shape.iter(Direction::LeftToRight).map(|id| out[0].shape.node(id).annotation().morph).collect();
        assert_eq!(morphs, [None, None, None, Some(0)]);
    }

    #[test]
    fn suffix_unapplies() {
        let rule = AffixRule::new("plural").subrule(suffix("pl", "s"));
        let out = analyze(&rule, WordAnalysis::new(word("taks")));
        assert_eq!(out.len(), 1);
        assert_eq!(render(&out[0].shape), "tak");
        assert_eq!(out[0].rules_unapplied, ["plural"]);
        assert!(analyze(&rule, WordAnalysis::new(word("tak"))).is_empty());
    }

    #[test]
    fn mpr_gate_blocks_apply_and_unapply() {
        let rule = AffixRule::new("gated").subrule(suffix("g", "i").requires_mpr("F1").excludes_mpr("F2"));

        assert!(synthesize(&rule, WordSynthesis::new(word("tak"), "noun")).is_empty());
        assert!(synthesize(&rule, WordSynthesis::new(word("tak"), "noun").with_mpr("F1").with_mpr("F2")).is_empty());
        let ok = synthesize(&rule, WordSynthesis::new(word("tak"), "noun").with_mpr("F1"));
        assert_eq!(ok.len(), 1);
        assert_eq!(render(&ok[0].shape), "taki");

        assert!(analyze(&rule, WordAnalysis::new(word("taki")).with_mpr("F2")).is_empty());
        let back = analyze(&rule, WordAnalysis::new(word("taki")));
        assert_eq!(back.len(), 1);
        assert!(back[0].mpr.contains("F1"));
    }

    #[test]
    fn pos_and_application_caps_gate_synthesis() {
        let rule = AffixRule::new("plural").subrule(suffix("pl", "s").requires_pos("noun").outputs_pos("noun"));
        assert!(synthesize(&rule, WordSynthesis::new(word("tak"), "verb")).is_empty());

        let once = synthesize(&rule, WordSynthesis::new(word("tak"), "noun"));
        assert_eq!(once.len(), 1);
        assert!(synthesize(&rule, once[0].clone()).is_empty());
    }

    #[test]
    fn head_features_gate_and_are_written() {
        let sys = system();
        let rule = AffixRule::new("plural")
            .subrule(suffix("pl", "s").requires_head(fs(&sys, "[num:sg]")).outputs_head(fs(&sys, "[num:pl]")).obligatory("case"));

        let plural = WordSynthesis::new(word("tak"), "noun").with_head(fs(&sys, "[num:pl case:nom]"));
        assert!(synthesize(&rule, plural).is_empty());

        let caseless = WordSynthesis::new(word("tak"), "noun").with_head(fs(&sys, "[num:sg]"));
        assert!(synthesize(&rule, caseless).is_empty());

        let singular = WordSynthesis::new(word("tak"), "noun").with_head(fs(&sys, "[num:sg case:nom]"));
        let out = synthesize(&rule, singular);
        assert_eq!(out[0].head, fs(&sys, "[num:pl case:nom]"));

        let back = analyze(&rule, WordAnalysis::new(word("taks")));
        assert_eq!(back[0].head, fs(&sys, "[num:sg]"));
    }

    #[test]
    fn subrule_iteration_stops_at_first_environment_free_subrule() {
        let sys = system();
        let after_vowel = Environment::new(Pattern::segments([fs(&sys, "[type:vowel]")]), Pattern::empty());
        let rule = AffixRule::new("plural")
            .subrule(suffix("s", "s").environment(after_vowel))
            .subrule(suffix("es", "es"))
            .subrule(suffix("never", "i"));

        let out = synthesize(&rule, WordSynthesis::new(word("tak"), "noun"));
        let forms: Vec<_> = out.iter().map(|w| render(&w.shape)).collect();
        assert_eq!(forms, ["taks", "takes"]);
        assert_eq!(out[0].allomorphs[0].subrule, 0);
        assert_eq!(out[1].allomorphs[0].subrule, 1);

        let plain = AffixRule::new("plain").subrule(suffix("first", "s")).subrule(suffix("second", "i"));
        let out = synthesize(&plain, WordSynthesis::new(word("tak"), "noun"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].allomorphs[0].id, "first");
    }

    #[test]
    fn environments_are_checked_on_the_surface() {
        let sys = system();
        let env = Environment::new(Pattern::segments([fs(&sys, "[type:vowel]")]), Pattern::empty());
        let shape = word("tas");
        let ids: Vec<_> = shape.iter(Direction::LeftToRight).collect();
        assert!(env.is_satisfied(&shape, ids[2], ids[2]));
        assert!(!env.is_satisfied(&shape, ids[1], ids[1]));
        assert!(Environment::new(Pattern::empty(), Pattern::empty()).is_satisfied(&shape, ids[0], ids[0]));
    }

    #[test]
    fn deleted_partitions_return_as_optional_nodes() {
        let sys = system();
        let truncation = AffixSubrule::new(
            "trunc",
            vec![stem(), Pattern::segments([fs(&sys, "[type:vowel]")])],
            vec![OutputAction::Copy(0)],
        );
        let rule = AffixRule::new("truncate").subrule(truncation);
        let out = synthesize(&rule, WordSynthesis::new(word("taka"), "noun"));
        assert_eq!(render(&out[0].shape), "tak");

        let back = analyze(&rule, WordAnalysis::new(word("tak")));
        assert_eq!(back.len(), 1);
        assert_eq!(render(&back[0].shape), "tak({a|e|i|o|u})");
    }

    #[test]
    fn modified_partitions_reset_the_modified_features() {
        let sys = system();
        let rounding = AffixSubrule::new(
            "round",
            vec![stem(), Pattern::segments([fs(&sys, "[type:vowel]")]), Pattern::segments([fs(&sys, "[type:consonant]")])],
            vec![OutputAction::Copy(0), OutputAction::Modify(1, fs(&sys, "[height:mid round:+]")), OutputAction::Copy(2)],
        );
        let rule = AffixRule::new("ablaut").subrule(rounding);
        let out = synthesize(&rule, WordSynthesis::new(word("tak"), "noun"));
        assert_eq!(render(&out[0].shape), "tok");

        let back = analyze(&rule, WordAnalysis::new(word("tok")));
        assert_eq!(back.len(), 1);
        let vowel = back[0].shape.iter(Direction::LeftToRight).nth(1).unwrap();
        let fs = back[0].shape.node(vowel).fs();
        assert!(!fs.contains("height"));
        assert!(!fs.contains("round"));
        assert_eq!(render(&back[0].shape), "t{a|o|u}k");
    }

    #[test]
    fn reduplication_copies_must_agree() {
        let rule = AffixRule::new("redup").subrule(AffixSubrule::new("rd", vec![stem()], vec![OutputAction::Copy(0), OutputAction::Copy(0)]));
        let out = synthesize(&rule, WordSynthesis::new(word("ka"), "noun"));
        assert_eq!(render(&out[0].shape), "kaka");

        let back = analyze(&rule, WordAnalysis::new(word("kaka")));
        assert_eq!(back.len(), 1);
        assert_eq!(render(&back[0].shape), "ka");
        assert!(analyze(&rule, WordAnalysis::new(word("kat"))).is_empty());
    }

    #[test]
    fn blocker_can_veto_or_replace() {
        struct Irregular;
        impl Blocker for Irregular {
            fn check_blocking(&self, _rule: &str, candidate: WordSynthesis) -> Option<WordSynthesis> {
                if demo::inventory().render(&candidate.shape) == "paks" {
                    return None;
                }
                Some(candidate)
            }
        }
        let rule = AffixRule::new("plural").subrule(suffix("pl", "s"));
        let compiled = rule.compile_synthesis(&Options::default()).unwrap();
        let mut trace = TraceLog::default();
        let mut env = RuleEnv::new(&mut trace, &Irregular);
        assert!(compiled.apply(&WordSynthesis::new(word("pak"), "noun"), &mut env).is_empty());
        assert_eq!(compiled.apply(&WordSynthesis::new(word("tak"), "noun"), &mut env).len(), 1);
        assert_eq!(trace.events.len(), 1);
    }

    #[test]
    fn out_of_range_partitions_are_rejected() {
        let rule = AffixRule::new("bad").subrule(AffixSubrule::new("x", vec![stem()], vec![OutputAction::Copy(1)]));
        assert_eq!(
            rule.compile_synthesis(&Options::default()).err(),
            Some(RuleError::PartitionOutOfRange { rule: "bad".into(), index: 1, count: 1 })
        );
        assert!(matches!(AffixRule::new("none").compile_analysis(&Options::default()), Err(RuleError::NoSubrules(_))));
    }
}
