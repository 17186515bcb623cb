//! Patterns: frozen trees of constraints and named groups.
//!
//! A [`Pattern`] is built once from [`PatternNode`]s and never changes. At
//! construction it is validated and compiled into two small instruction
//! programs, one per traversal direction, which the backtracking matcher in
//! `engine/matcher.rs` executes:
//!
//! ```text
//! [leftEnv: C] [target0: V] [rightEnv: C*]
//!
//! left-to-right:  Open(leftEnv) Match(C) Close  Open(target0) Match(V) Close
//!                 Open(rightEnv) L: Split(L+1, X) Match(C) Jump(L) X: Close
//! right-to-left:  the same tree, children visited from the right end
//! ```
//!
//! Patterns hold no per-match state, so one compiled rule can be matched
//! against any number of shapes.

use crate::error::{Result, RuleError};
use crate::feature::{FeatureStruct, VariableBindings};
use crate::shape::{Direction, NodeId};
use std::collections::BTreeMap;

/// Which kind of node a constraint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Segment,
    Boundary,
    /// A word margin.
    Anchor,
}

/// A test against one shape node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub fs: FeatureStruct,
    /// In analysis mode, refuse nodes already marked `SEARCHED`.
    pub not_searched: bool,
}

impl Constraint {
    pub fn segment(fs: FeatureStruct) -> Self {
        Self { kind: ConstraintKind::Segment, fs, not_searched: false }
    }

    pub fn boundary(fs: FeatureStruct) -> Self {
        Self { kind: ConstraintKind::Boundary, fs, not_searched: false }
    }

    pub fn anchor() -> Self {
        Self { kind: ConstraintKind::Anchor, fs: FeatureStruct::new(), not_searched: false }
    }

    pub fn not_searched(mut self) -> Self {
        self.not_searched = true;
        self
    }
}

/// Repetition bounds for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub min: usize,
    pub max: Option<usize>,
}

impl Quantifier {
    pub const ONE: Quantifier = Quantifier { min: 1, max: Some(1) };
    pub const OPTIONAL: Quantifier = Quantifier { min: 0, max: Some(1) };
    pub const STAR: Quantifier = Quantifier { min: 0, max: None };
    pub const PLUS: Quantifier = Quantifier { min: 1, max: None };

    pub fn new(min: usize, max: Option<usize>) -> Self {
        debug_assert!(max.is_none_or(|max| max >= min), "quantifier max below min");
        Self { min, max }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Capture name; unnamed groups only structure repetition.
    pub name: Option<String>,
    pub children: Vec<PatternNode>,
    pub quantifier: Quantifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternNode {
    Constraint(Constraint),
    Group(Group),
}

impl PatternNode {
    pub fn segment(fs: FeatureStruct) -> Self {
        PatternNode::Constraint(Constraint::segment(fs))
    }

    pub fn anchor() -> Self {
        PatternNode::Constraint(Constraint::anchor())
    }

    pub fn group(name: impl Into<String>, children: Vec<PatternNode>) -> Self {
        PatternNode::Group(Group { name: Some(name.into()), children, quantifier: Quantifier::ONE })
    }

    pub fn repeat(name: Option<&str>, children: Vec<PatternNode>, quantifier: Quantifier) -> Self {
        PatternNode::Group(Group { name: name.map(str::to_string), children, quantifier })
    }

    fn can_be_empty(&self) -> bool {
        match self {
            PatternNode::Constraint(_) => false,
            PatternNode::Group(g) => g.quantifier.min == 0 || g.children.iter().all(PatternNode::can_be_empty),
        }
    }

    fn validate(&self) -> Result<()> {
        if let PatternNode::Group(g) = self {
            if g.quantifier.max.is_none() && g.children.iter().all(PatternNode::can_be_empty) {
                return Err(RuleError::EmptyLoop(g.name.clone().unwrap_or_else(|| "<anonymous>".to_string())));
            }
            for child in &g.children {
                child.validate()?;
            }
        }
        Ok(())
    }

    fn collect_constraints<'a>(&'a self, out: &mut Vec<&'a Constraint>) {
        match self {
            PatternNode::Constraint(c) => out.push(c),
            PatternNode::Group(g) => g.children.iter().for_each(|c| c.collect_constraints(out)),
        }
    }
}

// --- Compiled programs ---------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) enum Inst {
    Match(Constraint),
    Open(String),
    Close,
    /// Try the first target, backtrack into the second.
    Split(usize, usize),
    Jump(usize),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Program {
    pub(crate) insts: Vec<Inst>,
}

impl Program {
    fn compile(nodes: &[PatternNode], reverse: bool) -> Self {
        let mut insts = Vec::new();
        emit_seq(nodes, reverse, &mut insts);
        Program { insts }
    }
}

fn emit_seq(nodes: &[PatternNode], reverse: bool, out: &mut Vec<Inst>) {
    if reverse {
        nodes.iter().rev().for_each(|n| emit(n, reverse, out));
    } else {
        nodes.iter().for_each(|n| emit(n, reverse, out));
    }
}

fn emit(node: &PatternNode, reverse: bool, out: &mut Vec<Inst>) {
    let g = match node {
        PatternNode::Constraint(c) => {
            out.push(Inst::Match(c.clone()));
            return;
        }
        PatternNode::Group(g) => g,
    };

    if let Some(name) = &g.name {
        out.push(Inst::Open(name.clone()));
    }
    for _ in 0..g.quantifier.min {
        emit_seq(&g.children, reverse, out);
    }
    match g.quantifier.max {
        Some(max) => {
            // Skipping one optional copy skips all later ones too.
            let mut splits = Vec::new();
            for _ in g.quantifier.min..max {
                splits.push(out.len());
                out.push(Inst::Split(0, 0));
                emit_seq(&g.children, reverse, out);
            }
            let exit = out.len();
            for at in splits {
                out[at] = Inst::Split(at + 1, exit);
            }
        }
        None => {
            let at = out.len();
            out.push(Inst::Split(0, 0));
            emit_seq(&g.children, reverse, out);
            out.push(Inst::Jump(at));
            let exit = out.len();
            out[at] = Inst::Split(at + 1, exit);
        }
    }
    if let Some(name) = &g.name {
        out.push(Inst::Close);
    }
}

/// A validated, compiled, immutable pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    nodes: Vec<PatternNode>,
    ltr: Program,
    rtl: Program,
}

impl Pattern {
    pub fn new(nodes: Vec<PatternNode>) -> Result<Self> {
        for node in &nodes {
            node.validate()?;
        }
        let ltr = Program::compile(&nodes, false);
        let rtl = Program::compile(&nodes, true);
        Ok(Pattern { nodes, ltr, rtl })
    }

    /// A pattern that matches the empty sequence.
    pub fn empty() -> Self {
        Pattern { nodes: Vec::new(), ltr: Program::default(), rtl: Program::default() }
    }

    /// A plain sequence of segment constraints.
    pub fn segments(segments: impl IntoIterator<Item = FeatureStruct>) -> Self {
        let nodes: Vec<PatternNode> = segments.into_iter().map(PatternNode::segment).collect();
        // Plain constraint sequences cannot loop.
        let ltr = Program::compile(&nodes, false);
        let rtl = Program::compile(&nodes, true);
        Pattern { nodes, ltr, rtl }
    }

    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every constraint in left-to-right order, flattening groups.
    pub fn constraints(&self) -> Vec<&Constraint> {
        let mut out = Vec::new();
        self.nodes.iter().for_each(|n| n.collect_constraints(&mut out));
        out
    }

    pub(crate) fn program(&self, dir: Direction) -> &Program {
        match dir {
            Direction::LeftToRight => &self.ltr,
            Direction::RightToLeft => &self.rtl,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

// --- Match results -------------------------------------------------------------

/// Which direction of rule execution a match serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    Synthesis,
    /// Honors `not_searched` constraints.
    Analysis,
}

/// Bound on the work one match attempt may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchLimits {
    /// Maximum number of search states explored per start position.
    pub max_steps: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self { max_steps: 100_000 }
    }
}

/// A consumed span, always stored left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: NodeId,
    pub end: NodeId,
}

/// One successful walk of a pattern over a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    /// Everything consumed; `None` when the pattern matched empty.
    pub span: Option<Span>,
    pub groups: BTreeMap<String, Span>,
    pub bindings: VariableBindings,
}

impl PatternMatch {
    pub fn group(&self, name: &str) -> Option<Span> {
        self.groups.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fs, system};

    #[test]
    fn unbounded_group_that_can_match_empty_is_rejected() {
        let inner = PatternNode::repeat(None, vec![], Quantifier::OPTIONAL);
        let looping = PatternNode::repeat(Some("loop"), vec![inner], Quantifier::STAR);
        assert_eq!(Pattern::new(vec![looping]).unwrap_err(), RuleError::EmptyLoop("loop".into()));
    }

    #[test]
    fn programs_are_mirrored_per_direction() {
        let sys = system();
        let pattern = Pattern::new(vec![
            PatternNode::group("a", vec![PatternNode::segment(fs(&sys, "[type:consonant]"))]),
            PatternNode::segment(fs(&sys, "[type:vowel]")),
        ])
        .unwrap();

        let ltr = &pattern.program(Direction::LeftToRight).insts;
        let rtl = &pattern.program(Direction::RightToLeft).insts;
        assert!(matches!(&ltr[0], Inst::Open(name) if name == "a"));
        assert!(matches!(ltr[2], Inst::Close));
        assert!(matches!(&ltr[3], Inst::Match(c) if c.fs == fs(&sys, "[type:vowel]")));
        assert!(matches!(&rtl[0], Inst::Match(c) if c.fs == fs(&sys, "[type:vowel]")));
        assert!(matches!(&rtl[1], Inst::Open(name) if name == "a"));
    }

    #[test]
    fn bounded_quantifier_unrolls_optional_copies() {
        let sys = system();
        let c = PatternNode::segment(fs(&sys, "[type:consonant]"));
        let pattern = Pattern::new(vec![PatternNode::repeat(None, vec![c], Quantifier::new(1, Some(3)))]).unwrap();
        let insts = &pattern.program(Direction::LeftToRight).insts;
        // Match, Split, Match, Split, Match
        assert_eq!(insts.len(), 5);
        assert!(matches!(insts[1], Inst::Split(2, 5)));
        assert!(matches!(insts[3], Inst::Split(4, 5)));
    }

    #[test]
    fn plain_segment_sequences_compile_in_both_directions() {
        let sys = system();
        let pattern = Pattern::segments([fs(&sys, "[type:consonant]"), fs(&sys, "[type:vowel]")]);
        assert_eq!(pattern.nodes().len(), 2);
        let ltr = &pattern.program(Direction::LeftToRight).insts;
        let rtl = &pattern.program(Direction::RightToLeft).insts;
        assert!(matches!(&ltr[0], Inst::Match(c) if c.fs == fs(&sys, "[type:consonant]")));
        assert!(matches!(&rtl[0], Inst::Match(c) if c.fs == fs(&sys, "[type:vowel]")));
        assert!(Pattern::segments(Vec::<FeatureStruct>::new()).is_empty());
    }

    #[test]
    fn constraints_flatten_groups_in_order() {
        let sys = system();
        let pattern = Pattern::new(vec![
            PatternNode::anchor(),
            PatternNode::group("x", vec![PatternNode::segment(fs(&sys, "[voice:+]")), PatternNode::segment(fs(&sys, "[voice:-]"))]),
        ])
        .unwrap();
        let kinds: Vec<_> = pattern.constraints().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, [ConstraintKind::Anchor, ConstraintKind::Segment, ConstraintKind::Segment]);
    }
}
