//! Backtracking pattern matcher.
//!
//! Executes a compiled [`Pattern`] program over a [`Shape`], starting at a
//! given node and walking in one direction. The search is a stack-based DFS:
//! every choice point (a `Split`, or an `OPTIONAL` node that may be skipped)
//! pushes a second thread, and each thread owns its own copy of the variable
//! bindings, so abandoning a branch never has to undo anything.
//!
//! ```text
//! shape:    [<] [k] [a] [t] [>]
//! pattern:  C  V
//!                 start ─┐
//! thread 0:  pc=0 pos=k  │  Match(C) ok  -> pc=1 pos=a
//! thread 0:  pc=1 pos=a  │  Match(V) ok  -> pc=2 pos=t   (complete)
//! ```
//!
//! Results come out in preference order: the first element of a `Split` is
//! explored before the second, and taking an optional node before skipping it.

use crate::feature::VariableBindings;
use crate::pattern::{Constraint, ConstraintKind, Inst, MatchLimits, MatchMode, Pattern, PatternMatch, Span};
use crate::shape::{Direction, NodeId, NodeKind, Shape};
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// One search thread. `route` holds the consumed nodes in traversal order.
///
/// ```text
/// pattern: [leftEnv: C] [target0: V]
/// route:   [k]                  after Match(C)
/// open:    [("target0", 1)]     after Open(target0): capture starts at route[1]
/// ```
#[derive(Debug, Clone)]
struct Thread {
    pc: usize,
    position: Option<NodeId>,
    bindings: VariableBindings,
    route: Vec<NodeId>,
    open: Vec<(String, usize)>,
    groups: BTreeMap<String, Span>,
}

/// A pattern bound to a direction and a mode.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'p> {
    pattern: &'p Pattern,
    direction: Direction,
    mode: MatchMode,
    limits: MatchLimits,
}

impl<'p> Matcher<'p> {
    pub fn new(pattern: &'p Pattern, direction: Direction, mode: MatchMode) -> Self {
        Self { pattern, direction, mode, limits: MatchLimits::default() }
    }

    pub fn with_limits(mut self, limits: MatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Every way the pattern matches beginning exactly at `start`.
    pub fn is_match(&self, shape: &Shape, start: NodeId, bindings: &VariableBindings) -> Vec<PatternMatch> {
        self.run(shape, start, bindings, false)
    }

    /// The preferred match beginning at `start`.
    pub fn first_at(&self, shape: &Shape, start: NodeId, bindings: &VariableBindings) -> Option<PatternMatch> {
        self.run(shape, start, bindings, true).into_iter().next()
    }

    /// Try every start position in traversal order, margins included.
    ///
    /// Non-exhaustive scans return only the preferred match at the first
    /// position that has one.
    pub fn scan(&self, shape: &Shape, exhaustive: bool) -> Vec<PatternMatch> {
        let mut out = Vec::new();
        let mut cursor = Some(shape.begin(self.direction));
        let bindings = VariableBindings::new();
        while let Some(start) = cursor {
            if exhaustive {
                out.extend(self.is_match(shape, start, &bindings));
            } else if let Some(m) = self.first_at(shape, start, &bindings) {
                out.push(m);
                break;
            }
            cursor = shape.next(start, self.direction);
        }
        out
    }

    fn run(&self, shape: &Shape, start: NodeId, bindings: &VariableBindings, first_only: bool) -> Vec<PatternMatch> {
        let insts = &self.pattern.program(self.direction).insts;
        let mut results = Vec::new();
        let mut stack = vec![Thread {
            pc: 0,
            position: Some(start),
            bindings: bindings.clone(),
            route: Vec::new(),
            open: Vec::new(),
            groups: BTreeMap::new(),
        }];
        let mut steps = 0usize;

        while let Some(mut t) = stack.pop() {
            steps += 1;
            if steps > self.limits.max_steps {
                warn!(max_steps = self.limits.max_steps, found = results.len(), "match step budget exhausted");
                break;
            }

            let Some(inst) = insts.get(t.pc) else {
                results.push(self.finish(t));
                if first_only {
                    break;
                }
                continue;
            };

            match inst {
                Inst::Match(constraint) => {
                    let Some(pos) = t.position else { continue };
                    let node = shape.node(pos);
                    let next = shape.next(pos, self.direction);

                    // Pushed first so that consuming the node is preferred.
                    if node.kind() != NodeKind::Margin && node.annotation().is_optional() {
                        let mut skip = t.clone();
                        skip.position = next;
                        stack.push(skip);
                    }

                    if self.accepts(constraint, shape, pos, &mut t.bindings) {
                        t.route.push(pos);
                        t.position = next;
                        t.pc += 1;
                        stack.push(t);
                    }
                }
                Inst::Open(name) => {
                    t.open.push((name.clone(), t.route.len()));
                    t.pc += 1;
                    stack.push(t);
                }
                Inst::Close => {
                    if let Some((name, from)) = t.open.pop() {
                        if let Some(span) = self.span_of(&t.route[from..]) {
                            t.groups.insert(name, span);
                        }
                    }
                    t.pc += 1;
                    stack.push(t);
                }
                Inst::Split(preferred, other) => {
                    let mut alt = t.clone();
                    alt.pc = *other;
                    stack.push(alt);
                    t.pc = *preferred;
                    stack.push(t);
                }
                Inst::Jump(to) => {
                    t.pc = *to;
                    stack.push(t);
                }
            }
        }

        trace!(start = ?start, direction = ?self.direction, steps, matches = results.len(), "match attempt");
        results
    }

    fn accepts(&self, c: &Constraint, shape: &Shape, id: NodeId, bindings: &mut VariableBindings) -> bool {
        let node = shape.node(id);
        let kind_ok = matches!(
            (c.kind, node.kind()),
            (ConstraintKind::Segment, NodeKind::Segment)
                | (ConstraintKind::Boundary, NodeKind::Boundary)
                | (ConstraintKind::Anchor, NodeKind::Margin)
        );
        if !kind_ok {
            return false;
        }
        if self.mode == MatchMode::Analysis && c.not_searched && node.annotation().is_searched() {
            return false;
        }
        c.fs.unifiable(node.fs(), bindings)
    }

    /// Normalize a traversal-order slice of the route into a left-to-right span.
    fn span_of(&self, route: &[NodeId]) -> Option<Span> {
        let (first, last) = (*route.first()?, *route.last()?);
        Some(match self.direction {
            Direction::LeftToRight => Span { start: first, end: last },
            Direction::RightToLeft => Span { start: last, end: first },
        })
    }

    fn finish(&self, t: Thread) -> PatternMatch {
        PatternMatch { span: self.span_of(&t.route), groups: t.groups, bindings: t.bindings }
    }
}
