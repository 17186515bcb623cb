//! Derivation run metrics.
//!
//! This module defines a small set of structs used to observe and debug what a
//! derivation did and how long it took.
//!
//! The intended usage is:
//!
//! - `Derivation::synthesize` / `Derivation::analyze` always fill a
//!   [`RunMetrics`]; the cost is one `Instant` per rule.
//! - The verbose API (`synthesize_verbose_with`, `analyze_verbose_with`)
//!   surfaces them together with the trace for the CLI report.
//!
//! ## Design notes
//!
//! - Rule metrics are recorded in execution order, so in analysis they appear
//!   in reverse grammar order.
//! - A rule that was gated out still gets an entry, with `attempted == 0`.

use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for the run.
    pub total: Duration,
    /// One entry per rule, in execution order.
    pub rules: Vec<RuleMetrics>,
    /// Time spent in surface resolution (synthesis only).
    pub resolve: Duration,
}

impl RunMetrics {
    /// Time spent inside rules.
    pub fn rules_total(&self) -> Duration {
        self.rules.iter().map(|r| r.duration).sum()
    }
}

/// Timing and candidate counts for one rule over all live candidates.
#[derive(Debug, Default, Clone)]
pub struct RuleMetrics {
    pub rule: String,
    /// Elapsed time for the rule.
    pub duration: Duration,
    /// Candidates the rule was tried on (after gating).
    pub attempted: usize,
    /// Candidates on which the rule applied or unapplied.
    pub applied: usize,
    /// Live candidates after the rule.
    pub candidates: usize,
}

/// Derivation output bundled with timing information.
#[derive(Debug, Clone)]
pub struct RunResult<W> {
    pub words: Vec<W>,
    pub metrics: RunMetrics,
}
