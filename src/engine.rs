//! Rule application engine.
//!
//! This module is the *public entry point* for running rules. The engine is
//! split into focused submodules under `src/engine/` while keeping public paths
//! flat (for example `crate::engine::RewriteRule` and
//! `crate::engine::CompiledRules`).
//!
//! ## How the parts work together
//!
//! ```text
//! Grammar (rules) ──┐
//!                   │  CompiledRules::new              (compiled_rules.rs)
//!                   └───────────────┬────────────────
//!                                   │  per rule: SynthesisRule + AnalysisRule
//!                                   │  built by rewrite.rs / metathesis.rs / affix.rs
//!                                   v
//! word ───────────────────▶ Derivation                  (derivation.rs)
//!                             - gate affix rules         (trigger.rs)
//!                             - match patterns           (matcher.rs)
//!                             - apply / unapply rules
//!                             - dedup analyses           (dedup.rs)
//!                                   │
//!                                   v
//!                           resolve_surface              (resolve.rs)
//!                             - allomorph environments
//!                             - disjunctive selection
//!                                   │
//!                                   v
//!                      Vec<WordSynthesis> / Vec<WordAnalysis>
//! ```
//!
//! ## Responsibilities by module
//!
//! - `matcher.rs`: backtracking matcher executing compiled pattern programs in
//!   either direction.
//! - `rewrite.rs`: feature-changing rules (`lhs -> rhs / left _ right`).
//! - `metathesis.rs`: reordering of named groups.
//! - `affix.rs`: affixal subrules (partitions, output actions, allomorphs).
//! - `word.rs`: the word records rules consume and produce.
//! - `trace.rs`: the trace sink rules report to.
//! - `compiled_rules.rs`: compiles a grammar once and indexes it.
//! - `trigger.rs`: cheap MPR/part-of-speech gates for affix rules.
//! - `derivation.rs`: runs a compiled grammar forwards or backwards.
//! - `dedup.rs`: the keep-longer policy for duplicate analyses.
//! - `resolve.rs`: surface environment checks and allomorph selection.
//! - `metrics.rs`: timing and candidate counts for runs.
//!
//! ## Debugging
//!
//! Every module logs through `tracing`. The CLI maps `MORPHON_DEBUG_RULES=1`
//! to `morphon=trace`.

#[path = "engine/affix.rs"]
mod affix;
#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/dedup.rs"]
mod dedup;
#[path = "engine/derivation.rs"]
mod derivation;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metathesis.rs"]
mod metathesis;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/rewrite.rs"]
mod rewrite;
#[path = "engine/trace.rs"]
mod trace;
#[path = "engine/trigger.rs"]
mod trigger;
#[path = "engine/word.rs"]
mod word;

pub use affix::{AffixRule, AffixSubrule, Environment, OutputAction};
pub use compiled_rules::{CompiledRule, CompiledRules, RuleIndex, RuleMeta, RuleTraits};
pub use derivation::Derivation;
pub use matcher::Matcher;
pub use metathesis::MetathesisRule;
pub use metrics::{RuleMetrics, RunMetrics, RunResult};
pub use rewrite::{Application, ReapplyType, RewriteRule, RewriteSubrule};
pub use trace::{NoTrace, TraceDirection, TraceEvent, TraceLog, TraceSink};
pub use trigger::TriggerInfo;
pub use word::{AppliedAllomorph, WordAnalysis, WordSynthesis};
