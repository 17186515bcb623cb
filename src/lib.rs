//! Bidirectional rule engine for computational morphology and phonology.
//!
//! Words are [`Shape`]s: linked sequences of segments, each annotated with a
//! [`FeatureStruct`]. Rules match [`Pattern`]s against shapes and rewrite
//! them. Every rule runs in two directions:
//!
//! ```text
//!            synthesize (apply rules in order)
//! underlying ─────────────────────────────────▶ surface
//!            ◀─────────────────────────────────
//!            analyze (unapply rules in reverse)
//! ```
//!
//! Analysis is not a function: a surface form can have several sources, so it
//! returns every candidate it cannot rule out, the unanalyzed input included.
//!
//! ## Building a grammar
//!
//! Features live in a [`FeatureSystem`]; feature structures are most easily
//! written in the compact notation read by [`FeatureSystem::parse`]. Rules are
//! [`RewriteRule`]s, [`MetathesisRule`]s and [`AffixRule`]s collected into a
//! [`Grammar`] and compiled once into [`CompiledRules`].
//!
//! See [`rules::demo`] for a complete small grammar.

#[macro_use]
mod macros;
mod api;
pub mod engine;
pub mod error;
pub mod feature;
pub mod notation;
pub mod pattern;
pub mod rule;
pub mod rules;
pub mod shape;

#[cfg(test)]
mod test_support;

pub use api::{
    AnalysisResult, AnalysisVerbose, Grammar, Options, RunDetails, SynthesisResult, SynthesisVerbose, analyze,
    analyze_verbose_with, analyze_with, synthesize, synthesize_verbose_with, synthesize_with,
};
pub use engine::{
    AffixRule, AffixSubrule, Application, CompiledRules, Environment, MetathesisRule, NoTrace, OutputAction,
    RewriteRule, RewriteSubrule, TraceEvent, TraceLog, TraceSink, WordAnalysis, WordSynthesis,
};
pub use error::{Error, NotationError, RuleError};
pub use feature::{Feature, FeatureStruct, FeatureSystem, FeatureValue, Variable, VariableBindings};
pub use notation::Inventory;
pub use pattern::{MatchLimits, MatchMode, Pattern, PatternNode, Quantifier};
pub use rule::{Blocker, NoBlocking, Rule};
pub use shape::{Direction, Shape};
