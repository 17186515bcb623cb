//! Error types for rule construction and literal notation.
//!
//! Per-input failures (a pattern that does not match, two feature structures
//! that do not unify, a vacuous unapplication) are *not* errors: they surface
//! as empty match lists, `None`, or a pruned candidate. The enums below cover
//! the configuration side only, which is validated once when a rule is
//! compiled or a literal is parsed.

use thiserror::Error;

/// A malformed feature system or rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("feature '{0}' is already defined")]
    DuplicateFeature(String),

    #[error("feature '{feature}' declares {count} symbols; at most 64 are supported")]
    DomainTooLarge { feature: String, count: usize },

    #[error("feature '{feature}' has no symbol '{symbol}'")]
    UnknownSymbol { feature: String, symbol: String },

    #[error("rule '{rule}': left-hand side has {lhs} segments but subrule {subrule} writes {rhs}")]
    ArityMismatch { rule: String, subrule: usize, lhs: usize, rhs: usize },

    #[error("rule '{rule}': group order {order:?} is not a permutation of groups {groups:?}")]
    InvalidGroupOrder { rule: String, groups: Vec<String>, order: Vec<String> },

    #[error("rule '{rule}': output refers to partition {index}, but only {count} are declared")]
    PartitionOutOfRange { rule: String, index: usize, count: usize },

    #[error("rule '{0}' has no subrules")]
    NoSubrules(String),

    #[error("rule '{0}' has an empty target")]
    EmptyTarget(String),

    #[error("group '{0}' can match an empty span under an unbounded quantifier")]
    EmptyLoop(String),
}

/// A literal in the compact feature/segment notation could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("syntax error at token {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("feature '{feature}' has no symbol '{symbol}'")]
    UnknownSymbol { feature: String, symbol: String },

    #[error("feature '{0}' takes a nested structure, not symbols")]
    ExpectedComplex(String),

    #[error("feature '{0}' takes symbols, not a nested structure")]
    ExpectedSymbols(String),

    #[error("no segment in the inventory starts at '{0}'")]
    UnknownSegment(String),

    #[error("inventory symbols must not be blank")]
    EmptySymbol,
}

/// Either kind of configuration error, for code that builds grammars from
/// literals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Notation(#[from] NotationError),
}

/// Result type alias for rule construction.
pub type Result<T> = std::result::Result<T, RuleError>;
