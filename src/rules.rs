//! Built-in rule sets.
//!
//! Each set lives in its own directory with the same layout: `mod.rs` exposes
//! the compiled, shared instance, `rules.rs` builds the grammar from literals
//! and `tests.rs` holds a case table.

pub mod demo;
