//! A small demonstration grammar.
//!
//! Five vowels and ten consonants, one plural affix with two allomorphs and
//! three phonological rules:
//!
//! ```text
//! plural       -s / V _      (surface environment)
//!              -es           (elsewhere)
//! voicing      [C fricative] -> [voice:@v] / [C voice:@v] _
//! lowering     [V high]      -> [mid]      / _ C #
//! metathesis   dorsal fricative -> fricative dorsal / _ V
//! ```
//!
//! Everything is built once on first use and shared.

mod rules;

use crate::api::{Grammar, Options};
use crate::engine::CompiledRules;
use crate::feature::FeatureSystem;
use crate::notation::Inventory;
use crate::pattern::Pattern;
use once_cell::sync::Lazy;

static SYSTEM: Lazy<FeatureSystem> = Lazy::new(|| rules::features().expect("demo feature system is valid"));
static INVENTORY: Lazy<Inventory> = Lazy::new(|| rules::segments(&SYSTEM).expect("demo inventory is valid"));
static STEM: Lazy<Pattern> = Lazy::new(|| rules::stem().expect("stem pattern is valid"));
static GRAMMAR: Lazy<Grammar> = Lazy::new(|| rules::get(&SYSTEM, &INVENTORY).expect("demo grammar literals are valid"));
static COMPILED: Lazy<CompiledRules> =
    Lazy::new(|| GRAMMAR.compile(&Options::default()).expect("demo grammar compiles"));

pub fn system() -> &'static FeatureSystem {
    &SYSTEM
}

pub fn inventory() -> &'static Inventory {
    &INVENTORY
}

/// Any sequence of segments.
pub fn stem() -> Pattern {
    STEM.clone()
}

pub fn grammar() -> Grammar {
    GRAMMAR.clone()
}

/// The grammar compiled with default options.
pub fn compiled() -> &'static CompiledRules {
    &COMPILED
}
