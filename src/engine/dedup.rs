//! Candidate deduplication for analysis.
//!
//! Unapplying an affix can rebuild the same underlying form more than once:
//! with and without reconstructed optional segments, or through two
//! different matches of a reduplicated template. Two candidates are
//! duplicates when their shapes hold the same sequence of non-optional nodes
//! (see `Shape::duplicates`).
//!
//! ## Which duplicate survives
//!
//! The one with more nodes. Optional nodes carry material a later (earlier,
//! in derivation order) rule may still need, so dropping the longer form
//! would lose analyses.
//!
//! ```text
//! [t a k s]          4 nodes
//! [t a k s (a) (t)]  6 nodes   <- kept
//! ```

use super::word::WordAnalysis;

/// Keep one candidate per duplicate class, preferring longer shapes.
/// Survivors keep the position of the first member of their class.
pub(crate) fn dedup_keep_longer(candidates: Vec<WordAnalysis>) -> Vec<WordAnalysis> {
    let mut kept: Vec<WordAnalysis> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match kept.iter_mut().find(|k| k.shape.duplicates(&candidate.shape)) {
            Some(existing) => {
                if candidate.shape.len() > existing.shape.len() {
                    *existing = candidate;
                }
            }
            None => kept.push(candidate),
        }
    }
    kept
}
