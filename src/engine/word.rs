//! Word records threaded through a derivation.
//!
//! Rules never mutate the record they are given; they clone it, change the
//! clone and return it as a new candidate.

use super::affix::Environment;
use crate::feature::FeatureStruct;
use crate::shape::Shape;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// An affix subrule that contributed to a synthesized word.
#[derive(Debug, Clone)]
pub struct AppliedAllomorph {
    pub rule: String,
    /// Index of the subrule within its rule; lower is preferred.
    pub subrule: usize,
    pub id: String,
    pub environment: Option<Arc<Environment>>,
}

#[derive(Debug, Clone)]
pub struct WordSynthesis {
    pub shape: Shape,
    pub head: FeatureStruct,
    pub foot: FeatureStruct,
    pub pos: String,
    /// Morphological-phonological rule features.
    pub mpr: BTreeSet<String>,
    pub applications: BTreeMap<String, usize>,
    pub allomorphs: Vec<AppliedAllomorph>,
}

impl WordSynthesis {
    pub fn new(shape: Shape, pos: &str) -> Self {
        Self {
            shape,
            head: FeatureStruct::new(),
            foot: FeatureStruct::new(),
            pos: pos.to_string(),
            mpr: BTreeSet::new(),
            applications: BTreeMap::new(),
            allomorphs: Vec::new(),
        }
    }

    pub fn with_head(mut self, head: FeatureStruct) -> Self {
        self.head = head;
        self
    }

    pub fn with_mpr(mut self, feature: &str) -> Self {
        self.mpr.insert(feature.to_string());
        self
    }

    pub fn applications_of(&self, rule: &str) -> usize {
        self.applications.get(rule).copied().unwrap_or(0)
    }

    /// Rule names of the applied allomorphs, in application order.
    pub fn rule_sequence(&self) -> Vec<&str> {
        self.allomorphs.iter().map(|a| a.rule.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct WordAnalysis {
    pub shape: Shape,
    pub head: FeatureStruct,
    pub foot: FeatureStruct,
    /// Parts of speech still possible; empty means unconstrained.
    pub pos: BTreeSet<String>,
    /// MPR features the underlying word must carry.
    pub mpr: BTreeSet<String>,
    pub unapplications: BTreeMap<String, usize>,
    /// Rules unapplied so far, most recent last.
    pub rules_unapplied: Vec<String>,
}

impl WordAnalysis {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            head: FeatureStruct::new(),
            foot: FeatureStruct::new(),
            pos: BTreeSet::new(),
            mpr: BTreeSet::new(),
            unapplications: BTreeMap::new(),
            rules_unapplied: Vec::new(),
        }
    }

    pub fn with_mpr(mut self, feature: &str) -> Self {
        self.mpr.insert(feature.to_string());
        self
    }

    pub fn unapplications_of(&self, rule: &str) -> usize {
        self.unapplications.get(rule).copied().unwrap_or(0)
    }

    pub(crate) fn record_unapplication(&mut self, rule: &str) {
        *self.unapplications.entry(rule.to_string()).or_default() += 1;
        self.rules_unapplied.push(rule.to_string());
    }
}
