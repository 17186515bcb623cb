//! Feature structures and their unification algebra.
//!
//! A [`FeatureStruct`] is a partial description of a segment (or of a word's
//! head/foot properties): an ordered map from [`Feature`] to [`FeatureValue`].
//! Values are immutable once built; every operation below returns a new
//! structure, and call sites rebind their local instead of mutating shared
//! trees.
//!
//! ## Operations
//!
//! ```text
//! merge / unifiable   a ⊓ b       fails when two symbol sets do not intersect
//! priority_union      a ◁ b       b's values win, used to write rule outputs
//! negation            ¬a          feature-wise complement within each domain
//! subtract            a − b       drop what b already entails
//! replace             a ← b       overwrite a's values with b's, shallowly
//! ```
//!
//! Symbol values are sets: `height:high|mid` is a disjunction. Unifying two
//! symbol values intersects them, so the result is always the narrower set.
//!
//! Variables (`@v`, `-@v`) range over symbol values. They are bound through a
//! [`VariableBindings`] map that lives for one match/unification episode; a
//! variable with `agree == false` stands for the complement of its binding.

use crate::error::{Result, RuleError};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Maximum number of symbols a closed feature domain may declare.
pub const MAX_SYMBOLS: usize = 64;

// --- Features ----------------------------------------------------------------

/// The value domain of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    /// A closed set of symbols, in declaration order.
    Symbolic(Vec<String>),
    /// A nested feature structure.
    Complex,
}

#[derive(Debug)]
struct FeatureDef {
    id: String,
    description: String,
    domain: Domain,
}

/// A dimension of linguistic description.
///
/// Cheap to clone (shared definition). Identity, ordering and hashing all go
/// through the feature id, which is also what gives [`FeatureStruct`] its
/// stable iteration order.
#[derive(Debug, Clone)]
pub struct Feature(Arc<FeatureDef>);

impl Feature {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn description(&self) -> &str {
        &self.0.description
    }

    pub fn domain(&self) -> &Domain {
        &self.0.domain
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.0.domain, Domain::Complex)
    }

    /// The singleton set for `name`, if it belongs to this feature's domain.
    pub fn symbol(&self, name: &str) -> Option<SymbolSet> {
        match &self.0.domain {
            Domain::Symbolic(symbols) => symbols.iter().position(|s| s == name).map(|i| SymbolSet(1 << i)),
            Domain::Complex => None,
        }
    }

    /// The disjunctive set of `names`; `None` if any name is unknown.
    pub fn symbols(&self, names: &[&str]) -> Option<SymbolSet> {
        names.iter().try_fold(SymbolSet::EMPTY, |acc, name| Some(acc.union(self.symbol(name)?)))
    }

    /// The set of every symbol in the domain.
    pub fn full(&self) -> SymbolSet {
        match &self.0.domain {
            Domain::Symbolic(symbols) if symbols.len() == MAX_SYMBOLS => SymbolSet(u64::MAX),
            Domain::Symbolic(symbols) => SymbolSet((1u64 << symbols.len()) - 1),
            Domain::Complex => SymbolSet::EMPTY,
        }
    }

    /// Set complement within this feature's domain.
    pub fn complement(&self, set: SymbolSet) -> SymbolSet {
        SymbolSet(self.full().0 & !set.0)
    }

    /// Names of the symbols in `set`, in declaration order.
    pub fn symbol_names(&self, set: SymbolSet) -> Vec<&str> {
        match &self.0.domain {
            Domain::Symbolic(symbols) => {
                symbols.iter().enumerate().filter(|(i, _)| set.0 & (1 << i) != 0).map(|(_, s)| s.as_str()).collect()
            }
            Domain::Complex => Vec::new(),
        }
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Feature {}

impl PartialOrd for Feature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Feature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for Feature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Borrow<str> for Feature {
    fn borrow(&self) -> &str {
        &self.0.id
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.id)
    }
}

/// A set of symbols of one feature's domain, as a bitmask over declaration
/// indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SymbolSet(u64);

impl SymbolSet {
    pub const EMPTY: SymbolSet = SymbolSet(0);

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn intersect(self, other: SymbolSet) -> SymbolSet {
        SymbolSet(self.0 & other.0)
    }

    pub const fn union(self, other: SymbolSet) -> SymbolSet {
        SymbolSet(self.0 | other.0)
    }

    pub const fn is_subset_of(self, other: SymbolSet) -> bool {
        self.0 & !other.0 == 0
    }
}

/// The set of features a grammar is written against.
#[derive(Debug, Clone, Default)]
pub struct FeatureSystem {
    features: BTreeMap<String, Feature>,
}

impl FeatureSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a feature with a closed symbol domain.
    pub fn add_symbolic(&mut self, id: &str, description: &str, symbols: &[&str]) -> Result<Feature> {
        if symbols.len() > MAX_SYMBOLS {
            return Err(RuleError::DomainTooLarge { feature: id.to_string(), count: symbols.len() });
        }
        let domain = Domain::Symbolic(symbols.iter().map(|s| s.to_string()).collect());
        self.add(id, description, domain)
    }

    /// Declare a feature whose value is a nested structure.
    pub fn add_complex(&mut self, id: &str, description: &str) -> Result<Feature> {
        self.add(id, description, Domain::Complex)
    }

    fn add(&mut self, id: &str, description: &str, domain: Domain) -> Result<Feature> {
        if self.features.contains_key(id) {
            return Err(RuleError::DuplicateFeature(id.to_string()));
        }
        let feature = Feature(Arc::new(FeatureDef { id: id.to_string(), description: description.to_string(), domain }));
        self.features.insert(id.to_string(), feature.clone());
        Ok(feature)
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    /// Build a symbol value, checking every name against the domain.
    pub fn symbol_value(&self, feature: &Feature, names: &[&str]) -> Result<FeatureValue> {
        for name in names {
            if feature.symbol(name).is_none() {
                return Err(RuleError::UnknownSymbol { feature: feature.id().to_string(), symbol: name.to_string() });
            }
        }
        Ok(FeatureValue::Symbol(feature.symbols(names).unwrap_or_default()))
    }
}

// --- Values ------------------------------------------------------------------

/// An unbound placeholder over symbol values ("alpha variable").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    pub name: String,
    /// `false` means "the opposite of whatever the variable is bound to".
    pub agree: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, agree: bool) -> Self {
        Self { name: name.into(), agree }
    }

    fn negated(&self) -> Self {
        Self { name: self.name.clone(), agree: !self.agree }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureValue {
    Symbol(SymbolSet),
    Complex(FeatureStruct),
    Variable(Variable),
}

/// Variable assignments made during one match or unification episode.
///
/// Branching searches clone the bindings at each choice point, so abandoning a
/// branch is just dropping its copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableBindings {
    values: BTreeMap<String, SymbolSet>,
}

impl VariableBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<SymbolSet> {
        self.values.get(name).copied()
    }

    pub fn bind(&mut self, name: &str, value: SymbolSet) {
        self.values.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value `var` denotes under `feature`, if bound.
    pub fn resolve(&self, feature: &Feature, var: &Variable) -> Option<SymbolSet> {
        self.get(&var.name).map(|bound| if var.agree { bound } else { feature.complement(bound) })
    }
}

// --- Feature structures --------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureStruct {
    values: BTreeMap<Feature, FeatureValue>,
}

impl FeatureStruct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, feature: &Feature, value: FeatureValue) -> Self {
        self.values.insert(feature.clone(), value);
        self
    }

    pub fn insert(&mut self, feature: &Feature, value: FeatureValue) {
        self.values.insert(feature.clone(), value);
    }

    pub fn remove(&mut self, feature_id: &str) -> Option<FeatureValue> {
        self.values.remove(feature_id)
    }

    pub fn get(&self, feature_id: &str) -> Option<&FeatureValue> {
        self.values.get(feature_id)
    }

    pub fn contains(&self, feature_id: &str) -> bool {
        self.values.contains_key(feature_id)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Feature, &FeatureValue)> {
        self.values.iter()
    }

    /// Symbol names held by `feature_id`, when it is a symbol value.
    pub fn symbol_names(&self, feature_id: &str) -> Option<Vec<&str>> {
        let (feature, value) = self.values.get_key_value(feature_id)?;
        match value {
            FeatureValue::Symbol(set) => Some(feature.symbol_names(*set)),
            _ => None,
        }
    }

    /// True when `self` and `other` can be unified. Variables bound along the
    /// way are committed to `bindings` only on success.
    pub fn unifiable(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> bool {
        self.merge(other, bindings).is_some()
    }

    /// Unify `other` into `self`, returning the combined structure.
    ///
    /// `bindings` is left untouched when unification fails.
    pub fn merge(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> Option<FeatureStruct> {
        let mut scratch = bindings.clone();
        let merged = self.unify_with(other, &mut scratch)?;
        *bindings = scratch;
        Some(merged)
    }

    fn unify_with(&self, other: &FeatureStruct, bindings: &mut VariableBindings) -> Option<FeatureStruct> {
        let mut out = self.values.clone();
        for (feature, theirs) in &other.values {
            let value = match self.values.get(feature) {
                Some(mine) => unify_values(feature, mine, theirs, bindings)?,
                None => theirs.clone(),
            };
            out.insert(feature.clone(), value);
        }
        Some(FeatureStruct { values: out })
    }

    /// `other`'s values overwrite `self`'s; nested structures are combined
    /// recursively. Bound variables are instantiated; unbound ones are skipped.
    pub fn priority_union(&self, other: &FeatureStruct, bindings: &VariableBindings) -> FeatureStruct {
        let mut out = self.values.clone();
        for (feature, value) in &other.values {
            match value {
                FeatureValue::Symbol(set) => {
                    out.insert(feature.clone(), FeatureValue::Symbol(*set));
                }
                FeatureValue::Variable(var) => {
                    if let Some(set) = bindings.resolve(feature, var) {
                        out.insert(feature.clone(), FeatureValue::Symbol(set));
                    }
                }
                FeatureValue::Complex(inner) => {
                    let combined = match out.get(feature) {
                        Some(FeatureValue::Complex(existing)) => existing.priority_union(inner, bindings),
                        _ => inner.instantiate(bindings),
                    };
                    out.insert(feature.clone(), FeatureValue::Complex(combined));
                }
            }
        }
        FeatureStruct { values: out }
    }

    /// Replace bound variables with the symbols they denote.
    pub fn instantiate(&self, bindings: &VariableBindings) -> FeatureStruct {
        let values = self
            .values
            .iter()
            .map(|(feature, value)| {
                let value = match value {
                    FeatureValue::Variable(var) => match bindings.resolve(feature, var) {
                        Some(set) => FeatureValue::Symbol(set),
                        None => value.clone(),
                    },
                    FeatureValue::Complex(inner) => FeatureValue::Complex(inner.instantiate(bindings)),
                    FeatureValue::Symbol(_) => value.clone(),
                };
                (feature.clone(), value)
            })
            .collect();
        FeatureStruct { values }
    }

    /// Shallow overwrite: every feature of `other` replaces `self`'s value.
    pub fn replace(&self, other: &FeatureStruct) -> FeatureStruct {
        let mut out = self.values.clone();
        for (feature, value) in &other.values {
            out.insert(feature.clone(), value.clone());
        }
        FeatureStruct { values: out }
    }

    /// Feature-wise complement ("anti feature structure").
    ///
    /// A symbol set becomes its complement within the feature's domain (and the
    /// feature disappears when that complement is empty); nested structures are
    /// negated recursively; variables flip polarity.
    pub fn negation(&self) -> FeatureStruct {
        let mut out = BTreeMap::new();
        for (feature, value) in &self.values {
            match value {
                FeatureValue::Symbol(set) => {
                    let complement = feature.complement(*set);
                    if !complement.is_empty() {
                        out.insert(feature.clone(), FeatureValue::Symbol(complement));
                    }
                }
                FeatureValue::Complex(inner) => {
                    let negated = inner.negation();
                    if !negated.is_empty() {
                        out.insert(feature.clone(), FeatureValue::Complex(negated));
                    }
                }
                FeatureValue::Variable(var) => {
                    out.insert(feature.clone(), FeatureValue::Variable(var.negated()));
                }
            }
        }
        FeatureStruct { values: out }
    }

    /// Remove every feature whose value is already entailed by `other`.
    pub fn subtract(&self, other: &FeatureStruct) -> FeatureStruct {
        let mut out = BTreeMap::new();
        for (feature, mine) in &self.values {
            let kept = match (mine, other.values.get(feature)) {
                (_, None) => Some(mine.clone()),
                (FeatureValue::Symbol(own), Some(FeatureValue::Symbol(theirs))) => {
                    (!theirs.is_subset_of(*own)).then(|| mine.clone())
                }
                (FeatureValue::Complex(own), Some(FeatureValue::Complex(theirs))) => {
                    let rest = own.subtract(theirs);
                    (!rest.is_empty()).then_some(FeatureValue::Complex(rest))
                }
                (FeatureValue::Variable(own), Some(FeatureValue::Variable(theirs))) if own == theirs => None,
                _ => Some(mine.clone()),
            };
            if let Some(value) = kept {
                out.insert(feature.clone(), value);
            }
        }
        FeatureStruct { values: out }
    }

    /// Drop every top-level feature that `other` mentions.
    pub fn without(&self, other: &FeatureStruct) -> FeatureStruct {
        let values = self.values.iter().filter(|(f, _)| !other.values.contains_key(*f)).map(|(f, v)| (f.clone(), v.clone())).collect();
        FeatureStruct { values }
    }
}

fn unify_values(
    feature: &Feature,
    a: &FeatureValue,
    b: &FeatureValue,
    bindings: &mut VariableBindings,
) -> Option<FeatureValue> {
    use FeatureValue::*;

    match (a, b) {
        (Symbol(x), Symbol(y)) => {
            let both = x.intersect(*y);
            (!both.is_empty()).then_some(Symbol(both))
        }
        (Complex(x), Complex(y)) => x.unify_with(y, bindings).map(Complex),
        (Variable(var), Symbol(set)) | (Symbol(set), Variable(var)) => {
            unify_variable(feature, var, *set, bindings).map(Symbol)
        }
        (Variable(v), Variable(w)) => match (bindings.resolve(feature, v), bindings.resolve(feature, w)) {
            (Some(x), Some(y)) => {
                let both = x.intersect(y);
                (!both.is_empty()).then_some(Symbol(both))
            }
            (Some(x), None) => unify_variable(feature, w, x, bindings).map(Symbol),
            (None, Some(y)) => unify_variable(feature, v, y, bindings).map(Symbol),
            // Pick deterministically so that a ⊓ b == b ⊓ a.
            (None, None) => Some(Variable(if v <= w { v.clone() } else { w.clone() })),
        },
        _ => None,
    }
}

fn unify_variable(feature: &Feature, var: &Variable, value: SymbolSet, bindings: &mut VariableBindings) -> Option<SymbolSet> {
    if value.is_empty() {
        return None;
    }
    match bindings.resolve(feature, var) {
        Some(bound) => {
            let both = bound.intersect(value);
            (!both.is_empty()).then_some(both)
        }
        None => {
            let stored = if var.agree { value } else { feature.complement(value) };
            bindings.bind(&var.name, stored);
            Some(value)
        }
    }
}

impl fmt::Display for FeatureStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (feature, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:", feature.id())?;
            match value {
                FeatureValue::Symbol(set) => f.write_str(&feature.symbol_names(*set).join("|"))?,
                FeatureValue::Complex(inner) => write!(f, "{inner}")?,
                FeatureValue::Variable(var) => write!(f, "{}@{}", if var.agree { "" } else { "-" }, var.name)?,
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fs, system};

    #[test]
    fn symbol_sets_unify_to_their_intersection() {
        let sys = system();
        let a = fs(&sys, "[height:high|mid]");
        let b = fs(&sys, "[height:mid|low type:vowel]");
        let merged = a.merge(&b, &mut VariableBindings::new()).unwrap();
        assert_eq!(merged, fs(&sys, "[height:mid type:vowel]"));
    }

    #[test]
    fn disjoint_symbols_do_not_unify() {
        let sys = system();
        let mut bindings = VariableBindings::new();
        assert!(!fs(&sys, "[height:high]").unifiable(&fs(&sys, "[height:low]"), &mut bindings));
        assert!(bindings.is_empty());
    }

    #[test]
    fn unification_is_commutative() {
        let sys = system();
        let cases = [
            ("[type:vowel height:high|mid]", "[height:mid backness:front]"),
            ("[type:vowel]", "[type:consonant]"),
            ("[head:[num:sg|pl]]", "[head:[num:pl case:nom]]"),
            ("[voice:@v]", "[voice:+ place:labial]"),
            ("[voice:@a]", "[voice:@b]"),
            ("[]", "[round:-]"),
        ];
        for (left, right) in cases {
            let a = fs(&sys, left);
            let b = fs(&sys, right);
            let ab = a.merge(&b, &mut VariableBindings::new());
            let ba = b.merge(&a, &mut VariableBindings::new());
            assert_eq!(
                a.unifiable(&b, &mut VariableBindings::new()),
                b.unifiable(&a, &mut VariableBindings::new()),
                "{left} / {right}"
            );
            assert_eq!(ab, ba, "{left} / {right}");
        }
    }

    #[test]
    fn unification_is_associative() {
        let sys = system();
        let cases = [
            ("[type:vowel height:high|mid]", "[height:mid|low backness:front]", "[round:-]"),
            ("[height:high|mid]", "[height:mid|low]", "[height:high|low]"),
            ("[head:[num:sg|pl]]", "[head:[case:nom]]", "[head:[num:pl] type:vowel]"),
            ("[head:[num:sg]]", "[head:[case:acc]]", "[head:[num:pl]]"),
            ("[voice:@v place:labial]", "[voice:+]", "[manner:stop]"),
            ("[voice:@v]", "[voice:+]", "[voice:-]"),
            ("[voice:@a]", "[voice:@b]", "[voice:-]"),
        ];
        for (a, b, c) in cases {
            let (a, b, c) = (fs(&sys, a), fs(&sys, b), fs(&sys, c));
            let mut left_bindings = VariableBindings::new();
            let left = a.merge(&b, &mut left_bindings).and_then(|ab| ab.merge(&c, &mut left_bindings));
            let mut right_bindings = VariableBindings::new();
            let right = b.merge(&c, &mut right_bindings).and_then(|bc| a.merge(&bc, &mut right_bindings));
            assert_eq!(left, right, "({a} ⊓ {b}) ⊓ {c}");
        }
    }

    #[test]
    fn nested_structures_unify_member_wise() {
        let sys = system();
        let a = fs(&sys, "[head:[num:pl]]");
        assert!(a.unifiable(&fs(&sys, "[head:[case:acc]]"), &mut VariableBindings::new()));
        assert!(!a.unifiable(&fs(&sys, "[head:[num:sg]]"), &mut VariableBindings::new()));
    }

    #[test]
    fn variables_bind_and_then_constrain() {
        let sys = system();
        let pattern = fs(&sys, "[voice:@v]");
        let mut bindings = VariableBindings::new();
        assert!(pattern.unifiable(&fs(&sys, "[voice:+]"), &mut bindings));
        let voice = sys.feature("voice").unwrap();
        assert_eq!(bindings.get("v"), voice.symbol("+"));

        // Already bound to "+": a "-" segment is now incompatible.
        assert!(!pattern.unifiable(&fs(&sys, "[voice:-]"), &mut bindings));

        // The negated variable agrees with the opposite value.
        let opposite = fs(&sys, "[voice:-@v]");
        assert!(opposite.unifiable(&fs(&sys, "[voice:-]"), &mut bindings));
    }

    #[test]
    fn failed_merge_leaves_bindings_untouched() {
        let sys = system();
        let pattern = fs(&sys, "[voice:@v height:high]");
        let mut bindings = VariableBindings::new();
        assert!(pattern.merge(&fs(&sys, "[voice:+ height:low]"), &mut bindings).is_none());
        assert!(bindings.get("v").is_none());
    }

    #[test]
    fn negation_is_an_involution_on_single_symbols() {
        let sys = system();
        for text in ["[height:high]", "[height:mid]", "[backness:front]", "[voice:-]", "[place:dorsal]"] {
            let value = fs(&sys, text);
            assert_eq!(value.negation().negation(), value, "{text}");
        }
        assert_eq!(fs(&sys, "[height:high]").negation(), fs(&sys, "[height:mid|low]"));
    }

    #[test]
    fn negation_drops_values_spanning_the_whole_domain() {
        let sys = system();
        let value = fs(&sys, "[height:high|mid|low type:vowel]");
        assert_eq!(value.negation(), fs(&sys, "[type:consonant]"));
    }

    #[test]
    fn negation_recurses_and_flips_variables() {
        let sys = system();
        assert_eq!(fs(&sys, "[head:[num:sg]]").negation(), fs(&sys, "[head:[num:pl]]"));
        assert_eq!(fs(&sys, "[voice:@v]").negation(), fs(&sys, "[voice:-@v]"));
    }

    #[test]
    fn subtract_drops_entailed_features() {
        let sys = system();
        let a = fs(&sys, "[height:high|low voice:+ head:[num:pl case:nom]]");
        let b = fs(&sys, "[height:low voice:- head:[num:pl]]");
        assert_eq!(a.subtract(&b), fs(&sys, "[voice:+ head:[case:nom]]"));
    }

    #[test]
    fn unapplication_value_for_vowel_lowering() {
        let sys = system();
        let lhs = fs(&sys, "[type:vowel height:high]");
        let rhs = fs(&sys, "[height:mid]");
        let value = rhs.negation().subtract(&lhs.negation());
        assert_eq!(value, fs(&sys, "[height:high|low]"));
    }

    #[test]
    fn priority_union_overwrites_and_instantiates() {
        let sys = system();
        let segment = fs(&sys, "[type:vowel height:high backness:front]");
        let out = segment.priority_union(&fs(&sys, "[height:mid]"), &VariableBindings::new());
        assert_eq!(out, fs(&sys, "[type:vowel height:mid backness:front]"));

        let mut bindings = VariableBindings::new();
        assert!(fs(&sys, "[voice:@v]").unifiable(&fs(&sys, "[voice:+]"), &mut bindings));
        let consonant = fs(&sys, "[type:consonant voice:-]");
        assert_eq!(consonant.priority_union(&fs(&sys, "[voice:@v]"), &bindings), fs(&sys, "[type:consonant voice:+]"));
        // Unbound variables are not written.
        assert_eq!(consonant.priority_union(&fs(&sys, "[voice:@w]"), &bindings), consonant);
    }

    #[test]
    fn replace_is_shallow() {
        let sys = system();
        let a = fs(&sys, "[type:vowel height:high head:[num:pl case:nom]]");
        let b = fs(&sys, "[height:mid head:[case:acc]]");
        assert_eq!(a.replace(&b), fs(&sys, "[type:vowel height:mid head:[case:acc]]"));
    }

    #[test]
    fn display_lists_features_in_id_order() {
        let sys = system();
        let value = fs(&sys, "[type:vowel height:high|low voice:-@v]");
        assert_eq!(value.to_string(), "[height:high|low type:vowel voice:-@v]");
    }

    #[test]
    fn feature_system_rejects_duplicates_and_huge_domains() {
        let mut sys = FeatureSystem::new();
        sys.add_symbolic("voice", "voicing", &["+", "-"]).unwrap();
        assert_eq!(sys.add_complex("voice", "again"), Err(RuleError::DuplicateFeature("voice".into())));

        let names: Vec<String> = (0..65).map(|i| format!("s{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        assert!(matches!(sys.add_symbolic("big", "", &refs), Err(RuleError::DomainTooLarge { count: 65, .. })));

        let voice = sys.feature("voice").unwrap().clone();
        assert!(sys.symbol_value(&voice, &["0"]).is_err());
    }
}
