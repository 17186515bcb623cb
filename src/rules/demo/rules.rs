use crate::api::Grammar;
use crate::engine::{AffixRule, AffixSubrule, Environment, MetathesisRule, OutputAction, RewriteRule, RewriteSubrule};
use crate::error::{Error, Result};
use crate::feature::{FeatureStruct, FeatureSystem};
use crate::notation::Inventory;
use crate::pattern::{Pattern, PatternNode, Quantifier};

pub(super) fn features() -> Result<FeatureSystem> {
    let mut sys = FeatureSystem::new();
    sys.add_symbolic("type", "major class", &["consonant", "vowel"])?;
    sys.add_symbolic("height", "vowel height", &["high", "mid", "low"])?;
    sys.add_symbolic("backness", "vowel backness", &["front", "back"])?;
    sys.add_symbolic("round", "lip rounding", &["+", "-"])?;
    sys.add_symbolic("voice", "voicing", &["+", "-"])?;
    sys.add_symbolic("place", "place of articulation", &["labial", "coronal", "dorsal"])?;
    sys.add_symbolic("manner", "manner of articulation", &["stop", "fricative", "nasal"])?;
    sys.add_symbolic("num", "number", &["sg", "pl"])?;
    sys.add_symbolic("case", "case", &["nom", "acc"])?;
    sys.add_complex("head", "agreement features")?;
    Ok(sys)
}

/// Vowels first: rendering lists compatible segments in inventory order.
const SEGMENTS: &[(&str, &str)] = &[
    ("a", "[type:vowel height:low backness:back round:- voice:+]"),
    ("e", "[type:vowel height:mid backness:front round:- voice:+]"),
    ("i", "[type:vowel height:high backness:front round:- voice:+]"),
    ("o", "[type:vowel height:mid backness:back round:+ voice:+]"),
    ("u", "[type:vowel height:high backness:back round:+ voice:+]"),
    ("p", "[type:consonant place:labial manner:stop voice:-]"),
    ("b", "[type:consonant place:labial manner:stop voice:+]"),
    ("m", "[type:consonant place:labial manner:nasal voice:+]"),
    ("t", "[type:consonant place:coronal manner:stop voice:-]"),
    ("d", "[type:consonant place:coronal manner:stop voice:+]"),
    ("s", "[type:consonant place:coronal manner:fricative voice:-]"),
    ("z", "[type:consonant place:coronal manner:fricative voice:+]"),
    ("n", "[type:consonant place:coronal manner:nasal voice:+]"),
    ("k", "[type:consonant place:dorsal manner:stop voice:-]"),
    ("g", "[type:consonant place:dorsal manner:stop voice:+]"),
];

pub(super) fn segments(sys: &FeatureSystem) -> std::result::Result<Inventory, Error> {
    let mut inventory = Inventory::new();
    for (symbol, literal) in SEGMENTS {
        inventory.add_segment(symbol, sys.parse(literal)?)?;
    }
    inventory.add_boundary("+", FeatureStruct::new())?;
    Ok(inventory)
}

pub(super) fn stem() -> Result<Pattern> {
    Pattern::new(vec![PatternNode::repeat(None, vec![PatternNode::segment(FeatureStruct::new())], Quantifier::STAR)])
}

pub(super) fn get(sys: &FeatureSystem, inventory: &Inventory) -> std::result::Result<Grammar, Error> {
    let fs = |text: &str| sys.parse(text);
    let seg = |symbol: &str| {
        inventory.segment(symbol).cloned().ok_or_else(|| crate::error::NotationError::UnknownSegment(symbol.to_string()))
    };

    let suffix = |id: &str, symbols: &[&str]| -> std::result::Result<AffixSubrule, Error> {
        let inserted = symbols.iter().map(|&s| seg(s)).collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(AffixSubrule::new(id, vec![stem()?], vec![OutputAction::Copy(0), OutputAction::Insert(inserted)])
            .requires_pos("noun")
            .outputs_pos("noun")
            .requires_head(fs("[num:sg]")?)
            .outputs_head(fs("[num:pl]")?))
    };

    let after_vowel = Environment::new(Pattern::segments([fs("[type:vowel]")?]), Pattern::empty());
    let plural = AffixRule::new("plural")
        .subrule(suffix("s", &["s"])?.environment(after_vowel))
        .subrule(suffix("es", &["e", "s"])?);

    let voicing = RewriteRule::new("voicing", vec![fs("[type:consonant manner:fricative]")?])
        .subrule(RewriteSubrule::new(vec![fs("[voice:@v]")?]).left(Pattern::segments([fs("[type:consonant voice:@v]")?])));

    let word_final_consonant =
        Pattern::new(vec![PatternNode::segment(fs("[type:consonant]")?), PatternNode::anchor()])?;
    let lowering = RewriteRule::new("lowering", vec![fs("[type:vowel height:high]")?])
        .subrule(RewriteSubrule::new(vec![fs("[height:mid]")?]).right(word_final_consonant));

    let metathesis = MetathesisRule::new("cluster-metathesis")
        .group("dorsal", Pattern::segments([fs("[place:dorsal]")?]))
        .group("fricative", Pattern::segments([fs("[manner:fricative]")?]))
        .order(&["fricative", "dorsal"])
        .right(Pattern::segments([fs("[type:vowel]")?]));

    Ok(Grammar::new().morphological(plural).phonological(voicing).phonological(lowering).phonological(metathesis))
}
