//! Compact literal notation for feature structures and shapes.
//!
//! ```text
//! [type:vowel height:high|mid voice:@v place:-@p head:[num:pl]]
//!  └── feature:symbol   └─ disjunction  └─ variable   └─ nested structure
//! ```
//!
//! Shapes are written as strings of inventory symbols ("kata"), segmented by
//! longest match. Rendering goes the other way; a node that does not equal
//! any inventory entry is printed as the set of entries it is compatible with
//! (`{i|e}`), and optional nodes are parenthesized.

use crate::error::NotationError;
use crate::feature::{FeatureStruct, FeatureSystem, FeatureValue, Variable, VariableBindings};
use crate::shape::{Annotation, Direction, NodeKind, Shape};

type Result<T> = std::result::Result<T, NotationError>;

struct Tokens<'t> {
    items: Vec<&'t str>,
    pos: usize,
}

impl<'t> Tokens<'t> {
    fn new(text: &'t str) -> Self {
        let items = regex!(r"\[|\]|:|\||-?@\w+|[^\s\[\]:|]+").find_iter(text).map(|m| m.as_str()).collect();
        Tokens { items, pos: 0 }
    }

    fn peek(&self) -> Option<&'t str> {
        self.items.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<&'t str> {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: &str) -> Result<()> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(self.error(format!("expected '{want}', found '{tok}'"))),
            None => Err(self.error(format!("expected '{want}', found end of input"))),
        }
    }

    fn error(&self, message: String) -> NotationError {
        NotationError::Syntax { position: self.pos.saturating_sub(1), message }
    }
}

impl FeatureSystem {
    /// Read a feature structure literal.
    pub fn parse(&self, text: &str) -> Result<FeatureStruct> {
        let mut tokens = Tokens::new(text);
        let fs = self.parse_struct(&mut tokens)?;
        match tokens.next() {
            None => Ok(fs),
            Some(extra) => Err(tokens.error(format!("unexpected '{extra}' after structure"))),
        }
    }

    fn parse_struct(&self, tokens: &mut Tokens<'_>) -> Result<FeatureStruct> {
        tokens.expect("[")?;
        let mut fs = FeatureStruct::new();
        loop {
            let id = match tokens.next() {
                Some("]") => return Ok(fs),
                Some(tok) if !matches!(tok, "[" | ":" | "|") => tok,
                Some(tok) => return Err(tokens.error(format!("expected a feature name, found '{tok}'"))),
                None => return Err(tokens.error("unterminated structure".to_string())),
            };
            let feature = self.feature(id).ok_or_else(|| NotationError::UnknownFeature(id.to_string()))?.clone();
            tokens.expect(":")?;

            let value = match tokens.peek() {
                Some("[") => {
                    if !feature.is_complex() {
                        return Err(NotationError::ExpectedSymbols(id.to_string()));
                    }
                    FeatureValue::Complex(self.parse_struct(tokens)?)
                }
                Some(tok) if tok.contains('@') => {
                    tokens.next();
                    if feature.is_complex() {
                        return Err(NotationError::ExpectedComplex(id.to_string()));
                    }
                    let agree = !tok.starts_with('-');
                    FeatureValue::Variable(Variable::new(tok.trim_start_matches('-').trim_start_matches('@'), agree))
                }
                _ => {
                    if feature.is_complex() {
                        return Err(NotationError::ExpectedComplex(id.to_string()));
                    }
                    let mut names = Vec::new();
                    loop {
                        match tokens.next() {
                            Some(tok) if !matches!(tok, "[" | "]" | ":" | "|") => names.push(tok),
                            Some(tok) => return Err(tokens.error(format!("expected a symbol, found '{tok}'"))),
                            None => return Err(tokens.error("expected a symbol".to_string())),
                        }
                        if tokens.peek() != Some("|") {
                            break;
                        }
                        tokens.next();
                    }
                    let set = feature.symbols(&names).ok_or_else(|| {
                        let unknown = names.iter().find(|n| feature.symbol(n).is_none()).copied().unwrap_or_default();
                        NotationError::UnknownSymbol { feature: id.to_string(), symbol: unknown.to_string() }
                    })?;
                    FeatureValue::Symbol(set)
                }
            };
            fs.insert(&feature, value);
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    symbol: String,
    kind: NodeKind,
    fs: FeatureStruct,
}

/// Segment symbols and the feature structures they stand for.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    entries: Vec<Entry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, symbol: &str, fs: FeatureStruct) -> Result<()> {
        self.add(symbol, NodeKind::Segment, fs)
    }

    pub fn add_boundary(&mut self, symbol: &str, fs: FeatureStruct) -> Result<()> {
        self.add(symbol, NodeKind::Boundary, fs)
    }

    /// Symbols must consume input, or segmenting would never advance.
    fn add(&mut self, symbol: &str, kind: NodeKind, fs: FeatureStruct) -> Result<()> {
        if symbol.trim().is_empty() {
            return Err(NotationError::EmptySymbol);
        }
        self.entries.push(Entry { symbol: symbol.to_string(), kind, fs });
        Ok(())
    }

    pub fn segment(&self, symbol: &str) -> Option<&FeatureStruct> {
        self.entries.iter().find(|e| e.symbol == symbol).map(|e| &e.fs)
    }

    /// Segment `text` by longest match. Whitespace is ignored.
    pub fn shape(&self, text: &str) -> Result<Shape> {
        let mut shape = Shape::new();
        let mut rest = text.trim_start();
        while !rest.is_empty() {
            let entry = self
                .entries
                .iter()
                .filter(|e| rest.starts_with(e.symbol.as_str()))
                .max_by_key(|e| e.symbol.len())
                .ok_or_else(|| NotationError::UnknownSegment(rest.to_string()))?;
            shape.push(entry.kind, Annotation::new(entry.fs.clone()));
            rest = rest[entry.symbol.len()..].trim_start();
        }
        Ok(shape)
    }

    /// Render a shape back into symbols.
    pub fn render(&self, shape: &Shape) -> String {
        let mut out = String::new();
        for id in shape.iter(Direction::LeftToRight) {
            let node = shape.node(id);
            let text = self.symbol_for(node.kind(), node.fs());
            if node.annotation().is_optional() {
                out.push('(');
                out.push_str(&text);
                out.push(')');
            } else {
                out.push_str(&text);
            }
        }
        out
    }

    fn symbol_for(&self, kind: NodeKind, fs: &FeatureStruct) -> String {
        let same_kind = || self.entries.iter().filter(move |e| e.kind == kind);
        if let Some(exact) = same_kind().find(|e| &e.fs == fs) {
            return exact.symbol.clone();
        }
        let compatible: Vec<&str> =
            same_kind().filter(|e| e.fs.unifiable(fs, &mut VariableBindings::new())).map(|e| e.symbol.as_str()).collect();
        match compatible.as_slice() {
            [] => "?".to_string(),
            [one] => (*one).to_string(),
            many => format!("{{{}}}", many.join("|")),
        }
    }
}
