//! Rule variants and the traits the engine drives them through.
//!
//! A [`Rule`] is a declarative description. Compiling it (once, validated)
//! yields two runtime objects: a [`SynthesisRule`] that applies the rule and
//! an [`AnalysisRule`] that reverses it.
//!
//! ```text
//! Rule ──compile_synthesis──▶ Box<dyn SynthesisRule>  apply:   WordSynthesis ─▶ Vec<WordSynthesis>
//!      └─compile_analysis───▶ Box<dyn AnalysisRule>   unapply: WordAnalysis  ─▶ Vec<WordAnalysis>
//! ```
//!
//! An empty result means "did not apply". Compiled rules are immutable and
//! can be shared across threads.

use crate::api::Options;
use crate::engine::{AffixRule, MetathesisRule, RewriteRule, TraceSink, WordAnalysis, WordSynthesis};
use crate::error::Result;
use crate::pattern::Pattern;

/// Decides whether a freshly synthesized word is blocked by an existing form.
pub trait Blocker {
    /// `None` vetoes the candidate; otherwise the (possibly replaced) word.
    fn check_blocking(&self, rule: &str, candidate: WordSynthesis) -> Option<WordSynthesis>;
}

/// Blocks nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlocking;

impl Blocker for NoBlocking {
    fn check_blocking(&self, _rule: &str, candidate: WordSynthesis) -> Option<WordSynthesis> {
        Some(candidate)
    }
}

/// Per-call collaborators handed to every rule.
pub struct RuleEnv<'a> {
    pub trace: &'a mut dyn TraceSink,
    pub blocker: &'a dyn Blocker,
}

impl<'a> RuleEnv<'a> {
    pub fn new(trace: &'a mut dyn TraceSink, blocker: &'a dyn Blocker) -> Self {
        Self { trace, blocker }
    }
}

pub trait SynthesisRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, word: &WordSynthesis, env: &mut RuleEnv<'_>) -> Vec<WordSynthesis>;
}

pub trait AnalysisRule: Send + Sync {
    fn name(&self) -> &str;
    fn unapply(&self, word: &WordAnalysis, env: &mut RuleEnv<'_>) -> Vec<WordAnalysis>;
}

pub trait CompileRule {
    fn name(&self) -> &str;
    fn compile_synthesis(&self, options: &Options) -> Result<Box<dyn SynthesisRule>>;
    fn compile_analysis(&self, options: &Options) -> Result<Box<dyn AnalysisRule>>;
    /// Visit every pattern the rule is built from.
    fn traverse(&self, visit: &mut dyn FnMut(&Pattern));
}

#[derive(Debug, Clone)]
pub enum Rule {
    Rewrite(RewriteRule),
    Metathesis(MetathesisRule),
    Affix(AffixRule),
}

impl Rule {
    fn inner(&self) -> &dyn CompileRule {
        match self {
            Rule::Rewrite(r) => r,
            Rule::Metathesis(r) => r,
            Rule::Affix(r) => r,
        }
    }
}

impl CompileRule for Rule {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn compile_synthesis(&self, options: &Options) -> Result<Box<dyn SynthesisRule>> {
        self.inner().compile_synthesis(options)
    }

    fn compile_analysis(&self, options: &Options) -> Result<Box<dyn AnalysisRule>> {
        self.inner().compile_analysis(options)
    }

    fn traverse(&self, visit: &mut dyn FnMut(&Pattern)) {
        self.inner().traverse(visit)
    }
}

impl From<RewriteRule> for Rule {
    fn from(rule: RewriteRule) -> Self {
        Rule::Rewrite(rule)
    }
}

impl From<MetathesisRule> for Rule {
    fn from(rule: MetathesisRule) -> Self {
        Rule::Metathesis(rule)
    }
}

impl From<AffixRule> for Rule {
    fn from(rule: AffixRule) -> Self {
        Rule::Affix(rule)
    }
}
