use crate::engine::{
    CompiledRules, Derivation, NoTrace, RuleMetrics, TraceEvent, TraceLog, TraceSink, WordAnalysis, WordSynthesis,
};
use crate::error::Result;
use crate::pattern::MatchLimits;
use crate::rule::{Blocker, NoBlocking, Rule, RuleEnv};
use std::time::Duration;

/// Options that affect compilation and derivation behavior.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Bound on the work a single match attempt may do.
    pub limits: MatchLimits,
    /// Collect a [`TraceLog`] in the verbose entry points.
    pub trace: bool,
}

/// An ordered rule list split into its two layers.
///
/// Morphological rules apply first in synthesis and are unapplied last in
/// analysis.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub morphological: Vec<Rule>,
    pub phonological: Vec<Rule>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn morphological(mut self, rule: impl Into<Rule>) -> Self {
        self.morphological.push(rule.into());
        self
    }

    pub fn phonological(mut self, rule: impl Into<Rule>) -> Self {
        self.phonological.push(rule.into());
        self
    }

    /// Validate and compile every rule.
    pub fn compile(&self, options: &Options) -> Result<CompiledRules> {
        CompiledRules::new(self, options)
    }
}

/// Result from [`synthesize`] and [`synthesize_with`].
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Surface forms that survived resolution.
    pub forms: Vec<WordSynthesis>,
    pub elapsed: Duration,
}

/// Result from [`analyze`] and [`analyze_with`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Candidate underlying forms, the unanalyzed input included.
    pub candidates: Vec<WordAnalysis>,
    pub elapsed: Duration,
}

/// Additional details returned by the verbose entry points.
///
/// This is meant for debugging and performance inspection without dumping the
/// entire internal state.
#[derive(Debug, Clone)]
pub struct RunDetails {
    pub total: Duration,
    /// Time spent inside rules.
    pub rules_total: Duration,
    /// Per-rule timings and candidate counts, in execution order.
    pub rules: Vec<RuleMetrics>,
    /// Time spent in surface resolution (zero for analysis).
    pub resolve: Duration,
    /// Rules the gates admitted for the input.
    pub active_rules: Vec<String>,
    /// Trace events, when [`Options::trace`] was set at compile time.
    pub trace: Vec<TraceEvent>,
}

#[derive(Debug, Clone)]
pub struct SynthesisVerbose {
    pub forms: Vec<WordSynthesis>,
    pub elapsed: Duration,
    pub details: RunDetails,
}

#[derive(Debug, Clone)]
pub struct AnalysisVerbose {
    pub candidates: Vec<WordAnalysis>,
    pub elapsed: Duration,
    pub details: RunDetails,
}

/// Synthesize `word` through `rules` with nothing blocked.
///
/// # Example
/// ```
/// use morphon::{WordSynthesis, rules::demo, synthesize};
///
/// let word = WordSynthesis::new(demo::inventory().shape("pik").unwrap(), "noun");
/// let out = synthesize(demo::compiled(), word);
/// assert_eq!(demo::inventory().render(&out.forms[0].shape), "pikes");
/// ```
pub fn synthesize(rules: &CompiledRules, word: WordSynthesis) -> SynthesisResult {
    synthesize_with(rules, word, &NoBlocking)
}

/// Synthesize `word`, letting `blocker` veto or replace affixed forms.
pub fn synthesize_with(rules: &CompiledRules, word: WordSynthesis, blocker: &dyn Blocker) -> SynthesisResult {
    let mut trace = NoTrace;
    let mut env = RuleEnv::new(&mut trace, blocker);
    let run = Derivation::new(rules).synthesize(word, &mut env);
    SynthesisResult { forms: run.words, elapsed: run.metrics.total }
}

pub fn analyze(rules: &CompiledRules, word: WordAnalysis) -> AnalysisResult {
    analyze_with(rules, word, &NoBlocking)
}

pub fn analyze_with(rules: &CompiledRules, word: WordAnalysis, blocker: &dyn Blocker) -> AnalysisResult {
    let mut trace = NoTrace;
    let mut env = RuleEnv::new(&mut trace, blocker);
    let run = Derivation::new(rules).analyze(word, &mut env);
    AnalysisResult { candidates: run.words, elapsed: run.metrics.total }
}

/// Synthesize and return extra (compact) debug details.
///
/// The default [`synthesize_with`] path does not allocate these.
pub fn synthesize_verbose_with(rules: &CompiledRules, word: WordSynthesis, blocker: &dyn Blocker) -> SynthesisVerbose {
    let derivation = Derivation::new(rules);
    let active_rules = derivation.active_rule_names(&word).into_iter().map(str::to_string).collect();

    let mut log = TraceLog::default();
    let mut none = NoTrace;
    let sink: &mut dyn TraceSink = if rules.options.trace { &mut log } else { &mut none };
    let mut env = RuleEnv::new(sink, blocker);
    let run = derivation.synthesize(word, &mut env);

    let details = RunDetails {
        total: run.metrics.total,
        rules_total: run.metrics.rules_total(),
        rules: run.metrics.rules,
        resolve: run.metrics.resolve,
        active_rules,
        trace: log.events,
    };
    SynthesisVerbose { forms: run.words, elapsed: details.total, details }
}

/// Analyze and return extra (compact) debug details.
pub fn analyze_verbose_with(rules: &CompiledRules, word: WordAnalysis, blocker: &dyn Blocker) -> AnalysisVerbose {
    let derivation = Derivation::new(rules);
    let active_rules = rules.metas.iter().map(|m| m.name.clone()).collect();

    let mut log = TraceLog::default();
    let mut none = NoTrace;
    let sink: &mut dyn TraceSink = if rules.options.trace { &mut log } else { &mut none };
    let mut env = RuleEnv::new(sink, blocker);
    let run = derivation.analyze(word, &mut env);

    let details = RunDetails {
        total: run.metrics.total,
        rules_total: run.metrics.rules_total(),
        rules: run.metrics.rules,
        resolve: run.metrics.resolve,
        active_rules,
        trace: log.events,
    };
    AnalysisVerbose { candidates: run.words, elapsed: details.total, details }
}
