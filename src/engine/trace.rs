//! Derivation tracing.
//!
//! Rules report what they did to a [`TraceSink`] passed in by the caller. The
//! default sink is [`NoTrace`]; rules check [`TraceSink::enabled`] before
//! building an event so that a disabled trace costs nothing.

use crate::shape::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceDirection {
    Synthesis,
    Analysis,
}

#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub rule: String,
    pub direction: TraceDirection,
    pub input: Shape,
    /// `None` when the application was vetoed.
    pub output: Option<Shape>,
    /// Allomorph id, for affix subrules.
    pub allomorph: Option<String>,
}

pub trait TraceSink {
    fn enabled(&self) -> bool;
    fn record(&mut self, event: TraceEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn enabled(&self) -> bool {
        false
    }

    fn record(&mut self, _event: TraceEvent) {}
}

/// Collects every event in order.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for TraceLog {
    fn enabled(&self) -> bool {
        true
    }

    fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}
