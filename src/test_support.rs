//! Fixtures shared by unit tests.

use crate::feature::{FeatureStruct, FeatureSystem};
use crate::rules::demo;
use crate::shape::Shape;

pub(crate) fn system() -> &'static FeatureSystem {
    demo::system()
}

/// Parse a feature literal, panicking with the notation error.
pub(crate) fn fs(system: &FeatureSystem, text: &str) -> FeatureStruct {
    system.parse(text).unwrap_or_else(|err| panic!("bad literal {text}: {err}"))
}

/// Build a shape from demo inventory symbols.
pub(crate) fn word(text: &str) -> Shape {
    demo::inventory().shape(text).unwrap_or_else(|err| panic!("bad word {text}: {err}"))
}
