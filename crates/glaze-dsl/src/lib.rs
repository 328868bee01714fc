//! Glaze DSL - Selector & Style Parser
//!
//! Parses the textual rule language into structured form:
//!
//! - target chains: `Type[#Name][@StateGroup][[filter]...] > Type...`
//! - style lines: `Property[@State][:]=Value`
//! - style constants: `$name=value` with textual substitution
//!
//! Parsing is purely syntactic. Resolving type names against the host,
//! materializing values and matching live elements happen downstream.

pub mod constants;
pub mod matcher;
pub mod rule;
pub mod style;

pub use constants::StyleConstants;
pub use matcher::{ElementMatcher, PropertyFilter};
pub use rule::{Rule, adjust_type_name};
pub use style::StyleLine;

use thiserror::Error;

/// Errors produced while parsing the rule language.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DslError {
    #[error("target segment has an empty type name")]
    EmptyType,
    #[error("target segment has more than one #Name token")]
    DuplicateName,
    #[error("target segment has an empty #Name token")]
    EmptyName,
    #[error("target chain names more than one @StateGroup")]
    DuplicateStateGroup,
    #[error("unterminated [ ... ] token in target segment")]
    UnterminatedBracket,
    #[error("empty [ ... ] token in target segment")]
    EmptyBracket,
    #[error("property filter is missing '=': {0}")]
    FilterMissingValue(String),
    #[error("property filter has an empty property name")]
    EmptyFilterName,
    #[error("unexpected text after ']' in target segment: {0}")]
    TrailingGarbage(String),
    #[error("style line is missing '=': {0}")]
    StyleMissingValue(String),
    #[error("style line has an empty property name")]
    EmptyStyleName,
    #[error("target chain is empty")]
    EmptyChain,
}
