//! One style line of a rule.

use crate::DslError;

/// Parsed form of `Property[@State][:]=Value`.
///
/// A trailing `:` on the name marks the value as a markup fragment. An
/// empty markup value is the explicit-clear form: it erases the local
/// value instead of writing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleLine {
    pub property: String,
    /// Visual state the value applies in; empty means stateless default.
    pub state: String,
    pub raw_value: String,
    pub is_markup: bool,
}

impl StyleLine {
    pub fn parse(line: &str) -> Result<StyleLine, DslError> {
        let eq = line
            .find('=')
            .ok_or_else(|| DslError::StyleMissingValue(line.to_string()))?;
        let mut name = line[..eq].trim();
        let raw_value = line[eq + 1..].trim().to_string();

        let is_markup = if let Some(stripped) = name.strip_suffix(':') {
            name = stripped.trim_end();
            true
        } else {
            false
        };

        let (property, state) = match name.find('@') {
            Some(at) => (name[..at].trim_end(), name[at + 1..].trim_start()),
            None => (name, ""),
        };
        if property.is_empty() {
            return Err(DslError::EmptyStyleName);
        }

        Ok(StyleLine {
            property: property.to_string(),
            state: state.to_string(),
            raw_value,
            is_markup,
        })
    }

    /// Whether this is the explicit-clear form (`Property:=`).
    pub fn is_explicit_clear(&self) -> bool {
        self.is_markup && self.raw_value.is_empty()
    }
}
