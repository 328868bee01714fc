//! One segment of a target chain.

use crate::DslError;

/// Property filter attached to a segment: `[Property=Value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    pub property: String,
    pub raw_value: String,
}

/// Parsed form of one target-chain segment.
///
/// `Type[#Name][@StateGroup][[index-or-filter]...]`, every token after
/// the type optional and order-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMatcher {
    pub type_name: String,
    pub instance_name: Option<String>,
    pub state_group: Option<String>,
    /// Position among the parent's children, 1-based.
    pub one_based_index: Option<usize>,
    pub property_filters: Vec<PropertyFilter>,
}

impl ElementMatcher {
    pub fn parse(segment: &str) -> Result<ElementMatcher, DslError> {
        let segment = segment.trim();
        let boundary = |c: char| c == '#' || c == '@' || c == '[';

        let type_end = segment.find(boundary).unwrap_or(segment.len());
        let type_name = segment[..type_end].trim();
        if type_name.is_empty() {
            return Err(DslError::EmptyType);
        }

        let mut matcher = ElementMatcher {
            type_name: type_name.to_string(),
            instance_name: None,
            state_group: None,
            one_based_index: None,
            property_filters: Vec::new(),
        };

        let mut rest = &segment[type_end..];
        while !rest.is_empty() {
            let (token, tail) = rest.split_at(1);
            match token {
                "#" => {
                    if matcher.instance_name.is_some() {
                        return Err(DslError::DuplicateName);
                    }
                    let end = tail.find(boundary).unwrap_or(tail.len());
                    let name = tail[..end].trim();
                    if name.is_empty() {
                        return Err(DslError::EmptyName);
                    }
                    matcher.instance_name = Some(name.to_string());
                    rest = &tail[end..];
                }
                "@" => {
                    if matcher.state_group.is_some() {
                        return Err(DslError::DuplicateStateGroup);
                    }
                    let end = tail.find(boundary).unwrap_or(tail.len());
                    matcher.state_group = Some(tail[..end].trim().to_string());
                    rest = &tail[end..];
                }
                "[" => {
                    let close = tail.find(']').ok_or(DslError::UnterminatedBracket)?;
                    let content = tail[..close].trim();
                    if content.is_empty() {
                        return Err(DslError::EmptyBracket);
                    }
                    if let Ok(index) = content.parse::<usize>() {
                        matcher.one_based_index = Some(index);
                    } else {
                        let eq = content
                            .find('=')
                            .ok_or_else(|| DslError::FilterMissingValue(content.to_string()))?;
                        let property = content[..eq].trim();
                        if property.is_empty() {
                            return Err(DslError::EmptyFilterName);
                        }
                        matcher.property_filters.push(PropertyFilter {
                            property: property.to_string(),
                            raw_value: content[eq + 1..].trim().to_string(),
                        });
                    }
                    rest = &tail[close + 1..];
                    if !rest.is_empty() && !rest.starts_with(boundary) {
                        return Err(DslError::TrailingGarbage(rest.to_string()));
                    }
                }
                _ => unreachable!("loop only continues at a boundary character"),
            }
        }

        Ok(matcher)
    }
}
