//! Matches live elements against the rule registry.
//!
//! Matching runs once per element, when the tree-change observer reports
//! it. The leaf matcher is tested against the element itself, then the
//! remaining matchers walk strictly upward through the ancestors with no
//! skipping.

use std::collections::HashSet;

use tracing::{debug, warn};

use glaze_tree::host::LocalValue;
use glaze_tree::value::Value;
use glaze_tree::{NodeHandle, PropertyId, StateGroupHandle};

use crate::materialize::{FALLBACK_BASE_TYPE, PropertyOverrides};
use crate::registry::{CompiledRule, RuleRegistry};
use crate::session::EngineShared;

/// Overrides claimed for one element, grouped by the visual-state group
/// the contributing rules named (`None` for stateless rules).
pub struct GroupOverrides {
    pub group: Option<StateGroupHandle>,
    pub overrides: PropertyOverrides,
}

/// Collects the overrides every matching rule contributes to `node`.
///
/// Rules are visited newest-first and a property is claimed by the first
/// rule that provides it, so the most recently added rule wins each
/// property across the whole registry.
pub fn find_property_overrides(
    shared: &EngineShared,
    registry: &RuleRegistry,
    node: NodeHandle,
    fallback_class: &str,
) -> Vec<GroupOverrides> {
    let mut result: Vec<GroupOverrides> = Vec::new();
    let mut claimed: HashSet<PropertyId> = HashSet::new();

    for rule in registry.iter_newest_first() {
        let mut group: Option<StateGroupHandle> = None;
        if !test_rule_chain(shared, rule, node, fallback_class, &mut group) {
            continue;
        }
        debug!(target_chain = %rule.rule.target, node = ?node, "rule matched");

        let overrides = rule.resolved_overrides(&*shared.parser, fallback_class);
        if overrides.is_empty() {
            continue;
        }

        let position = match result.iter().position(|g| g.group == group) {
            Some(position) => position,
            None => {
                result.push(GroupOverrides { group, overrides: PropertyOverrides::new() });
                result.len() - 1
            }
        };
        let entry = &mut result[position];
        for (property, values) in overrides.iter() {
            if claimed.insert(*property) {
                entry.overrides.insert(*property, values.clone());
            }
        }
    }

    result.retain(|g| !g.overrides.is_empty());
    result
}

fn test_rule_chain(
    shared: &EngineShared,
    rule: &CompiledRule,
    node: NodeHandle,
    fallback_class: &str,
    group: &mut Option<StateGroupHandle>,
) -> bool {
    let mut current = Some(node);
    for (index, _) in rule.rule.matchers.iter().enumerate() {
        let Some(element) = current else { return false };
        // Only the reported element gets the wire-level fallback type;
        // ancestors are compared against their runtime type alone.
        let fallback = if index == 0 { Some(fallback_class) } else { None };
        if !test_matcher(shared, rule, index, element, fallback, group) {
            return false;
        }
        current = shared.tree.parent(element);
    }
    true
}

fn test_matcher(
    shared: &EngineShared,
    rule: &CompiledRule,
    index: usize,
    element: NodeHandle,
    fallback_class: Option<&str>,
    group: &mut Option<StateGroupHandle>,
) -> bool {
    let matcher = &rule.rule.matchers[index];
    let tree = &shared.tree;

    let Some(type_name) = tree.type_name(element) else {
        return false;
    };
    if matcher.type_name != type_name
        && fallback_class.is_none_or(|f| matcher.type_name != f)
    {
        return false;
    }

    if let Some(expected_name) = &matcher.instance_name {
        let name = tree.instance_name(element).unwrap_or_default();
        if &name != expected_name {
            return false;
        }
    }

    if let Some(index) = matcher.one_based_index {
        let Some(parent) = tree.parent(element) else { return false };
        let siblings = tree.children(parent);
        if index == 0 || siblings.get(index - 1) != Some(&element) {
            return false;
        }
    }

    if !matcher.property_filters.is_empty() {
        let filters = rule.resolved_filters(
            index,
            &*shared.parser,
            fallback_class.unwrap_or(FALLBACK_BASE_TYPE),
        );
        // Filters that failed to materialize can never match.
        if filters.is_empty() {
            return false;
        }
        for (property, expected) in filters.iter() {
            if !property_filter_matches(shared, element, *property, expected) {
                return false;
            }
        }
    }

    if let Some(group_name) = &matcher.state_group {
        *group = tree.state_group(element, group_name);
    }

    true
}

/// Compares the element's local value to the filter's expected value.
/// The value must be readable and of a comparable type; anything else is
/// a non-match.
fn property_filter_matches(
    shared: &EngineShared,
    element: NodeHandle,
    property: PropertyId,
    expected: &Value,
) -> bool {
    let local = match shared.tree.read_local_value(element, property) {
        Ok(LocalValue::Value(v)) => v,
        Ok(LocalValue::BindingExpression) => {
            match shared.tree.animation_base_value(element, property) {
                Ok(v) => v,
                Err(_) => return false,
            }
        }
        Ok(LocalValue::Unset) | Err(_) => return false,
    };
    match (expected, &local) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Double(a), Value::Double(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Keyword(a), Value::Keyword(b)) => a == b,
        (Value::Color(a), Value::Color(b)) => a == b,
        _ => {
            warn!(
                expected = ?expected,
                actual = ?local,
                "unsupported property filter comparison"
            );
            false
        }
    }
}
