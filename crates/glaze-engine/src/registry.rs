//! Rule registry with lazy, cached materialization.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use glaze_dsl::Rule;
use glaze_tree::host::StyleParser;
use glaze_tree::value::Value;
use glaze_tree::PropertyId;

use crate::materialize::{
    PropertyOverrides, resolve_property_filters, resolve_property_overrides,
};

/// A rule plus its lazily materialized host-typed form.
///
/// Both caches fill on first use and also cache failure as an empty
/// result, so a rule that cannot materialize is skipped cheaply from
/// then on. The fallback type of the first materialization sticks.
pub struct CompiledRule {
    pub rule: Rule,
    overrides: RefCell<Option<Rc<PropertyOverrides>>>,
    filters: Vec<RefCell<Option<Rc<Vec<(PropertyId, Value)>>>>>,
}

impl CompiledRule {
    pub fn new(rule: Rule) -> CompiledRule {
        let filters = rule.matchers.iter().map(|_| RefCell::new(None)).collect();
        CompiledRule { rule, overrides: RefCell::new(None), filters }
    }

    /// Materialized override values for this rule's leaf type.
    pub fn resolved_overrides(
        &self,
        parser: &dyn StyleParser,
        fallback_type: &str,
    ) -> Rc<PropertyOverrides> {
        if let Some(cached) = self.overrides.borrow().as_ref() {
            return cached.clone();
        }
        let resolved = resolve_property_overrides(
            parser,
            &self.rule.leaf().type_name,
            fallback_type,
            &self.rule.styles,
        )
        .unwrap_or_else(|e| {
            warn!(target_chain = %self.rule.target, error = %e, "rule failed to materialize");
            PropertyOverrides::new()
        });
        let resolved = Rc::new(resolved);
        *self.overrides.borrow_mut() = Some(resolved.clone());
        resolved
    }

    /// Typed expected values for the property filters of one matcher.
    pub fn resolved_filters(
        &self,
        matcher_index: usize,
        parser: &dyn StyleParser,
        fallback_type: &str,
    ) -> Rc<Vec<(PropertyId, Value)>> {
        if let Some(cached) = self.filters[matcher_index].borrow().as_ref() {
            return cached.clone();
        }
        let matcher = &self.rule.matchers[matcher_index];
        let resolved = resolve_property_filters(
            parser,
            &matcher.type_name,
            fallback_type,
            &matcher.property_filters,
        )
        .unwrap_or_else(|e| {
            warn!(
                target_chain = %self.rule.target,
                matcher_type = %matcher.type_name,
                error = %e,
                "property filters failed to materialize"
            );
            Vec::new()
        });
        let resolved = Rc::new(resolved);
        *self.filters[matcher_index].borrow_mut() = Some(resolved.clone());
        resolved
    }
}

/// Insertion-ordered rule collection, matched newest-first so the most
/// recently added rule claims each property.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<CompiledRule>,
}

impl RuleRegistry {
    pub fn new() -> RuleRegistry {
        RuleRegistry::default()
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.push(CompiledRule::new(rule));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn iter_newest_first(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().rev()
    }
}
