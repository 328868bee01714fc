//! Per-element override application and restoration.
//!
//! For every overridden property the engine snapshots the original local
//! value before the first write and restores it when the override is
//! removed or the element leaves the tree. While an override is active,
//! external writes to the property are detected through the host's
//! property-changed notification, adopted as the new baseline and then
//! overridden again. Visual-state transitions re-select the active value
//! per property.
//!
//! Engine-initiated writes set a write-intent flag on the shared state;
//! the property-changed callback bails out when the flag is up, which
//! both suppresses self-reaction and makes reentrant borrows impossible.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use glaze_tree::host::LocalValue;
use glaze_tree::value::Value;
use glaze_tree::{NodeHandle, PropertyId, StateGroupHandle, SubscriptionId};

use crate::brush::BlurBrush;
use crate::materialize::{OverrideValue, PropertyOverrides};
use crate::matching::GroupOverrides;
use crate::session::{DeferredApply, EngineShared};

/// Element and property the host is known to reject early writes on:
/// the taskbar background rectangle's fill must be set from a dispatcher
/// task, after the element has finished entering the tree.
const DEFERRED_TYPE: &str = "Windows.UI.Xaml.Shapes.Rectangle";
const DEFERRED_NAME: &str = "BackgroundFill";
const DEFERRED_PROPERTY: &str = "Fill";

/// Tracking for one overridden property.
#[derive(Default)]
pub(crate) struct PropertyState {
    /// Local value before the engine's first write; `None` until an
    /// override actually lands on the property.
    pub original: Option<Value>,
    /// Currently applied override, `None` while no state selects one.
    pub custom: Option<OverrideValue>,
    pub changed_sub: Option<SubscriptionId>,
}

pub(crate) struct GroupState {
    pub props: HashMap<PropertyId, PropertyState>,
}

/// One visual-state group's worth of overrides on one element.
pub(crate) struct GroupCustomization {
    pub group: Option<StateGroupHandle>,
    pub state: Rc<RefCell<GroupState>>,
    pub state_sub: Option<SubscriptionId>,
}

/// Everything the engine holds for one customized element.
pub(crate) struct NodeCustomization {
    pub groups: Vec<GroupCustomization>,
}

/// Reads the local value, falling back to the animation base value when
/// the local slot holds a pass-through binding expression.
pub(crate) fn read_local_value(
    shared: &EngineShared,
    node: NodeHandle,
    property: PropertyId,
) -> Option<Value> {
    match shared.tree.read_local_value(node, property) {
        Ok(LocalValue::Value(v)) => Some(v),
        Ok(LocalValue::Unset) => Some(Value::Unset),
        Ok(LocalValue::BindingExpression) => {
            shared.tree.animation_base_value(node, property).ok()
        }
        Err(e) => {
            warn!(node = ?node, property = ?property, error = %e, "local value unreadable");
            None
        }
    }
}

/// Applies one group's overrides to an element and wires up the
/// callbacks that keep them applied.
pub(crate) fn apply_group(
    shared: &Rc<EngineShared>,
    node: NodeHandle,
    group_overrides: GroupOverrides,
) -> GroupCustomization {
    let GroupOverrides { group, overrides } = group_overrides;
    let overrides = Rc::new(overrides);
    let current = group
        .and_then(|g| shared.tree.current_state(g))
        .unwrap_or_default();

    let state = Rc::new(RefCell::new(GroupState { props: HashMap::new() }));

    for (property, values) in overrides.iter() {
        let mut prop_state = PropertyState::default();

        if let Some(value) = values.get(&current).or_else(|| values.get("")) {
            prop_state.original = read_local_value(shared, node, *property);
            prop_state.custom = Some(value.clone());
            set_or_clear_value(shared, node, *property, value, true);
        }

        // The callback is registered even for properties no state
        // currently selects, so a later transition can activate them.
        let sub = shared.tree.register_property_changed(
            node,
            *property,
            make_property_changed_callback(shared, state.clone()),
        );
        prop_state.changed_sub = Some(sub);
        state.borrow_mut().props.insert(*property, prop_state);
    }

    let state_sub = group.map(|g| {
        shared.tree.register_state_changed(
            g,
            make_state_changed_callback(shared, node, overrides.clone(), state.clone()),
        )
    });

    GroupCustomization { group, state, state_sub }
}

fn make_property_changed_callback(
    shared: &Rc<EngineShared>,
    state: Rc<RefCell<GroupState>>,
) -> Rc<dyn Fn(NodeHandle, PropertyId)> {
    let shared = shared.clone();
    Rc::new(move |node, property| {
        if shared.writing.get() {
            return;
        }
        let custom = {
            let mut group_state = state.borrow_mut();
            let Some(prop_state) = group_state.props.get_mut(&property) else {
                return;
            };
            let Some(custom) = prop_state.custom.clone() else {
                return;
            };
            // An external write becomes the value restored later, unless
            // it merely echoes the override back.
            if let OverrideValue::Plain(custom_value) = &custom {
                if let Some(local) = read_local_value(&shared, node, property) {
                    if local != *custom_value {
                        prop_state.original = Some(local);
                    }
                }
            }
            custom
        };
        debug!(node = ?node, property = ?property, "overriding external property write");
        set_or_clear_value(&shared, node, property, &custom, false);
    })
}

fn make_state_changed_callback(
    shared: &Rc<EngineShared>,
    node: NodeHandle,
    overrides: Rc<PropertyOverrides>,
    state: Rc<RefCell<GroupState>>,
) -> Rc<dyn Fn(Option<&str>, Option<&str>)> {
    let shared = shared.clone();
    Rc::new(move |old, new| {
        if !shared.tree.resolve(node) {
            return;
        }
        let old_name = old.unwrap_or("");
        let new_name = new.unwrap_or("");
        debug!(node = ?node, old = old_name, new = new_name, "visual state transition");

        let mut group_state = state.borrow_mut();
        for (property, values) in overrides.iter() {
            let Some(prop_state) = group_state.props.get_mut(property) else {
                continue;
            };
            let selected = match values.get(new_name) {
                Some(value) => Some(value),
                None => match values.get("") {
                    // The default only takes over when the state being
                    // left had an explicit entry; otherwise the default
                    // is already in force.
                    Some(_) if !values.contains_key(old_name) => continue,
                    Some(default) => Some(default),
                    None => None,
                },
            };
            match selected {
                Some(value) => {
                    if prop_state.original.is_none() {
                        prop_state.original = read_local_value(&shared, node, *property);
                    }
                    prop_state.custom = Some(value.clone());
                    set_or_clear_value(&shared, node, *property, value, false);
                }
                None => {
                    if let Some(original) = prop_state.original.take() {
                        set_or_clear_value(
                            &shared,
                            node,
                            *property,
                            &OverrideValue::Plain(original),
                            false,
                        );
                    }
                    prop_state.custom = None;
                }
            }
        }
    })
}

/// Unregisters a group's callbacks and writes the original values back.
pub(crate) fn restore_group(
    shared: &Rc<EngineShared>,
    node: NodeHandle,
    customization: &GroupCustomization,
) {
    let element_alive = shared.tree.resolve(node);
    let mut group_state = customization.state.borrow_mut();
    for (property, prop_state) in group_state.props.drain() {
        if !element_alive {
            continue;
        }
        if let Some(sub) = prop_state.changed_sub {
            shared.tree.unregister_property_changed(node, property, sub);
        }
        if let Some(original) = prop_state.original {
            set_or_clear_value(shared, node, property, &OverrideValue::Plain(original), false);
        }
    }
    drop(group_state);
    if let (Some(group), Some(sub)) = (customization.group, customization.state_sub) {
        if shared.tree.resolve_state_group(group) {
            shared.tree.unregister_state_changed(group, sub);
        }
    }
}

/// Writes an override (or original) value to the element, routing
/// through the dispatcher for the known-fragile target on first apply.
pub(crate) fn set_or_clear_value(
    shared: &Rc<EngineShared>,
    node: NodeHandle,
    property: PropertyId,
    value: &OverrideValue,
    initial_apply: bool,
) {
    let value = match value {
        OverrideValue::Plain(v) => v.clone(),
        OverrideValue::Blur(spec) => Value::Brush(BlurBrush::create(
            spec.clone(),
            shared.theme_colors.clone(),
            shared.compositor.clone(),
        )),
    };

    if is_deferred_target(shared, node, property) {
        cancel_deferred(shared, node);
        if initial_apply && !value.is_unset() {
            debug!(node = ?node, "deferring background fill write to dispatcher");
            let cancelled = Rc::new(Cell::new(false));
            shared
                .deferred
                .borrow_mut()
                .push(DeferredApply { node, cancelled: cancelled.clone() });
            let task_shared = shared.clone();
            shared.dispatcher.post(Box::new(move || {
                if cancelled.get() {
                    return;
                }
                task_shared
                    .deferred
                    .borrow_mut()
                    .retain(|d| !Rc::ptr_eq(&d.cancelled, &cancelled));
                if !task_shared.tree.resolve(node) {
                    return;
                }
                write_value(&task_shared, node, property, value);
            }));
            return;
        }
    }

    write_value(shared, node, property, value);
}

fn write_value(shared: &EngineShared, node: NodeHandle, property: PropertyId, value: Value) {
    shared.writing.set(true);
    let result = if value.is_unset() {
        shared.tree.clear_value(node, property)
    } else {
        shared.tree.set_value(node, property, value)
    };
    shared.writing.set(false);
    if let Err(e) = result {
        warn!(node = ?node, property = ?property, error = %e, "property write failed");
    }
}

fn is_deferred_target(shared: &EngineShared, node: NodeHandle, property: PropertyId) -> bool {
    if shared.tree.property_name(property).as_deref() != Some(DEFERRED_PROPERTY) {
        return false;
    }
    shared.tree.type_name(node).as_deref() == Some(DEFERRED_TYPE)
        && shared.tree.instance_name(node).as_deref() == Some(DEFERRED_NAME)
}

/// Cancels any queued deferred write for `node`.
pub(crate) fn cancel_deferred(shared: &EngineShared, node: NodeHandle) {
    shared.deferred.borrow_mut().retain(|d| {
        if d.node == node {
            d.cancelled.set(true);
            false
        } else {
            true
        }
    });
}

/// Cancels every queued deferred write.
pub(crate) fn cancel_all_deferred(shared: &EngineShared) {
    for deferred in shared.deferred.borrow_mut().drain(..) {
        deferred.cancelled.set(true);
    }
}
