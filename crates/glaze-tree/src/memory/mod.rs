//! In-memory host implementation.
//!
//! `MemoryTree` is a full host built on an arena of linked nodes. It
//! implements every boundary trait the engine needs, delivers callbacks
//! synchronously on the calling thread, and exposes enough inspection
//! surface for integration tests to assert on effective values, brush
//! resources and deferred work.

mod services;

pub use services::{
    MemoryCompositor, MemoryDiagnostics, MemoryDispatcher, MemorySettings, MemoryThemeColors,
};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::host::{
    HostContext, LocalValue, ParseFacilityError, ResolvedSetter, SetterLine, StyleParser,
    TreeError, TreeEventSink, TreeHost,
};
use crate::value::Value;
use crate::{NodeHandle, PropertyId, StateGroupHandle, SubscriptionId};

const NONE: usize = usize::MAX;

struct MemoryNode {
    alive: bool,
    type_name: String,
    name: String,
    parent: usize,
    first_child: usize,
    last_child: usize,
    prev_sibling: usize,
    next_sibling: usize,
    locals: HashMap<u32, Value>,
    /// Binding base values: the local slot reads back as a binding
    /// expression while an entry is present and no local value shadows it.
    bindings: HashMap<u32, Value>,
    prop_subs: HashMap<u32, Vec<(u64, Rc<dyn Fn(NodeHandle, PropertyId)>)>>,
    /// State-group name to global group id.
    groups: HashMap<String, u64>,
}

struct GroupData {
    alive: bool,
    current: Option<String>,
    subs: Vec<(u64, Rc<dyn Fn(Option<&str>, Option<&str>)>)>,
}

#[derive(Default)]
struct TreeData {
    nodes: Vec<MemoryNode>,
    groups: HashMap<u64, GroupData>,
    /// Property name interner; ids are stable for the tree's lifetime.
    prop_names: Vec<String>,
    prop_ids: HashMap<String, u32>,
}

impl TreeData {
    fn node(&self, handle: NodeHandle) -> Option<&MemoryNode> {
        self.nodes.get(handle.0 as usize).filter(|n| n.alive)
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(handle.0 as usize).filter(|n| n.alive)
    }

    fn intern_property(&mut self, name: &str) -> u32 {
        if let Some(id) = self.prop_ids.get(name) {
            return *id;
        }
        let id = self.prop_names.len() as u32;
        self.prop_names.push(name.to_string());
        self.prop_ids.insert(name.to_string(), id);
        id
    }
}

/// Arena-backed host tree with synchronous callback delivery.
pub struct MemoryTree {
    data: RefCell<TreeData>,
    /// Types the setter-parsing facility can resolve from text. A node's
    /// runtime type is deliberately not auto-registered: an element can
    /// exist in the tree while its type stays unresolvable to the parser.
    parsable_types: RefCell<Vec<String>>,
    sink: RefCell<Option<Weak<dyn TreeEventSink>>>,
    next_sub: Cell<u64>,
    next_group: Cell<u64>,
    compositor: Rc<MemoryCompositor>,
    theme: Rc<MemoryThemeColors>,
    dispatcher: Rc<MemoryDispatcher>,
    diagnostics: Arc<MemoryDiagnostics>,
}

impl MemoryTree {
    pub fn new() -> Rc<MemoryTree> {
        Rc::new(MemoryTree {
            data: RefCell::new(TreeData::default()),
            parsable_types: RefCell::new(Vec::new()),
            sink: RefCell::new(None),
            next_sub: Cell::new(1),
            next_group: Cell::new(1),
            compositor: Rc::new(MemoryCompositor::new()),
            theme: Rc::new(MemoryThemeColors::new()),
            dispatcher: Rc::new(MemoryDispatcher::new()),
            diagnostics: Arc::new(MemoryDiagnostics::new()),
        })
    }

    /// Bundles this host's services for engine construction.
    pub fn context(self: &Rc<Self>) -> HostContext {
        HostContext {
            tree: self.clone(),
            parser: self.clone(),
            theme_colors: self.theme.clone(),
            compositor: self.compositor.clone(),
            dispatcher: self.dispatcher.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    pub fn compositor(&self) -> &Rc<MemoryCompositor> {
        &self.compositor
    }

    pub fn theme_colors(&self) -> &Rc<MemoryThemeColors> {
        &self.theme
    }

    pub fn diagnostics(&self) -> &Arc<MemoryDiagnostics> {
        &self.diagnostics
    }

    /// Makes a type name resolvable by the setter-parsing facility.
    pub fn register_parsable_type(&self, type_name: &str) {
        let mut types = self.parsable_types.borrow_mut();
        if !types.iter().any(|t| t == type_name) {
            types.push(type_name.to_string());
        }
    }

    pub fn create_root(&self, type_name: &str, name: &str) -> NodeHandle {
        self.insert_node(type_name, name, NONE)
    }

    /// Creates an element under `parent` and reports it on the
    /// diagnostics channel.
    pub fn create_element(&self, parent: NodeHandle, type_name: &str, name: &str) -> NodeHandle {
        let handle = self.stage_element(parent, type_name, name);
        self.announce_element(handle);
        handle
    }

    /// Creates an element without reporting it, so properties, bindings
    /// and state groups can be set up first, the way template inflation
    /// finishes before the diagnostics channel sees the element.
    pub fn stage_element(&self, parent: NodeHandle, type_name: &str, name: &str) -> NodeHandle {
        self.insert_node(type_name, name, parent.0 as usize)
    }

    /// Reports a staged element on the diagnostics channel.
    pub fn announce_element(&self, node: NodeHandle) {
        self.fire_added(node, None);
    }

    /// Reports a staged element under a different wire-level type name,
    /// the way diagnostics channels report a base class for types the
    /// markup system cannot resolve.
    pub fn announce_element_as(&self, node: NodeHandle, wire_type: &str) {
        self.fire_added(node, Some(wire_type));
    }

    fn insert_node(&self, type_name: &str, name: &str, parent: usize) -> NodeHandle {
        let mut data = self.data.borrow_mut();
        let idx = data.nodes.len();
        data.nodes.push(MemoryNode {
            alive: true,
            type_name: type_name.to_string(),
            name: name.to_string(),
            parent,
            first_child: NONE,
            last_child: NONE,
            prev_sibling: NONE,
            next_sibling: NONE,
            locals: HashMap::new(),
            bindings: HashMap::new(),
            prop_subs: HashMap::new(),
            groups: HashMap::new(),
        });
        if parent != NONE {
            let prev_last = data.nodes[parent].last_child;
            data.nodes[parent].last_child = idx;
            if prev_last == NONE {
                data.nodes[parent].first_child = idx;
            } else {
                data.nodes[prev_last].next_sibling = idx;
                data.nodes[idx].prev_sibling = prev_last;
            }
        }
        NodeHandle(idx as u64)
    }

    /// Detaches a subtree and reports every element in it as removed.
    /// The element objects stay resolvable until destroyed, matching
    /// hosts where removal from the tree does not free the element.
    pub fn remove_element(&self, node: NodeHandle) {
        let removed = {
            let mut data = self.data.borrow_mut();
            let idx = node.0 as usize;
            if data.node(node).is_none() {
                return;
            }
            let parent = data.nodes[idx].parent;
            if parent != NONE {
                let prev = data.nodes[idx].prev_sibling;
                let next = data.nodes[idx].next_sibling;
                if prev != NONE {
                    data.nodes[prev].next_sibling = next;
                } else {
                    data.nodes[parent].first_child = next;
                }
                if next != NONE {
                    data.nodes[next].prev_sibling = prev;
                } else {
                    data.nodes[parent].last_child = prev;
                }
                data.nodes[idx].parent = NONE;
                data.nodes[idx].prev_sibling = NONE;
                data.nodes[idx].next_sibling = NONE;
            }
            collect_subtree(&data, idx)
        };
        for idx in removed {
            self.fire_removed(NodeHandle(idx as u64));
        }
    }

    /// Frees an element so its handle dangles. For testing defensive
    /// handle resolution; real hosts do this on their own schedule.
    pub fn destroy_element(&self, node: NodeHandle) {
        let mut data = self.data.borrow_mut();
        let idx = node.0 as usize;
        if data.node(node).is_none() {
            return;
        }
        for sub_idx in collect_subtree(&data, idx) {
            let group_ids: Vec<u64> = data.nodes[sub_idx].groups.values().copied().collect();
            for gid in group_ids {
                if let Some(g) = data.groups.get_mut(&gid) {
                    g.alive = false;
                }
            }
            data.nodes[sub_idx].alive = false;
        }
    }

    /// Declares a visual-state group on an element.
    pub fn add_state_group(&self, node: NodeHandle, name: &str) -> StateGroupHandle {
        let gid = self.next_group.get();
        self.next_group.set(gid + 1);
        let mut data = self.data.borrow_mut();
        data.groups.insert(
            gid,
            GroupData { alive: true, current: None, subs: Vec::new() },
        );
        if let Some(n) = data.node_mut(node) {
            n.groups.insert(name.to_string(), gid);
        }
        StateGroupHandle(gid)
    }

    /// Transitions a group to a new state and notifies subscribers.
    pub fn set_current_state(&self, group: StateGroupHandle, state: Option<&str>) {
        let (old, subs) = {
            let mut data = self.data.borrow_mut();
            let Some(g) = data.groups.get_mut(&group.0).filter(|g| g.alive) else {
                return;
            };
            let old = g.current.take();
            g.current = state.map(str::to_string);
            (old, g.subs.clone())
        };
        for (_, cb) in subs {
            cb(old.as_deref(), state);
        }
    }

    /// Installs a binding base value. The local slot reads back as a
    /// binding expression until a local value shadows it.
    pub fn set_binding(&self, node: NodeHandle, property: PropertyId, base: Value) {
        if let Some(n) = self.data.borrow_mut().node_mut(node) {
            n.bindings.insert(property.0, base);
        }
    }

    /// Interns a property name, for direct test access.
    pub fn property_id(&self, name: &str) -> PropertyId {
        PropertyId(self.data.borrow_mut().intern_property(name))
    }

    /// The value an observer of the element would see.
    pub fn effective_value(&self, node: NodeHandle, property: PropertyId) -> Value {
        let data = self.data.borrow();
        let Some(n) = data.node(node) else {
            return Value::Unset;
        };
        if let Some(v) = n.locals.get(&property.0) {
            return v.clone();
        }
        n.bindings.get(&property.0).cloned().unwrap_or(Value::Unset)
    }

    /// Runs queued dispatcher tasks until the queue drains.
    pub fn run_deferred_tasks(&self) {
        self.dispatcher.run_all();
    }

    fn fire_added(&self, node: NodeHandle, wire_type: Option<&str>) {
        if !self.diagnostics.is_advised() {
            return;
        }
        let Some(sink) = self.upgrade_sink() else { return };
        let type_name = match self.data.borrow().node(node) {
            Some(n) => wire_type.unwrap_or(&n.type_name).to_string(),
            None => return,
        };
        sink.node_added(node, &type_name);
    }

    fn fire_removed(&self, node: NodeHandle) {
        if !self.diagnostics.is_advised() {
            return;
        }
        if let Some(sink) = self.upgrade_sink() {
            sink.node_removed(node);
        }
    }

    fn upgrade_sink(&self) -> Option<Rc<dyn TreeEventSink>> {
        self.sink.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn write_value(
        &self,
        node: NodeHandle,
        property: PropertyId,
        value: Option<Value>,
    ) -> Result<(), TreeError> {
        let (old, changed, subs) = {
            let mut data = self.data.borrow_mut();
            let n = data.node_mut(node).ok_or(TreeError::DanglingHandle)?;
            let old = match &value {
                Some(v) => n.locals.insert(property.0, v.clone()),
                None => n.locals.remove(&property.0),
            };
            let changed = old.as_ref() != value.as_ref();
            let subs = if changed {
                n.prop_subs.get(&property.0).cloned().unwrap_or_default()
            } else {
                Vec::new()
            };
            (old, changed, subs)
        };
        if !changed {
            return Ok(());
        }
        // Brush lifecycle mirrors hosts that connect composition brushes
        // when they land on a rendered property.
        if let Some(Value::Brush(brush)) = &old {
            brush.on_disconnected();
        }
        if let Some(Value::Brush(brush)) = &value {
            brush.on_connected();
        }
        for (_, cb) in subs {
            cb(node, property);
        }
        Ok(())
    }
}

fn collect_subtree(data: &TreeData, root: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        if !data.nodes[idx].alive {
            continue;
        }
        out.push(idx);
        let mut child = data.nodes[idx].first_child;
        while child != NONE {
            stack.push(child);
            child = data.nodes[child].next_sibling;
        }
    }
    out
}

impl TreeHost for MemoryTree {
    fn resolve(&self, node: NodeHandle) -> bool {
        self.data.borrow().node(node).is_some()
    }

    fn type_name(&self, node: NodeHandle) -> Option<String> {
        self.data.borrow().node(node).map(|n| n.type_name.clone())
    }

    fn instance_name(&self, node: NodeHandle) -> Option<String> {
        self.data.borrow().node(node).map(|n| n.name.clone())
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        let data = self.data.borrow();
        let n = data.node(node)?;
        if n.parent == NONE {
            return None;
        }
        Some(NodeHandle(n.parent as u64))
    }

    fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let data = self.data.borrow();
        let mut out = Vec::new();
        let Some(n) = data.node(node) else { return out };
        let mut child = n.first_child;
        while child != NONE {
            out.push(NodeHandle(child as u64));
            child = data.nodes[child].next_sibling;
        }
        out
    }

    fn property(&self, node: NodeHandle, name: &str) -> Option<PropertyId> {
        let mut data = self.data.borrow_mut();
        data.node(node)?;
        Some(PropertyId(data.intern_property(name)))
    }

    fn property_name(&self, property: PropertyId) -> Option<String> {
        self.data
            .borrow()
            .prop_names
            .get(property.0 as usize)
            .cloned()
    }

    fn read_local_value(
        &self,
        node: NodeHandle,
        property: PropertyId,
    ) -> Result<LocalValue, TreeError> {
        let data = self.data.borrow();
        let n = data.node(node).ok_or(TreeError::DanglingHandle)?;
        if let Some(v) = n.locals.get(&property.0) {
            return Ok(LocalValue::Value(v.clone()));
        }
        if n.bindings.contains_key(&property.0) {
            return Ok(LocalValue::BindingExpression);
        }
        Ok(LocalValue::Unset)
    }

    fn animation_base_value(
        &self,
        node: NodeHandle,
        property: PropertyId,
    ) -> Result<Value, TreeError> {
        let data = self.data.borrow();
        let n = data.node(node).ok_or(TreeError::DanglingHandle)?;
        if let Some(v) = n.locals.get(&property.0) {
            return Ok(v.clone());
        }
        Ok(n.bindings.get(&property.0).cloned().unwrap_or(Value::Unset))
    }

    fn set_value(
        &self,
        node: NodeHandle,
        property: PropertyId,
        value: Value,
    ) -> Result<(), TreeError> {
        self.write_value(node, property, Some(value))
    }

    fn clear_value(&self, node: NodeHandle, property: PropertyId) -> Result<(), TreeError> {
        self.write_value(node, property, None)
    }

    fn register_property_changed(
        &self,
        node: NodeHandle,
        property: PropertyId,
        callback: Rc<dyn Fn(NodeHandle, PropertyId)>,
    ) -> SubscriptionId {
        let id = self.next_sub.get();
        self.next_sub.set(id + 1);
        if let Some(n) = self.data.borrow_mut().node_mut(node) {
            n.prop_subs
                .entry(property.0)
                .or_default()
                .push((id, callback));
        }
        SubscriptionId(id)
    }

    fn unregister_property_changed(
        &self,
        node: NodeHandle,
        property: PropertyId,
        subscription: SubscriptionId,
    ) {
        if let Some(n) = self.data.borrow_mut().node_mut(node) {
            if let Some(subs) = n.prop_subs.get_mut(&property.0) {
                subs.retain(|(id, _)| *id != subscription.0);
            }
        }
    }

    fn state_group(&self, node: NodeHandle, name: &str) -> Option<StateGroupHandle> {
        let data = self.data.borrow();
        let gid = *data.node(node)?.groups.get(name)?;
        Some(StateGroupHandle(gid))
    }

    fn resolve_state_group(&self, group: StateGroupHandle) -> bool {
        self.data
            .borrow()
            .groups
            .get(&group.0)
            .is_some_and(|g| g.alive)
    }

    fn current_state(&self, group: StateGroupHandle) -> Option<String> {
        self.data
            .borrow()
            .groups
            .get(&group.0)
            .filter(|g| g.alive)
            .and_then(|g| g.current.clone())
    }

    fn register_state_changed(
        &self,
        group: StateGroupHandle,
        callback: Rc<dyn Fn(Option<&str>, Option<&str>)>,
    ) -> SubscriptionId {
        let id = self.next_sub.get();
        self.next_sub.set(id + 1);
        if let Some(g) = self.data.borrow_mut().groups.get_mut(&group.0) {
            g.subs.push((id, callback));
        }
        SubscriptionId(id)
    }

    fn unregister_state_changed(&self, group: StateGroupHandle, subscription: SubscriptionId) {
        if let Some(g) = self.data.borrow_mut().groups.get_mut(&group.0) {
            g.subs.retain(|(id, _)| *id != subscription.0);
        }
    }

    fn set_event_sink(&self, sink: Weak<dyn TreeEventSink>) {
        *self.sink.borrow_mut() = Some(sink);
    }
}

impl StyleParser for MemoryTree {
    fn parse_setters(
        &self,
        target_type: &str,
        setters: &[SetterLine],
    ) -> Result<Vec<ResolvedSetter>, ParseFacilityError> {
        if !self
            .parsable_types
            .borrow()
            .iter()
            .any(|t| t == target_type)
        {
            return Err(ParseFacilityError::UnresolvedType(target_type.to_string()));
        }
        let mut data = self.data.borrow_mut();
        let mut out = Vec::with_capacity(setters.len());
        for setter in setters {
            if setter.property.is_empty() {
                return Err(ParseFacilityError::Invalid("empty property name".into()));
            }
            let property = PropertyId(data.intern_property(&setter.property));
            let value = match &setter.raw_value {
                // Placeholder setter: the caller substitutes the value.
                None => Value::Unset,
                Some(raw) if setter.markup => Value::Str(raw.clone()),
                Some(raw) => Value::parse_literal(raw),
            };
            out.push(ResolvedSetter { property, value });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ThemeColors as _;
    use crate::value::Color;

    fn prop(tree: &MemoryTree, node: NodeHandle, name: &str) -> PropertyId {
        tree.property(node, name).unwrap()
    }

    #[test]
    fn tree_structure_and_children_order() {
        let tree = MemoryTree::new();
        let root = tree.create_root("Taskbar.TaskbarFrame", "");
        let a = tree.create_element(root, "Taskbar.TaskListButton", "a");
        let b = tree.create_element(root, "Taskbar.TaskListButton", "b");
        assert_eq!(tree.children(root), vec![a, b]);
        assert_eq!(tree.parent(a), Some(root));
        assert_eq!(tree.parent(root), None);
    }

    #[test]
    fn removal_detaches_but_keeps_elements_resolvable() {
        let tree = MemoryTree::new();
        let root = tree.create_root("Grid", "");
        let child = tree.create_element(root, "Border", "x");
        tree.remove_element(child);
        assert!(tree.children(root).is_empty());
        assert!(tree.resolve(child));
        tree.destroy_element(child);
        assert!(!tree.resolve(child));
    }

    #[test]
    fn property_changed_fires_only_on_change() {
        let tree = MemoryTree::new();
        let root = tree.create_root("Grid", "");
        let p = prop(&tree, root, "Opacity");
        let hits = Rc::new(Cell::new(0u32));
        let hits2 = hits.clone();
        tree.register_property_changed(
            root,
            p,
            Rc::new(move |_, _| hits2.set(hits2.get() + 1)),
        );
        tree.set_value(root, p, Value::Double(0.5)).unwrap();
        tree.set_value(root, p, Value::Double(0.5)).unwrap();
        tree.set_value(root, p, Value::Double(0.7)).unwrap();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn binding_reads_back_as_expression_until_shadowed() {
        let tree = MemoryTree::new();
        let root = tree.create_root("Grid", "");
        let p = prop(&tree, root, "Fill");
        tree.set_binding(root, p, Value::Color(Color::rgb(1, 2, 3)));
        assert_eq!(
            tree.read_local_value(root, p).unwrap(),
            LocalValue::BindingExpression
        );
        assert_eq!(
            tree.animation_base_value(root, p).unwrap(),
            Value::Color(Color::rgb(1, 2, 3))
        );
        tree.set_value(root, p, Value::Color(Color::rgb(9, 9, 9))).unwrap();
        assert_eq!(
            tree.read_local_value(root, p).unwrap(),
            LocalValue::Value(Value::Color(Color::rgb(9, 9, 9)))
        );
    }

    #[test]
    fn state_transitions_report_old_and_new() {
        let tree = MemoryTree::new();
        let root = tree.create_root("Button", "");
        let group = tree.add_state_group(root, "CommonStates");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        tree.register_state_changed(
            group,
            Rc::new(move |old, new| {
                seen2
                    .borrow_mut()
                    .push((old.map(str::to_string), new.map(str::to_string)));
            }),
        );
        tree.set_current_state(group, Some("PointerOver"));
        tree.set_current_state(group, Some("Pressed"));
        assert_eq!(
            *seen.borrow(),
            vec![
                (None, Some("PointerOver".to_string())),
                (Some("PointerOver".to_string()), Some("Pressed".to_string())),
            ]
        );
    }

    #[test]
    fn parse_facility_rejects_unregistered_types() {
        let tree = MemoryTree::new();
        let setters = vec![SetterLine {
            property: "Fill".into(),
            raw_value: Some("Red".into()),
            markup: false,
        }];
        assert!(matches!(
            tree.parse_setters("JumpViewUI.JumpListItem", &setters),
            Err(ParseFacilityError::UnresolvedType(_))
        ));
        tree.register_parsable_type("JumpViewUI.JumpListItem");
        let resolved = tree.parse_setters("JumpViewUI.JumpListItem", &setters).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].value, Value::Color(Color::rgb(0xFF, 0, 0)));
    }

    #[test]
    fn theme_colors_notify_subscribers() {
        let tree = MemoryTree::new();
        let hits = Rc::new(Cell::new(0u32));
        let hits2 = hits.clone();
        tree.theme_colors().subscribe(Rc::new(move || hits2.set(hits2.get() + 1)));
        tree.theme_colors().set_color("SystemAccentColor", Color::rgb(0, 0x78, 0xD4));
        assert_eq!(hits.get(), 1);
        assert_eq!(
            tree.theme_colors().color("SystemAccentColor"),
            Some(Color::rgb(0, 0x78, 0xD4))
        );
    }
}
