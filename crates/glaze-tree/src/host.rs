//! Traits a host toolkit implements to let the engine style its tree.
//!
//! The engine runs on the host's UI thread and holds these as `Rc` trait
//! objects, except tree-change diagnostics which must be reachable from a
//! helper thread and is therefore `Send + Sync`.

use std::rc::{Rc, Weak};
use std::sync::Arc;

use thiserror::Error;

use crate::value::{Color, Value};
use crate::{BrushId, NodeHandle, PropertyId, StateGroupHandle, SubscriptionId};

/// Errors surfaced by host tree operations.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("element handle no longer resolves to a live element")]
    DanglingHandle,
    #[error("unknown property for this element: {0:?}")]
    UnknownProperty(PropertyId),
    #[error("value rejected by property: {0}")]
    ValueRejected(String),
    #[error("tree diagnostics unavailable: {0}")]
    DiagnosticsUnavailable(String),
}

/// A property's local value as stored on the element itself.
///
/// `BindingExpression` is the pass-through case: the local slot holds a
/// binding object rather than an effective value, and reading it back
/// verbatim would wedge the binding when restored. Callers fall back to
/// [`TreeHost::animation_base_value`] for those.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalValue {
    Unset,
    Value(Value),
    BindingExpression,
}

/// Read/write access to the live element tree.
pub trait TreeHost {
    /// Whether the handle still refers to a live element.
    fn resolve(&self, node: NodeHandle) -> bool;

    /// Fully qualified runtime type name, e.g. `Taskbar.TaskListButton`.
    fn type_name(&self, node: NodeHandle) -> Option<String>;

    /// The element's `Name`, empty if it has none.
    fn instance_name(&self, node: NodeHandle) -> Option<String>;

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn children(&self, node: NodeHandle) -> Vec<NodeHandle>;

    /// Resolves a property name on the element's type to its identifier.
    fn property(&self, node: NodeHandle, name: &str) -> Option<PropertyId>;

    /// Name of a property identifier, for special-case dispatch.
    fn property_name(&self, property: PropertyId) -> Option<String>;

    fn read_local_value(
        &self,
        node: NodeHandle,
        property: PropertyId,
    ) -> Result<LocalValue, TreeError>;

    /// The value animations and bindings resolve on top of. Used instead
    /// of the local slot when that slot holds a binding expression.
    fn animation_base_value(
        &self,
        node: NodeHandle,
        property: PropertyId,
    ) -> Result<Value, TreeError>;

    fn set_value(
        &self,
        node: NodeHandle,
        property: PropertyId,
        value: Value,
    ) -> Result<(), TreeError>;

    fn clear_value(&self, node: NodeHandle, property: PropertyId) -> Result<(), TreeError>;

    /// Registers for change notification on one property of one element.
    /// The callback receives the element and property that changed.
    fn register_property_changed(
        &self,
        node: NodeHandle,
        property: PropertyId,
        callback: Rc<dyn Fn(NodeHandle, PropertyId)>,
    ) -> SubscriptionId;

    fn unregister_property_changed(
        &self,
        node: NodeHandle,
        property: PropertyId,
        subscription: SubscriptionId,
    );

    /// Looks up a visual-state group by name on the element.
    fn state_group(&self, node: NodeHandle, name: &str) -> Option<StateGroupHandle>;

    /// Whether a state-group handle still refers to a live group.
    fn resolve_state_group(&self, group: StateGroupHandle) -> bool;

    /// Name of the group's current state, `None` when no state is active.
    fn current_state(&self, group: StateGroupHandle) -> Option<String>;

    /// Registers for state transitions; the callback receives the old and
    /// new state names.
    fn register_state_changed(
        &self,
        group: StateGroupHandle,
        callback: Rc<dyn Fn(Option<&str>, Option<&str>)>,
    ) -> SubscriptionId;

    fn unregister_state_changed(&self, group: StateGroupHandle, subscription: SubscriptionId);

    /// Installs the sink that receives element add/remove events once
    /// diagnostics are advised. A host keeps at most one sink.
    fn set_event_sink(&self, sink: Weak<dyn TreeEventSink>);
}

/// Receiver for tree-change events, implemented by the engine session.
pub trait TreeEventSink {
    /// An element entered the tree. `type_name` is the wire-level type
    /// string the diagnostics channel reported, which may be resolvable
    /// even when the runtime type is not.
    fn node_added(&self, node: NodeHandle, type_name: &str);

    fn node_removed(&self, node: NodeHandle);
}

/// Tree-change diagnostics subscription.
///
/// `advise` blocks until the host has replayed the existing tree, and on
/// some hosts deadlocks when called from the UI thread it is reporting
/// on. Callers invoke it from a dedicated helper thread.
pub trait TreeDiagnostics: Send + Sync {
    fn advise(&self) -> Result<(), TreeError>;
    fn unadvise(&self);
}

/// One property setter handed to the host's style-parsing facility.
#[derive(Debug, Clone, PartialEq)]
pub struct SetterLine {
    /// Property name, possibly attached-property qualified.
    pub property: String,
    /// Raw textual value. `None` is a placeholder: the caller only needs
    /// the property resolved and substitutes its own value afterwards.
    pub raw_value: Option<String>,
    /// The value is a markup fragment rather than a plain literal.
    pub markup: bool,
}

/// A setter after the host resolved property and value against a type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSetter {
    pub property: PropertyId,
    pub value: Value,
}

#[derive(Debug, Error)]
pub enum ParseFacilityError {
    /// The target type name could not be resolved from text. Callers may
    /// retry against a fallback type.
    #[error("cannot resolve type from text: {0}")]
    UnresolvedType(String),
    #[error("invalid setter: {0}")]
    Invalid(String),
}

/// The host's batch setter-parsing facility.
pub trait StyleParser {
    /// Resolves a batch of setters against `target_type`. The whole batch
    /// succeeds or fails together, mirroring how hosts compile style
    /// fragments in one unit.
    fn parse_setters(
        &self,
        target_type: &str,
        setters: &[SetterLine],
    ) -> Result<Vec<ResolvedSetter>, ParseFacilityError>;
}

/// Read-only view of the host theme color table.
pub trait ThemeColors {
    fn color(&self, key: &str) -> Option<Color>;

    /// Subscribes to theme changes. Callbacks run on the UI thread.
    fn subscribe(&self, callback: Rc<dyn Fn()>) -> SubscriptionId;

    fn unsubscribe(&self, subscription: SubscriptionId);
}

/// Description of an effect graph handed to the compositor.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectNode {
    /// Samples whatever is rendered behind the element.
    BackdropSource,
    GaussianBlur { source: Box<EffectNode>, radius: f32 },
    Flood { color: Color },
    /// Source-over composite, painted first-to-last.
    Composite { sources: Vec<EffectNode> },
}

/// Compositor resource factory.
pub trait Compositor {
    fn create_effect_brush(&self, graph: EffectNode) -> BrushId;

    /// Updates a named color parameter of a live effect brush without
    /// rebuilding the effect graph.
    fn update_color_parameter(&self, brush: BrushId, parameter: &str, color: Color);

    fn close_brush(&self, brush: BrushId);
}

/// A value-level brush the host connects to the compositor when it lands
/// on a rendered property.
pub trait CompositionBrush {
    fn on_connected(&self);
    fn on_disconnected(&self);
}

/// Defers work to the UI thread's dispatcher queue.
pub trait UiDispatcher {
    fn post(&self, task: Box<dyn FnOnce()>);
}

/// Key/value settings the host persists for the engine.
pub trait SettingsStore {
    fn string(&self, key: &str) -> Option<String>;
}

/// Bundle of host services a session is constructed over.
#[derive(Clone)]
pub struct HostContext {
    pub tree: Rc<dyn TreeHost>,
    pub parser: Rc<dyn StyleParser>,
    pub theme_colors: Rc<dyn ThemeColors>,
    pub compositor: Rc<dyn Compositor>,
    pub dispatcher: Rc<dyn UiDispatcher>,
    pub diagnostics: Arc<dyn TreeDiagnostics>,
}
