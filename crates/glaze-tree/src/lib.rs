//! Glaze Tree - Host UI-Tree Boundary
//!
//! Everything the styling engine knows about the host UI toolkit goes
//! through the traits in this crate: reading and writing element
//! properties, walking parents and children, visual-state groups,
//! tree-change diagnostics, the host's setter-parsing facility, theme
//! colors and the compositor. The engine itself never touches a concrete
//! toolkit type.
//!
//! [`memory::MemoryTree`] is a complete in-process host built on an arena
//! tree. It backs the integration tests and doubles as the reference for
//! what a real host adapter has to provide.

pub mod host;
pub mod memory;
pub mod value;

pub use host::{
    CompositionBrush, Compositor, EffectNode, HostContext, LocalValue, ParseFacilityError,
    ResolvedSetter, SetterLine, SettingsStore, StyleParser, ThemeColors, TreeDiagnostics,
    TreeError, TreeEventSink, TreeHost, UiDispatcher,
};
pub use memory::MemoryTree;
pub use value::{Color, Thickness, Value};

/// Opaque identifier for an element in the host tree.
///
/// Handles stay stable for the lifetime of the element but may dangle
/// after the host destroys it, so every use re-resolves through the host
/// and tolerates failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Opaque identifier for a visual-state group on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateGroupHandle(pub u64);

/// Host-interned dependency-property identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(pub u32);

/// Token returned by the host for a callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Identifier for a compositor-side effect brush resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrushId(pub u64);
