//! Glaze Engine - Live-Tree Styling
//!
//! Applies declarative style rules to a running UI tree and keeps them
//! applied as the tree changes:
//!
//! 1. Rules from settings and the theme catalogue are compiled into a
//!    registry ordered newest-first.
//! 2. A tree-change observer reports elements entering and leaving the
//!    tree; each new element is matched against the registry once.
//! 3. Matched properties are overridden with snapshot/restore semantics,
//!    visual-state awareness and protection against external writes.
//!
//! Everything host-specific flows through the `glaze-tree` traits; the
//! engine itself is toolkit-agnostic and runs on the host's UI thread.

pub mod brush;
pub mod config;
pub mod materialize;
pub mod matching;
pub mod observer;
pub mod overrides;
pub mod registry;
pub mod session;
pub mod themes;

pub use brush::{BlurBrush, BlurBrushSpec};
pub use config::{SessionConfig, TargetStyles};
pub use materialize::{OverrideValue, PropertyOverrides};
pub use observer::AdviseStatus;
pub use registry::{CompiledRule, RuleRegistry};
pub use session::{SkippedRule, StyleSession};
pub use themes::{Theme, find_theme};
