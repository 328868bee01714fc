//! One styling session per UI thread.
//!
//! A session owns the compiled rule registry, the per-element override
//! records and the observer subscription. It is not `Send`: hosts run
//! one session per UI thread, each over that thread's slice of the tree.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info, warn};

use glaze_dsl::{Rule, StyleConstants};
use glaze_tree::host::{
    Compositor, HostContext, SettingsStore, StyleParser, ThemeColors, TreeEventSink, TreeHost,
    UiDispatcher,
};
use glaze_tree::NodeHandle;

use crate::config::SessionConfig;
use crate::matching;
use crate::observer::{AdviseStatus, ObserverBridge};
use crate::overrides::{self, NodeCustomization};
use crate::registry::RuleRegistry;
use crate::themes;

/// A queued dispatcher write that can still be called off.
pub struct DeferredApply {
    pub node: NodeHandle,
    pub cancelled: Rc<Cell<bool>>,
}

/// Host services plus the small amount of state the override callbacks
/// share: the write-intent flag and the deferred-write queue.
pub struct EngineShared {
    pub tree: Rc<dyn TreeHost>,
    pub parser: Rc<dyn StyleParser>,
    pub theme_colors: Rc<dyn ThemeColors>,
    pub compositor: Rc<dyn Compositor>,
    pub dispatcher: Rc<dyn UiDispatcher>,
    /// Up while the engine itself is writing a property, so the
    /// property-changed callback can tell its own writes from external
    /// ones.
    pub writing: Cell<bool>,
    pub deferred: RefCell<Vec<DeferredApply>>,
}

impl EngineShared {
    pub fn new(ctx: HostContext) -> Rc<EngineShared> {
        Rc::new(EngineShared {
            tree: ctx.tree,
            parser: ctx.parser,
            theme_colors: ctx.theme_colors,
            compositor: ctx.compositor,
            dispatcher: ctx.dispatcher,
            writing: Cell::new(false),
            deferred: RefCell::new(Vec::new()),
        })
    }
}

/// A rule that could not be compiled, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct SkippedRule {
    pub target: String,
    pub reason: String,
}

/// The engine's top-level object.
pub struct StyleSession {
    shared: Rc<EngineShared>,
    observer: ObserverBridge,
    settings: Rc<dyn SettingsStore>,
    registry: RefCell<RuleRegistry>,
    records: RefCell<HashMap<NodeHandle, NodeCustomization>>,
    skipped: RefCell<Vec<SkippedRule>>,
    loaded: Cell<bool>,
}

impl StyleSession {
    pub fn new(ctx: HostContext, settings: Rc<dyn SettingsStore>) -> Rc<StyleSession> {
        let observer = ObserverBridge::new(ctx.diagnostics.clone());
        Rc::new(StyleSession {
            shared: EngineShared::new(ctx),
            observer,
            settings,
            registry: RefCell::new(RuleRegistry::new()),
            records: RefCell::new(HashMap::new()),
            skipped: RefCell::new(Vec::new()),
            loaded: Cell::new(false),
        })
    }

    /// Compiles settings into the registry, installs the event sink and
    /// starts the observer subscription.
    pub fn load(self: &Rc<Self>) {
        if self.loaded.get() {
            return;
        }
        let config = SessionConfig::from_settings(&*self.settings);
        self.compile(&config);

        let sink: Rc<dyn TreeEventSink> = self.clone();
        self.shared.tree.set_event_sink(Rc::downgrade(&sink));
        self.observer.subscribe();
        self.loaded.set(true);
        info!(rules = self.registry.borrow().len(), "styling session loaded");
    }

    /// Restores every customized element and drops all compiled state.
    pub fn unload(&self) {
        if !self.loaded.get() {
            return;
        }
        overrides::cancel_all_deferred(&self.shared);
        let records: Vec<(NodeHandle, NodeCustomization)> =
            self.records.borrow_mut().drain().collect();
        for (node, record) in &records {
            for group in &record.groups {
                overrides::restore_group(&self.shared, *node, group);
            }
        }
        self.registry.borrow_mut().clear();
        self.observer.unsubscribe();
        self.loaded.set(false);
        info!(restored = records.len(), "styling session unloaded");
    }

    /// Full settings-change handling: tear everything down and rebuild
    /// from the store.
    pub fn reload(self: &Rc<Self>) {
        self.unload();
        self.load();
    }

    /// Blocks until the observer helper thread finished advising.
    pub fn wait_subscribed(&self) -> bool {
        self.observer.wait_subscribed()
    }

    pub fn advise_status(&self) -> AdviseStatus {
        self.observer.status()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    pub fn rule_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Number of elements currently carrying overrides.
    pub fn customized_count(&self) -> usize {
        self.records.borrow().len()
    }

    /// Rules that failed to compile during the last load.
    pub fn skipped_rules(&self) -> Vec<SkippedRule> {
        self.skipped.borrow().clone()
    }

    fn compile(&self, config: &SessionConfig) {
        self.skipped.borrow_mut().clear();
        let theme = config.theme.as_deref().and_then(|name| {
            let theme = themes::find_theme(name);
            if theme.is_none() {
                warn!(theme = name, "unknown theme name in settings");
            }
            theme
        });

        let mut constant_lines: Vec<&str> = Vec::new();
        if let Some(theme) = theme {
            constant_lines.extend(theme.style_constants);
        }
        constant_lines.extend(config.style_constants.iter().map(String::as_str));
        let constants = StyleConstants::from_lines(constant_lines);

        let mut registry = self.registry.borrow_mut();
        registry.clear();

        // Theme rules go in first so user rules, being newer, win every
        // property both provide.
        if let Some(theme) = theme {
            for entry in theme.target_styles {
                let styles: Vec<String> =
                    entry.styles.iter().map(|s| constants.apply(s)).collect();
                self.add_rule(&mut registry, entry.target, &styles);
            }
        }
        for entry in &config.control_styles {
            if entry.target.trim_start().starts_with("//") {
                debug!(target_chain = %entry.target, "skipping disabled rule");
                continue;
            }
            let styles: Vec<String> =
                entry.styles.iter().map(|s| constants.apply(s)).collect();
            self.add_rule(&mut registry, &entry.target, &styles);
        }
    }

    fn add_rule(&self, registry: &mut RuleRegistry, target: &str, styles: &[String]) {
        match Rule::parse(target, styles) {
            Ok(rule) => registry.add(rule),
            Err(e) => {
                warn!(target_chain = %target, error = %e, "rule failed to parse, skipping");
                self.skipped.borrow_mut().push(SkippedRule {
                    target: target.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    fn apply_customizations(&self, node: NodeHandle, fallback_class: &str) {
        let groups = {
            let registry = self.registry.borrow();
            matching::find_property_overrides(&self.shared, &registry, node, fallback_class)
        };
        if groups.is_empty() {
            return;
        }
        debug!(node = ?node, groups = groups.len(), "applying customizations");

        // Re-reported elements start from a clean slate.
        if let Some(existing) = self.records.borrow_mut().remove(&node) {
            for group in &existing.groups {
                overrides::restore_group(&self.shared, node, group);
            }
        }

        let record = NodeCustomization {
            groups: groups
                .into_iter()
                .map(|group| overrides::apply_group(&self.shared, node, group))
                .collect(),
        };
        self.records.borrow_mut().insert(node, record);
    }

    fn cleanup_customizations(&self, node: NodeHandle) {
        overrides::cancel_deferred(&self.shared, node);
        let record = self.records.borrow_mut().remove(&node);
        if let Some(record) = record {
            debug!(node = ?node, "restoring customizations for removed element");
            for group in &record.groups {
                overrides::restore_group(&self.shared, node, group);
            }
        }
    }
}

impl TreeEventSink for StyleSession {
    fn node_added(&self, node: NodeHandle, type_name: &str) {
        if !self.loaded.get() {
            return;
        }
        if !self.shared.tree.resolve(node) {
            return;
        }
        self.apply_customizations(node, type_name);
    }

    fn node_removed(&self, node: NodeHandle) {
        if !self.loaded.get() {
            return;
        }
        self.cleanup_customizations(node);
    }
}
