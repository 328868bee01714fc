//! Host-side services of the in-memory host: compositor, theme color
//! table, dispatcher queue, diagnostics channel and settings store.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::host::{
    Compositor, EffectNode, SettingsStore, ThemeColors, TreeDiagnostics, TreeError, UiDispatcher,
};
use crate::value::Color;
use crate::{BrushId, SubscriptionId};

/// Recorded state of one compositor brush.
#[derive(Debug, Clone)]
pub struct BrushRecord {
    pub graph: EffectNode,
    pub color_parameters: HashMap<String, Color>,
    pub closed: bool,
}

/// Compositor that records every resource it hands out.
pub struct MemoryCompositor {
    brushes: RefCell<HashMap<u64, BrushRecord>>,
    next: Cell<u64>,
}

impl MemoryCompositor {
    pub(crate) fn new() -> Self {
        MemoryCompositor {
            brushes: RefCell::new(HashMap::new()),
            next: Cell::new(1),
        }
    }

    pub fn brush(&self, id: BrushId) -> Option<BrushRecord> {
        self.brushes.borrow().get(&id.0).cloned()
    }

    /// Ids of brushes created so far, in creation order.
    pub fn brush_ids(&self) -> Vec<BrushId> {
        let mut ids: Vec<u64> = self.brushes.borrow().keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(BrushId).collect()
    }

    pub fn live_brush_count(&self) -> usize {
        self.brushes.borrow().values().filter(|b| !b.closed).count()
    }
}

impl Compositor for MemoryCompositor {
    fn create_effect_brush(&self, graph: EffectNode) -> BrushId {
        let id = self.next.get();
        self.next.set(id + 1);
        self.brushes.borrow_mut().insert(
            id,
            BrushRecord { graph, color_parameters: HashMap::new(), closed: false },
        );
        BrushId(id)
    }

    fn update_color_parameter(&self, brush: BrushId, parameter: &str, color: Color) {
        if let Some(record) = self.brushes.borrow_mut().get_mut(&brush.0) {
            if !record.closed {
                record.color_parameters.insert(parameter.to_string(), color);
            }
        }
    }

    fn close_brush(&self, brush: BrushId) {
        if let Some(record) = self.brushes.borrow_mut().get_mut(&brush.0) {
            record.closed = true;
        }
    }
}

/// Mutable theme color table with synchronous change notification.
pub struct MemoryThemeColors {
    colors: RefCell<HashMap<String, Color>>,
    subs: RefCell<Vec<(u64, Rc<dyn Fn()>)>>,
    next: Cell<u64>,
}

impl MemoryThemeColors {
    pub(crate) fn new() -> Self {
        MemoryThemeColors {
            colors: RefCell::new(HashMap::new()),
            subs: RefCell::new(Vec::new()),
            next: Cell::new(1),
        }
    }

    /// Sets a theme color and notifies subscribers.
    pub fn set_color(&self, key: &str, color: Color) {
        self.colors.borrow_mut().insert(key.to_string(), color);
        let subs = self.subs.borrow().clone();
        for (_, cb) in subs {
            cb();
        }
    }
}

impl ThemeColors for MemoryThemeColors {
    fn color(&self, key: &str) -> Option<Color> {
        self.colors.borrow().get(key).copied()
    }

    fn subscribe(&self, callback: Rc<dyn Fn()>) -> SubscriptionId {
        let id = self.next.get();
        self.next.set(id + 1);
        self.subs.borrow_mut().push((id, callback));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.subs.borrow_mut().retain(|(id, _)| *id != subscription.0);
    }
}

/// FIFO dispatcher queue pumped explicitly by tests.
pub struct MemoryDispatcher {
    queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl MemoryDispatcher {
    pub(crate) fn new() -> Self {
        MemoryDispatcher { queue: RefCell::new(VecDeque::new()) }
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Drains the queue, including tasks enqueued while draining.
    pub fn run_all(&self) {
        loop {
            let task = self.queue.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

impl UiDispatcher for MemoryDispatcher {
    fn post(&self, task: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push_back(task);
    }
}

/// Diagnostics channel toggled by `advise`/`unadvise`.
///
/// Shared with the tree through an `Arc` so a helper thread can advise
/// while the tree stays single-threaded.
pub struct MemoryDiagnostics {
    advised: AtomicBool,
    fail_next_advise: AtomicBool,
}

impl MemoryDiagnostics {
    pub(crate) fn new() -> Self {
        MemoryDiagnostics {
            advised: AtomicBool::new(false),
            fail_next_advise: AtomicBool::new(false),
        }
    }

    pub fn is_advised(&self) -> bool {
        self.advised.load(Ordering::SeqCst)
    }

    /// Makes the next `advise` call fail, for lifecycle error tests.
    pub fn fail_next_advise(&self) {
        self.fail_next_advise.store(true, Ordering::SeqCst);
    }
}

impl TreeDiagnostics for MemoryDiagnostics {
    fn advise(&self) -> Result<(), TreeError> {
        if self.fail_next_advise.swap(false, Ordering::SeqCst) {
            return Err(TreeError::DiagnosticsUnavailable(
                "advise rejected by host".into(),
            ));
        }
        self.advised.store(true, Ordering::SeqCst);
        debug!("tree-change diagnostics advised");
        Ok(())
    }

    fn unadvise(&self) {
        self.advised.store(false, Ordering::SeqCst);
    }
}

/// String settings store backed by a map.
#[derive(Default)]
pub struct MemorySettings {
    values: RefCell<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        MemorySettings::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }
}

impl SettingsStore for MemorySettings {
    fn string(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }
}
