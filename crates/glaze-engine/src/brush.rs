//! Backdrop blur/tint composition brush.
//!
//! The effect graph is: backdrop source -> gaussian blur, composited
//! under a flood tint. The tint can be bound to a host theme color, in
//! which case theme changes update the live effect's color parameter in
//! place instead of rebuilding the brush.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use glaze_tree::host::{CompositionBrush, Compositor, EffectNode, ThemeColors};
use glaze_tree::value::Color;
use glaze_tree::{BrushId, SubscriptionId};

/// Color parameter name of the flood effect inside the graph.
const TINT_PARAMETER: &str = "FloodEffect.Color";

/// Parameters parsed from a `<GlazeBlur .../>` marker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlurBrushSpec {
    pub blur_radius: f32,
    pub tint_color: Option<Color>,
    /// Overrides the tint's alpha channel, 0.0 to 1.0.
    pub tint_opacity: Option<f32>,
    /// Theme color key the tint follows, e.g. `SystemChromeAltHighColor`.
    pub tint_theme_resource: Option<String>,
}

/// A live blur brush. Created per application; the host connects it when
/// the value lands on a rendered property and disconnects it when the
/// value is replaced or cleared.
pub struct BlurBrush {
    spec: BlurBrushSpec,
    theme: Rc<dyn ThemeColors>,
    compositor: Rc<dyn Compositor>,
    tint: Cell<Color>,
    brush: Cell<Option<BrushId>>,
    theme_sub: Cell<Option<SubscriptionId>>,
}

impl BlurBrush {
    pub fn create(
        spec: BlurBrushSpec,
        theme: Rc<dyn ThemeColors>,
        compositor: Rc<dyn Compositor>,
    ) -> Rc<BlurBrush> {
        Rc::new_cyclic(|weak: &Weak<BlurBrush>| {
            let tint = resolve_tint(&spec, &*theme);
            let theme_sub = if spec.tint_theme_resource.is_some() {
                let weak = weak.clone();
                Some(theme.subscribe(Rc::new(move || {
                    if let Some(brush) = weak.upgrade() {
                        brush.on_theme_changed();
                    }
                })))
            } else {
                None
            };
            BlurBrush {
                spec,
                theme,
                compositor,
                tint: Cell::new(tint),
                brush: Cell::new(None),
                theme_sub: Cell::new(theme_sub),
            }
        })
    }

    pub fn spec(&self) -> &BlurBrushSpec {
        &self.spec
    }

    pub fn tint(&self) -> Color {
        self.tint.get()
    }

    pub fn brush_id(&self) -> Option<BrushId> {
        self.brush.get()
    }

    fn on_theme_changed(&self) {
        let tint = resolve_tint(&self.spec, &*self.theme);
        if tint == self.tint.get() {
            return;
        }
        self.tint.set(tint);
        if let Some(id) = self.brush.get() {
            debug!(tint = %tint, "updating blur tint in place after theme change");
            self.compositor.update_color_parameter(id, TINT_PARAMETER, tint);
        }
    }
}

impl CompositionBrush for BlurBrush {
    fn on_connected(&self) {
        if self.brush.get().is_some() {
            return;
        }
        let graph = EffectNode::Composite {
            sources: vec![
                EffectNode::GaussianBlur {
                    source: Box::new(EffectNode::BackdropSource),
                    radius: self.spec.blur_radius,
                },
                EffectNode::Flood { color: self.tint.get() },
            ],
        };
        self.brush.set(Some(self.compositor.create_effect_brush(graph)));
    }

    fn on_disconnected(&self) {
        if let Some(id) = self.brush.take() {
            self.compositor.close_brush(id);
        }
    }
}

impl Drop for BlurBrush {
    fn drop(&mut self) {
        if let Some(sub) = self.theme_sub.take() {
            self.theme.unsubscribe(sub);
        }
        if let Some(id) = self.brush.take() {
            self.compositor.close_brush(id);
        }
    }
}

fn resolve_tint(spec: &BlurBrushSpec, theme: &dyn ThemeColors) -> Color {
    let mut tint = spec.tint_color.unwrap_or(Color::TRANSPARENT);
    if let Some(key) = &spec.tint_theme_resource {
        match theme.color(key) {
            Some(c) => tint = c,
            None => warn!(key = %key, "theme color not found for blur tint"),
        }
    }
    if let Some(opacity) = spec.tint_opacity {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        tint = tint.with_alpha(alpha);
    }
    tint
}
