//! Pointer interaction: hit testing and the drag gesture.
//!
//! All points here are canvas-local; map screen coordinates through
//! [`crate::screen_to_local`] first.

use glam::DVec2;
use tracing::debug;

use layer_studio_core::{DocumentStore, Layer, LayerId, LayerKind, LayerPatch, ShapeType};

/// The topmost layer whose painted geometry contains `point`.
pub fn hit_test(document: &DocumentStore, point: DVec2) -> Option<LayerId> {
    document
        .layers()
        .iter()
        .rev()
        .find(|layer| contains(layer, point))
        .map(|layer| layer.id)
}

fn contains(layer: &Layer, point: DVec2) -> bool {
    let (cx, cy) = layer.center();
    let center = DVec2::new(cx, cy);
    // Undo the layer's rotation about its center.
    let local = DVec2::from_angle(-layer.rotation.to_radians()).rotate(point - center);

    let half = DVec2::new(layer.width, layer.height) / 2.0;
    match &layer.kind {
        LayerKind::Shape(shape) if shape.shape_type == ShapeType::Ellipse => {
            if half.x <= 0.0 || half.y <= 0.0 {
                return false;
            }
            (local / half).length_squared() <= 1.0
        }
        LayerKind::Text(_) | LayerKind::Shape(_) | LayerKind::Image(_) => {
            local.x.abs() <= half.x && local.y.abs() <= half.y
        }
    }
}

/// What a pointer event did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// Pointer-down over a layer: it is now selected and being dragged.
    Selected(LayerId),
    /// Pointer-down on empty canvas cleared the selection.
    Cleared,
    Moved(LayerId),
    /// A drag in progress ended.
    Ended,
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    layer_id: LayerId,
    offset: DVec2,
}

/// Tracks one drag gesture at a time.
#[derive(Debug, Default)]
pub struct DragController {
    active: Option<Drag>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn dragged_layer(&self) -> Option<LayerId> {
        self.active.map(|drag| drag.layer_id)
    }

    pub fn pointer_down(&mut self, document: &mut DocumentStore, point: DVec2) -> PointerOutcome {
        let Some(id) = hit_test(document, point) else {
            self.active = None;
            document.select(None);
            return PointerOutcome::Cleared;
        };
        let Some(layer) = document.layer(id) else {
            return PointerOutcome::Ignored;
        };
        let offset = point - DVec2::new(layer.x, layer.y);
        document.select(Some(id));
        self.active = Some(Drag {
            layer_id: id,
            offset,
        });
        debug!(%id, "Drag started");
        PointerOutcome::Selected(id)
    }

    pub fn pointer_move(&mut self, document: &mut DocumentStore, point: DVec2) -> PointerOutcome {
        let Some(drag) = self.active else {
            return PointerOutcome::Ignored;
        };
        if document.layer(drag.layer_id).is_none() {
            // Layer vanished mid-gesture (deleted or document replaced).
            self.active = None;
            return PointerOutcome::Ended;
        }
        let origin = point - drag.offset;
        document.update_layer(drag.layer_id, &LayerPatch::position(origin.x, origin.y));
        PointerOutcome::Moved(drag.layer_id)
    }

    pub fn pointer_up(&mut self) -> PointerOutcome {
        match self.active.take() {
            Some(drag) => {
                debug!(id = %drag.layer_id, "Drag ended");
                PointerOutcome::Ended
            }
            None => PointerOutcome::Ignored,
        }
    }

    pub fn pointer_leave(&mut self) -> PointerOutcome {
        self.pointer_up()
    }
}
