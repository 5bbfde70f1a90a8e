//! The document store: an ordered layer list (index 0 paints first) plus the
//! current selection.
//!
//! All mutations go through [`DocumentStore`], which upholds two invariants:
//! layer ids are unique, and the selection always references a layer that is
//! present in the document.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::layer::{Layer, LayerId, LayerPatch, NewLayerKind};
use crate::payload::ImagePayload;

/// A document store shared between the editor front end and the async edit
/// coordinator.
pub type SharedDocument = Arc<RwLock<DocumentStore>>;

/// Direction for [`DocumentStore::move_layer`]. `Up` moves towards the top
/// of the paint order (later in the list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    layers: Vec<Layer>,
    selection: Option<LayerId>,
    revision: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    /// Layers bottom-to-top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn selection(&self) -> Option<LayerId> {
        self.selection
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selection.and_then(|id| self.layer(id))
    }

    /// The selected layer's id and image payload, if an image layer is
    /// selected.
    pub fn selected_image(&self) -> Option<(LayerId, &ImagePayload)> {
        let layer = self.selected_layer()?;
        layer.image_src().map(|src| (layer.id, src))
    }

    /// Incremented by every mutation that changed the document or selection.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Append a new text or shape layer with default properties and select it.
    pub fn add_layer(&mut self, kind: NewLayerKind) -> LayerId {
        let layer = Layer::with_defaults(kind);
        let id = layer.id;
        debug!(%id, kind = layer.kind_name(), "Layer added");
        self.layers.push(layer);
        self.selection = Some(id);
        self.touch();
        id
    }

    /// Merge `patch` into the layer with the given id. Unknown ids are ignored.
    pub fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        let changed = layer.apply(patch);
        if changed {
            self.touch();
        }
        changed
    }

    /// Remove a layer, clearing the selection if it pointed at it.
    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.layers.remove(index);
        if self.selection == Some(id) {
            self.selection = None;
        }
        debug!(%id, "Layer deleted");
        self.touch();
        true
    }

    /// Swap a layer with its neighbour in the given direction. Moving past
    /// either end of the stack leaves the order unchanged.
    pub fn move_layer(&mut self, id: LayerId, direction: MoveDirection) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let neighbour = match direction {
            MoveDirection::Up if index + 1 < self.layers.len() => index + 1,
            MoveDirection::Down if index > 0 => index - 1,
            MoveDirection::Up | MoveDirection::Down => return false,
        };
        self.layers.swap(index, neighbour);
        self.touch();
        true
    }

    /// Discard every layer and the selection, then install `layers`.
    ///
    /// Duplicate ids keep their first occurrence. Out-of-range geometry and
    /// font sizes are normalized on the way in.
    pub fn replace_all(&mut self, layers: Vec<Layer>) {
        let mut seen = HashSet::with_capacity(layers.len());
        let mut installed = Vec::with_capacity(layers.len());
        for mut layer in layers {
            if seen.insert(layer.id) {
                if layer.normalize() {
                    warn!(id = %layer.id, "Clamped out-of-range layer properties");
                }
                installed.push(layer);
            } else {
                warn!(id = %layer.id, "Dropping layer with duplicate id");
            }
        }
        self.layers = installed;
        self.selection = None;
        self.touch();
    }

    /// Set the selection. Selecting an id that is not in the document clears
    /// the selection instead.
    pub fn select(&mut self, id: Option<LayerId>) {
        let next = id.filter(|id| self.index_of(*id).is_some());
        if next != self.selection {
            self.selection = next;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
