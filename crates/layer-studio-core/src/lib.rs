//! Core types, config, errors, and the layer document model for Layer Studio.

pub mod config;
pub mod document;
pub mod error;
pub mod layer;
pub mod payload;

pub use document::{DocumentStore, MoveDirection, SharedDocument};
pub use error::{Result, StudioError};
pub use layer::{Layer, LayerId, LayerKind, LayerPatch, NewLayerKind, ShapeType};
pub use payload::ImagePayload;

/// Fixed canvas width in document units (and export pixels).
pub const CANVAS_WIDTH: u32 = 800;

/// Fixed canvas height in document units (and export pixels).
pub const CANVAS_HEIGHT: u32 = 600;
