//! Canvas rendering for Layer Studio.
//!
//! The document is painted into a typed [`Scene`] that serializes to SVG
//! markup; pointer input is mapped into canvas-local coordinates and turned
//! into drag updates; the export pipeline rasterizes a scene into PNG or JPEG.

pub mod export;
pub mod interaction;
pub mod scene;
pub mod transform;

pub use export::{ExportError, ExportFormat, export_scene, rasterize};
pub use interaction::{DragController, PointerOutcome, hit_test};
pub use scene::{Primitive, Scene, SceneNode, SceneOptions};
pub use transform::{screen_ctm, screen_to_local};
