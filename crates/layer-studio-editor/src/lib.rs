//! Editor session for Layer Studio.
//!
//! [`Editor`] owns the shared document and routes every user action to it:
//! direct store edits, pointer drags, panel edits, and the remote-backed
//! edits that go through the [`EditCoordinator`].

pub mod coordinator;
pub mod editor;
pub mod panels;

pub use coordinator::{
    AI_REMOVAL_FAILED, EditAction, EditCoordinator, EditKind, EditOutcome, GENERATE_FAILED,
    LOCAL_REMOVAL_FAILED, RemovalMethod, SkipReason,
};
pub use editor::{Editor, ExportSettings, SURFACE_BACKGROUND};
pub use panels::{LayerEntry, PropertyField, PropertyRow};
