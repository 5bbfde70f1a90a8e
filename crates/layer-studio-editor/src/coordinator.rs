//! Async edit coordinator.
//!
//! Gates the two remote-backed edits (image generation and background
//! removal) behind a single in-flight slot. The slot is a watch channel:
//! entering an action is an atomic `Idle -> Running` check-and-set, and an
//! [`ActionGuard`] puts it back to `Idle` on every exit path, including
//! panics and dropped futures. A request that finds the slot taken is
//! dropped without touching any collaborator.
//!
//! The document lock is never held while a collaborator is running.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use layer_studio_core::{
    CANVAS_HEIGHT, CANVAS_WIDTH, Layer, LayerId, LayerPatch, SharedDocument, StudioError,
};
use layer_studio_providers::{BackgroundRemover, ImageGenerator};

pub const GENERATE_FAILED: &str = "Failed to generate image. Please try another prompt.";
pub const LOCAL_REMOVAL_FAILED: &str = "Manual background removal failed. Please try again.";
pub const AI_REMOVAL_FAILED: &str = "AI background removal failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Generate,
    LocalBackgroundRemoval,
    AiBackgroundRemoval,
}

impl EditKind {
    /// Label a front end shows on the busy control.
    pub fn progress_label(&self) -> &'static str {
        match self {
            EditKind::Generate => "Generating...",
            EditKind::LocalBackgroundRemoval | EditKind::AiBackgroundRemoval => "Processing...",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            EditKind::Generate => GENERATE_FAILED,
            EditKind::LocalBackgroundRemoval => LOCAL_REMOVAL_FAILED,
            EditKind::AiBackgroundRemoval => AI_REMOVAL_FAILED,
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditKind::Generate => "generate",
            EditKind::LocalBackgroundRemoval => "local-background-removal",
            EditKind::AiBackgroundRemoval => "ai-background-removal",
        };
        f.write_str(name)
    }
}

/// The system-wide edit-action state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditAction {
    #[default]
    Idle,
    Running(EditKind),
}

impl EditAction {
    pub fn is_idle(&self) -> bool {
        matches!(self, EditAction::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMethod {
    Local,
    Ai,
}

impl RemovalMethod {
    fn kind(self) -> EditKind {
        match self {
            RemovalMethod::Local => EditKind::LocalBackgroundRemoval,
            RemovalMethod::Ai => EditKind::AiBackgroundRemoval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another edit action is already running.
    Busy,
    EmptyPrompt,
    NoImageSelected,
    /// The target layer was deleted while the collaborator was running.
    LayerRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied { layer_id: LayerId },
    Skipped(SkipReason),
    Failed { message: String },
}

/// Resets the action state to idle when dropped.
struct ActionGuard<'a> {
    state: &'a watch::Sender<EditAction>,
    kind: EditKind,
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(EditAction::Idle);
        debug!(kind = %self.kind, "Edit action finished");
    }
}

pub struct EditCoordinator {
    document: SharedDocument,
    generator: Arc<dyn ImageGenerator>,
    local_remover: Arc<dyn BackgroundRemover>,
    ai_remover: Arc<dyn BackgroundRemover>,
    state: watch::Sender<EditAction>,
    last_error: watch::Sender<Option<String>>,
}

impl EditCoordinator {
    pub fn new(
        document: SharedDocument,
        generator: Arc<dyn ImageGenerator>,
        local_remover: Arc<dyn BackgroundRemover>,
        ai_remover: Arc<dyn BackgroundRemover>,
    ) -> Self {
        Self {
            document,
            generator,
            local_remover,
            ai_remover,
            state: watch::Sender::new(EditAction::Idle),
            last_error: watch::Sender::new(None),
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn state(&self) -> EditAction {
        *self.state.borrow()
    }

    /// Watch the edit-action state, e.g. to disable controls while busy.
    pub fn subscribe(&self) -> watch::Receiver<EditAction> {
        self.state.subscribe()
    }

    /// The user-facing message from the most recent failed action, if the
    /// latest action failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    pub fn clear_error(&self) {
        self.last_error.send_replace(None);
    }

    /// Generate an image from `prompt` and make it the whole document.
    pub async fn generate(&self, prompt: &str) -> EditOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return EditOutcome::Skipped(SkipReason::EmptyPrompt);
        }
        let Some(_guard) = self.try_begin(EditKind::Generate) else {
            return EditOutcome::Skipped(SkipReason::Busy);
        };

        debug!(generator = self.generator.id(), "Requesting image generation");
        let image = match self.generator.generate(prompt).await {
            Ok(image) => image,
            Err(e) => return self.fail(EditKind::Generate, &e),
        };

        let (width, height) = (f64::from(CANVAS_WIDTH), f64::from(CANVAS_HEIGHT));
        let layer = Layer::image(image, 0.0, 0.0, width, height);
        let layer_id = layer.id;
        {
            let mut document = self.document.write().await;
            document.replace_all(vec![layer]);
            document.select(Some(layer_id));
        }
        info!(%layer_id, generator = self.generator.id(), "Generated image installed");
        EditOutcome::Applied { layer_id }
    }

    /// Replace the selected image layer's bitmap with a background-free copy.
    pub async fn remove_background(&self, method: RemovalMethod) -> EditOutcome {
        let kind = method.kind();
        let selected = {
            let document = self.document.read().await;
            document
                .selected_image()
                .map(|(id, image)| (id, image.clone()))
        };
        let Some((layer_id, image)) = selected else {
            return EditOutcome::Skipped(SkipReason::NoImageSelected);
        };
        let Some(_guard) = self.try_begin(kind) else {
            return EditOutcome::Skipped(SkipReason::Busy);
        };

        let remover = match method {
            RemovalMethod::Local => &self.local_remover,
            RemovalMethod::Ai => &self.ai_remover,
        };
        debug!(%layer_id, remover = remover.id(), "Requesting background removal");
        let cut_out = match remover.remove_background(&image).await {
            Ok(cut_out) => cut_out,
            Err(e) => return self.fail(kind, &e),
        };

        let mut document = self.document.write().await;
        if document.layer(layer_id).is_none() {
            warn!(%layer_id, "Layer removed before background removal finished");
            return EditOutcome::Skipped(SkipReason::LayerRemoved);
        }
        document.update_layer(layer_id, &LayerPatch::src(cut_out));
        info!(%layer_id, remover = remover.id(), "Background removed");
        EditOutcome::Applied { layer_id }
    }

    fn try_begin(&self, kind: EditKind) -> Option<ActionGuard<'_>> {
        let started = self.state.send_if_modified(|state| {
            if state.is_idle() {
                *state = EditAction::Running(kind);
                true
            } else {
                false
            }
        });
        if !started {
            warn!(
                requested = %kind,
                current = ?self.state(),
                "Edit action already running, request dropped"
            );
            return None;
        }
        self.clear_error();
        debug!(%kind, "Edit action started");
        Some(ActionGuard {
            state: &self.state,
            kind,
        })
    }

    fn fail(&self, kind: EditKind, err: &anyhow::Error) -> EditOutcome {
        error!(%kind, error = %err, "Edit action failed");
        let message = match err.downcast_ref::<StudioError>() {
            Some(StudioError::MissingCredential(_)) => err.to_string(),
            _ => kind.failure_message().to_string(),
        };
        self.last_error.send_replace(Some(message.clone()));
        EditOutcome::Failed { message }
    }
}
