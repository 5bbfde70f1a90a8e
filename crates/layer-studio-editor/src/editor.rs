//! The editor session: one shared document plus everything that edits,
//! paints, and exports it.
//!
//! Every mutation publishes the document revision on a watch channel, which
//! front ends use as their re-render signal.

use std::path::PathBuf;
use std::sync::Arc;

use glam::{DAffine2, DVec2};
use tokio::sync::{Mutex, watch};
use tracing::debug;

use layer_studio_canvas::{
    DragController, ExportFormat, PointerOutcome, Scene, SceneOptions, export_scene,
    screen_to_local,
};
use layer_studio_core::config::Config;
use layer_studio_core::{
    DocumentStore, Layer, LayerId, LayerPatch, MoveDirection, NewLayerKind, SharedDocument,
};
use layer_studio_providers::{
    BackgroundRemover, GeminiBackgroundRemover, GeminiClient, GeminiImageGenerator, ImageGenerator,
    LocalBackgroundRemover,
};

use crate::coordinator::{EditCoordinator, EditOutcome, RemovalMethod};
use crate::panels::{self, LayerEntry, PropertyField, PropertyRow};

/// Editor surface color behind the layers. Never exported.
pub const SURFACE_BACKGROUND: &str = "#2d2d2d";

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub out_dir: PathBuf,
    pub jpeg_quality: u8,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            jpeg_quality: 92,
        }
    }
}

pub struct Editor {
    document: SharedDocument,
    coordinator: EditCoordinator,
    drag: Mutex<DragController>,
    export: ExportSettings,
    revision: watch::Sender<u64>,
}

impl Editor {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        local_remover: Arc<dyn BackgroundRemover>,
        ai_remover: Arc<dyn BackgroundRemover>,
        export: ExportSettings,
    ) -> Self {
        let document = DocumentStore::new().shared();
        Self {
            coordinator: EditCoordinator::new(
                document.clone(),
                generator,
                local_remover,
                ai_remover,
            ),
            document,
            drag: Mutex::new(DragController::new()),
            export,
            revision: watch::Sender::new(0),
        }
    }

    /// Wire the Gemini collaborators and the local remover from config.
    pub fn from_config(config: &Config) -> Self {
        let client = GeminiClient::from_config(&config.gemini()).shared();
        Self::new(
            Arc::new(GeminiImageGenerator::new(client.clone())),
            Arc::new(LocalBackgroundRemover::new(config.background_tolerance())),
            Arc::new(GeminiBackgroundRemover::new(client)),
            ExportSettings {
                out_dir: config.output_dir(),
                jpeg_quality: config.jpeg_quality(),
            },
        )
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn coordinator(&self) -> &EditCoordinator {
        &self.coordinator
    }

    /// Fires whenever the document changes.
    pub fn subscribe_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    async fn mutate<R>(&self, f: impl FnOnce(&mut DocumentStore) -> R) -> R {
        let mut document = self.document.write().await;
        let result = f(&mut document);
        self.publish(document.revision());
        result
    }

    fn publish(&self, revision: u64) {
        self.revision.send_if_modified(|current| {
            if *current == revision {
                return false;
            }
            *current = revision;
            true
        });
    }

    async fn sync_revision(&self) {
        let revision = self.document.read().await.revision();
        self.publish(revision);
    }

    pub async fn add_layer(&self, kind: NewLayerKind) -> LayerId {
        self.mutate(|doc| doc.add_layer(kind)).await
    }

    pub async fn update_layer(&self, id: LayerId, patch: &LayerPatch) -> bool {
        self.mutate(|doc| doc.update_layer(id, patch)).await
    }

    pub async fn delete_layer(&self, id: LayerId) -> bool {
        self.mutate(|doc| doc.delete_layer(id)).await
    }

    pub async fn move_layer(&self, id: LayerId, direction: MoveDirection) -> bool {
        self.mutate(|doc| doc.move_layer(id, direction)).await
    }

    pub async fn replace_all(&self, layers: Vec<Layer>) {
        self.mutate(|doc| doc.replace_all(layers)).await
    }

    pub async fn select(&self, id: Option<LayerId>) {
        self.mutate(|doc| doc.select(id)).await
    }

    /// Move the selected layer one step; no-op when nothing is selected.
    pub async fn move_selected(&self, direction: MoveDirection) -> bool {
        self.mutate(|doc| doc.selection().is_some_and(|id| doc.move_layer(id, direction)))
            .await
    }

    pub async fn delete_selected(&self) -> bool {
        self.mutate(|doc| doc.selection().is_some_and(|id| doc.delete_layer(id)))
            .await
    }

    pub async fn generate(&self, prompt: &str) -> EditOutcome {
        let outcome = self.coordinator.generate(prompt).await;
        self.sync_revision().await;
        outcome
    }

    pub async fn remove_background(&self, method: RemovalMethod) -> EditOutcome {
        let outcome = self.coordinator.remove_background(method).await;
        self.sync_revision().await;
        outcome
    }

    pub async fn pointer_down(&self, ctm: &DAffine2, screen: DVec2) -> PointerOutcome {
        let Some(point) = screen_to_local(ctm, screen) else {
            debug!("Pointer down ignored: degenerate screen transform");
            return PointerOutcome::Ignored;
        };
        let mut drag = self.drag.lock().await;
        self.mutate(|doc| drag.pointer_down(doc, point)).await
    }

    pub async fn pointer_move(&self, ctm: &DAffine2, screen: DVec2) -> PointerOutcome {
        let Some(point) = screen_to_local(ctm, screen) else {
            return PointerOutcome::Ignored;
        };
        let mut drag = self.drag.lock().await;
        if !drag.is_dragging() {
            return PointerOutcome::Ignored;
        }
        self.mutate(|doc| drag.pointer_move(doc, point)).await
    }

    pub async fn pointer_up(&self) -> PointerOutcome {
        self.drag.lock().await.pointer_up()
    }

    pub async fn pointer_leave(&self) -> PointerOutcome {
        self.drag.lock().await.pointer_leave()
    }

    /// The scene as shown in the editor, selection outline included.
    pub async fn scene(&self) -> Scene {
        let document = self.document.read().await;
        Scene::from_document(
            &document,
            &SceneOptions {
                background: Some(SURFACE_BACKGROUND.into()),
            },
        )
    }

    pub async fn svg(&self) -> String {
        self.scene().await.to_svg()
    }

    /// Rasterize the document into the configured output directory.
    pub async fn export(&self, format: ExportFormat) -> Option<PathBuf> {
        let scene = self.scene().await;
        export_scene(&scene, format, self.export.jpeg_quality, &self.export.out_dir).await
    }

    pub async fn layer_entries(&self) -> Vec<LayerEntry> {
        panels::layer_entries(&*self.document.read().await)
    }

    /// Property rows for the selected layer, `None` when nothing is selected.
    pub async fn selected_properties(&self) -> Option<Vec<PropertyRow>> {
        let document = self.document.read().await;
        document.selected_layer().map(panels::property_rows)
    }

    /// Apply a properties-panel edit to the selected layer.
    pub async fn edit_selected(&self, field: PropertyField, raw: &str) -> bool {
        let Some(patch) = panels::parse_edit(field, raw) else {
            return false;
        };
        self.mutate(|doc| doc.selection().is_some_and(|id| doc.update_layer(id, &patch)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use layer_studio_core::ImagePayload;

    struct Offline;

    #[async_trait]
    impl ImageGenerator for Offline {
        fn id(&self) -> &str {
            "offline"
        }

        async fn generate(&self, _prompt: &str) -> anyhow::Result<ImagePayload> {
            anyhow::bail!("offline")
        }
    }

    #[async_trait]
    impl BackgroundRemover for Offline {
        fn id(&self) -> &str {
            "offline"
        }

        async fn remove_background(&self, _image: &ImagePayload) -> anyhow::Result<ImagePayload> {
            anyhow::bail!("offline")
        }
    }

    fn editor() -> Editor {
        editor_with(ExportSettings::default())
    }

    fn editor_with(settings: ExportSettings) -> Editor {
        Editor::new(Arc::new(Offline), Arc::new(Offline), Arc::new(Offline), settings)
    }

    #[tokio::test]
    async fn test_mutations_publish_revision() {
        let editor = editor();
        let mut revisions = editor.subscribe_revision();
        assert_eq!(*revisions.borrow_and_update(), 0);

        editor.add_layer(NewLayerKind::Text).await;
        assert!(revisions.has_changed().unwrap());
        revisions.borrow_and_update();

        // No-op mutation leaves the revision alone.
        editor.move_selected(MoveDirection::Up).await;
        assert!(!revisions.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_drag_through_screen_transform() {
        let editor = editor();
        let id = editor.add_layer(NewLayerKind::Shape).await;
        // Canvas drawn at (10, 20) on screen, unscaled.
        let ctm = DAffine2::from_translation(DVec2::new(10.0, 20.0));

        assert_eq!(
            editor.pointer_down(&ctm, DVec2::new(70.0, 80.0)).await,
            PointerOutcome::Selected(id)
        );
        editor.pointer_move(&ctm, DVec2::new(90.0, 120.0)).await;
        assert_eq!(editor.pointer_up().await, PointerOutcome::Ended);

        let doc = editor.document().read().await;
        let layer = doc.layer(id).unwrap();
        assert_eq!((layer.x, layer.y), (70.0, 90.0));
    }

    #[tokio::test]
    async fn test_degenerate_transform_is_ignored() {
        let editor = editor();
        editor.add_layer(NewLayerKind::Shape).await;
        let ctm = DAffine2::from_cols_array(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            editor.pointer_down(&ctm, DVec2::new(60.0, 60.0)).await,
            PointerOutcome::Ignored
        );
        assert!(editor.document().read().await.selection().is_some());
    }

    #[tokio::test]
    async fn test_edit_selected_properties() {
        let editor = editor();
        let id = editor.add_layer(NewLayerKind::Text).await;
        assert!(editor.edit_selected(PropertyField::Text, "Hello").await);
        assert!(!editor.edit_selected(PropertyField::FontSize, "abc").await);

        let rows = editor.selected_properties().await.unwrap();
        let text = rows.iter().find(|r| r.field == PropertyField::Text).unwrap();
        assert_eq!(text.value, "Hello");
        assert_eq!(editor.layer_entries().await[0].name, "Hello");

        assert!(editor.delete_selected().await);
        assert!(editor.selected_properties().await.is_none());
        assert!(editor.document().read().await.layer(id).is_none());
    }

    #[tokio::test]
    async fn test_editor_svg_shows_surface_background() {
        let editor = editor();
        editor.add_layer(NewLayerKind::Shape).await;
        let svg = editor.svg().await;
        assert!(svg.contains("background-color:#2d2d2d"));
        assert!(svg.contains("stroke-dasharray"));
    }

    #[tokio::test]
    async fn test_export_writes_into_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ExportSettings {
            out_dir: dir.path().to_path_buf(),
            jpeg_quality: 80,
        };
        let editor = editor_with(settings);
        editor.add_layer(NewLayerKind::Shape).await;

        let png = editor.export(ExportFormat::Png).await.unwrap();
        assert_eq!(png, dir.path().join("design.png"));
        assert!(std::fs::read(&png).unwrap().starts_with(b"\x89PNG"));

        let jpeg = editor.export(ExportFormat::Jpeg).await.unwrap();
        assert_eq!(jpeg, dir.path().join("design.jpeg"));
        assert!(std::fs::read(&jpeg).unwrap().starts_with(&[0xFF, 0xD8]));
    }

    #[tokio::test]
    async fn test_export_into_missing_dir_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ExportSettings {
            out_dir: dir.path().join("missing"),
            ..ExportSettings::default()
        };
        let editor = editor_with(settings);
        editor.add_layer(NewLayerKind::Shape).await;
        assert!(editor.export(ExportFormat::Png).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_generation_reports_error() {
        let editor = editor();
        let outcome = editor.generate("cat").await;
        assert!(matches!(outcome, EditOutcome::Failed { .. }));
        assert!(editor.coordinator().last_error().is_some());
        assert!(editor.document().read().await.is_empty());
    }
}
