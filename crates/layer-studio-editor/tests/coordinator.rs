//! Edit coordinator behavior against hand-written collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use layer_studio_core::{
    DocumentStore, ImagePayload, Layer, NewLayerKind, SharedDocument, StudioError,
};
use layer_studio_editor::{
    EditAction, EditCoordinator, EditKind, EditOutcome, GENERATE_FAILED, LOCAL_REMOVAL_FAILED,
    RemovalMethod, SkipReason,
};
use layer_studio_providers::{BackgroundRemover, ImageGenerator};

enum Behavior {
    Succeed,
    Fail,
    MissingKey,
    Panic,
}

/// Counts calls and optionally blocks until released.
struct Mock {
    calls: AtomicUsize,
    gate: Option<Notify>,
    behavior: Behavior,
}

impl Mock {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
            behavior,
        })
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Some(Notify::new()),
            behavior: Behavior::Succeed,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    async fn respond(&self, data: Vec<u8>) -> anyhow::Result<ImagePayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.behavior {
            Behavior::Succeed => Ok(ImagePayload::png(data)),
            Behavior::Fail => anyhow::bail!("service unavailable"),
            Behavior::MissingKey => {
                Err(StudioError::MissingCredential("Gemini API key not set".into()).into())
            }
            Behavior::Panic => panic!("collaborator blew up"),
        }
    }
}

#[async_trait]
impl ImageGenerator for Mock {
    fn id(&self) -> &str {
        "mock"
    }

    async fn generate(&self, _prompt: &str) -> anyhow::Result<ImagePayload> {
        self.respond(vec![0xAA]).await
    }
}

#[async_trait]
impl BackgroundRemover for Mock {
    fn id(&self) -> &str {
        "mock"
    }

    async fn remove_background(&self, _image: &ImagePayload) -> anyhow::Result<ImagePayload> {
        self.respond(vec![0xBB]).await
    }
}

fn coordinator(
    document: SharedDocument,
    generator: Arc<Mock>,
    local: Arc<Mock>,
    ai: Arc<Mock>,
) -> Arc<EditCoordinator> {
    Arc::new(EditCoordinator::new(document, generator, local, ai))
}

async fn document_with_selected_image() -> SharedDocument {
    let document = DocumentStore::new().shared();
    {
        let mut doc = document.write().await;
        let layer = Layer::image(ImagePayload::png(vec![1, 2, 3]), 0.0, 0.0, 800.0, 600.0);
        let id = layer.id;
        doc.replace_all(vec![layer]);
        doc.select(Some(id));
    }
    document
}

async fn wait_until_running(coordinator: &EditCoordinator) {
    let mut state = coordinator.subscribe();
    state
        .wait_for(|s| !s.is_idle())
        .await
        .expect("coordinator dropped");
}

#[tokio::test]
async fn test_generate_installs_single_selected_image() {
    let document = DocumentStore::new().shared();
    {
        let mut doc = document.write().await;
        doc.add_layer(NewLayerKind::Text);
        doc.add_layer(NewLayerKind::Shape);
    }
    let generator = Mock::new(Behavior::Succeed);
    let coordinator = coordinator(
        document.clone(),
        generator.clone(),
        Mock::new(Behavior::Succeed),
        Mock::new(Behavior::Succeed),
    );

    let outcome = coordinator.generate("cat").await;
    let EditOutcome::Applied { layer_id } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };

    let doc = document.read().await;
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.selection(), Some(layer_id));
    let layer = &doc.layers()[0];
    assert_eq!(layer.id, layer_id);
    assert_eq!((layer.x, layer.y, layer.width, layer.height), (0.0, 0.0, 800.0, 600.0));
    assert_eq!(layer.image_src().unwrap().data(), &[0xAA]);
    assert_eq!(generator.calls(), 1);
    assert_eq!(coordinator.state(), EditAction::Idle);
}

#[tokio::test]
async fn test_only_one_external_call_in_flight() {
    let document = document_with_selected_image().await;
    let generator = Mock::gated();
    let local = Mock::new(Behavior::Succeed);
    let ai = Mock::new(Behavior::Succeed);
    let coordinator = coordinator(document.clone(), generator.clone(), local.clone(), ai.clone());

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.generate("a lighthouse").await }
    });
    wait_until_running(&coordinator).await;
    assert_eq!(coordinator.state(), EditAction::Running(EditKind::Generate));

    assert_eq!(coordinator.generate("a boat").await, EditOutcome::Skipped(SkipReason::Busy));
    assert_eq!(
        coordinator.remove_background(RemovalMethod::Local).await,
        EditOutcome::Skipped(SkipReason::Busy)
    );
    assert_eq!(
        coordinator.remove_background(RemovalMethod::Ai).await,
        EditOutcome::Skipped(SkipReason::Busy)
    );
    assert_eq!(generator.calls(), 1);
    assert_eq!(local.calls() + ai.calls(), 0);

    generator.release();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, EditOutcome::Applied { .. }));
    assert_eq!(coordinator.state(), EditAction::Idle);

    // Slot is free again.
    assert!(matches!(
        coordinator.remove_background(RemovalMethod::Local).await,
        EditOutcome::Applied { .. }
    ));
    assert_eq!(local.calls(), 1);
}

#[tokio::test]
async fn test_local_removal_without_image_makes_no_call() {
    let document = DocumentStore::new().shared();
    document.write().await.add_layer(NewLayerKind::Shape);
    let revision = document.read().await.revision();
    let local = Mock::new(Behavior::Succeed);
    let coordinator = coordinator(
        document.clone(),
        Mock::new(Behavior::Succeed),
        local.clone(),
        Mock::new(Behavior::Succeed),
    );

    assert_eq!(
        coordinator.remove_background(RemovalMethod::Local).await,
        EditOutcome::Skipped(SkipReason::NoImageSelected)
    );
    assert_eq!(local.calls(), 0);
    assert_eq!(document.read().await.revision(), revision);
}

#[tokio::test]
async fn test_removal_replaces_only_src() {
    let document = document_with_selected_image().await;
    let before = document.read().await.layers()[0].clone();
    let ai = Mock::new(Behavior::Succeed);
    let coordinator = coordinator(
        document.clone(),
        Mock::new(Behavior::Succeed),
        Mock::new(Behavior::Succeed),
        ai.clone(),
    );

    let outcome = coordinator.remove_background(RemovalMethod::Ai).await;
    assert_eq!(
        outcome,
        EditOutcome::Applied {
            layer_id: before.id
        }
    );

    let doc = document.read().await;
    let after = &doc.layers()[0];
    assert_eq!(after.image_src().unwrap().data(), &[0xBB]);
    assert_eq!(
        (after.id, after.x, after.y, after.width, after.height),
        (before.id, before.x, before.y, before.width, before.height)
    );
    assert_eq!(doc.selection(), Some(before.id));
}

#[tokio::test]
async fn test_removal_discarded_when_layer_deleted_mid_flight() {
    let document = document_with_selected_image().await;
    let layer_id = document.read().await.layers()[0].id;
    let local = Mock::gated();
    let coordinator = coordinator(
        document.clone(),
        Mock::new(Behavior::Succeed),
        local.clone(),
        Mock::new(Behavior::Succeed),
    );

    let task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.remove_background(RemovalMethod::Local).await }
    });
    wait_until_running(&coordinator).await;
    assert!(document.write().await.delete_layer(layer_id));
    local.release();

    assert_eq!(task.await.unwrap(), EditOutcome::Skipped(SkipReason::LayerRemoved));
    assert_eq!(local.calls(), 1);
    assert!(document.read().await.is_empty());
    assert!(coordinator.last_error().is_none());
    assert_eq!(coordinator.state(), EditAction::Idle);
}

#[tokio::test]
async fn test_failures_leave_document_unchanged() {
    let document = document_with_selected_image().await;
    let before = document.read().await.layers().to_vec();
    let coordinator = coordinator(
        document.clone(),
        Mock::new(Behavior::Fail),
        Mock::new(Behavior::Fail),
        Mock::new(Behavior::Fail),
    );
    let mut errors = coordinator.subscribe_errors();
    assert!(errors.borrow_and_update().is_none());

    assert_eq!(
        coordinator.generate("cat").await,
        EditOutcome::Failed {
            message: GENERATE_FAILED.into()
        }
    );
    assert!(errors.has_changed().unwrap());
    assert_eq!(errors.borrow_and_update().as_deref(), Some(GENERATE_FAILED));
    assert_eq!(coordinator.last_error().as_deref(), Some(GENERATE_FAILED));

    assert_eq!(
        coordinator.remove_background(RemovalMethod::Local).await,
        EditOutcome::Failed {
            message: LOCAL_REMOVAL_FAILED.into()
        }
    );
    assert_eq!(document.read().await.layers(), before.as_slice());
    assert_eq!(coordinator.state(), EditAction::Idle);
}

#[tokio::test]
async fn test_missing_credential_surfaces_own_message() {
    let coordinator = coordinator(
        DocumentStore::new().shared(),
        Mock::new(Behavior::MissingKey),
        Mock::new(Behavior::Succeed),
        Mock::new(Behavior::Succeed),
    );
    let EditOutcome::Failed { message } = coordinator.generate("cat").await else {
        panic!("expected failure");
    };
    assert!(message.contains("Gemini API key not set"));
    assert_ne!(message, GENERATE_FAILED);
}

#[tokio::test]
async fn test_state_resets_after_panic() {
    let coordinator = coordinator(
        DocumentStore::new().shared(),
        Mock::new(Behavior::Panic),
        Mock::new(Behavior::Succeed),
        Mock::new(Behavior::Succeed),
    );
    let task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.generate("cat").await }
    });
    assert!(task.await.unwrap_err().is_panic());
    assert_eq!(coordinator.state(), EditAction::Idle);
}

#[tokio::test]
async fn test_state_resets_when_future_dropped() {
    let generator = Mock::gated();
    let coordinator = coordinator(
        DocumentStore::new().shared(),
        generator.clone(),
        Mock::new(Behavior::Succeed),
        Mock::new(Behavior::Succeed),
    );
    let task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.generate("cat").await }
    });
    wait_until_running(&coordinator).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(coordinator.state(), EditAction::Idle);
    assert!(coordinator.document().read().await.is_empty());
}

#[tokio::test]
async fn test_subscribers_see_running_state() {
    let generator = Mock::gated();
    let coordinator = coordinator(
        DocumentStore::new().shared(),
        generator.clone(),
        Mock::new(Behavior::Succeed),
        Mock::new(Behavior::Succeed),
    );
    let mut state = coordinator.subscribe();
    let task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.generate("cat").await }
    });

    let running = *state.wait_for(|s| !s.is_idle()).await.unwrap();
    assert_eq!(running, EditAction::Running(EditKind::Generate));
    generator.release();
    task.await.unwrap();
    state.wait_for(EditAction::is_idle).await.unwrap();
}
