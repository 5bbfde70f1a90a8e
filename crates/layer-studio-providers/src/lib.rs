//! External image collaborators.
//!
//! The editor talks to two kinds of service: an [`ImageGenerator`] that turns
//! a prompt into a bitmap, and [`BackgroundRemover`]s that return a copy of a
//! bitmap with its background made transparent. Each is a trait so the edit
//! coordinator can be driven by Gemini, the in-process remover, or test
//! doubles.

use async_trait::async_trait;

use layer_studio_core::ImagePayload;

pub mod gemini;
pub mod local;

pub use gemini::{GeminiBackgroundRemover, GeminiClient, GeminiImageGenerator};
pub use local::LocalBackgroundRemover;

/// Turns a text prompt into an image. Single attempt, no retries.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Collaborator identifier for logs (e.g. "gemini-imagen").
    fn id(&self) -> &str;

    async fn generate(&self, prompt: &str) -> anyhow::Result<ImagePayload>;
}

/// Returns a copy of an image whose background is fully transparent.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Collaborator identifier for logs (e.g. "local", "gemini").
    fn id(&self) -> &str;

    async fn remove_background(&self, image: &ImagePayload) -> anyhow::Result<ImagePayload>;
}
