//! Google Generative AI (Gemini / Imagen) collaborators.
//!
//! Generation uses the Imagen `:predict` endpoint; AI background removal uses
//! an image-capable Gemini model through `:generateContent` with the source
//! image attached as inline data. Auth is via API key in query parameter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use layer_studio_core::config::GeminiConfig;
use layer_studio_core::{ImagePayload, StudioError};

use crate::{BackgroundRemover, ImageGenerator};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Matches the 800x600 canvas.
const ASPECT_RATIO: &str = "4:3";

const BACKGROUND_REMOVAL_INSTRUCTION: &str = "Task: Background removal. Input: Image. \
Action: Identify the primary subject and completely remove the background, replacing it with transparency. \
Output requirements: Return a PNG image. The background must be a true transparent alpha channel. \
Do not simulate transparency with a white or other colored background.";

/// Shared HTTP client and credentials for the Gemini collaborators.
///
/// The API key is resolved up front but only checked when a request is made,
/// so a missing key fails the first remote call rather than startup.
pub struct GeminiClient {
    pub base_url: String,
    image_model: String,
    edit_model: String,
    api_key: Option<String>,
    api_key_env: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            image_model: config
                .image_model
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.into()),
            edit_model: config
                .edit_model
                .clone()
                .unwrap_or_else(|| DEFAULT_EDIT_MODEL.into()),
            api_key: config.resolve_api_key(),
            api_key_env: config.api_key_env_name().to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn api_key(&self) -> anyhow::Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            StudioError::MissingCredential(format!(
                "Gemini API key not set. Set gemini.apiKey in config or the {} environment variable.",
                self.api_key_env
            ))
            .into()
        })
    }

    fn endpoint(&self, model: &str, method: &str, api_key: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}?key={api_key}", self.base_url)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error {status}: {body}");
        }

        Ok(response.json().await?)
    }
}

// --- Imagen request/response types ---

fn imagen_request(prompt: &str) -> serde_json::Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": {
            "sampleCount": 1,
            "aspectRatio": ASPECT_RATIO,
            "outputOptions": { "mimeType": "image/png" },
        }
    })
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

fn first_prediction(response: PredictResponse) -> anyhow::Result<ImagePayload> {
    let prediction = response
        .predictions
        .into_iter()
        .find(|p| p.bytes_base64_encoded.is_some())
        .ok_or_else(|| {
            anyhow::anyhow!("Image generation failed, no images were returned from the API.")
        })?;
    let mime = prediction.mime_type.unwrap_or_else(|| "image/png".into());
    let data = prediction.bytes_base64_encoded.unwrap_or_default();
    Ok(ImagePayload::from_base64(mime, &data)?)
}

// --- generateContent request/response types ---

fn background_removal_request(image: &ImagePayload) -> serde_json::Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": image.mime_type(),
                        "data": image.to_base64(),
                    }
                },
                { "text": BACKGROUND_REMOVAL_INSTRUCTION },
            ]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"],
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentPart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn first_inline_image(response: GenerateContentResponse) -> anyhow::Result<ImagePayload> {
    let inline = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .ok_or_else(|| {
            anyhow::anyhow!("AI did not return an image. It might have returned text instead.")
        })?;
    Ok(ImagePayload::from_base64(inline.mime_type, &inline.data)?)
}

/// Text-to-image generation through Imagen.
pub struct GeminiImageGenerator {
    client: Arc<GeminiClient>,
}

impl GeminiImageGenerator {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    fn id(&self) -> &str {
        "gemini-imagen"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<ImagePayload> {
        let api_key = self.client.api_key()?;
        let model = &self.client.image_model;
        let url = self.client.endpoint(model, "predict", api_key);

        debug!(%model, prompt_len = prompt.len(), "Requesting image generation");
        let response: PredictResponse = self.client.post(&url, &imagen_request(prompt)).await?;
        let image = first_prediction(response)?;

        info!(%model, size_kb = image.len() / 1024, "Image generated (Gemini)");
        Ok(image)
    }
}

/// Background removal by asking an image-capable Gemini model for a
/// transparent cut-out.
pub struct GeminiBackgroundRemover {
    client: Arc<GeminiClient>,
}

impl GeminiBackgroundRemover {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackgroundRemover for GeminiBackgroundRemover {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn remove_background(&self, image: &ImagePayload) -> anyhow::Result<ImagePayload> {
        let api_key = self.client.api_key()?;
        let model = &self.client.edit_model;
        let url = self.client.endpoint(model, "generateContent", api_key);

        debug!(
            %model,
            mime = image.mime_type(),
            size_kb = image.len() / 1024,
            "Requesting AI background removal"
        );
        let response: GenerateContentResponse = self
            .client
            .post(&url, &background_removal_request(image))
            .await?;
        let cut_out = first_inline_image(response)?;

        info!(%model, mime = cut_out.mime_type(), "Background removed (Gemini)");
        Ok(cut_out)
    }
}
