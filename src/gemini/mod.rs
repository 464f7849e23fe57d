//! Minimal client for the Google Generative Language `generateContent` API.
//!
//! Only the slice of the contract the render pipeline needs is modeled:
//! a single user turn of text + inline base64 image parts in, and the first
//! inline image of the first candidate out. The API key travels in the
//! `x-goog-api-key` header so it never appears in request URLs or logs.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn inline_image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    image_config: ImageConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// The first inline image part of the first candidate, if any.
    /// The model interleaves text and image parts; only the image matters here.
    pub fn first_inline_image(&self) -> Option<&InlineData> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|part| part.inline_data.as_ref())
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

pub struct GeminiClient {
    http: reqwest::Client,
    api_base_url: String,
    api_key: String,
    model: String,
    aspect_ratio: String,
    image_size: String,
}

impl GeminiClient {
    pub fn new(api_key: String, render: &RenderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(render.timeout_secs))
            .build()
            .context("failed to build model HTTP client")?;
        Ok(Self {
            http,
            api_base_url: render.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: render.model.clone(),
            aspect_ratio: render.aspect_ratio.clone(),
            image_size: render.image_size.clone(),
        })
    }

    /// One user turn of `parts`, requesting TEXT+IMAGE modalities back.
    pub async fn generate_content(&self, parts: Vec<Part>) -> Result<GenerateContentResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base_url, self.model
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: self.aspect_ratio.clone(),
                    image_size: self.image_size.clone(),
                },
            },
        };

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("model request failed to send")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "model API returned {status}: {}",
                body.chars().take(300).collect::<String>()
            );
        }

        resp.json::<GenerateContentResponse>()
            .await
            .context("failed to decode model response")
    }
}
