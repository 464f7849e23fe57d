//! Render generation pipeline.
//!
//! Given an uploaded room photo and a fabric image reference, produce one
//! composed image of roller blinds in that fabric fitted into the room. The
//! compositing itself happens in an external generative-image model; this
//! module only normalizes the fabric reference, inlines both images as
//! base64, submits the fixed instruction, and relays the produced image back
//! as a data URL.
//!
//! The pipeline is a straight sequence of fallible steps with no retries,
//! no caching, and no shared state between requests.

pub mod urls;

use anyhow::Context as _;
use base64::Engine as _;
use tracing::{debug, info};

use crate::config::RenderConfig;
use crate::gemini::{GeminiClient, Part};

/// Timeout for fetching the fabric swatch image (the model call has its own,
/// much longer budget).
const FABRIC_FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Fixed instruction sent with every render request. Mount and coverage
/// constraints are part of the product: blinds are quoted outside-mount,
/// ceiling to sill, so the montage must show exactly that.
const RENDER_PROMPT: &str = "You are an expert in hyperrealistic photomontages \
specialized in roller blinds.

The first image is a real photo of a window in a room of a home.
The second image shows a roller blind fabric.

Your task: create a hyperrealistic photomontage that places a roller blind \
made of the fabric in the second image into the room shown in the first image.

ESSENTIAL REQUIREMENTS OF THE PHOTOMONTAGE:
- The roller blind MUST REACH THE MAIN CEILING OF THE ROOM
- The roller blind MUST COMPLETELY COVER THE WINDOW with an OUTSIDE MOUNTING \
installation
- The blind fabric must have exactly the same texture, pattern and color as \
the second image
- Keep the original lighting and style of the room
- The result must be photorealistic and professional
- Do not add any text, watermarks or captions

Generate the final photomontage.";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("fabric image fetch failed: {0}")]
    FabricFetch(#[source] anyhow::Error),
    #[error("model request failed: {0}")]
    Model(#[source] anyhow::Error),
    #[error("no image data in model response")]
    NoImageData,
}

/// Content type for the fabric swatch, derived from the reference's file
/// extension. Unknown extensions default to JPEG.
pub fn fabric_mime_from_url(url: &str) -> &'static str {
    let ext = url
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

pub struct Renderer {
    http: reqwest::Client,
    gemini: GeminiClient,
    /// Base URL relative fabric paths are resolved against.
    public_base_url: String,
}

impl Renderer {
    pub fn new(
        api_key: String,
        render: &RenderConfig,
        public_base_url: String,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FABRIC_FETCH_TIMEOUT)
            .build()
            .context("failed to build fabric fetch client")?;
        Ok(Self {
            http,
            gemini: GeminiClient::new(api_key, render)?,
            public_base_url,
        })
    }

    /// Run the full pipeline and return the generated image as a data URL.
    ///
    /// The caller has already validated that both inputs are present; this
    /// method performs the two network steps (fabric fetch, model call) and
    /// short-circuits on the first failure.
    pub async fn generate(
        &self,
        room_bytes: &[u8],
        room_mime: &str,
        fabric_image_url: &str,
    ) -> Result<String, RenderError> {
        let fabric_url = urls::resolve_fabric_url(fabric_image_url, &self.public_base_url);
        debug!(url = %fabric_url, "fetching fabric image");

        let fabric_bytes = self
            .fetch_fabric(&fabric_url)
            .await
            .map_err(RenderError::FabricFetch)?;

        let engine = base64::engine::general_purpose::STANDARD;
        let room_b64 = engine.encode(room_bytes);
        let fabric_b64 = engine.encode(&fabric_bytes);

        let room_mime = if room_mime.is_empty() {
            "image/jpeg"
        } else {
            room_mime
        };
        // The original reference decides the fabric content type, not the
        // rewritten Drive URL (which has no extension).
        let fabric_mime = fabric_mime_from_url(fabric_image_url);

        let parts = vec![
            Part::text(RENDER_PROMPT),
            Part::inline_image(room_mime, room_b64),
            Part::inline_image(fabric_mime, fabric_b64),
        ];

        let response = self
            .gemini
            .generate_content(parts)
            .await
            .map_err(RenderError::Model)?;

        let image = response
            .first_inline_image()
            .ok_or(RenderError::NoImageData)?;
        let mime = if image.mime_type.is_empty() {
            "image/png"
        } else {
            image.mime_type.as_str()
        };

        info!(mime = %mime, "render generated");
        Ok(format!("data:{mime};base64,{}", image.data))
    }

    async fn fetch_fabric(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("could not reach {url}"))?
            .error_for_status()
            .context("fabric image server returned an error")?;
        let bytes = resp
            .bytes()
            .await
            .context("failed to read fabric image body")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fabric_mime_defaults_to_jpeg() {
        assert_eq!(fabric_mime_from_url("https://x.test/a.jpg"), "image/jpeg");
        assert_eq!(fabric_mime_from_url("https://x.test/a"), "image/jpeg");
        assert_eq!(
            fabric_mime_from_url("https://drive.google.com/file/d/ABC/view"),
            "image/jpeg"
        );
    }

    #[test]
    fn fabric_mime_honors_known_extensions() {
        assert_eq!(fabric_mime_from_url("/fabrics/lino.png"), "image/png");
        assert_eq!(fabric_mime_from_url("/fabrics/lino.WEBP"), "image/webp");
    }
}
