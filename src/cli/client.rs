//! Lightweight HTTP client for CLI commands.
//!
//! CLI subcommands (`rullod status`, `rullod fabrics`, `rullod render`) use
//! this to talk to the running daemon's REST API.

use anyhow::{Context as _, Result};
use serde_json::{json, Value};

use crate::studio::{Fabric, RoomImage};

/// Per-request timeout for catalog and admin calls.
const CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
/// Render calls wait on the external model and get a far larger budget.
const RENDER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(180);

/// A short-lived REST client for CLI-to-daemon calls.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client targeting `base_url` (e.g. `http://127.0.0.1:4460`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Check if the daemon is reachable (3-second timeout).
    pub async fn is_reachable(&self) -> bool {
        self.http
            .get(self.url("/api/health"))
            .timeout(std::time::Duration::from_secs(3))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// GET /api/health.
    pub async fn health(&self) -> Result<Value> {
        let resp = self
            .http
            .get(self.url("/api/health"))
            .timeout(CALL_TIMEOUT)
            .send()
            .await
            .context("could not reach daemon — is it running?")?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// POST /api/admin/auth — exchange the password for the bearer value.
    pub async fn login(&self, password: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url("/api/admin/auth"))
            .timeout(CALL_TIMEOUT)
            .json(&json!({ "password": password }))
            .send()
            .await
            .context("could not reach daemon — is it running?")?;

        let body: Value = resp.json().await.context("malformed auth response")?;
        if body["success"].as_bool() != Some(true) {
            anyhow::bail!(
                "login failed: {}",
                body["error"].as_str().unwrap_or("unknown error")
            );
        }
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("auth response carried no token")
    }

    /// GET /api/fabrics — the public catalog (possibly empty).
    pub async fn list_fabrics(&self) -> Result<Vec<Fabric>> {
        let resp = self
            .http
            .get(self.url("/api/fabrics"))
            .timeout(CALL_TIMEOUT)
            .send()
            .await
            .context("could not reach daemon — is it running?")?
            .error_for_status()?;
        Ok(resp.json().await.context("malformed fabric listing")?)
    }

    /// POST /api/admin/fabrics.
    pub async fn add_fabric(
        &self,
        token: &str,
        name: &str,
        image_url: &str,
        fabric_type: Option<&str>,
        color: Option<&str>,
    ) -> Result<Fabric> {
        let resp = self
            .http
            .post(self.url("/api/admin/fabrics"))
            .timeout(CALL_TIMEOUT)
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "imageUrl": image_url,
                "fabricType": fabric_type,
                "color": color,
            }))
            .send()
            .await?;

        let body: Value = resp.json().await.context("malformed add-fabric response")?;
        if body["success"].as_bool() != Some(true) {
            anyhow::bail!(
                "add failed: {}",
                body["error"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(serde_json::from_value(body["fabric"].clone())?)
    }

    /// DELETE /api/admin/fabrics. Succeeds for ids that never existed.
    pub async fn remove_fabric(&self, token: &str, id: i64) -> Result<()> {
        let resp = self
            .http
            .delete(self.url("/api/admin/fabrics"))
            .timeout(CALL_TIMEOUT)
            .bearer_auth(token)
            .json(&json!({ "id": id }))
            .send()
            .await?;

        let body: Value = resp.json().await.context("malformed delete response")?;
        if body["success"].as_bool() != Some(true) {
            anyhow::bail!(
                "delete failed: {}",
                body["error"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(())
    }

    /// POST /api/generate-render — multipart room photo + fabric reference.
    /// Returns the generated image as a data URL.
    pub async fn generate_render(&self, room: &RoomImage, fabric_image_url: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(room.bytes.clone())
            .file_name(room.file_name.clone())
            .mime_str(&room.mime)
            .context("invalid room image content type")?;
        let form = reqwest::multipart::Form::new()
            .part("roomImage", part)
            .text("fabricImageUrl", fabric_image_url.to_string());

        let resp = self
            .http
            .post(self.url("/api/generate-render"))
            .timeout(RENDER_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .context("could not reach daemon — is it running?")?;

        let body: Value = resp.json().await.context("malformed render response")?;
        if body["success"].as_bool() != Some(true) {
            anyhow::bail!(
                "render failed: {}",
                body["error"].as_str().unwrap_or("unknown error")
            );
        }
        body["renderUrl"]
            .as_str()
            .map(str::to_string)
            .context("render response carried no renderUrl")
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL into (mime, bytes).
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    use base64::Engine as _;

    let rest = data_url
        .strip_prefix("data:")
        .context("not a data URL")?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .context("data URL is not base64-encoded")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("invalid base64 payload in data URL")?;
    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_url() {
        let (mime, bytes) = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn rejects_non_data_url() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png,plain").is_err());
    }
}
