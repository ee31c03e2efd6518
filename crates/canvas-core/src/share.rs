//! Share client for the canvas REST service

use canvas_sandbox::CodeBuffer;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ShareSettings;
use crate::{CanvasError, Result};

/// Who can open a shared canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed and reachable by link
    #[default]
    Public,
    /// Reachable by link only
    Unlisted,
    /// Owner only
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Unlisted => write!(f, "unlisted"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "unlisted" => Ok(Visibility::Unlisted),
            "private" => Ok(Visibility::Private),
            other => Err(CanvasError::InvalidConfig(format!(
                "unknown visibility '{}'",
                other
            ))),
        }
    }
}

/// Body of `POST /canvas/share`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub title: String,
    pub html: String,
    pub css: String,
    pub js: String,
    pub visibility: Visibility,
}

impl ShareRequest {
    pub fn new(title: impl Into<String>, code: &CodeBuffer, visibility: Visibility) -> Self {
        Self {
            title: title.into(),
            html: code.html.clone(),
            css: code.css.clone(),
            js: code.js.clone(),
            visibility,
        }
    }

    /// A share needs a non-blank title.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CanvasError::InvalidConfig(
                "Please enter a title".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasStats {
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub forks: u64,
}

/// A canvas stored by the share service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedCanvas {
    pub share_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub stats: CanvasStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl SharedCanvas {
    pub fn code(&self) -> CodeBuffer {
        CodeBuffer::new(self.html.clone(), self.css.clone(), self.js.clone())
    }
}

/// Response of share and fork
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareResponse {
    pub canvas: SharedCanvas,
    /// Path relative to the public origin, e.g. `/canvas/abc123`
    pub share_url: String,
}

/// One page of the caller's canvases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasPage {
    #[serde(default)]
    pub canvases: Vec<SharedCanvas>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub has_more: bool,
}

/// Body of `PATCH /canvas/{id}`; only set fields are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
}

impl CanvasUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.visibility.is_none()
            && self.html.is_none()
            && self.css.is_none()
            && self.js.is_none()
    }
}

#[derive(Deserialize)]
struct PublicCanvasResponse {
    canvas: SharedCanvas,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Join the public origin and a relative share URL.
pub fn full_share_url(origin: &str, share_url: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        share_url.trim_start_matches('/')
    )
}

/// HTTP client for the canvas service
pub struct CanvasClient {
    client: reqwest::Client,
    base_url: String,
    public_origin: String,
    token: Option<String>,
}

impl CanvasClient {
    pub fn new(settings: &ShareSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            public_origin: settings.public_origin.clone(),
            token: settings.token.clone(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Absolute link for a share response
    pub fn full_share_url(&self, share_url: &str) -> String {
        full_share_url(&self.public_origin, share_url)
    }

    pub async fn share_canvas(&self, request: &ShareRequest) -> Result<ShareResponse> {
        request.validate()?;
        let response = self
            .request(reqwest::Method::POST, "/canvas/share")
            .json(request)
            .send()
            .await?;
        let shared: ShareResponse = Self::parse(response, "Failed to share canvas").await?;
        tracing::info!("Shared canvas {} ({})", shared.canvas.share_id, request.visibility);
        Ok(shared)
    }

    pub async fn my_canvases(&self, page: u32, limit: u32) -> Result<CanvasPage> {
        let response = self
            .request(reqwest::Method::GET, "/canvas/my-canvases")
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;
        Self::parse(response, "Failed to load canvases").await
    }

    /// Fetch a public or unlisted canvas; no token needed.
    pub async fn public_canvas(&self, share_id: &str) -> Result<SharedCanvas> {
        let response = self
            .request(reqwest::Method::GET, &format!("/canvas/public/{}", share_id))
            .send()
            .await?;
        let body: PublicCanvasResponse = Self::parse(response, "Failed to load canvas").await?;
        Ok(body.canvas)
    }

    pub async fn update_canvas(&self, share_id: &str, update: &CanvasUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(CanvasError::InvalidConfig(
                "No valid fields to update".to_string(),
            ));
        }
        let response = self
            .request(reqwest::Method::PATCH, &format!("/canvas/{}", share_id))
            .json(update)
            .send()
            .await?;
        Self::check(response, "Failed to update canvas").await
    }

    pub async fn delete_canvas(&self, share_id: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/canvas/{}", share_id))
            .send()
            .await?;
        Self::check(response, "Failed to delete canvas").await
    }

    /// Copy a canvas into the caller's collection.
    pub async fn fork_canvas(&self, share_id: &str) -> Result<ShareResponse> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/canvas/public/{}/fork", share_id),
            )
            .send()
            .await?;
        Self::parse(response, "Failed to fork canvas").await
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<T> {
        let response = Self::ensure_success(response, fallback).await?;
        Ok(response.json().await?)
    }

    async fn check(response: reqwest::Response, fallback: &str) -> Result<()> {
        Self::ensure_success(response, fallback).await.map(|_| ())
    }

    async fn ensure_success(
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| fallback.to_string());
        tracing::warn!("Canvas service returned {}: {}", status, message);

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CanvasError::NotFound(message));
        }
        Err(CanvasError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
