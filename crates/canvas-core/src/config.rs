//! Canvas configuration

use canvas_sandbox::{DocumentOptions, DEFAULT_TARGET_ORIGIN};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{CanvasError, DEFAULT_DEBOUNCE_MS};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Quiet period after the last edit before the preview regenerates
    pub debounce_ms: u64,

    /// Enable tracing output
    pub tracing: bool,

    /// Preview document settings
    pub document: DocumentSettings,

    /// Panel layout settings
    pub layout: LayoutSettings,

    /// Share service settings
    pub share: ShareSettings,

    /// Gateway server settings
    pub gateway: GatewaySettings,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            tracing: true,
            document: DocumentSettings::default(),
            layout: LayoutSettings::default(),
            share: ShareSettings::default(),
            gateway: GatewaySettings::default(),
        }
    }
}

impl CanvasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_target_origin(mut self, origin: impl Into<String>) -> Self {
        self.document.target_origin = origin.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.share.api_base_url = url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.share.token = Some(token.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.gateway.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.gateway.port = port;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions::default().with_target_origin(self.document.target_origin.clone())
    }

    /// Check invariants the rest of the crate relies on
    pub fn validate(&self) -> crate::Result<()> {
        if self.debounce_ms == 0 {
            return Err(CanvasError::InvalidConfig(
                "debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.document.target_origin.trim().is_empty() {
            return Err(CanvasError::InvalidConfig(
                "document.target_origin must not be empty".to_string(),
            ));
        }
        let layout = &self.layout;
        if layout.min_width > layout.default_width || layout.default_width > layout.max_width {
            return Err(CanvasError::InvalidConfig(format!(
                "layout widths must satisfy min <= default <= max (got {} / {} / {})",
                layout.min_width, layout.default_width, layout.max_width
            )));
        }
        Ok(())
    }

    /// Load configuration from a JSON file, or TOML when the path ends in `.toml`
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "toml").unwrap_or(false)
}

/// Preview document settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Target origin for the sandbox's `postMessage` calls
    pub target_origin: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            target_origin: DEFAULT_TARGET_ORIGIN.to_string(),
        }
    }
}

/// Panel layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Key the panel width is persisted under
    pub storage_key: String,

    pub default_width: u32,
    pub min_width: u32,
    pub max_width: u32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            storage_key: "codeCanvasPanelWidth".to_string(),
            default_width: 450,
            min_width: 300,
            max_width: 800,
        }
    }
}

/// Share service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSettings {
    /// Base URL of the REST API, e.g. `http://localhost:5000/api`
    pub api_base_url: String,

    /// Public origin share links are built on
    pub public_origin: String,

    /// Bearer token for authenticated endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub timeout_secs: u64,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            public_origin: "http://localhost:3000".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

/// Gateway server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,

    /// Origins allowed by CORS; empty means permissive
    pub allowed_origins: Vec<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18790,
            allowed_origins: Vec::new(),
        }
    }
}
