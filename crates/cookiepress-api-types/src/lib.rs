//! Wire types shared by the cookiepress server and its clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Route accepting generation requests.
pub const GENERATE_PATH: &str = "/api/generate";
/// Smoke-test route returning a static [`MessageResponse`].
pub const HELLO_PATH: &str = "/api/hello";
/// Liveness probe route.
pub const HEALTH_PATH: &str = "/_health";

/// Filename advertised in the `Content-Disposition` header of generated archives.
pub const ARCHIVE_FILENAME: &str = "project.zip";
/// MIME type of generated archives.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";
/// Header set when the archive body is base64 text rather than raw bytes.
pub const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";
/// Value of [`CONTENT_TRANSFER_ENCODING`] for base64 bodies.
pub const BASE64_ENCODING: &str = "base64";

/// Name of the variable declaration file at the root of a template.
pub const TEMPLATE_CONFIG_FILE: &str = "cookiecutter.json";

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub template_url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_context: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout: Option<String>,
}

impl GenerateRequest {
    pub fn new(template_url: impl Into<String>) -> Self {
        Self {
            template_url: template_url.into(),
            ..Default::default()
        }
    }

    /// Add a string override for a template variable.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_context
            .insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    pub fn with_checkout(mut self, checkout: impl Into<String>) -> Self {
        self.checkout = Some(checkout.into());
        self
    }
}

/// Static JSON body used by the smoke-test endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `Content-Disposition` value for generated archives.
pub fn attachment_disposition() -> String {
    format!("attachment; filename=\"{ARCHIVE_FILENAME}\"")
}
