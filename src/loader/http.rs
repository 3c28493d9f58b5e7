//! HTTP asset source
//!
//! Request: `GET {base}/api/products/customizable/{productId}/assets?materialId={materialId}`.
//! The transport is pluggable so the crate carries no HTTP client of its own.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AssetBundle, AssetSource};
use crate::error::{CustomizerError, Result};

/// Raw response handed back by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal GET-only HTTP client
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn get(&self, url: &str) -> anyhow::Result<HttpResponse>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetsPayload {
    available: bool,
    #[serde(default)]
    asset_paths: Vec<String>,
    #[serde(default)]
    frame_count: usize,
    #[serde(default)]
    last_generated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetsData {
    product_id: String,
    material_id: String,
    assets: AssetsPayload,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AssetsEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<AssetsData>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

/// Asset source backed by the storefront's JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpAssetSource<T: HttpTransport> {
    base_url: String,
    transport: T,
}

impl<T: HttpTransport> HttpAssetSource<T> {
    pub fn new(base_url: impl Into<String>, transport: T) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
        }
    }

    /// Endpoint URL for a material. Assets are immutable once generated, so
    /// no cache-busting parameter is appended.
    pub fn assets_url(&self, product_id: &str, material_id: &str) -> String {
        format!(
            "{}/api/products/customizable/{}/assets?materialId={}",
            self.base_url, product_id, material_id
        )
    }
}

/// Turn a response body into a bundle, classifying unusable answers
pub fn parse_assets_response(material_id: &str, body: &str) -> Result<AssetBundle> {
    let envelope: AssetsEnvelope = serde_json::from_str(body)?;

    if !envelope.success {
        let message = envelope
            .error
            .map(|e| format!("{}: {}", e.code, e.message))
            .unwrap_or_else(|| "request unsuccessful".to_string());
        return Err(CustomizerError::AssetsUnavailable {
            material_id: material_id.to_string(),
            message,
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| CustomizerError::Decode("missing data field".to_string()))?;

    if !data.assets.available || data.assets.asset_paths.is_empty() {
        return Err(CustomizerError::AssetsUnavailable {
            material_id: data.material_id,
            message: "assets not generated for this material".to_string(),
        });
    }

    Ok(AssetBundle {
        product_id: data.product_id,
        material_id: data.material_id,
        asset_paths: data.assets.asset_paths,
        frame_count: data.assets.frame_count,
        available: true,
        last_generated: data.assets.last_generated,
    })
}

#[async_trait]
impl<T: HttpTransport> AssetSource for HttpAssetSource<T> {
    async fn fetch_assets(&self, product_id: &str, material_id: &str) -> Result<AssetBundle> {
        let url = self.assets_url(product_id, material_id);
        log::debug!("GET {url}");

        let response = self
            .transport
            .get(&url)
            .await
            .map_err(|e| CustomizerError::Network(format!("{url}: {e:#}")))?;

        if !response.is_success() {
            return Err(CustomizerError::Network(format!(
                "{url} returned HTTP {}",
                response.status
            )));
        }

        parse_assets_response(material_id, &response.body)
    }
}
