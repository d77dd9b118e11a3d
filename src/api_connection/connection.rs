use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::endpoints::{
    self, parse_food_lookup, parse_guidance, parse_health, parse_motivation, parse_profile_setup,
    parse_recommendations, parse_scan_menu, upload_mime_type, FoodLookup, HealthStatus, ProfilePayload,
    ProfileSetup, RecommendationRequest, MAX_UPLOAD_BYTES,
};
use crate::models::{MenuDay, RecommendationSet};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("could not decode server response: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: StatusCode,
        error_body: String,
    },
    #[error("request failed: {0}")]
    UnsuccessfulStatus(String),
    #[error("unexpected response: {0}")]
    MalformedResponse(String),
    #[error("cannot upload menu: {0}")]
    InvalidUpload(String),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Client for the menu analysis and recommendation service.
///
/// Every call is sent exactly once. There are no retries, no timeouts and no
/// caching; failures go straight back to the caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiConnectionError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiConnectionError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiConnectionError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiConnectionError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiConnectionError::InvalidBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value, ApiConnectionError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    async fn post_json<T: Serialize>(&self, segment: &str, body: &T) -> Result<Value, ApiConnectionError> {
        let url = self.endpoint(&[segment])?;
        debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        read_json(response).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiConnectionError> {
        let body = self.get_json(&[endpoints::HEALTH]).await?;
        parse_health(&body)
    }

    pub async fn setup_profile(&self, payload: &ProfilePayload) -> Result<ProfileSetup, ApiConnectionError> {
        let body = self.post_json(endpoints::SETUP_PROFILE, payload).await?;
        parse_profile_setup(&body)
    }

    /// Uploads a menu image or PDF and returns the days the scanner found.
    pub async fn scan_menu(&self, path: &Path) -> Result<Vec<MenuDay>, ApiConnectionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime = upload_mime_type(extension).ok_or_else(|| {
            ApiConnectionError::InvalidUpload(format!(
                "{} is not a PNG, JPEG or PDF file",
                path.display()
            ))
        })?;

        let io_error = |source| ApiConnectionError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = tokio::fs::metadata(path).await.map_err(io_error)?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(ApiConnectionError::InvalidUpload(format!(
                "{} is {} bytes, the limit is {} bytes",
                path.display(),
                size,
                MAX_UPLOAD_BYTES
            )));
        }
        let bytes = tokio::fs::read(path).await.map_err(io_error)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("menu")
            .to_string();
        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&[endpoints::SCAN_MENU])?;
        debug!(%url, size, mime, "uploading menu");
        let response = self.client.post(url).multipart(form).send().await?;
        let body = read_json(response).await?;
        parse_scan_menu(&body)
    }

    pub async fn get_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationSet, ApiConnectionError> {
        let body = self.post_json(endpoints::GET_RECOMMENDATIONS, request).await?;
        parse_recommendations(&body)
    }

    pub async fn get_guidance(&self, request: &RecommendationRequest) -> Result<String, ApiConnectionError> {
        let body = self.post_json(endpoints::GET_GUIDANCE, request).await?;
        parse_guidance(&body)
    }

    pub async fn workout_motivation(&self, workout_day: &str, goal: &str) -> Result<String, ApiConnectionError> {
        let body = self
            .get_json(&[endpoints::WORKOUT_MOTIVATION, workout_day, goal])
            .await?;
        parse_motivation(&body)
    }

    pub async fn search_food(&self, food_name: &str) -> Result<FoodLookup, ApiConnectionError> {
        let body = self.get_json(&[endpoints::SEARCH_FOOD, food_name]).await?;
        parse_food_lookup(&body)
    }
}

/// Turns a response into JSON, mapping non-2xx codes to [`ApiConnectionError::ApiError`].
///
/// When the error body carries a `detail` field it replaces the raw body.
async fn read_json(response: reqwest::Response) -> Result<Value, ApiConnectionError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let error_body = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or(text);
        return Err(ApiConnectionError::ApiError { status, error_body });
    }
    debug!(%status, bytes = text.len(), "response received");
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_and_encodes_segments() {
        let client = ApiClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.endpoint(&["search-food", "Aloo Gobhi"]).unwrap().as_str(),
            "http://localhost:8000/search-food/Aloo%20Gobhi"
        );

        let prefixed = ApiClient::new("http://example.com/api/").unwrap();
        assert_eq!(
            prefixed.endpoint(&["health"]).unwrap().as_str(),
            "http://example.com/api/health"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ApiConnectionError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:someone@example.com"),
            Err(ApiConnectionError::InvalidBaseUrl(_))
        ));
    }
}
