//! JSON-over-HTTP implementation of `ResourceApi` (reqwest).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{PrimaryIds, PrimaryPatch, UploadTag, UploadTarget};
use super::ResourceApi;
use crate::config::OnboardingConfig;
use crate::draft::{Address, PropertyCategory, RoomDraft};
use crate::error::ApiError;

/// Error bodies longer than this are cut before being stored in an error.
const MAX_ERROR_BODY_LEN: usize = 512;

#[derive(Deserialize)]
struct CreatedId {
    id: String,
}

/// Talks to the property service over its REST API.
pub struct HttpResourceApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
    timeout: Duration,
}

impl HttpResourceApi {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                endpoint: "client".to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url).map_err(|e| ApiError::Transport {
            endpoint: "client".to_string(),
            reason: format!("Invalid base URL {base_url:?}: {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport {
                endpoint: "client".to_string(),
                reason: format!("Base URL {base_url} cannot carry a path"),
            });
        }
        Ok(Self {
            client,
            base_url,
            token,
            timeout,
        })
    }

    pub fn from_config(config: &OnboardingConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )
    }

    /// Base URL plus `segments`, each percent-encoded as a single path
    /// segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            ApiError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// Send a request and turn non-2xx statuses into `ApiError::Status`.
    async fn send(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY_LEN {
                let mut cut = MAX_ERROR_BODY_LEN;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(endpoint, status = status.as_u16(), "Resource API call succeeded");
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn create_primary(
        &self,
        category: PropertyCategory,
        address: &Address,
    ) -> Result<PrimaryIds, ApiError> {
        let body = serde_json::json!({
            "category": category,
            "address": address.minimal(),
        });
        let request = self.authorized(self.client.post(self.url(&["properties"])).json(&body));
        self.send_json("POST /properties", request).await
    }

    async fn update_primary(&self, primary_id: &str, patch: &PrimaryPatch) -> Result<(), ApiError> {
        let request = self.authorized(
            self.client
                .patch(self.url(&["properties", primary_id]))
                .json(patch),
        );
        self.send("PATCH /properties/{id}", request).await?;
        Ok(())
    }

    async fn create_sub_item(&self, primary_id: &str, room: &RoomDraft) -> Result<String, ApiError> {
        let request = self.authorized(
            self.client
                .post(self.url(&["properties", primary_id, "rooms"]))
                .json(room),
        );
        let created: CreatedId = self
            .send_json("POST /properties/{id}/rooms", request)
            .await?;
        Ok(created.id)
    }

    async fn request_upload_target(
        &self,
        primary_id: &str,
        file_name: &str,
        mime_type: &str,
        tag: UploadTag,
    ) -> Result<UploadTarget, ApiError> {
        let body = serde_json::json!({
            "file_name": file_name,
            "mime_type": mime_type,
            "tag": tag,
        });
        let request = self.authorized(
            self.client
                .post(self.url(&["properties", primary_id, "photos", "upload-target"]))
                .json(&body),
        );
        self.send_json("POST /properties/{id}/photos/upload-target", request)
            .await
    }

    async fn transfer_bytes(
        &self,
        target: &UploadTarget,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<(), ApiError> {
        // Pre-signed target: no bearer token, no JSON envelope.
        let request = self
            .client
            .put(&target.url)
            .header(CONTENT_TYPE, mime_type)
            .body(bytes.to_vec());
        self.send("PUT upload-target", request).await?;
        Ok(())
    }

    async fn bulk_write_tags(&self, primary_id: &str, tags: &[String]) -> Result<(), ApiError> {
        let body = serde_json::json!({ "tags": tags });
        let request = self.authorized(
            self.client
                .put(self.url(&["properties", primary_id, "tags"]))
                .json(&body),
        );
        self.send("PUT /properties/{id}/tags", request).await?;
        Ok(())
    }
}
