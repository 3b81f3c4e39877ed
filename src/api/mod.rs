//! Property resource API: the remote side of finalization.
//!
//! `ResourceApi` is the seam the finalizer talks through. `HttpResourceApi`
//! is the production implementation; tests provide their own.

pub mod http;
pub mod types;

pub use http::HttpResourceApi;
pub use types::{PrimaryIds, PrimaryPatch, UploadTag, UploadTarget};

use async_trait::async_trait;

use crate::draft::{Address, PropertyCategory, RoomDraft};
use crate::error::ApiError;

/// Calls the finalizer makes against the remote property service.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Create the property from its category and minimal address.
    async fn create_primary(
        &self,
        category: PropertyCategory,
        address: &Address,
    ) -> Result<PrimaryIds, ApiError>;

    /// Partial update. Keys absent from `patch` keep their server value.
    async fn update_primary(&self, primary_id: &str, patch: &PrimaryPatch) -> Result<(), ApiError>;

    /// Create one room under the property; returns the room id.
    async fn create_sub_item(&self, primary_id: &str, room: &RoomDraft) -> Result<String, ApiError>;

    /// Ask where to upload one photo. Callers must filter MIME types
    /// against the allow-list first.
    async fn request_upload_target(
        &self,
        primary_id: &str,
        file_name: &str,
        mime_type: &str,
        tag: UploadTag,
    ) -> Result<UploadTarget, ApiError>;

    /// Send raw bytes to a previously obtained target.
    async fn transfer_bytes(
        &self,
        target: &UploadTarget,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<(), ApiError>;

    /// Replace the property's classification tags.
    async fn bulk_write_tags(&self, primary_id: &str, tags: &[String]) -> Result<(), ApiError>;
}
