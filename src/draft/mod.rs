//! Onboarding draft: the client-held property record assembled across the
//! wizard.
//!
//! The draft is mutated through `DraftStore` only. Fields merge via
//! `DraftPatch`; photos are tracked as `PendingAttachment`s that stay local
//! until finalization uploads them.

pub mod attachment;
pub mod model;
pub mod snapshot;
pub mod store;

pub use attachment::{
    ALLOWED_MIME_TYPES, AttachmentOrigin, AttachmentSummary, PendingAttachment, UploadState,
    is_supported_mime,
};
pub use model::{
    Address, Draft, DraftFields, DraftPatch, DraftSnapshot, EnergyClass, EnergyRating,
    ListingState, PropertyCategory, PropertyDetails, PublicationOptions, RemoteIds, RoomDraft,
    RoomKind, Visibility,
};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use store::DraftStore;
