//! DraftStore: the single mutable onboarding draft.
//!
//! All state transitions are synchronous. Every mutation writes a snapshot
//! (mode, current step, serializable fields) to the injected
//! `SnapshotStore`; a failed write is logged, never surfaced to the caller.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::attachment::{self, PendingAttachment, UploadState};
use super::model::{Draft, DraftPatch, DraftSnapshot, RemoteIds, snapshot_keys};
use super::snapshot::SnapshotStore;
use crate::wizard::{Mode, WizardStep};

/// Shared handle to the onboarding draft.
///
/// UI components and the finalizer hold an `Arc<DraftStore>`, never a copy
/// of the draft itself.
pub struct DraftStore {
    draft: Mutex<Draft>,
    snapshots: Arc<dyn SnapshotStore>,
    key: String,
}

impl DraftStore {
    /// Create an empty draft without reading any previous snapshot.
    pub fn new(snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            draft: Mutex::new(Draft::default()),
            snapshots,
            key: snapshot_keys::PROPERTY_DRAFT.to_string(),
        }
    }

    /// Restore the draft from the last snapshot, or start empty.
    pub fn load(snapshots: Arc<dyn SnapshotStore>) -> Self {
        let store = Self::new(snapshots);
        let restored = match store.snapshots.load(&store.key) {
            Ok(Some(json)) => match serde_json::from_str::<DraftSnapshot>(&json) {
                Ok(snapshot) => Some(snapshot.into_draft()),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable draft snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read draft snapshot");
                None
            }
        };

        if let Some(draft) = restored {
            info!(
                mode = %draft.mode,
                step = %draft.current_step,
                "Restored onboarding draft"
            );
            *store.lock() = draft;
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().expect("Draft mutex poisoned")
    }

    /// Apply `f` to the draft and persist the result while still holding
    /// the lock, so snapshot writes land in mutation order.
    fn mutate<R>(&self, f: impl FnOnce(&mut Draft) -> R) -> R {
        let mut draft = self.lock();
        let result = f(&mut draft);
        self.persist(&draft);
        result
    }

    fn persist(&self, draft: &Draft) {
        let json = match serde_json::to_string(&draft.to_snapshot()) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize draft snapshot");
                return;
            }
        };
        if let Err(e) = self.snapshots.save(&self.key, &json) {
            warn!(error = %e, "Failed to persist draft snapshot");
        }
    }

    /// A read-only copy of the current draft.
    pub fn snapshot(&self) -> Draft {
        self.lock().clone()
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    pub fn current_step(&self) -> WizardStep {
        self.lock().current_step
    }

    /// Shallow-merge a partial update into the draft fields.
    pub fn patch(&self, patch: DraftPatch) {
        self.mutate(|draft| patch.apply(&mut draft.fields));
        debug!("Draft patched");
    }

    /// Clear everything and return to the default mode's first step.
    /// The stored snapshot is removed rather than overwritten.
    pub fn reset(&self) {
        let mut draft = self.lock();
        *draft = Draft::default();
        if let Err(e) = self.snapshots.clear(&self.key) {
            warn!(error = %e, "Failed to clear draft snapshot");
        }
        info!("Onboarding draft reset");
    }

    /// Run a navigation change (mode/step) under the lock.
    pub(crate) fn navigate<R>(&self, f: impl FnOnce(&mut Mode, &mut WizardStep) -> R) -> R {
        self.mutate(|draft| f(&mut draft.mode, &mut draft.current_step))
    }

    // ── Attachments ─────────────────────────────────────────────────

    /// Add a locally picked file. The first attachment becomes primary.
    pub fn add_attachment(
        &self,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Uuid {
        let attachment = PendingAttachment::new(file_name, mime_type, bytes);
        let id = self.mutate(|draft| attachment::push(&mut draft.fields.attachments, attachment));
        debug!(attachment_id = %id, "Attachment added");
        id
    }

    pub fn remove_attachment(&self, id: Uuid) -> bool {
        self.mutate(|draft| attachment::remove(&mut draft.fields.attachments, id))
    }

    pub fn set_primary_attachment(&self, id: Uuid) -> bool {
        self.mutate(|draft| attachment::set_primary(&mut draft.fields.attachments, id))
    }

    pub fn set_attachment_state(&self, id: Uuid, state: UploadState) -> bool {
        self.mutate(|draft| {
            match draft.fields.attachments.iter_mut().find(|a| a.id == id) {
                Some(attachment) => {
                    attachment.state = state;
                    true
                }
                None => false,
            }
        })
    }

    /// Record a confirmed upload and release the local bytes.
    pub fn confirm_attachment(&self, id: Uuid, remote_ref: &str) -> bool {
        self.mutate(|draft| {
            match draft.fields.attachments.iter_mut().find(|a| a.id == id) {
                Some(attachment) => {
                    attachment.confirm(remote_ref);
                    true
                }
                None => false,
            }
        })
    }

    // ── Remote ids (finalizer only) ─────────────────────────────────

    pub(crate) fn set_remote_ids(&self, ids: RemoteIds) {
        self.mutate(|draft| draft.remote_ids = Some(ids));
    }

    pub(crate) fn clear_remote_ids(&self) {
        self.mutate(|draft| draft.remote_ids = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::model::{Address, PropertyCategory};
    use crate::draft::snapshot::MemorySnapshotStore;
    use crate::error::SnapshotError;

    fn memory() -> Arc<MemorySnapshotStore> {
        Arc::new(MemorySnapshotStore::new())
    }

    fn saved_snapshot(store: &MemorySnapshotStore) -> serde_json::Value {
        let json = store
            .load(snapshot_keys::PROPERTY_DRAFT)
            .unwrap()
            .expect("snapshot should exist");
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn patch_persists_snapshot() {
        let snapshots = memory();
        let store = DraftStore::new(snapshots.clone());

        store.patch(DraftPatch {
            category: Some(PropertyCategory::Apartment),
            ..Default::default()
        });

        let saved = saved_snapshot(&snapshots);
        assert_eq!(saved["mode"], "full");
        assert_eq!(saved["current_step"], "category");
        assert_eq!(saved["fields"]["category"], "APARTMENT");
    }

    #[test]
    fn snapshot_never_contains_attachments() {
        let snapshots = memory();
        let store = DraftStore::new(snapshots.clone());
        store.add_attachment("front.jpg", "image/jpeg", vec![1, 2, 3]);

        let saved = saved_snapshot(&snapshots);
        assert!(saved["fields"].get("attachments").is_none());
        assert_eq!(store.snapshot().fields.attachments.len(), 1);
    }

    #[test]
    fn load_restores_fields_but_not_attachments() {
        let snapshots = memory();
        {
            let store = DraftStore::new(snapshots.clone());
            store.navigate(|mode, step| {
                *mode = Mode::Full;
                *step = WizardStep::Details;
            });
            store.patch(DraftPatch {
                tags: Some(vec!["balcony".to_string()]),
                ..Default::default()
            });
            store.add_attachment("front.jpg", "image/jpeg", vec![1]);
        }

        let reloaded = DraftStore::load(snapshots);
        let draft = reloaded.snapshot();
        assert_eq!(draft.current_step, WizardStep::Details);
        assert_eq!(draft.fields.tags, vec!["balcony".to_string()]);
        assert!(draft.fields.attachments.is_empty());
    }

    #[test]
    fn load_ignores_corrupt_snapshot() {
        let snapshots = memory();
        snapshots
            .save(snapshot_keys::PROPERTY_DRAFT, "{not json")
            .unwrap();
        let store = DraftStore::load(snapshots);
        assert!(store.snapshot().fields.is_empty());
        assert_eq!(store.current_step(), WizardStep::Category);
    }

    #[test]
    fn reset_clears_everything() {
        let snapshots = memory();
        let store = DraftStore::new(snapshots.clone());
        store.navigate(|mode, step| {
            *mode = Mode::Fast;
            *step = WizardStep::Photos;
        });
        store.patch(DraftPatch {
            address: Some(Address {
                line1: "1 Main St".to_string(),
                postal_code: "10001".to_string(),
                city: "New York".to_string(),
                country: "US".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
        store.add_attachment("a.png", "image/png", vec![0]);
        store.set_remote_ids(RemoteIds {
            primary_id: "prop_1".to_string(),
            secondary_id: None,
        });

        store.reset();

        let draft = store.snapshot();
        assert_eq!(draft.mode, Mode::Full);
        assert_eq!(draft.current_step, WizardStep::Category);
        assert!(draft.fields.is_empty());
        assert!(draft.remote_ids.is_none());
        assert!(
            snapshots
                .load(snapshot_keys::PROPERTY_DRAFT)
                .unwrap()
                .is_none()
        );

        // A reload after reset starts from scratch.
        let reloaded = DraftStore::load(snapshots);
        assert_eq!(reloaded.current_step(), WizardStep::Category);
        assert!(reloaded.snapshot().fields.is_empty());
    }

    #[test]
    fn confirm_attachment_updates_state() {
        let store = DraftStore::new(memory());
        let id = store.add_attachment("a.webp", "image/webp", vec![9; 16]);

        assert!(store.set_attachment_state(id, UploadState::InFlight));
        assert!(store.confirm_attachment(id, "photos/a.webp"));
        let draft = store.snapshot();
        let attachment = &draft.fields.attachments[0];
        assert_eq!(attachment.state, UploadState::Succeeded);
        assert!(attachment.bytes().is_none());

        assert!(!store.confirm_attachment(Uuid::new_v4(), "nope"));
    }

    struct FailingSnapshots;

    impl SnapshotStore for FailingSnapshots {
        fn load(&self, _key: &str) -> Result<Option<String>, SnapshotError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn save(&self, _key: &str, _json: &str) -> Result<(), SnapshotError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn clear(&self, _key: &str) -> Result<(), SnapshotError> {
            Ok(())
        }
    }

    #[test]
    fn snapshot_failures_do_not_block_mutation() {
        let store = DraftStore::load(Arc::new(FailingSnapshots));
        store.patch(DraftPatch {
            category: Some(PropertyCategory::Loft),
            ..Default::default()
        });
        assert_eq!(store.snapshot().fields.category, Some(PropertyCategory::Loft));
    }
}
