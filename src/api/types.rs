//! Request and response types for the property resource API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::draft::{
    Address, DraftFields, EnergyRating, ListingState, PropertyDetails, PublicationOptions,
    RemoteIds, Visibility,
};

/// Placeholder values some backends return instead of a real id.
const SENTINEL_IDS: &[&str] = &["0", "null", "undefined", "none", "nan", "-1"];

/// Identifiers returned by the create call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimaryIds {
    #[serde(default, alias = "id")]
    pub primary_id: Option<String>,
    #[serde(default)]
    pub secondary_id: Option<String>,
}

impl PrimaryIds {
    /// The primary id, if it is present and not a blank or placeholder
    /// value.
    pub fn usable_primary_id(&self) -> Option<&str> {
        let id = self.primary_id.as_deref()?.trim();
        if id.is_empty() || SENTINEL_IDS.iter().any(|s| s.eq_ignore_ascii_case(id)) {
            return None;
        }
        Some(id)
    }

    pub fn into_remote_ids(self) -> Option<RemoteIds> {
        let primary_id = self.usable_primary_id()?.to_string();
        Some(RemoteIds {
            primary_id,
            secondary_id: self.secondary_id.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Partial update of the property. Absent fields are never serialized,
/// so the server keeps its current value for them.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PrimaryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<PropertyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ListingState>,
}

impl PrimaryPatch {
    /// Everything the create call did not carry: full address, numeric
    /// details and energy fields.
    pub fn attributes(fields: &DraftFields) -> Self {
        Self {
            address: fields.address.clone(),
            details: fields.details.clone(),
            energy: fields.energy.clone(),
            ..Default::default()
        }
    }

    /// Only the publication fields the user actually touched.
    pub fn publication(options: &PublicationOptions) -> Self {
        Self {
            visibility: options.visibility,
            available_from: options.available_from,
            state: options.target_state,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Role of an uploaded photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadTag {
    Cover,
    Gallery,
}

impl std::fmt::Display for UploadTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cover => write!(f, "cover"),
            Self::Gallery => write!(f, "gallery"),
        }
    }
}

/// Where to send the bytes of one photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    /// Server-side reference of the stored file, when the API provides one.
    #[serde(default)]
    pub remote_ref: Option<String>,
}

impl UploadTarget {
    pub fn reference(&self) -> &str {
        self.remote_ref.as_deref().unwrap_or(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{EnergyClass, PropertyCategory};

    fn ids(primary: Option<&str>) -> PrimaryIds {
        PrimaryIds {
            primary_id: primary.map(String::from),
            secondary_id: Some("unit_9".to_string()),
        }
    }

    #[test]
    fn sentinel_ids_are_unusable() {
        for bad in [None, Some(""), Some("   "), Some("0"), Some("null"), Some("UNDEFINED"), Some("NaN")] {
            assert!(ids(bad).usable_primary_id().is_none(), "{bad:?} should be rejected");
        }
        assert_eq!(ids(Some(" prop_42 ")).usable_primary_id(), Some("prop_42"));
    }

    #[test]
    fn into_remote_ids_keeps_secondary() {
        let remote = ids(Some("prop_42")).into_remote_ids().unwrap();
        assert_eq!(remote.primary_id, "prop_42");
        assert_eq!(remote.secondary_id.as_deref(), Some("unit_9"));
        assert!(ids(Some("0")).into_remote_ids().is_none());
    }

    #[test]
    fn create_response_accepts_plain_id_key() {
        let parsed: PrimaryIds =
            serde_json::from_str(r#"{"id": "prop_1", "secondary_id": "lot_1"}"#).unwrap();
        assert_eq!(parsed.usable_primary_id(), Some("prop_1"));
    }

    #[test]
    fn publication_patch_sends_only_touched_fields() {
        let options = PublicationOptions {
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        let json = serde_json::to_value(PrimaryPatch::publication(&options)).unwrap();
        assert_eq!(json, serde_json::json!({"visibility": "public"}));
        assert!(PrimaryPatch::publication(&PublicationOptions::default()).is_empty());
    }

    #[test]
    fn attribute_patch_omits_missing_blocks() {
        let fields = DraftFields {
            category: Some(PropertyCategory::House),
            energy: Some(EnergyRating {
                energy_class: Some(EnergyClass::C),
                ..Default::default()
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(PrimaryPatch::attributes(&fields)).unwrap();
        assert_eq!(json, serde_json::json!({"energy": {"energy_class": "C"}}));
    }

    #[test]
    fn upload_target_reference_falls_back_to_url() {
        let target = UploadTarget {
            url: "https://bucket/abc?sig=1".to_string(),
            remote_ref: None,
        };
        assert_eq!(target.reference(), "https://bucket/abc?sig=1");
    }
}
