//! Property draft data model.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::attachment::PendingAttachment;
use crate::wizard::{Mode, WizardStep};

/// Kind of property being listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyCategory {
    Apartment,
    House,
    Studio,
    Loft,
    Parking,
    Commercial,
    Other,
}

impl std::fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Apartment => "APARTMENT",
            Self::House => "HOUSE",
            Self::Studio => "STUDIO",
            Self::Loft => "LOFT",
            Self::Parking => "PARKING",
            Self::Commercial => "COMMERCIAL",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Postal address of the property.
///
/// `line1`, `postal_code`, `city` and `country` are what the resource API
/// needs to create the property; everything else is detail applied later.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door: Option<String>,
}

impl Address {
    /// The subset sent with the create call.
    pub fn minimal(&self) -> Address {
        Address {
            line1: self.line1.clone(),
            postal_code: self.postal_code.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
            ..Default::default()
        }
    }
}

/// Numeric characteristics of the property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_m2: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedroom_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathroom_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furnished: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_charges: Option<Decimal>,
}

/// Energy performance label, A (best) to G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyClass {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

/// Energy and compliance fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyRating {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_class: Option<EnergyClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissions_class: Option<EnergyClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_consumption_kwh: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    LivingRoom,
    Bedroom,
    Kitchen,
    Bathroom,
    Office,
    Other,
}

/// A room of the property, written as a sub-item once the property exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDraft {
    pub name: String,
    pub kind: RoomKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_m2: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// Remote lifecycle state of the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Draft,
    Available,
    Listed,
}

/// Publication choices. `None` means the user never touched the field and
/// the server value must be left alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PublicationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_state: Option<ListingState>,
}

impl PublicationOptions {
    pub fn is_untouched(&self) -> bool {
        self.visibility.is_none() && self.available_from.is_none() && self.target_state.is_none()
    }
}

/// The accumulating, partially-filled property record.
///
/// Attachments are skipped by serde: their bytes are local handles and
/// must be re-added after a reload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<PropertyCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<PropertyDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyRating>,
    #[serde(default)]
    pub rooms: Vec<RoomDraft>,
    #[serde(skip)]
    pub attachments: Vec<PendingAttachment>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub publication: PublicationOptions,
}

impl DraftFields {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.address.is_none()
            && self.details.is_none()
            && self.energy.is_none()
            && self.rooms.is_empty()
            && self.attachments.is_empty()
            && self.tags.is_empty()
            && self.publication.is_untouched()
    }
}

/// A partial update to `DraftFields`.
///
/// Every present key replaces the corresponding field wholesale. Lists are
/// never appended to: send the full desired list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPatch {
    pub category: Option<PropertyCategory>,
    pub address: Option<Address>,
    pub details: Option<PropertyDetails>,
    pub energy: Option<EnergyRating>,
    pub rooms: Option<Vec<RoomDraft>>,
    pub tags: Option<Vec<String>>,
    pub publication: Option<PublicationOptions>,
}

impl DraftPatch {
    /// Shallow-merge this patch into `fields`.
    pub fn apply(self, fields: &mut DraftFields) {
        if let Some(category) = self.category {
            fields.category = Some(category);
        }
        if let Some(address) = self.address {
            fields.address = Some(address);
        }
        if let Some(details) = self.details {
            fields.details = Some(details);
        }
        if let Some(energy) = self.energy {
            fields.energy = Some(energy);
        }
        if let Some(rooms) = self.rooms {
            fields.rooms = rooms;
        }
        if let Some(tags) = self.tags {
            fields.tags = tags;
        }
        if let Some(publication) = self.publication {
            fields.publication = publication;
        }
    }
}

/// Identifiers assigned by the resource API once the property exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIds {
    pub primary_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_id: Option<String>,
}

/// Full draft state: navigation plus fields plus remote ids.
#[derive(Debug, Clone)]
pub struct Draft {
    pub mode: Mode,
    pub current_step: WizardStep,
    pub fields: DraftFields,
    pub remote_ids: Option<RemoteIds>,
}

impl Default for Draft {
    fn default() -> Self {
        let mode = Mode::default();
        Self {
            mode,
            current_step: mode.first_step(),
            fields: DraftFields::default(),
            remote_ids: None,
        }
    }
}

impl Draft {
    pub fn to_snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            mode: self.mode,
            current_step: self.current_step,
            fields: self.fields.clone(),
        }
    }
}

/// What survives a reload: navigation and serializable fields only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub mode: Mode,
    pub current_step: WizardStep,
    pub fields: DraftFields,
}

impl DraftSnapshot {
    /// Rebuild a draft, repairing a step that does not belong to the mode.
    pub fn into_draft(self) -> Draft {
        let current_step = if self.mode.contains(self.current_step) {
            self.current_step
        } else {
            self.mode.first_step()
        };
        Draft {
            mode: self.mode,
            current_step,
            fields: self.fields,
            remote_ids: None,
        }
    }
}

/// Snapshot store keys.
pub mod snapshot_keys {
    /// Key for the in-progress property draft.
    pub const PROPERTY_DRAFT: &str = "property_onboarding_draft";
}
