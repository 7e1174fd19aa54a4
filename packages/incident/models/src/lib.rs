#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident, category and media record types.
//!
//! These are the read-only entities the aggregation engine works over. They
//! mirror the rows of the `incident`, `category`, `incident_category` and
//! `media` tables, independent of how a particular record store lays them out.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Approval state of an incident report.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActiveState {
    /// Not yet approved by a moderator (`incident_active = 0`).
    Inactive = 0,
    /// Approved and publicly visible (`incident_active = 1`).
    Active = 1,
}

impl ActiveState {
    /// Returns the stored numeric value of this state.
    #[must_use]
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Creates a state from its stored numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is neither 0 nor 1.
    pub const fn from_value(value: i32) -> Result<Self, InvalidActiveStateError> {
        match value {
            0 => Ok(Self::Inactive),
            1 => Ok(Self::Active),
            _ => Err(InvalidActiveStateError { value }),
        }
    }

    /// Returns both states, inactive first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Inactive, Self::Active]
    }
}

/// Error returned when a stored active flag is outside `{0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidActiveStateError {
    /// The invalid value that was provided.
    pub value: i32,
}

impl std::fmt::Display for InvalidActiveStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid active state {}: expected 0 or 1", self.value)
    }
}

impl std::error::Error for InvalidActiveStateError {}

/// A media attachment on an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Media primary key.
    pub id: i64,
    /// Media type code (photo, video, news link, ...).
    pub media_type: i32,
}

/// An incident report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Primary key.
    pub id: i64,
    /// When the incident happened.
    pub incident_date: NaiveDateTime,
    /// Approval state.
    pub active: ActiveState,
    /// Whether the report has been verified.
    pub verified: bool,
    /// Categories the incident is tagged with.
    pub category_ids: Vec<i64>,
    /// Attached media items.
    pub media: Vec<MediaItem>,
}

impl Incident {
    /// Creates an unverified incident with no categories or media.
    #[must_use]
    pub const fn new(id: i64, incident_date: NaiveDateTime, active: ActiveState) -> Self {
        Self {
            id,
            incident_date,
            active,
            verified: false,
            category_ids: Vec::new(),
            media: Vec::new(),
        }
    }

    /// Tags the incident with the given categories.
    #[must_use]
    pub fn with_categories(mut self, category_ids: impl IntoIterator<Item = i64>) -> Self {
        self.category_ids.extend(category_ids);
        self
    }

    /// Attaches a media item.
    #[must_use]
    pub fn with_media(mut self, id: i64, media_type: i32) -> Self {
        self.media.push(MediaItem { id, media_type });
        self
    }

    /// Marks the incident as verified.
    #[must_use]
    pub const fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Returns `true` if any attached media item has one of the given types.
    #[must_use]
    pub fn has_media_of_type(&self, media_types: &[i32]) -> bool {
        self.media
            .iter()
            .any(|m| media_types.contains(&m.media_type))
    }
}

/// A row in the `category` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Primary key.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Display color as hex, stored without the leading `#`.
    pub color: String,
    /// Whether the category is shown to users.
    pub visible: bool,
}

impl Category {
    /// Creates a visible category.
    #[must_use]
    pub fn new(id: i64, title: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            color: color.into(),
            visible: true,
        }
    }

    /// Hides the category.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}
