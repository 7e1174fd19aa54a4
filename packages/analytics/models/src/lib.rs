#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interval aggregation parameters and chart series types.
//!
//! Defines the caller-facing parameters for the "incidents by interval"
//! query, the typed filter they are parsed into, the grouped rows a record
//! source returns, and the keyed series collection that is serialized for
//! charting.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use incident_trends_incident_models::ActiveState;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// Label of the aggregate series that counts every category.
pub const ALL_CATEGORIES_LABEL: &str = "All Categories";

/// Color of the aggregate series.
pub const ALL_CATEGORIES_COLOR: &str = "#990000";

/// Time resolution a report timestamp is truncated to before grouping.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum BucketUnit {
    /// One bucket per clock hour.
    Hour,
    /// One bucket per calendar day.
    Day,
    /// One bucket per Sunday-start week.
    Week,
    /// One bucket per calendar month.
    #[default]
    Month,
}

impl BucketUnit {
    /// Parses an interval name, falling back to [`Self::Month`] for anything
    /// unrecognized (including an absent value).
    #[must_use]
    pub fn parse_lenient(value: Option<&str>) -> Self {
        value.and_then(|v| v.trim().parse().ok()).unwrap_or_default()
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Hour, Self::Day, Self::Week, Self::Month]
    }
}

/// Which approval states a query counts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActiveSelector {
    /// Only approved reports.
    #[default]
    Approved,
    /// Only reports still awaiting approval.
    Unapproved,
    /// Approved and unapproved reports.
    All,
}

impl ActiveSelector {
    /// Parses the `active` request parameter.
    ///
    /// `"true"` selects approved reports, `"false"` unapproved reports and
    /// `"all"` both. Any other value, or no value, selects approved reports.
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("false") => Self::Unapproved,
            Some("all") => Self::All,
            _ => Self::Approved,
        }
    }

    /// Returns the concrete set of active states this selector admits.
    #[must_use]
    pub const fn states(self) -> &'static [ActiveState] {
        match self {
            Self::Approved => &[ActiveState::Active],
            Self::Unapproved => &[ActiveState::Inactive],
            Self::All => ActiveState::all(),
        }
    }

    /// Returns `true` if a report in the given state passes this selector.
    #[must_use]
    pub fn admits(self, state: ActiveState) -> bool {
        self.states().contains(&state)
    }
}

/// Raw parameters for an interval query, as received over HTTP or the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IntervalParams {
    /// `hour`, `day`, `week` or `month`.
    pub interval: Option<String>,
    /// Inclusive lower bound on `incident_date`.
    pub start_date: Option<String>,
    /// Inclusive upper bound on `incident_date`.
    pub end_date: Option<String>,
    /// `true`, `false` or `all`.
    pub active: Option<String>,
    /// Media type code; only honored when numeric.
    pub media_type: Option<String>,
}

/// Typed record filter shared by every grouped read of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Approval states to count.
    pub active: ActiveSelector,
    /// Inclusive lower bound.
    pub start: Option<NaiveDateTime>,
    /// Inclusive upper bound.
    pub end: Option<NaiveDateTime>,
    /// When set, only reports with at least one media item of these types.
    pub media_types: Option<BTreeSet<i32>>,
}

impl FilterSpec {
    /// Returns `true` if the timestamp lies within the inclusive date range.
    #[must_use]
    pub fn in_date_range(&self, timestamp: NaiveDateTime) -> bool {
        self.start.is_none_or(|start| timestamp >= start)
            && self.end.is_none_or(|end| timestamp <= end)
    }

    /// Returns the media type filter as a sorted slice-friendly vector, or
    /// `None` when no media restriction applies.
    #[must_use]
    pub fn media_type_list(&self) -> Option<Vec<i32>> {
        self.media_types
            .as_ref()
            .filter(|types| !types.is_empty())
            .map(|types| types.iter().copied().collect())
    }
}

/// One row of the overall grouped count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCount {
    /// Bucket start as Unix seconds.
    pub bucket_epoch_seconds: i64,
    /// Reports in the bucket.
    pub count: u64,
}

/// One row of the per-category grouped count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBucketCount {
    /// Bucket start as Unix seconds.
    pub bucket_epoch_seconds: i64,
    /// Reports in the bucket tagged with the category.
    pub count: u64,
    /// Category primary key.
    pub category_id: i64,
    /// Category display title.
    pub category_title: String,
    /// Category color as stored (no leading `#`).
    pub category_color: String,
}

/// Category id whose string form collides with the aggregate key `"0"`.
pub const RESERVED_CATEGORY_ID: i64 = 0;

/// Key of a series in a [`SeriesCollection`].
///
/// Serialized as a string: `"0"` for the aggregate series, the decimal
/// category id otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesKey {
    /// The aggregate series across all categories.
    AllCategories,
    /// The series of one category.
    Category(i64),
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllCategories => write!(f, "0"),
            Self::Category(id) => write!(f, "{id}"),
        }
    }
}

impl std::str::FromStr for SeriesKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "0" {
            return Ok(Self::AllCategories);
        }
        s.parse().map(Self::Category)
    }
}

impl Serialize for SeriesKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SeriesKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single `(timestamp, count)` chart point.
///
/// Serialized as a two-element array `[epochMillis, count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeriesPoint {
    /// Bucket start as Unix milliseconds.
    pub epoch_millis: i64,
    /// Reports in the bucket.
    pub count: u64,
}

impl Serialize for SeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.epoch_millis, self.count).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SeriesPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (epoch_millis, count) = <(i64, u64)>::deserialize(deserializer)?;
        Ok(Self {
            epoch_millis,
            count,
        })
    }
}

/// A named, colored series of points ordered by time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Legend label.
    pub label: String,
    /// `#RRGGBB` color.
    pub color: String,
    /// Points in ascending time order, one per bucket.
    pub data: Vec<SeriesPoint>,
}

impl Series {
    /// Creates an empty series.
    #[must_use]
    pub fn new(label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: color.into(),
            data: Vec::new(),
        }
    }

    /// Creates the empty aggregate series.
    #[must_use]
    pub fn all_categories() -> Self {
        Self::new(ALL_CATEGORIES_LABEL, ALL_CATEGORIES_COLOR)
    }

    /// Sum of all point counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.data.iter().map(|p| p.count).sum()
    }
}

/// Series keyed by [`SeriesKey`], aggregate series first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SeriesCollection {
    series: BTreeMap<SeriesKey, Series>,
}

impl<'de> Deserialize<'de> for SeriesCollection {
    /// Restores an empty aggregate series when the input has no `"0"` key.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut series = BTreeMap::<SeriesKey, Series>::deserialize(deserializer)?;
        series
            .entry(SeriesKey::AllCategories)
            .or_insert_with(Series::all_categories);
        Ok(Self { series })
    }
}

impl Default for SeriesCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesCollection {
    /// Creates a collection holding only an empty aggregate series.
    #[must_use]
    pub fn new() -> Self {
        let mut series = BTreeMap::new();
        series.insert(SeriesKey::AllCategories, Series::all_categories());
        Self { series }
    }

    /// The aggregate series.
    ///
    /// # Panics
    ///
    /// Never: construction and deserialization both insert the aggregate
    /// series and nothing removes it.
    #[must_use]
    pub fn all_categories(&self) -> &Series {
        &self.series[&SeriesKey::AllCategories]
    }

    /// Mutable access to the aggregate series.
    pub fn all_categories_mut(&mut self) -> &mut Series {
        self.series
            .entry(SeriesKey::AllCategories)
            .or_insert_with(Series::all_categories)
    }

    /// Looks up a category's series.
    #[must_use]
    pub fn category(&self, id: i64) -> Option<&Series> {
        self.series.get(&SeriesKey::Category(id))
    }

    /// Inserts or replaces a category series.
    ///
    /// Id `0` is reserved for the aggregate series; inserting it is ignored
    /// and returns `false`.
    pub fn insert_category(&mut self, id: i64, series: Series) -> bool {
        if id == RESERVED_CATEGORY_ID {
            return false;
        }
        self.series.insert(SeriesKey::Category(id), series);
        true
    }

    /// Looks up any series by key.
    #[must_use]
    pub fn get(&self, key: SeriesKey) -> Option<&Series> {
        self.series.get(&key)
    }

    /// Category ids present, ascending.
    pub fn category_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.series.keys().filter_map(|key| match key {
            SeriesKey::AllCategories => None,
            SeriesKey::Category(id) => Some(*id),
        })
    }

    /// Iterates `(key, series)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &Series)> {
        self.series.iter()
    }

    /// Number of series, including the aggregate one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Always `false`: the aggregate series is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Serializes the collection to its JSON chart representation.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A visible category as exposed to chart legends and filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    /// Category primary key.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// `#RRGGBB` color.
    pub color: String,
}

/// Report totals for the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    /// Every report regardless of state.
    pub total: u64,
    /// Approved reports.
    pub approved: u64,
    /// Approved and verified reports.
    pub verified: u64,
    /// Approved but unverified reports.
    pub unverified: u64,
}

/// Daily report counts keyed by the day's midnight as Unix milliseconds.
pub type DailyCounts = BTreeMap<i64, u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_interval_falls_back_to_month() {
        assert_eq!(BucketUnit::parse_lenient(Some("week")), BucketUnit::Week);
        assert_eq!(BucketUnit::parse_lenient(Some(" day ")), BucketUnit::Day);
        assert_eq!(BucketUnit::parse_lenient(Some("fortnight")), BucketUnit::Month);
        assert_eq!(BucketUnit::parse_lenient(Some("")), BucketUnit::Month);
        assert_eq!(BucketUnit::parse_lenient(None), BucketUnit::Month);
    }

    #[test]
    fn active_selector_maps_to_state_sets() {
        assert_eq!(
            ActiveSelector::from_param(Some("true")).states(),
            &[ActiveState::Active]
        );
        assert_eq!(
            ActiveSelector::from_param(Some("false")).states(),
            &[ActiveState::Inactive]
        );
        assert_eq!(
            ActiveSelector::from_param(Some("all")).states(),
            &[ActiveState::Inactive, ActiveState::Active]
        );
        assert_eq!(
            ActiveSelector::from_param(Some("yes please")),
            ActiveSelector::Approved
        );
        assert_eq!(ActiveSelector::from_param(None), ActiveSelector::Approved);
    }

    #[test]
    fn series_key_string_form() {
        assert_eq!(SeriesKey::AllCategories.to_string(), "0");
        assert_eq!(SeriesKey::Category(12).to_string(), "12");
        assert_eq!("0".parse::<SeriesKey>().unwrap(), SeriesKey::AllCategories);
        assert_eq!("7".parse::<SeriesKey>().unwrap(), SeriesKey::Category(7));
        assert!("x".parse::<SeriesKey>().is_err());
    }

    #[test]
    fn collection_serializes_as_chart_object() {
        let mut collection = SeriesCollection::new();
        collection.all_categories_mut().data.push(SeriesPoint {
            epoch_millis: 1_704_067_200_000,
            count: 2,
        });
        let mut trees = Series::new("Trees", "#00ff00");
        trees.data.push(SeriesPoint {
            epoch_millis: 1_704_067_200_000,
            count: 1,
        });
        collection.insert_category(10, trees);
        collection.insert_category(2, Series::new("Roads", "#0000ff"));

        let json = collection.to_json().unwrap();
        assert_eq!(
            json,
            r##"{"0":{"label":"All Categories","color":"#990000","data":[[1704067200000,2]]},"2":{"label":"Roads","color":"#0000ff","data":[]},"10":{"label":"Trees","color":"#00ff00","data":[[1704067200000,1]]}}"##
        );
    }

    #[test]
    fn missing_aggregate_series_is_restored_on_read() {
        let collection: SeriesCollection =
            serde_json::from_str(r##"{"3":{"label":"R","color":"#0000ff","data":[]}}"##).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.all_categories(), &Series::all_categories());
        assert_eq!(collection.category(3).map(|s| s.label.as_str()), Some("R"));
    }

    #[test]
    fn category_zero_cannot_shadow_aggregate_key() {
        let mut collection = SeriesCollection::new();
        assert!(!collection.insert_category(0, Series::new("Zero", "#000000")));
        assert!(collection.insert_category(4, Series::new("Four", "#000000")));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.all_categories().label, ALL_CATEGORIES_LABEL);
        assert_eq!(collection.category_ids().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        let filter = FilterSpec {
            start: Some(at("2024-01-01 00:00:00")),
            end: Some(at("2024-01-31 00:00:00")),
            ..FilterSpec::default()
        };

        assert!(filter.in_date_range(at("2024-01-01 00:00:00")));
        assert!(filter.in_date_range(at("2024-01-31 00:00:00")));
        assert!(!filter.in_date_range(at("2023-12-31 23:59:59")));
        assert!(!filter.in_date_range(at("2024-01-31 00:00:01")));
    }
}
