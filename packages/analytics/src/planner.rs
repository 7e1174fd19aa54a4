//! Filter and bucket planning.
//!
//! Turns request parameters into a [`Plan`]: the bucket unit that decides
//! how timestamps are truncated and grouped, and the [`FilterSpec`] every
//! grouped read of the request shares.
//!
//! Week buckets start on Sunday. A week's grouping key is `YYYYWW`, where
//! `YYYY` is the year of its Sunday and `WW` counts Sundays from the start of
//! that year (the week holding the year's first Sunday is week 1).

use std::collections::BTreeSet;

use chrono::{Datelike as _, Days, NaiveDate, NaiveDateTime, Timelike as _};
use incident_trends_analytics_models::{ActiveSelector, BucketUnit, FilterSpec, IntervalParams};
use incident_trends_incident_models::Incident;

use crate::AnalyticsError;

/// A concrete query plan: bucket unit plus record filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Bucket resolution.
    pub unit: BucketUnit,
    /// Record filter.
    pub filter: FilterSpec,
}

impl Plan {
    /// Truncates a timestamp to the start of its bucket.
    #[must_use]
    pub fn bucket_start(&self, timestamp: NaiveDateTime) -> NaiveDateTime {
        bucket_start(self.unit, timestamp)
    }

    /// Returns the grouping key of the bucket holding `timestamp`.
    #[must_use]
    pub fn bucket_key(&self, timestamp: NaiveDateTime) -> i64 {
        bucket_key(self.unit, timestamp)
    }

    /// Returns the display form of the bucket holding `timestamp`.
    #[must_use]
    pub fn bucket_label(&self, timestamp: NaiveDateTime) -> String {
        bucket_label(self.unit, timestamp)
    }

    /// Unix seconds of the start of the bucket holding `timestamp`.
    #[must_use]
    pub fn bucket_epoch_seconds(&self, timestamp: NaiveDateTime) -> i64 {
        self.bucket_start(timestamp).and_utc().timestamp()
    }

    /// Returns `true` if the incident passes the active-state, date range
    /// and media-type filters.
    ///
    /// The media filter is an existence test: any one matching media item
    /// admits the incident, and admitting it never counts it twice.
    #[must_use]
    pub fn admits(&self, incident: &Incident) -> bool {
        self.filter.active.admits(incident.active)
            && self.filter.in_date_range(incident.incident_date)
            && self
                .filter
                .media_type_list()
                .is_none_or(|types| incident.has_media_of_type(&types))
    }
}

/// Builds a plan from already-typed parameters.
#[must_use]
pub fn plan(
    unit: BucketUnit,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    active: ActiveSelector,
    media_types: Option<BTreeSet<i32>>,
) -> Plan {
    Plan {
        unit,
        filter: FilterSpec {
            active,
            start,
            end,
            media_types: media_types.filter(|types| !types.is_empty()),
        },
    }
}

/// Builds a plan from raw request parameters.
///
/// An unrecognized `interval` falls back to monthly buckets unless `strict`
/// is set. A non-numeric `media_type` is ignored.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if a date cannot be parsed,
/// or if `strict` is set and the interval is not one of
/// `hour|day|week|month`.
pub fn plan_from_params(params: &IntervalParams, strict: bool) -> Result<Plan, AnalyticsError> {
    let unit = match params.interval.as_deref() {
        Some(raw) if strict => raw
            .trim()
            .parse::<BucketUnit>()
            .map_err(|_| AnalyticsError::InvalidParameter {
                message: format!("Unknown interval '{raw}'. Expected hour, day, week or month"),
            })?,
        raw => BucketUnit::parse_lenient(raw),
    };

    let start = params
        .start_date
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_date)
        .transpose()?;
    let end = params
        .end_date
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_date)
        .transpose()?;

    let media_types = params.media_type.as_deref().and_then(|raw| {
        raw.trim().parse::<i32>().map_or_else(
            |_| {
                log::debug!("Ignoring non-numeric media_type '{raw}'");
                None
            },
            |code| Some(BTreeSet::from([code])),
        )
    });

    let plan = plan(
        unit,
        start,
        end,
        ActiveSelector::from_param(params.active.as_deref()),
        media_types,
    );
    log::debug!("Planned interval query: {plan:?}");
    Ok(plan)
}

/// Parses a date bound like `"2024-01-01"` or `"2024-01-01 13:30:00"`.
///
/// A date without a time means midnight at the start of that day.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if no supported format
/// matches.
pub fn parse_date(s: &str) -> Result<NaiveDateTime, AnalyticsError> {
    let s = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        .map_err(|e| AnalyticsError::InvalidParameter {
            message: format!("Invalid date '{s}': {e}. Expected format: YYYY-MM-DD"),
        })
}

/// Truncates a timestamp to the start of its `unit` bucket.
#[must_use]
pub fn bucket_start(unit: BucketUnit, timestamp: NaiveDateTime) -> NaiveDateTime {
    let date = timestamp.date();
    match unit {
        BucketUnit::Hour => date
            .and_hms_opt(timestamp.hour(), 0, 0)
            .unwrap_or(timestamp),
        BucketUnit::Day => date.and_hms_opt(0, 0, 0).unwrap_or_default(),
        BucketUnit::Week => week_start(date).and_hms_opt(0, 0, 0).unwrap_or_default(),
        BucketUnit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
            .unwrap_or(date)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default(),
    }
}

/// Returns the grouping key of the `unit` bucket holding `timestamp`:
/// `YYYYMMDDHH`, `YYYYMMDD`, `YYYYWW` or `YYYYMM`.
#[must_use]
pub fn bucket_key(unit: BucketUnit, timestamp: NaiveDateTime) -> i64 {
    let date = timestamp.date();
    let year = i64::from(date.year());
    let month = i64::from(date.month());
    let day = i64::from(date.day());
    match unit {
        BucketUnit::Hour => {
            year * 1_000_000 + month * 10_000 + day * 100 + i64::from(timestamp.hour())
        }
        BucketUnit::Day => year * 10_000 + month * 100 + day,
        BucketUnit::Week => {
            let sunday = week_start(date);
            i64::from(sunday.year()) * 100 + i64::from(sunday.ordinal0() / 7 + 1)
        }
        BucketUnit::Month => year * 100 + month,
    }
}

/// Formats the start of the `unit` bucket holding `timestamp`.
#[must_use]
pub fn bucket_label(unit: BucketUnit, timestamp: NaiveDateTime) -> String {
    let start = bucket_start(unit, timestamp);
    match unit {
        BucketUnit::Hour => start.format("%Y-%m-%d %H:%M").to_string(),
        BucketUnit::Day | BucketUnit::Week | BucketUnit::Month => {
            start.format("%Y-%m-%d").to_string()
        }
    }
}

/// The Sunday on or before `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_sunday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}
