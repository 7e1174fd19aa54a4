#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the incident trends server.
//!
//! The interval endpoint takes
//! [`IntervalParams`](incident_trends_analytics_models::IntervalParams) as its
//! query string and returns a
//! [`SeriesCollection`](incident_trends_analytics_models::SeriesCollection)
//! directly; the types here cover the remaining endpoints.

use incident_trends_analytics_models::DailyCounts;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Query parameters for the daily counts endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyQueryParams {
    /// Number of days back from today. Missing or `0` means all time.
    pub range: Option<u32>,
}

/// One day's report count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDailyCount {
    /// Midnight of the day as Unix milliseconds.
    pub day: i64,
    /// Reports on that day.
    pub count: u64,
}

/// Converts keyed daily counts into the ascending list the API returns.
#[must_use]
pub fn daily_counts_to_api(counts: &DailyCounts) -> Vec<ApiDailyCount> {
    counts
        .iter()
        .map(|(&day, &count)| ApiDailyCount { day, count })
        .collect()
}

/// Query parameters for the oldest report endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OldestQueryParams {
    /// `false` looks at unapproved reports. Defaults to approved.
    pub approved: Option<bool>,
}

/// Timestamp of the oldest matching report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOldestReport {
    /// Unix seconds, or `null` when there are no matching reports.
    pub timestamp: Option<i64>,
}
