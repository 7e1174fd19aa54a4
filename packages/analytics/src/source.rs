//! Record store seams.
//!
//! [`RecordSource`] is the contract the aggregator runs against: the two
//! grouped counts of an interval query. [`ReportLookup`] covers the simple
//! lookups dashboards show next to the chart.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use incident_trends_analytics_models::{BucketCount, CategoryBucketCount, DailyCounts};
use incident_trends_incident_models::Category;

use crate::AnalyticsError;
use crate::planner::Plan;

/// A store that can run the grouped counts of a [`Plan`].
///
/// Both reads of one request must see the same filter: active states, date
/// range and media-type existence test.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Counts filtered incidents per bucket.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable or returns a
    /// malformed row.
    async fn bucket_counts(&self, plan: &Plan) -> Result<Vec<BucketCount>, AnalyticsError>;

    /// Counts filtered incidents per `(bucket, category)`.
    ///
    /// An incident with several categories is counted once under each.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable or returns a
    /// malformed row.
    async fn category_bucket_counts(
        &self,
        plan: &Plan,
    ) -> Result<Vec<CategoryBucketCount>, AnalyticsError>;
}

/// Simple lookups over the same incident and category records.
#[async_trait]
pub trait ReportLookup: Send + Sync {
    /// All visible categories, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable.
    async fn visible_categories(&self) -> Result<Vec<Category>, AnalyticsError>;

    /// Number of reports, optionally only approved ones.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable.
    async fn total_reports(&self, approved_only: bool) -> Result<u64, AnalyticsError>;

    /// Number of approved reports with the given verification state.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable.
    async fn total_reports_by_verified(&self, verified: bool) -> Result<u64, AnalyticsError>;

    /// Earliest `incident_date` among approved (or unapproved) reports.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable.
    async fn oldest_report_date(
        &self,
        approved: bool,
    ) -> Result<Option<NaiveDateTime>, AnalyticsError>;

    /// Reports per calendar day, all states, from `since` onwards when given.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable.
    async fn daily_counts(&self, since: Option<NaiveDate>) -> Result<DailyCounts, AnalyticsError>;

    /// `incident_date` of every approved report, ordered by report id.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the store is unavailable.
    async fn approved_incident_dates(&self) -> Result<Vec<NaiveDateTime>, AnalyticsError>;
}
