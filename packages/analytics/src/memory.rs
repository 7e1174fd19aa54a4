//! In-process record source.
//!
//! Holds incidents and categories in memory and applies a [`Plan`] to them
//! directly, with the same semantics the SQL source gets from its joins:
//! the media filter is an existence test and category rows fan out once per
//! distinct category tag. Used for tests and for small offline datasets.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use incident_trends_analytics_models::{BucketCount, CategoryBucketCount, DailyCounts};
use incident_trends_incident_models::{ActiveState, Category, Incident};

use crate::AnalyticsError;
use crate::planner::Plan;
use crate::source::{RecordSource, ReportLookup};

/// In-memory incident and category store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    incidents: Vec<Incident>,
    categories: BTreeMap<i64, Category>,
    unavailable: bool,
}

impl MemoryRecordSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an incident.
    #[must_use]
    pub fn with_incident(mut self, incident: Incident) -> Self {
        self.incidents.push(incident);
        self
    }

    /// Adds or replaces a category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.insert(category.id, category);
        self
    }

    /// Makes every read fail with [`AnalyticsError::DataSourceUnavailable`].
    #[must_use]
    pub const fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// The stored incidents in insertion order.
    #[must_use]
    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    fn check_available(&self) -> Result<(), AnalyticsError> {
        if self.unavailable {
            return Err(AnalyticsError::DataSourceUnavailable {
                message: "in-memory source marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn admitted<'a>(&'a self, plan: &'a Plan) -> impl Iterator<Item = &'a Incident> + 'a {
        self.incidents.iter().filter(move |i| plan.admits(i))
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    async fn bucket_counts(&self, plan: &Plan) -> Result<Vec<BucketCount>, AnalyticsError> {
        self.check_available()?;

        // bucket key -> (bucket start seconds, count)
        let mut groups: BTreeMap<i64, (i64, u64)> = BTreeMap::new();
        for incident in self.admitted(plan) {
            let key = plan.bucket_key(incident.incident_date);
            let entry = groups
                .entry(key)
                .or_insert_with(|| (plan.bucket_epoch_seconds(incident.incident_date), 0));
            entry.1 += 1;
        }

        Ok(groups
            .into_values()
            .map(|(bucket_epoch_seconds, count)| BucketCount {
                bucket_epoch_seconds,
                count,
            })
            .collect())
    }

    async fn category_bucket_counts(
        &self,
        plan: &Plan,
    ) -> Result<Vec<CategoryBucketCount>, AnalyticsError> {
        self.check_available()?;

        let mut groups: BTreeMap<(i64, i64), (i64, u64)> = BTreeMap::new();
        for incident in self.admitted(plan) {
            let key = plan.bucket_key(incident.incident_date);
            let tags: BTreeSet<i64> = incident.category_ids.iter().copied().collect();
            for category_id in tags {
                if !self.categories.contains_key(&category_id) {
                    continue;
                }
                let entry = groups
                    .entry((key, category_id))
                    .or_insert_with(|| (plan.bucket_epoch_seconds(incident.incident_date), 0));
                entry.1 += 1;
            }
        }

        Ok(groups
            .into_iter()
            .filter_map(|((_, category_id), (bucket_epoch_seconds, count))| {
                let category = self.categories.get(&category_id)?;
                Some(CategoryBucketCount {
                    bucket_epoch_seconds,
                    count,
                    category_id,
                    category_title: category.title.clone(),
                    category_color: category.color.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl ReportLookup for MemoryRecordSource {
    async fn visible_categories(&self) -> Result<Vec<Category>, AnalyticsError> {
        self.check_available()?;
        Ok(self
            .categories
            .values()
            .filter(|c| c.visible)
            .cloned()
            .collect())
    }

    async fn total_reports(&self, approved_only: bool) -> Result<u64, AnalyticsError> {
        self.check_available()?;
        Ok(self
            .incidents
            .iter()
            .filter(|i| !approved_only || i.active == ActiveState::Active)
            .count() as u64)
    }

    async fn total_reports_by_verified(&self, verified: bool) -> Result<u64, AnalyticsError> {
        self.check_available()?;
        Ok(self
            .incidents
            .iter()
            .filter(|i| i.active == ActiveState::Active && i.verified == verified)
            .count() as u64)
    }

    async fn oldest_report_date(
        &self,
        approved: bool,
    ) -> Result<Option<NaiveDateTime>, AnalyticsError> {
        self.check_available()?;
        let wanted = if approved {
            ActiveState::Active
        } else {
            ActiveState::Inactive
        };
        Ok(self
            .incidents
            .iter()
            .filter(|i| i.active == wanted)
            .map(|i| i.incident_date)
            .min())
    }

    async fn daily_counts(&self, since: Option<NaiveDate>) -> Result<DailyCounts, AnalyticsError> {
        self.check_available()?;
        let mut counts = DailyCounts::new();
        for incident in &self.incidents {
            let day = incident.incident_date.date();
            if since.is_some_and(|since| day < since) {
                continue;
            }
            let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
            *counts
                .entry(midnight.and_utc().timestamp_millis())
                .or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn approved_incident_dates(&self) -> Result<Vec<NaiveDateTime>, AnalyticsError> {
        self.check_available()?;
        let mut approved: Vec<&Incident> = self
            .incidents
            .iter()
            .filter(|i| i.active == ActiveState::Active)
            .collect();
        approved.sort_by_key(|i| i.id);
        Ok(approved.into_iter().map(|i| i.incident_date).collect())
    }
}

#[cfg(test)]
mod tests {
    use incident_trends_analytics_models::{ActiveSelector, BucketUnit};

    use super::*;
    use crate::planner::plan;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[tokio::test]
    async fn duplicate_tags_and_unknown_categories_do_not_count() {
        let source = MemoryRecordSource::new()
            .with_category(Category::new(1, "Riots", "cc0000"))
            .with_incident(
                Incident::new(1, at("2024-01-05 10:00:00"), ActiveState::Active)
                    .with_categories([1, 1, 42]),
            );
        let plan = plan(BucketUnit::Month, None, None, ActiveSelector::Approved, None);

        let rows = source.category_bucket_counts(&plan).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category_id, 1);
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[0].category_color, "cc0000");
    }

    #[tokio::test]
    async fn bucket_rows_carry_bucket_start() {
        let source = MemoryRecordSource::new()
            .with_incident(Incident::new(1, at("2024-01-05 10:20:00"), ActiveState::Active))
            .with_incident(Incident::new(2, at("2024-01-05 10:50:00"), ActiveState::Active));
        let plan = plan(BucketUnit::Hour, None, None, ActiveSelector::Approved, None);

        let rows = source.bucket_counts(&plan).await.unwrap();
        assert_eq!(
            rows,
            vec![BucketCount {
                bucket_epoch_seconds: at("2024-01-05 10:00:00").and_utc().timestamp(),
                count: 2,
            }]
        );
    }

    #[tokio::test]
    async fn lookups_follow_active_and_verified_flags() {
        let source = MemoryRecordSource::new()
            .with_category(Category::new(1, "Riots", "cc0000"))
            .with_category(Category::new(2, "Hidden", "000000").hidden())
            .with_incident(
                Incident::new(3, at("2024-01-07 10:00:00"), ActiveState::Active).verified(),
            )
            .with_incident(Incident::new(1, at("2024-01-05 10:00:00"), ActiveState::Active))
            .with_incident(Incident::new(2, at("2023-12-01 10:00:00"), ActiveState::Inactive));

        let visible = source.visible_categories().await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Riots");

        assert_eq!(source.total_reports(false).await.unwrap(), 3);
        assert_eq!(source.total_reports(true).await.unwrap(), 2);
        assert_eq!(source.total_reports_by_verified(true).await.unwrap(), 1);
        assert_eq!(source.total_reports_by_verified(false).await.unwrap(), 1);

        assert_eq!(
            source.oldest_report_date(true).await.unwrap(),
            Some(at("2024-01-05 10:00:00"))
        );
        assert_eq!(
            source.oldest_report_date(false).await.unwrap(),
            Some(at("2023-12-01 10:00:00"))
        );

        assert_eq!(
            source.approved_incident_dates().await.unwrap(),
            vec![at("2024-01-05 10:00:00"), at("2024-01-07 10:00:00")]
        );
    }

    #[tokio::test]
    async fn daily_counts_respect_since() {
        let source = MemoryRecordSource::new()
            .with_incident(Incident::new(1, at("2024-01-05 10:00:00"), ActiveState::Active))
            .with_incident(Incident::new(2, at("2024-01-05 23:00:00"), ActiveState::Inactive))
            .with_incident(Incident::new(3, at("2024-01-09 01:00:00"), ActiveState::Active));

        let all = source.daily_counts(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            all.get(&at("2024-01-05 00:00:00").and_utc().timestamp_millis()),
            Some(&2)
        );

        let recent = source
            .daily_counts(NaiveDate::from_ymd_opt(2024, 1, 6))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_source_fails_every_read() {
        let source = MemoryRecordSource::new().unavailable();
        assert!(source.bucket_counts(&Plan::default()).await.is_err());
        assert!(source.visible_categories().await.is_err());
        assert!(source.daily_counts(None).await.is_err());
    }
}
