//! Dashboard lookups that sit beside the interval chart.

use chrono::{Days, NaiveDate};
use incident_trends_analytics_models::{CategoryInfo, DailyCounts, ReportTotals};

use crate::AnalyticsError;
use crate::aggregate::prefix_color;
use crate::source::ReportLookup;

/// Lists visible categories with `#`-prefixed colors.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the lookup fails or a category color is
/// unusable.
pub async fn active_categories(
    lookup: &dyn ReportLookup,
) -> Result<Vec<CategoryInfo>, AnalyticsError> {
    lookup
        .visible_categories()
        .await?
        .into_iter()
        .map(|category| -> Result<CategoryInfo, AnalyticsError> {
            let color = prefix_color(&category.color).map_err(|e| AnalyticsError::MalformedRow {
                message: format!("category {}: {e}", category.id),
            })?;
            Ok(CategoryInfo {
                id: category.id,
                title: category.title,
                color,
            })
        })
        .collect()
}

/// Collects the report totals shown in the dashboard header.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if any count fails.
pub async fn report_totals(lookup: &dyn ReportLookup) -> Result<ReportTotals, AnalyticsError> {
    Ok(ReportTotals {
        total: lookup.total_reports(false).await?,
        approved: lookup.total_reports(true).await?,
        verified: lookup.total_reports_by_verified(true).await?,
        unverified: lookup.total_reports_by_verified(false).await?,
    })
}

/// Counts reports per day over the last `range_days` days up to `today`.
///
/// `None` or `Some(0)` counts over all time.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the lookup fails.
pub async fn reports_by_date(
    lookup: &dyn ReportLookup,
    range_days: Option<u32>,
    today: NaiveDate,
) -> Result<DailyCounts, AnalyticsError> {
    let since = range_days
        .filter(|days| *days > 0)
        .map(|days| {
            today
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN)
        });
    log::debug!("Counting reports by date since {since:?}");
    lookup.daily_counts(since).await
}

/// Unix seconds of the oldest approved (or unapproved) report, if any.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the lookup fails.
pub async fn oldest_report_timestamp(
    lookup: &dyn ReportLookup,
    approved: bool,
) -> Result<Option<i64>, AnalyticsError> {
    Ok(lookup
        .oldest_report_date(approved)
        .await?
        .map(|date| date.and_utc().timestamp()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use incident_trends_incident_models::{ActiveState, Category, Incident};

    use super::*;
    use crate::memory::MemoryRecordSource;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn source() -> MemoryRecordSource {
        MemoryRecordSource::new()
            .with_category(Category::new(2, "Floods", "0000cc"))
            .with_category(Category::new(1, "Riots", "cc0000"))
            .with_category(Category::new(3, "Internal", "333333").hidden())
            .with_incident(
                Incident::new(1, at("2024-01-01 08:00:00"), ActiveState::Active).verified(),
            )
            .with_incident(Incident::new(2, at("2024-01-08 08:00:00"), ActiveState::Active))
            .with_incident(Incident::new(3, at("2024-01-09 08:00:00"), ActiveState::Inactive))
    }

    #[tokio::test]
    async fn active_categories_are_visible_and_prefixed() {
        let categories = active_categories(&source()).await.unwrap();
        assert_eq!(
            categories,
            vec![
                CategoryInfo {
                    id: 1,
                    title: "Riots".to_string(),
                    color: "#cc0000".to_string(),
                },
                CategoryInfo {
                    id: 2,
                    title: "Floods".to_string(),
                    color: "#0000cc".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn totals_split_by_state() {
        let totals = report_totals(&source()).await.unwrap();
        assert_eq!(
            totals,
            ReportTotals {
                total: 3,
                approved: 2,
                verified: 1,
                unverified: 1,
            }
        );
    }

    #[tokio::test]
    async fn range_limits_daily_counts() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let week = reports_by_date(&source(), Some(7), today).await.unwrap();
        assert_eq!(week.values().sum::<u64>(), 2);

        let all = reports_by_date(&source(), Some(0), today).await.unwrap();
        assert_eq!(all.values().sum::<u64>(), 3);
        assert!(all.keys().zip(all.keys().skip(1)).all(|(a, b)| a < b));
    }

    #[tokio::test]
    async fn oldest_timestamp_is_epoch_seconds() {
        assert_eq!(
            oldest_report_timestamp(&source(), true).await.unwrap(),
            Some(1_704_096_000)
        );
        assert_eq!(
            oldest_report_timestamp(&MemoryRecordSource::new(), true)
                .await
                .unwrap(),
            None
        );
    }
}
