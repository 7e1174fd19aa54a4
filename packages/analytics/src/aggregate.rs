//! Series aggregation.
//!
//! Runs a plan's two grouped counts against a [`RecordSource`] and merges the
//! rows into one [`SeriesCollection`]: the `"0"` series over every qualifying
//! report plus one series per category that has at least one.

use std::collections::BTreeMap;

use incident_trends_analytics_models::{
    BucketCount, CategoryBucketCount, IntervalParams, RESERVED_CATEGORY_ID, Series,
    SeriesCollection, SeriesPoint,
};

use crate::AnalyticsError;
use crate::planner::{Plan, plan_from_params};
use crate::source::RecordSource;

/// Aggregates incidents into per-bucket series according to `plan`.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if either grouped read fails or returns a
/// malformed row. No partial collection is returned.
pub async fn aggregate(
    plan: &Plan,
    source: &dyn RecordSource,
) -> Result<SeriesCollection, AnalyticsError> {
    let totals = source.bucket_counts(plan).await?;
    let by_category = source.category_bucket_counts(plan).await?;

    log::debug!(
        "Aggregating {} bucket rows and {} category rows ({} buckets)",
        totals.len(),
        by_category.len(),
        plan.unit,
    );

    assemble(&totals, &by_category)
}

/// Plans and aggregates an interval query from raw request parameters.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if planning fails or either grouped read fails.
pub async fn aggregate_params(
    params: &IntervalParams,
    strict: bool,
    source: &dyn RecordSource,
) -> Result<SeriesCollection, AnalyticsError> {
    let plan = plan_from_params(params, strict)?;
    aggregate(&plan, source).await
}

/// A category series under construction.
struct CategoryAccum {
    series: Series,
    points: BTreeMap<i64, u64>,
}

/// Merges grouped rows into a series collection.
///
/// Rows may arrive in any order. Points are emitted in ascending time order
/// with one point per bucket; repeated rows for the same bucket are summed.
/// Rows with a zero count contribute nothing, so a category whose rows are
/// all zero is left out of the collection.
///
/// # Errors
///
/// Returns [`AnalyticsError::MalformedRow`] if a category row has no color or
/// uses the reserved id `0`, or a bucket timestamp overflows when converted
/// to milliseconds.
pub fn assemble(
    totals: &[BucketCount],
    by_category: &[CategoryBucketCount],
) -> Result<SeriesCollection, AnalyticsError> {
    let mut collection = SeriesCollection::new();

    let mut overall = BTreeMap::new();
    for row in totals {
        accumulate(&mut overall, row.bucket_epoch_seconds, row.count)?;
    }
    collection.all_categories_mut().data = into_points(overall);

    let mut categories: BTreeMap<i64, CategoryAccum> = BTreeMap::new();
    for row in by_category {
        if row.count == 0 {
            continue;
        }
        if row.category_id == RESERVED_CATEGORY_ID {
            return Err(AnalyticsError::MalformedRow {
                message: format!(
                    "category id {RESERVED_CATEGORY_ID} is reserved for the aggregate series"
                ),
            });
        }
        let entry = match categories.entry(row.category_id) {
            std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::btree_map::Entry::Vacant(e) => e.insert(CategoryAccum {
                series: Series::new(
                    row.category_title.clone(),
                    prefix_color(&row.category_color).map_err(|e| {
                        AnalyticsError::MalformedRow {
                            message: format!("category {}: {e}", row.category_id),
                        }
                    })?,
                ),
                points: BTreeMap::new(),
            }),
        };
        accumulate(&mut entry.points, row.bucket_epoch_seconds, row.count)?;
    }

    for (id, accum) in categories {
        let mut series = accum.series;
        series.data = into_points(accum.points);
        collection.insert_category(id, series);
    }

    Ok(collection)
}

/// Prefixes a stored category color with `#`.
///
/// # Errors
///
/// Returns a description of the problem if the color is empty.
pub fn prefix_color(raw: &str) -> Result<String, String> {
    let color = raw.trim().trim_start_matches('#');
    if color.is_empty() {
        return Err("missing color".to_string());
    }
    Ok(format!("#{color}"))
}

fn accumulate(
    points: &mut BTreeMap<i64, u64>,
    epoch_seconds: i64,
    count: u64,
) -> Result<(), AnalyticsError> {
    if count == 0 {
        return Ok(());
    }
    let millis = epoch_seconds
        .checked_mul(1000)
        .ok_or_else(|| AnalyticsError::MalformedRow {
            message: format!("bucket timestamp {epoch_seconds} out of range"),
        })?;
    *points.entry(millis).or_insert(0) += count;
    Ok(())
}

fn into_points(points: BTreeMap<i64, u64>) -> Vec<SeriesPoint> {
    points
        .into_iter()
        .map(|(epoch_millis, count)| SeriesPoint {
            epoch_millis,
            count,
        })
        .collect()
}
