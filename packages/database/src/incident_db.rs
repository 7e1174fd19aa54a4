//! [`RecordSource`] and [`ReportLookup`] over a live Postgres connection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use incident_trends_analytics::{AnalyticsError, Plan, RecordSource, ReportLookup};
use incident_trends_analytics_models::{BucketCount, CategoryBucketCount, DailyCounts};
use incident_trends_incident_models::Category;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, Row};

use crate::DbError;
use crate::db::DbConfig;
use crate::queries::{self, RenderedQuery, Tables};

/// Incident store backed by `switchy_database`.
#[derive(Clone)]
pub struct IncidentDb {
    db: Arc<dyn Database>,
    tables: Tables,
}

impl std::fmt::Debug for IncidentDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentDb")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

impl IncidentDb {
    /// Wraps an open connection, resolving tables under `table_prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidTablePrefix`] if the prefix is not a plain
    /// identifier fragment.
    pub fn new(db: Arc<dyn Database>, table_prefix: &str) -> Result<Self, DbError> {
        Ok(Self {
            db,
            tables: Tables::new(table_prefix)?,
        })
    }

    /// Connects with `config` and wraps the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is invalid or the connection fails.
    pub async fn connect(config: &DbConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let tables = Tables::new(&config.table_prefix)?;
        let db = config.connect().await?;
        Ok(Self {
            db: Arc::from(db),
            tables,
        })
    }

    /// Resolved table names.
    #[must_use]
    pub const fn tables(&self) -> &Tables {
        &self.tables
    }

    async fn fetch(&self, query: &RenderedQuery) -> Result<Vec<Row>, DbError> {
        log::debug!("{} ({} params)", query.sql, query.params.len());
        let rows = self.db.query_raw_params(&query.sql, &query.params).await?;
        log::debug!("{} rows", rows.len());
        Ok(rows)
    }

    async fn fetch_count(&self, query: &RenderedQuery) -> Result<u64, DbError> {
        let rows = self.fetch(query).await?;
        rows.first().map_or(Ok(0), |row| read_count(row, "total"))
    }
}

fn read_i64(row: &Row, column: &str) -> Result<i64, DbError> {
    row.to_value(column).map_err(|e| DbError::Conversion {
        message: format!("Failed to parse {column}: {e}"),
    })
}

fn read_count(row: &Row, column: &str) -> Result<u64, DbError> {
    let n = read_i64(row, column)?;
    u64::try_from(n).map_err(|_| DbError::Conversion {
        message: format!("Negative {column}: {n}"),
    })
}

fn read_text(row: &Row, column: &str) -> Result<String, DbError> {
    let value: Option<String> = row.to_value(column).map_err(|e| DbError::Conversion {
        message: format!("Failed to parse {column}: {e}"),
    })?;
    value.ok_or_else(|| DbError::Conversion {
        message: format!("Null {column}"),
    })
}

fn bucket_count(row: &Row) -> Result<BucketCount, DbError> {
    Ok(BucketCount {
        bucket_epoch_seconds: read_i64(row, "bucket_start")?,
        count: read_count(row, "number")?,
    })
}

fn category_bucket_count(row: &Row) -> Result<CategoryBucketCount, DbError> {
    Ok(CategoryBucketCount {
        bucket_epoch_seconds: read_i64(row, "bucket_start")?,
        count: read_count(row, "number")?,
        category_id: read_i64(row, "category_id")?,
        category_title: read_text(row, "category_title")?,
        category_color: read_text(row, "category_color")?,
    })
}

#[async_trait]
impl RecordSource for IncidentDb {
    async fn bucket_counts(&self, plan: &Plan) -> Result<Vec<BucketCount>, AnalyticsError> {
        let query = queries::bucket_counts_query(plan, &self.tables);
        let rows = self.fetch(&query).await?;
        Ok(rows.iter().map(bucket_count).collect::<Result<_, _>>()?)
    }

    async fn category_bucket_counts(
        &self,
        plan: &Plan,
    ) -> Result<Vec<CategoryBucketCount>, AnalyticsError> {
        let query = queries::category_bucket_counts_query(plan, &self.tables);
        let rows = self.fetch(&query).await?;
        Ok(rows
            .iter()
            .map(category_bucket_count)
            .collect::<Result<_, _>>()?)
    }
}

#[async_trait]
impl ReportLookup for IncidentDb {
    async fn visible_categories(&self) -> Result<Vec<Category>, AnalyticsError> {
        let rows = self
            .fetch(&queries::visible_categories_query(&self.tables))
            .await?;
        let mut categories = Vec::with_capacity(rows.len());
        for row in &rows {
            categories.push(Category::new(
                read_i64(row, "id")?,
                read_text(row, "category_title")?,
                read_text(row, "category_color")?,
            ));
        }
        Ok(categories)
    }

    async fn total_reports(&self, approved_only: bool) -> Result<u64, AnalyticsError> {
        Ok(self
            .fetch_count(&queries::total_reports_query(&self.tables, approved_only))
            .await?)
    }

    async fn total_reports_by_verified(&self, verified: bool) -> Result<u64, AnalyticsError> {
        Ok(self
            .fetch_count(&queries::verified_reports_query(&self.tables, verified))
            .await?)
    }

    async fn oldest_report_date(
        &self,
        approved: bool,
    ) -> Result<Option<NaiveDateTime>, AnalyticsError> {
        let rows = self
            .fetch(&queries::oldest_report_query(&self.tables, approved))
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let oldest: Option<NaiveDateTime> =
            row.to_value("oldest").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse oldest: {e}"),
            })?;
        Ok(oldest)
    }

    async fn daily_counts(&self, since: Option<NaiveDate>) -> Result<DailyCounts, AnalyticsError> {
        let rows = self
            .fetch(&queries::daily_counts_query(&self.tables, since))
            .await?;
        let mut counts = DailyCounts::new();
        for row in &rows {
            *counts.entry(read_i64(row, "day_millis")?).or_insert(0) += read_count(row, "number")?;
        }
        Ok(counts)
    }

    async fn approved_incident_dates(&self) -> Result<Vec<NaiveDateTime>, AnalyticsError> {
        let rows = self
            .fetch(&queries::approved_dates_query(&self.tables))
            .await?;
        let mut dates = Vec::with_capacity(rows.len());
        for row in &rows {
            let date: NaiveDateTime =
                row.to_value("incident_date").map_err(|e| DbError::Conversion {
                    message: format!("Failed to parse incident_date: {e}"),
                })?;
            dates.push(date);
        }
        Ok(dates)
    }
}
