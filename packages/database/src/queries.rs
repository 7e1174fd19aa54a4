//! SQL rendering for the incident store.
//!
//! Every query is rendered from typed inputs into `$n`-placeholder SQL plus
//! its parameter list; no filter value is ever spliced into the text. Table
//! names are the only interpolated identifiers and come from a validated
//! [`Tables`].

use chrono::NaiveDate;
use incident_trends_analytics::Plan;
use incident_trends_analytics_models::{BucketUnit, FilterSpec};
use switchy_database::DatabaseValue;

use crate::DbError;

/// Resolved table names for one table prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    /// Incident records.
    pub incident: String,
    /// Incident-to-category links.
    pub incident_category: String,
    /// Categories.
    pub category: String,
    /// Media attached to incidents.
    pub media: String,
}

impl Tables {
    /// Resolves table names for `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidTablePrefix`] unless the prefix is made of
    /// ASCII letters, digits and underscores.
    pub fn new(prefix: &str) -> Result<Self, DbError> {
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DbError::InvalidTablePrefix {
                prefix: prefix.to_string(),
            });
        }
        Ok(Self {
            incident: format!("{prefix}incident"),
            incident_category: format!("{prefix}incident_category"),
            category: format!("{prefix}category"),
            media: format!("{prefix}media"),
        })
    }
}

/// SQL text and its positional parameters.
#[derive(Debug)]
pub struct RenderedQuery {
    /// Query text with `$1..$n` placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub params: Vec<DatabaseValue>,
}

/// Expression truncating `i.incident_date` to the start of its bucket.
#[must_use]
pub const fn bucket_expr(unit: BucketUnit) -> &'static str {
    match unit {
        BucketUnit::Hour => "date_trunc('hour', i.incident_date)",
        BucketUnit::Day => "date_trunc('day', i.incident_date)",
        // Sunday on or before the date.
        BucketUnit::Week => {
            "(i.incident_date::date - EXTRACT(DOW FROM i.incident_date)::int)::timestamp"
        }
        BucketUnit::Month => "date_trunc('month', i.incident_date)",
    }
}

/// Returns `(where_fragments, params, next_param_index)` for a filter.
fn build_filters(
    filter: &FilterSpec,
    tables: &Tables,
    start_idx: u32,
) -> (Vec<String>, Vec<DatabaseValue>, u32) {
    let mut frags = Vec::new();
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut idx = start_idx;

    let mut placeholders = Vec::new();
    for state in filter.active.states() {
        placeholders.push(format!("${idx}"));
        params.push(DatabaseValue::Int32(state.value()));
        idx += 1;
    }
    frags.push(format!("i.incident_active IN ({})", placeholders.join(", ")));

    if let Some(start) = filter.start {
        frags.push(format!("i.incident_date >= ${idx}"));
        params.push(DatabaseValue::DateTime(start));
        idx += 1;
    }

    if let Some(end) = filter.end {
        frags.push(format!("i.incident_date <= ${idx}"));
        params.push(DatabaseValue::DateTime(end));
        idx += 1;
    }

    if let Some(media_types) = filter.media_type_list() {
        let mut placeholders = Vec::with_capacity(media_types.len());
        for media_type in media_types {
            placeholders.push(format!("${idx}"));
            params.push(DatabaseValue::Int32(media_type));
            idx += 1;
        }
        // Existence test: several matching media must not multiply the row.
        frags.push(format!(
            "EXISTS (SELECT 1 FROM {media} m WHERE m.incident_id = i.id AND m.media_type IN ({list}))",
            media = tables.media,
            list = placeholders.join(", "),
        ));
    }

    (frags, params, idx)
}

fn where_clause(frags: &[String]) -> String {
    if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    }
}

/// Filtered incident counts per bucket, as `(bucket_start, number)` with
/// `bucket_start` in epoch seconds.
#[must_use]
pub fn bucket_counts_query(plan: &Plan, tables: &Tables) -> RenderedQuery {
    let (frags, params, _) = build_filters(&plan.filter, tables, 1);
    let sql = format!(
        "SELECT EXTRACT(EPOCH FROM {bucket})::bigint AS bucket_start, COUNT(*) AS number \
         FROM {incident} i{filters} \
         GROUP BY 1 ORDER BY 1",
        bucket = bucket_expr(plan.unit),
        incident = tables.incident,
        filters = where_clause(&frags),
    );
    RenderedQuery { sql, params }
}

/// Filtered incident counts per `(bucket, category)`.
///
/// Incidents fan out once per linked category; a link stored twice still
/// counts the incident once.
#[must_use]
pub fn category_bucket_counts_query(plan: &Plan, tables: &Tables) -> RenderedQuery {
    let (frags, params, _) = build_filters(&plan.filter, tables, 1);
    let sql = format!(
        "SELECT EXTRACT(EPOCH FROM {bucket})::bigint AS bucket_start, COUNT(DISTINCT i.id) AS number, \
                c.id::bigint AS category_id, c.category_title, c.category_color \
         FROM {incident} i \
         JOIN {incident_category} ic ON ic.incident_id = i.id \
         JOIN {category} c ON ic.category_id = c.id{filters} \
         GROUP BY 1, c.id, c.category_title, c.category_color \
         ORDER BY 1, c.id",
        bucket = bucket_expr(plan.unit),
        incident = tables.incident,
        incident_category = tables.incident_category,
        category = tables.category,
        filters = where_clause(&frags),
    );
    RenderedQuery { sql, params }
}

/// Visible categories ordered by id.
#[must_use]
pub fn visible_categories_query(tables: &Tables) -> RenderedQuery {
    RenderedQuery {
        sql: format!(
            "SELECT c.id::bigint AS id, c.category_title, c.category_color \
             FROM {category} c WHERE c.category_visible = $1 ORDER BY c.id",
            category = tables.category,
        ),
        params: vec![DatabaseValue::Int32(1)],
    }
}

/// Number of reports, optionally approved only.
#[must_use]
pub fn total_reports_query(tables: &Tables, approved_only: bool) -> RenderedQuery {
    let mut sql = format!("SELECT COUNT(*) AS total FROM {} i", tables.incident);
    let mut params = Vec::new();
    if approved_only {
        sql.push_str(" WHERE i.incident_active = $1");
        params.push(DatabaseValue::Int32(1));
    }
    RenderedQuery { sql, params }
}

/// Number of approved reports with the given verification state.
#[must_use]
pub fn verified_reports_query(tables: &Tables, verified: bool) -> RenderedQuery {
    RenderedQuery {
        sql: format!(
            "SELECT COUNT(*) AS total FROM {} i \
             WHERE i.incident_verified = $1 AND i.incident_active = $2",
            tables.incident
        ),
        params: vec![
            DatabaseValue::Int32(i32::from(verified)),
            DatabaseValue::Int32(1),
        ],
    }
}

/// Earliest `incident_date` among approved or unapproved reports.
#[must_use]
pub fn oldest_report_query(tables: &Tables, approved: bool) -> RenderedQuery {
    RenderedQuery {
        sql: format!(
            "SELECT MIN(i.incident_date) AS oldest FROM {} i WHERE i.incident_active = $1",
            tables.incident
        ),
        params: vec![DatabaseValue::Int32(i32::from(approved))],
    }
}

/// Reports per calendar day, keyed by the day's epoch milliseconds.
#[must_use]
pub fn daily_counts_query(tables: &Tables, since: Option<NaiveDate>) -> RenderedQuery {
    let mut frags = Vec::new();
    let mut params = Vec::new();
    if let Some(midnight) = since.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        frags.push("i.incident_date >= $1".to_string());
        params.push(DatabaseValue::DateTime(midnight));
    }
    let sql = format!(
        "SELECT (EXTRACT(EPOCH FROM date_trunc('day', i.incident_date))::bigint * 1000) AS day_millis, \
                COUNT(*) AS number \
         FROM {incident} i{filters} \
         GROUP BY 1 ORDER BY 1",
        incident = tables.incident,
        filters = where_clause(&frags),
    );
    RenderedQuery { sql, params }
}

/// `incident_date` of every approved report, ordered by id.
#[must_use]
pub fn approved_dates_query(tables: &Tables) -> RenderedQuery {
    RenderedQuery {
        sql: format!(
            "SELECT i.incident_date FROM {} i WHERE i.incident_active = $1 ORDER BY i.id",
            tables.incident
        ),
        params: vec![DatabaseValue::Int32(1)],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDateTime;
    use incident_trends_analytics::plan;
    use incident_trends_analytics_models::ActiveSelector;

    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn tables() -> Tables {
        Tables::new("ush_").unwrap()
    }

    #[test]
    fn prefix_is_applied_to_every_table() {
        let t = tables();
        assert_eq!(t.incident, "ush_incident");
        assert_eq!(t.incident_category, "ush_incident_category");
        assert_eq!(t.category, "ush_category");
        assert_eq!(t.media, "ush_media");
        assert_eq!(Tables::new("").unwrap().incident, "incident");
    }

    #[test]
    fn unsafe_prefixes_are_rejected() {
        for prefix in ["x;", "a b", "t.", "x'--"] {
            assert!(matches!(
                Tables::new(prefix),
                Err(DbError::InvalidTablePrefix { .. })
            ));
        }
    }

    #[test]
    fn default_plan_filters_on_approved_only() {
        let q = bucket_counts_query(&Plan::default(), &tables());
        assert_eq!(
            q.sql,
            "SELECT EXTRACT(EPOCH FROM date_trunc('month', i.incident_date))::bigint AS bucket_start, \
             COUNT(*) AS number FROM ush_incident i WHERE i.incident_active IN ($1) \
             GROUP BY 1 ORDER BY 1"
        );
        assert!(matches!(q.params.as_slice(), [DatabaseValue::Int32(1)]));
    }

    #[test]
    fn placeholders_follow_filter_order() {
        let media: BTreeSet<i32> = [1, 5].into_iter().collect();
        let p = plan(
            BucketUnit::Day,
            Some(at("2024-01-01 00:00:00")),
            Some(at("2024-01-31 00:00:00")),
            ActiveSelector::All,
            Some(media),
        );
        let q = bucket_counts_query(&p, &tables());
        assert!(q.sql.contains("i.incident_active IN ($1, $2)"));
        assert!(q.sql.contains("i.incident_date >= $3"));
        assert!(q.sql.contains("i.incident_date <= $4"));
        assert!(q.sql.contains(
            "EXISTS (SELECT 1 FROM ush_media m WHERE m.incident_id = i.id AND m.media_type IN ($5, $6))"
        ));
        assert!(q.sql.contains("date_trunc('day', i.incident_date)"));
        assert!(matches!(
            q.params.as_slice(),
            [
                DatabaseValue::Int32(0),
                DatabaseValue::Int32(1),
                DatabaseValue::DateTime(_),
                DatabaseValue::DateTime(_),
                DatabaseValue::Int32(1),
                DatabaseValue::Int32(5),
            ]
        ));
    }

    #[test]
    fn category_query_joins_and_shares_the_filter() {
        let media: BTreeSet<i32> = [2].into_iter().collect();
        let p = plan(
            BucketUnit::Week,
            None,
            None,
            ActiveSelector::Unapproved,
            Some(media),
        );
        let plain = bucket_counts_query(&p, &tables());
        let by_category = category_bucket_counts_query(&p, &tables());

        assert!(by_category
            .sql
            .contains("JOIN ush_incident_category ic ON ic.incident_id = i.id"));
        assert!(by_category.sql.contains("JOIN ush_category c ON ic.category_id = c.id"));
        assert!(by_category
            .sql
            .contains("GROUP BY 1, c.id, c.category_title, c.category_color"));
        assert!(by_category.sql.contains(bucket_expr(BucketUnit::Week)));
        assert!(by_category.sql.contains("COUNT(DISTINCT i.id) AS number"));
        assert!(!by_category.sql.contains("COUNT(*)"));

        let where_of = |sql: &str| sql[sql.find(" WHERE ").unwrap()..sql.find(" GROUP BY").unwrap()].to_string();
        assert_eq!(where_of(&plain.sql), where_of(&by_category.sql));
        assert_eq!(plain.params.len(), by_category.params.len());
    }

    #[test]
    fn hour_and_week_buckets() {
        assert_eq!(bucket_expr(BucketUnit::Hour), "date_trunc('hour', i.incident_date)");
        assert!(bucket_expr(BucketUnit::Week).contains("EXTRACT(DOW FROM i.incident_date)"));
    }

    #[test]
    fn report_queries_bind_flags() {
        let t = tables();
        let total = total_reports_query(&t, false);
        assert_eq!(total.sql, "SELECT COUNT(*) AS total FROM ush_incident i");
        assert!(total.params.is_empty());

        let approved = total_reports_query(&t, true);
        assert!(approved.sql.ends_with("WHERE i.incident_active = $1"));

        let verified = verified_reports_query(&t, false);
        assert!(matches!(
            verified.params.as_slice(),
            [DatabaseValue::Int32(0), DatabaseValue::Int32(1)]
        ));

        let oldest = oldest_report_query(&t, false);
        assert!(matches!(oldest.params.as_slice(), [DatabaseValue::Int32(0)]));

        let categories = visible_categories_query(&t);
        assert!(categories.sql.contains("FROM ush_category c WHERE c.category_visible = $1"));
    }

    #[test]
    fn daily_query_only_filters_with_since() {
        let t = tables();
        let all = daily_counts_query(&t, None);
        assert!(!all.sql.contains("WHERE"));
        assert!(all.params.is_empty());

        let recent = daily_counts_query(&t, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert!(recent.sql.contains("WHERE i.incident_date >= $1"));
        assert!(matches!(
            recent.params.as_slice(),
            [DatabaseValue::DateTime(d)] if *d == at("2024-01-03 00:00:00")
        ));
    }
}
