#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interval bucketing planner and incident series aggregator.
//!
//! A request's raw parameters are turned into a typed [`planner::Plan`]
//! (bucket unit plus record filter). The [`aggregate`] module runs the plan's
//! two grouped counts against any [`source::RecordSource`] and merges them
//! into a [`SeriesCollection`](incident_trends_analytics_models::SeriesCollection).
//! The [`memory`] module provides an in-process record source that applies
//! the same plan directly to incident records.

pub mod aggregate;
pub mod memory;
pub mod planner;
pub mod reports;
pub mod source;

use thiserror::Error;

/// Errors that can occur while planning or aggregating a query.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A caller-supplied parameter could not be interpreted.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of what went wrong.
        message: String,
    },

    /// The record store could not be reached or the query failed.
    #[error("Data source unavailable: {message}")]
    DataSourceUnavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// A result row had an unexpected null or shape.
    #[error("Malformed row: {message}")]
    MalformedRow {
        /// Description of what went wrong.
        message: String,
    },
}

pub use aggregate::aggregate;
pub use planner::{Plan, plan, plan_from_params};
pub use source::{RecordSource, ReportLookup};
