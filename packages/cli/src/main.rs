#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for incident trend queries.
//!
//! Connects to the incident store the same way the server does and prints
//! each result as JSON on stdout.

use clap::{Parser, Subcommand};
use incident_trends_analytics::aggregate::aggregate_params;
use incident_trends_analytics::{ReportLookup as _, reports};
use incident_trends_analytics_models::IntervalParams;
use incident_trends_database::IncidentDb;
use incident_trends_database::db::{DbConfig, strict_interval_from_env};
use incident_trends_server_models::{ApiOldestReport, daily_counts_to_api};

#[derive(Parser)]
#[command(name = "incident_trends_cli", about = "Incident trend queries")]
struct Cli {
    /// Postgres connection URL (overrides `DATABASE_URL`)
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Table name prefix (overrides `TABLE_PREFIX`)
    #[arg(long, global = true)]
    table_prefix: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incident counts per time bucket, overall and per category
    Interval {
        /// Bucket size: hour, day, week or month
        #[arg(long)]
        interval: Option<String>,
        /// Inclusive lower bound (`YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`)
        #[arg(long)]
        start_date: Option<String>,
        /// Inclusive upper bound (`YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`)
        #[arg(long)]
        end_date: Option<String>,
        /// Approval filter: true, false or all
        #[arg(long)]
        active: Option<String>,
        /// Only count incidents with media of this numeric type
        #[arg(long)]
        media_type: Option<String>,
        /// Reject unknown intervals instead of falling back to month
        /// (also enabled by `STRICT_INTERVAL`)
        #[arg(long)]
        strict: bool,
    },
    /// List visible categories
    Categories,
    /// Total, approved, verified and unverified report counts
    Totals,
    /// Reports per day
    Daily {
        /// Number of days back from today; 0 counts all time
        #[arg(long, default_value = "0")]
        range: u32,
    },
    /// Timestamp of the oldest report
    Oldest {
        /// Look at unapproved reports instead of approved ones
        #[arg(long)]
        unapproved: bool,
    },
    /// Timestamps of every approved report
    Dates,
}

impl Cli {
    fn db_config(&self) -> DbConfig {
        let mut config = DbConfig::from_env();
        if let Some(url) = &self.database_url {
            config.url.clone_from(url);
        }
        if let Some(prefix) = &self.table_prefix {
            config.table_prefix.clone_from(prefix);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = cli.db_config();
    let store = IncidentDb::connect(&config).await?;

    match cli.command {
        Commands::Interval {
            interval,
            start_date,
            end_date,
            active,
            media_type,
            strict,
        } => {
            let params = IntervalParams {
                interval,
                start_date,
                end_date,
                active,
                media_type,
            };
            let strict = strict || strict_interval_from_env();
            let collection = aggregate_params(&params, strict, &store).await?;
            log::info!(
                "{} series, {} incidents overall",
                collection.len(),
                collection.all_categories().total()
            );
            println!("{}", collection.to_json()?);
        }
        Commands::Categories => {
            let categories = reports::active_categories(&store).await?;
            println!("{}", serde_json::to_string(&categories)?);
        }
        Commands::Totals => {
            let totals = reports::report_totals(&store).await?;
            println!("{}", serde_json::to_string(&totals)?);
        }
        Commands::Daily { range } => {
            let today = chrono::Utc::now().date_naive();
            let counts = reports::reports_by_date(&store, Some(range), today).await?;
            println!("{}", serde_json::to_string(&daily_counts_to_api(&counts))?);
        }
        Commands::Oldest { unapproved } => {
            let timestamp = reports::oldest_report_timestamp(&store, !unapproved).await?;
            println!("{}", serde_json::to_string(&ApiOldestReport { timestamp })?);
        }
        Commands::Dates => {
            let seconds: Vec<i64> = store
                .approved_incident_dates()
                .await?
                .iter()
                .map(|d| d.and_utc().timestamp())
                .collect();
            println!("{}", serde_json::to_string(&seconds)?);
        }
    }

    Ok(())
}
