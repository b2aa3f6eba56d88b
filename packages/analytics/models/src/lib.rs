#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate result types for a before/after bridge study.
//!
//! These are plain data produced in a single batch pass by
//! `bridge_accidents_analytics` and consumed by the renderers and the report
//! writer. Field order and collection order are deterministic so a report
//! serialized twice from the same input is byte-identical.

use bridge_accidents_accident_models::{ConstructionState, PeriodLabel, SeverityCode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Count, date range, and daily rate for one construction state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    /// Before or after construction.
    pub state: ConstructionState,
    /// Number of accidents.
    pub count: u64,
    /// Earliest accident date.
    pub min_date: NaiveDate,
    /// Latest accident date.
    pub max_date: NaiveDate,
    /// Days between the earliest and latest accident.
    pub span_days: i64,
    /// Accidents per day over the span.
    pub rate: f64,
}

/// Share of one severity code within a construction state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityBreakdown {
    /// Before or after construction.
    pub state: ConstructionState,
    /// Severity code.
    pub severity: SeverityCode,
    /// Accidents with this code in this state.
    pub count: u64,
    /// `count` divided by the state's total, in `[0, 1]`.
    pub percent_of_state: f64,
}

/// Accident count for one year-quarter within a construction state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterCount {
    /// Before or after construction.
    pub state: ConstructionState,
    /// Year-quarter bucket.
    pub period: PeriodLabel,
    /// Accidents in the bucket.
    pub count: u64,
}

/// Daily accident rates before and after, and their ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateComparison {
    /// Accidents per day before construction.
    pub before_rate: f64,
    /// Accidents per day after construction.
    pub after_rate: f64,
    /// `after_rate / before_rate`.
    pub ratio: f64,
}

/// Everything a study run produces, ready for rendering or serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyReport {
    /// Identifier of the study configuration.
    pub study_id: String,
    /// Records that passed the corridor and date filters.
    pub record_count: u64,
    /// Per-state totals, Before then After.
    pub rows: Vec<AggregateRow>,
    /// Per-state, per-severity shares.
    pub severities: Vec<SeverityBreakdown>,
    /// Per-state, per-quarter counts for the bar chart.
    pub quarters: Vec<QuarterCount>,
    /// Before/after rate comparison.
    pub comparison: RateComparison,
}

impl StudyReport {
    /// Returns the aggregate row for `state`, if present.
    #[must_use]
    pub fn row(&self, state: ConstructionState) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| r.state == state)
    }
}
