#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Before/after analysis of accidents on a bridge corridor.
//!
//! The analysis is a filter-map-reduce pipeline:
//!
//! 1. [`filter`] keeps records that are outside the construction window and
//!    inside the bridge corridor.
//! 2. [`classify`] labels each survivor `before`/`after` and buckets it by
//!    year-quarter.
//! 3. [`aggregate`] reduces the labeled records to counts, date spans,
//!    daily rates, and severity shares.
//!
//! [`pipeline::run_study`] chains the three stages.

pub mod aggregate;
pub mod classify;
pub mod filter;
pub mod pipeline;

use bridge_accidents_accident_models::ConstructionState;
use chrono::NaiveDate;
use thiserror::Error;

/// A construction state has no records to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no '{state}' records to aggregate; check the corridor and construction window")]
pub struct EmptyGroupError {
    /// The state with no records.
    pub state: ConstructionState,
}

/// Every record in a construction state falls on the same day, so a daily
/// rate is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("all {count} '{state}' records fall on {date}; a daily rate needs at least a one-day span")]
pub struct DegenerateSpanError {
    /// The state with a zero-day span.
    pub state: ConstructionState,
    /// The single date all records share.
    pub date: NaiveDate,
    /// Number of records in the state.
    pub count: u64,
}

/// Errors that can occur during analysis.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A state group is empty.
    #[error(transparent)]
    EmptyGroup(#[from] EmptyGroupError),

    /// A state group spans zero days.
    #[error(transparent)]
    DegenerateSpan(#[from] DegenerateSpanError),

    /// Report serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
