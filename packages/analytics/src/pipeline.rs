//! End-to-end study run: filter, classify, aggregate.

use bridge_accidents_accident_models::{AccidentRecord, ClassifiedRecord, ConstructionWindow};
use bridge_accidents_analytics_models::StudyReport;
use bridge_accidents_spatial::Corridor;
use chrono::NaiveDate;

use crate::AnalyticsError;
use crate::aggregate::{aggregate, compare_rates, quarterly_counts};
use crate::classify::classify_all;
use crate::filter::filter_records;

/// Output of [`run_study`].
#[derive(Debug, Clone, PartialEq)]
pub struct StudyRun {
    /// In-scope records in date order, labeled.
    pub classified: Vec<ClassifiedRecord>,
    /// Aggregated results.
    pub report: StudyReport,
}

/// Runs the full analysis over `records`.
///
/// Records outside `corridor` or inside `window` are dropped; the rest are
/// split at `split` and aggregated.
///
/// # Errors
///
/// * [`AnalyticsError::EmptyGroup`] if either state ends up with no records
/// * [`AnalyticsError::DegenerateSpan`] if a state's records share one date
pub fn run_study(
    study_id: &str,
    records: &[AccidentRecord],
    corridor: &Corridor,
    window: &ConstructionWindow,
    split: NaiveDate,
) -> Result<StudyRun, AnalyticsError> {
    let kept = filter_records(records, corridor, window);
    let classified = classify_all(&kept, split);
    let aggregates = aggregate(&classified)?;
    let comparison = compare_rates(&aggregates.rows)?;
    let quarters = quarterly_counts(&classified);

    log::info!(
        "Study '{study_id}': before {:.4}/day, after {:.4}/day (x{:.2})",
        comparison.before_rate,
        comparison.after_rate,
        comparison.ratio
    );

    let report = StudyReport {
        study_id: study_id.to_string(),
        record_count: classified.len() as u64,
        rows: aggregates.rows,
        severities: aggregates.severities,
        quarters,
        comparison,
    };

    Ok(StudyRun { classified, report })
}

/// Serializes a report as pretty-printed JSON.
///
/// # Errors
///
/// * [`AnalyticsError::Json`] if serialization fails
pub fn report_json(report: &StudyReport) -> Result<String, AnalyticsError> {
    Ok(serde_json::to_string_pretty(report)?)
}
