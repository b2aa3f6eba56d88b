//! Plain-text rendering of a [`StudyReport`] for the terminal.

use std::fmt::Write as _;

use bridge_accidents_accident_models::ConstructionState;
use bridge_accidents_analytics_models::StudyReport;
use bridge_accidents_study::definition::Labels;

/// Formats the per-state aggregates, the rate comparison, and the severity
/// mix as aligned text tables.
#[must_use]
pub fn format_report(report: &StudyReport, labels: &Labels) -> String {
    let mut out = String::new();
    let label_width = ConstructionState::ALL
        .iter()
        .map(|&s| labels.for_state(s).len())
        .max()
        .unwrap_or(0)
        .max("state".len());

    let _ = writeln!(out, "Study: {} ({} records)", report.study_id, report.record_count);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<label_width$}  {:>6}  {:<10}  {:<10}  {:>6}  {:>8}",
        "state", "count", "first", "last", "days", "per day"
    );
    for row in &report.rows {
        let _ = writeln!(
            out,
            "{:<label_width$}  {:>6}  {:<10}  {:<10}  {:>6}  {:>8.4}",
            labels.for_state(row.state),
            row.count,
            row.min_date,
            row.max_date,
            row.span_days,
            row.rate
        );
    }

    let c = &report.comparison;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} / {}: {:.4} / {:.4} = x{:.2}",
        labels.after, labels.before, c.after_rate, c.before_rate, c.ratio
    );

    if !report.severities.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<label_width$}  {:>8}  {:>6}  {:>7}",
            "state", "severity", "count", "share"
        );
        for s in &report.severities {
            let _ = writeln!(
                out,
                "{:<label_width$}  {:>8}  {:>6}  {:>6.1}%",
                labels.for_state(s.state),
                s.severity,
                s.count,
                s.percent_of_state * 100.0
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use bridge_accidents_accident_models::SeverityCode;
    use bridge_accidents_analytics_models::{AggregateRow, RateComparison, SeverityBreakdown};
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report() -> StudyReport {
        StudyReport {
            study_id: "lafayette_bridge".to_string(),
            record_count: 596,
            rows: vec![
                AggregateRow {
                    state: ConstructionState::Before,
                    count: 205,
                    min_date: date(2007, 1, 28),
                    max_date: date(2010, 12, 28),
                    span_days: 1430,
                    rate: 205.0 / 1430.0,
                },
                AggregateRow {
                    state: ConstructionState::After,
                    count: 391,
                    min_date: date(2016, 4, 3),
                    max_date: date(2018, 12, 26),
                    span_days: 997,
                    rate: 391.0 / 997.0,
                },
            ],
            severities: vec![SeverityBreakdown {
                state: ConstructionState::Before,
                severity: SeverityCode(2),
                count: 41,
                percent_of_state: 0.2,
            }],
            quarters: Vec::new(),
            comparison: RateComparison {
                before_rate: 205.0 / 1430.0,
                after_rate: 391.0 / 997.0,
                ratio: (391.0 / 997.0) / (205.0 / 1430.0),
            },
        }
    }

    #[test]
    fn includes_rows_and_ratio() {
        let labels = Labels {
            before: "old bridge".to_string(),
            after: "new bridge".to_string(),
        };
        let text = format_report(&report(), &labels);

        assert!(text.starts_with("Study: lafayette_bridge (596 records)"));
        assert!(text.contains("old bridge     205  2007-01-28  2010-12-28    1430    0.1434"));
        assert!(text.contains("new bridge     391  2016-04-03  2018-12-26     997    0.3922"));
        assert!(text.contains("new bridge / old bridge: 0.3922 / 0.1434 = x2.74"));
        assert!(text.contains("20.0%"));
    }

    #[test]
    fn omits_empty_severity_table() {
        let mut r = report();
        r.severities.clear();
        let text = format_report(&r, &Labels::default());
        assert!(!text.contains("severity"));
    }
}
