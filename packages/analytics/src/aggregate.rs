//! Per-state totals, daily rates, severity shares, and quarterly counts.

use std::collections::BTreeMap;

use bridge_accidents_accident_models::{
    ClassifiedRecord, ConstructionState, PeriodLabel, SeverityCode,
};
use bridge_accidents_analytics_models::{
    AggregateRow, QuarterCount, RateComparison, SeverityBreakdown,
};
use chrono::NaiveDate;

use crate::{AnalyticsError, DegenerateSpanError, EmptyGroupError};

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    /// One row per state, Before then After.
    pub rows: Vec<AggregateRow>,
    /// Severity shares, ordered by state then severity code.
    pub severities: Vec<SeverityBreakdown>,
}

struct Group {
    count: u64,
    min: NaiveDate,
    max: NaiveDate,
}

/// Reduces classified records to per-state totals and severity shares.
///
/// Records without a severity code count toward the totals but are left
/// out of the severity shares, whose denominator is the number of coded
/// records in the state.
///
/// # Errors
///
/// * [`AnalyticsError::EmptyGroup`] if either state has no records
/// * [`AnalyticsError::DegenerateSpan`] if every record in a state falls
///   on the same day
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(classified: &[ClassifiedRecord]) -> Result<Aggregates, AnalyticsError> {
    let mut groups: BTreeMap<ConstructionState, Group> = BTreeMap::new();
    let mut by_severity: BTreeMap<(ConstructionState, SeverityCode), u64> = BTreeMap::new();
    let mut coded: BTreeMap<ConstructionState, u64> = BTreeMap::new();

    for c in classified {
        let date = c.record.date;
        groups
            .entry(c.state)
            .and_modify(|g| {
                g.count += 1;
                g.min = g.min.min(date);
                g.max = g.max.max(date);
            })
            .or_insert(Group {
                count: 1,
                min: date,
                max: date,
            });
        if let Some(severity) = c.record.severity {
            *by_severity.entry((c.state, severity)).or_default() += 1;
            *coded.entry(c.state).or_default() += 1;
        }
    }

    let mut rows = Vec::with_capacity(ConstructionState::ALL.len());
    for &state in ConstructionState::ALL {
        let group = groups.get(&state).ok_or(EmptyGroupError { state })?;
        let span_days = (group.max - group.min).num_days();
        if span_days == 0 {
            return Err(DegenerateSpanError {
                state,
                date: group.min,
                count: group.count,
            }
            .into());
        }

        let rate = group.count as f64 / span_days as f64;
        log::debug!(
            "{state}: {} accidents from {} to {} ({span_days} days, {rate:.4}/day)",
            group.count,
            group.min,
            group.max
        );

        rows.push(AggregateRow {
            state,
            count: group.count,
            min_date: group.min,
            max_date: group.max,
            span_days,
            rate,
        });
    }

    let severities = by_severity
        .into_iter()
        .map(|((state, severity), count)| {
            let total = coded.get(&state).copied().unwrap_or(1);
            SeverityBreakdown {
                state,
                severity,
                count,
                percent_of_state: count as f64 / total as f64,
            }
        })
        .collect();

    Ok(Aggregates { rows, severities })
}

/// Counts records per state and year-quarter, ordered by state then period.
///
/// Quarters with no accidents are omitted.
#[must_use]
pub fn quarterly_counts(classified: &[ClassifiedRecord]) -> Vec<QuarterCount> {
    let mut counts: BTreeMap<(ConstructionState, PeriodLabel), u64> = BTreeMap::new();
    for c in classified {
        *counts.entry((c.state, c.period)).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((state, period), count)| QuarterCount {
            state,
            period,
            count,
        })
        .collect()
}

/// Compares the after rate against the before rate.
///
/// # Errors
///
/// * [`AnalyticsError::EmptyGroup`] if `rows` lacks either state
pub fn compare_rates(rows: &[AggregateRow]) -> Result<RateComparison, AnalyticsError> {
    let rate_of = |state: ConstructionState| {
        rows.iter()
            .find(|r| r.state == state)
            .map(|r| r.rate)
            .ok_or(EmptyGroupError { state })
    };
    let before_rate = rate_of(ConstructionState::Before)?;
    let after_rate = rate_of(ConstructionState::After)?;

    Ok(RateComparison {
        before_rate,
        after_rate,
        ratio: after_rate / before_rate,
    })
}

#[cfg(test)]
mod tests {
    use bridge_accidents_accident_models::AccidentRecord;

    use super::*;
    use crate::classify::classify_all;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn split() -> NaiveDate {
        date(2011, 1, 1)
    }

    /// `count` records evenly spread from `first` to `last` inclusive.
    fn spread(first: NaiveDate, last: NaiveDate, count: u64) -> Vec<AccidentRecord> {
        let span = u64::try_from((last - first).num_days()).unwrap();
        (0..count)
            .map(|i| AccidentRecord {
                date: first + chrono::Days::new(span * i / (count - 1)),
                latitude: 44.946,
                longitude: -93.0789,
                severity: Some(SeverityCode(u8::try_from(i % 5).unwrap())),
            })
            .collect()
    }

    fn scenario() -> Vec<ClassifiedRecord> {
        let mut records = spread(date(2007, 1, 28), date(2010, 12, 28), 205);
        records.extend(spread(date(2016, 4, 3), date(2018, 12, 26), 391));
        classify_all(&records, split())
    }

    #[test]
    fn computes_scenario_rates() {
        let agg = aggregate(&scenario()).unwrap();
        let before = &agg.rows[0];
        let after = &agg.rows[1];

        assert_eq!(before.state, ConstructionState::Before);
        assert_eq!(before.count, 205);
        assert_eq!(before.span_days, 1430);
        assert!((before.rate - 0.1434).abs() < 1e-4);

        assert_eq!(after.state, ConstructionState::After);
        assert_eq!(after.count, 391);
        assert_eq!(after.span_days, 997);
        assert!((after.rate - 0.3922).abs() < 1e-4);

        let cmp = compare_rates(&agg.rows).unwrap();
        assert!((cmp.ratio - 2.74).abs() < 0.01);
    }

    #[test]
    fn severity_shares_sum_to_one() {
        let agg = aggregate(&scenario()).unwrap();
        for &state in ConstructionState::ALL {
            let total: f64 = agg
                .severities
                .iter()
                .filter(|s| s.state == state)
                .map(|s| s.percent_of_state)
                .sum();
            assert!((total - 1.0).abs() < 1e-9, "{state}: {total}");
        }
    }

    #[test]
    fn severity_order_is_state_then_code() {
        let agg = aggregate(&scenario()).unwrap();
        let keys: Vec<(ConstructionState, u8)> = agg
            .severities
            .iter()
            .map(|s| (s.state, s.severity.value()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 10);
    }

    #[test]
    fn uncoded_records_count_but_skip_severity_shares() {
        let mut records = scenario();
        for c in records.iter_mut().step_by(7) {
            c.record.severity = None;
        }
        let agg = aggregate(&records).unwrap();

        assert_eq!(agg.rows[0].count, 205);
        assert_eq!(agg.rows[1].count, 391);

        for &state in ConstructionState::ALL {
            let shares: Vec<_> = agg.severities.iter().filter(|s| s.state == state).collect();
            let coded: u64 = shares.iter().map(|s| s.count).sum();
            let uncoded = u64::try_from(
                records
                    .iter()
                    .filter(|c| c.state == state && c.record.severity.is_none())
                    .count(),
            )
            .unwrap();
            assert!(uncoded > 0);
            assert_eq!(coded + uncoded, agg.rows.iter().find(|r| r.state == state).unwrap().count);

            let total: f64 = shares.iter().map(|s| s.percent_of_state).sum();
            assert!((total - 1.0).abs() < 1e-9, "{state}: {total}");
        }
    }

    #[test]
    fn empty_after_group_is_an_error() {
        let records = spread(date(2007, 1, 28), date(2010, 12, 28), 10);
        let err = aggregate(&classify_all(&records, split())).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::EmptyGroup(EmptyGroupError {
                state: ConstructionState::After
            })
        ));
    }

    #[test]
    fn no_records_reports_before_first() {
        let err = aggregate(&[]).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::EmptyGroup(EmptyGroupError {
                state: ConstructionState::Before
            })
        ));
    }

    #[test]
    fn single_day_group_is_degenerate() {
        let mut records = spread(date(2007, 1, 28), date(2010, 12, 28), 10);
        let lone = AccidentRecord {
            date: date(2017, 3, 3),
            latitude: 44.946,
            longitude: -93.0789,
            severity: Some(SeverityCode(1)),
        };
        records.push(lone);
        records.push(lone);

        let err = aggregate(&classify_all(&records, split())).unwrap_err();
        match err {
            AnalyticsError::DegenerateSpan(e) => {
                assert_eq!(e.state, ConstructionState::After);
                assert_eq!(e.date, date(2017, 3, 3));
                assert_eq!(e.count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn quarterly_counts_cover_every_record() {
        let classified = scenario();
        let quarters = quarterly_counts(&classified);
        let total: u64 = quarters.iter().map(|q| q.count).sum();
        assert_eq!(total, 596);

        let first = &quarters[0];
        assert_eq!(first.state, ConstructionState::Before);
        assert_eq!(first.period.to_string(), "2007-Q1");

        let last = quarters.last().unwrap();
        assert_eq!(last.state, ConstructionState::After);
        assert_eq!(last.period.to_string(), "2018-Q4");
    }

    #[test]
    fn compare_rates_requires_both_rows() {
        let agg = aggregate(&scenario()).unwrap();
        let err = compare_rates(&agg.rows[..1]).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::EmptyGroup(EmptyGroupError {
                state: ConstructionState::After
            })
        ));
    }
}
