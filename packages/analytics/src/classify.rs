//! Before/after labeling and year-quarter binning.

use bridge_accidents_accident_models::{
    AccidentRecord, ClassifiedRecord, ConstructionState, PeriodLabel,
};
use chrono::NaiveDate;

/// `Before` if `date` is strictly earlier than `split`, otherwise `After`.
#[must_use]
pub fn state_for(date: NaiveDate, split: NaiveDate) -> ConstructionState {
    if date < split {
        ConstructionState::Before
    } else {
        ConstructionState::After
    }
}

/// Labels a record with its state and year-quarter.
#[must_use]
pub fn classify(record: &AccidentRecord, split: NaiveDate) -> ClassifiedRecord {
    ClassifiedRecord {
        record: *record,
        state: state_for(record.date, split),
        period: PeriodLabel::from_date(record.date),
    }
}

/// Labels every record, preserving input order.
#[must_use]
pub fn classify_all(records: &[AccidentRecord], split: NaiveDate) -> Vec<ClassifiedRecord> {
    records.iter().map(|r| classify(r, split)).collect()
}
