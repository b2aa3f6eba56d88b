//! Corridor and construction-window filtering.

use bridge_accidents_accident_models::{AccidentRecord, ConstructionWindow};
use bridge_accidents_spatial::Corridor;

/// Returns `true` if the record is outside the construction window and
/// inside the corridor.
#[must_use]
pub fn is_relevant(record: &AccidentRecord, corridor: &Corridor, window: &ConstructionWindow) -> bool {
    window.is_in_scope(record.date) && corridor.is_within(record.latitude, record.longitude)
}

/// Keeps the relevant records, sorted by date.
///
/// The sort is stable, so records sharing a date keep their input order.
#[must_use]
pub fn filter_records(
    records: &[AccidentRecord],
    corridor: &Corridor,
    window: &ConstructionWindow,
) -> Vec<AccidentRecord> {
    let mut kept: Vec<AccidentRecord> = records
        .iter()
        .filter(|r| is_relevant(r, corridor, window))
        .copied()
        .collect();
    kept.sort_by_key(|r| r.date);

    log::info!(
        "{} of {} records are on the corridor outside construction",
        kept.len(),
        records.len()
    );

    kept
}

#[cfg(test)]
mod tests {
    use bridge_accidents_accident_models::SeverityCode;
    use bridge_accidents_spatial::GeoPoint;
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, lat: f64, lon: f64) -> AccidentRecord {
        AccidentRecord {
            date,
            latitude: lat,
            longitude: lon,
            severity: Some(SeverityCode(1)),
        }
    }

    fn corridor() -> Corridor {
        Corridor::new(
            GeoPoint::new(44.9395, -93.0754),
            GeoPoint::new(44.9525, -93.0824),
            0.0012,
        )
        .unwrap()
    }

    fn window() -> ConstructionWindow {
        ConstructionWindow::new(date(2011, 1, 1), date(2016, 4, 1)).unwrap()
    }

    #[test]
    fn requires_both_date_and_location() {
        let (c, w) = (corridor(), window());
        assert!(is_relevant(&record(date(2010, 12, 31), 44.9460, -93.0789), &c, &w));
        assert!(is_relevant(&record(date(2016, 4, 2), 44.9460, -93.0789), &c, &w));
        assert!(!is_relevant(&record(date(2012, 6, 1), 44.9460, -93.0789), &c, &w));
        assert!(!is_relevant(&record(date(2010, 12, 31), 44.9460, -93.0700), &c, &w));
    }

    #[test]
    fn filters_and_sorts_by_date() {
        let records = [
            record(date(2017, 5, 1), 44.9460, -93.0789),
            record(date(2013, 5, 1), 44.9460, -93.0789),
            record(date(2008, 5, 1), 44.9460, -93.0789),
            record(date(2009, 5, 1), 44.9600, -93.0789),
            record(date(2007, 5, 1), 44.9460, -93.0789),
        ];
        let kept = filter_records(&records, &corridor(), &window());
        let dates: Vec<String> = kept.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, ["2007-05-01", "2008-05-01", "2017-05-01"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(filter_records(&[], &corridor(), &window()).is_empty());
    }
}
