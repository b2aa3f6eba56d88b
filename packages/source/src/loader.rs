//! Cached CSV loader.
//!
//! Reads the merged `date,latitude,longitude,severity` CSV produced by
//! [`crate::cache::build_cache`]. Files written by earlier tooling with
//! `lat`/`lon`/`sev` headers and an extra index column are accepted too.

use std::io::Read;
use std::path::Path;

use bridge_accidents_accident_models::AccidentRecord;
use serde::Deserialize;

use crate::SourceError;
use crate::parsing::parse_record;

/// Header names the loader accepts for each required column.
const COLUMNS: &[(&str, &[&str])] = &[
    ("date", &["date"]),
    ("latitude", &["latitude", "lat"]),
    ("longitude", &["longitude", "lon", "lng"]),
    ("severity", &["severity", "sev"]),
];

/// A raw cached row. Every field is kept as text so bad cells drop the row
/// (or, for severity, just the code) instead of failing the whole file.
#[derive(Debug, Deserialize)]
struct CachedRow {
    #[serde(default)]
    date: String,
    #[serde(default, alias = "lat")]
    latitude: String,
    #[serde(default, alias = "lon", alias = "lng")]
    longitude: String,
    #[serde(default, alias = "sev")]
    severity: String,
}

impl CachedRow {
    fn to_record(&self) -> Option<AccidentRecord> {
        parse_record(&self.date, &self.latitude, &self.longitude, &self.severity)
    }
}

/// Records read from a cached CSV, with bookkeeping for dropped rows.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    /// Successfully parsed records, in file order.
    pub records: Vec<AccidentRecord>,
    /// Number of data rows encountered.
    pub rows_read: u64,
    /// Rows dropped for unusable dates or coordinates.
    pub dropped: u64,
}

/// Loads accident records from a cached CSV file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be opened, the header is
/// missing a required column, or the CSV itself is malformed.
pub fn load_records(path: &Path) -> Result<LoadedRecords, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| SourceError::io(path, e))?;
    let loaded = read_records(file, path)?;

    log::info!(
        "Loaded {} records from {} ({} of {} rows dropped)",
        loaded.records.len(),
        path.display(),
        loaded.dropped,
        loaded.rows_read
    );

    Ok(loaded)
}

/// Reads accident records from any CSV source. `path` is used for error
/// messages only.
///
/// # Errors
///
/// Returns [`SourceError`] if the header is missing a required column or
/// the CSV is malformed.
pub fn read_records(reader: impl Read, path: &Path) -> Result<LoadedRecords, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| SourceError::csv(path, e))?
        .clone();
    for &(column, names) in COLUMNS {
        if !headers.iter().any(|h| names.contains(&h)) {
            return Err(SourceError::MissingColumn {
                path: path.display().to_string(),
                column,
            });
        }
    }

    let mut loaded = LoadedRecords::default();
    for result in csv_reader.deserialize::<CachedRow>() {
        loaded.rows_read += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed row: {e}");
                loaded.dropped += 1;
                continue;
            }
        };

        if let Some(record) = row.to_record() {
            loaded.records.push(record);
        } else {
            log::trace!("  dropping unusable row: {row:?}");
            loaded.dropped += 1;
        }
    }

    log::debug!(
        "Read {} rows from {}, dropped {}",
        loaded.rows_read,
        path.display(),
        loaded.dropped
    );

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use bridge_accidents_accident_models::SeverityCode;

    use super::*;

    fn read(csv: &str) -> Result<LoadedRecords, SourceError> {
        read_records(csv.as_bytes(), Path::new("test.csv"))
    }

    #[test]
    fn reads_cached_rows() {
        let loaded = read(
            "date,latitude,longitude,severity\n\
             2007-01-28,44.9400,-93.0760,2\n\
             2018-12-26,44.9520,-93.0820,4\n",
        )
        .unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.rows_read, 2);
        assert_eq!(loaded.dropped, 0);
        assert_eq!(loaded.records[1].date.to_string(), "2018-12-26");
    }

    #[test]
    fn drops_placeholder_and_zero_coordinates() {
        let loaded = read(
            "date,latitude,longitude,severity\n\
             2007-01-28,44.9400,.,2\n\
             2007-02-01,0,0,2\n\
             2007-02-02,abc,-93.07,2\n\
             2007-02-03,44.9400,-93.0760,1\n",
        )
        .unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.dropped, 3);
    }

    #[test]
    fn keeps_rows_with_blank_or_unreadable_severity() {
        let loaded = read(
            "date,latitude,longitude,severity\n\
             2007-01-28,44.94,-93.07,\n\
             2007-01-29,44.94,-93.07,2\n\
             2007-01-30,44.94,-93.07,n/a\n",
        )
        .unwrap();
        assert_eq!(loaded.rows_read, 3);
        assert_eq!(loaded.dropped, 0);
        let severities: Vec<_> = loaded.records.iter().map(|r| r.severity).collect();
        assert_eq!(severities, [None, Some(SeverityCode(2)), None]);
    }

    #[test]
    fn accepts_short_headers_and_index_column() {
        let loaded = read(
            "index,date,lat,lon,sev\n\
             0,2010-12-28 00:00:00,44.94,-93.07,3\n",
        )
        .unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].date.to_string(), "2010-12-28");
    }

    #[test]
    fn drops_short_rows() {
        let loaded = read(
            "date,latitude,longitude,severity\n\
             2007-01-28,44.94\n\
             2007-01-29,44.94,-93.07,2\n",
        )
        .unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.dropped, 1);
    }

    #[test]
    fn rejects_missing_column() {
        let err = read("date,latitude,severity\n2007-01-28,44.94,2\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::MissingColumn {
                column: "longitude",
                ..
            }
        ));
    }

    #[test]
    fn loads_from_disk() {
        let tmp = std::env::temp_dir().join("bridge_accidents_loader_test");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();

        let path = tmp.join("cached.csv");
        std::fs::write(
            &path,
            "date,latitude,longitude,severity\n2016-04-03,44.95,-93.08,2\n",
        )
        .unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded.records.len(), 1);

        assert!(load_records(&tmp.join("missing.csv")).is_err());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
