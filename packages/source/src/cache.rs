//! Merges raw spreadsheet sheet exports into the cached CSV.
//!
//! The public dataset is published as a workbook with one sheet per period
//! (e.g. `2007-2015` and `2016-2018`). Each sheet is exported to CSV and the
//! relevant columns are picked out positionally via [`SheetLayout`]. The
//! merged result is written once and reused until a sheet changes, which is
//! tracked with a fingerprint manifest stored beside the cache.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceError;
use crate::parsing::parse_record;

/// Bump when the cache format changes so stale caches are rebuilt.
const MANIFEST_VERSION: u32 = 2;

/// Header row of the cached CSV.
pub const CACHE_HEADER: [&str; 4] = ["date", "latitude", "longitude", "severity"];

/// Zero-based column positions of the fields in a sheet export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Accident date column.
    pub date: usize,
    /// Latitude column.
    pub latitude: usize,
    /// Longitude column.
    pub longitude: usize,
    /// Severity code column.
    pub severity: usize,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            date: 3,
            latitude: 4,
            longitude: 5,
            severity: 8,
        }
    }
}

/// Row counts from a cache build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of sheets merged.
    pub sheets: usize,
    /// Data rows read across all sheets.
    pub rows_read: u64,
    /// Rows written to the cache.
    pub rows_written: u64,
    /// Rows dropped for unusable values.
    pub dropped: u64,
}

/// Outcome of [`ensure_cache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The existing cache matched the sheets and was reused.
    Fresh,
    /// The cache was (re)built.
    Rebuilt(CacheStats),
}

/// Identity of a sheet export at the time the cache was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SheetFingerprint {
    path: String,
    size: u64,
    modified: Option<String>,
}

/// Sidecar file recording what the cache was built from.
#[derive(Debug, Serialize, Deserialize)]
struct CacheManifest {
    version: u32,
    layout: SheetLayout,
    sheets: Vec<SheetFingerprint>,
    built_at: String,
}

/// Merges sheet exports into a single cached CSV at `output`.
///
/// The cache is written to a `.tmp` sibling first and renamed into place so
/// an interrupted build never leaves a truncated cache behind.
///
/// # Errors
///
/// Returns [`SourceError`] if a sheet cannot be read or the cache cannot be
/// written.
pub fn build_cache(
    sheets: &[PathBuf],
    layout: SheetLayout,
    output: &Path,
) -> Result<CacheStats, SourceError> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| SourceError::io(parent, e))?;
    }

    let tmp_path = sibling_path(output, ".tmp");
    let stats = match merge_sheets(sheets, layout, &tmp_path) {
        Ok(stats) => stats,
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&tmp_path)
                && rm.kind() != std::io::ErrorKind::NotFound
            {
                log::warn!("Failed to remove {}: {rm}", tmp_path.display());
            }
            return Err(e);
        }
    };
    std::fs::rename(&tmp_path, output).map_err(|e| SourceError::io(output, e))?;

    log::info!(
        "Cached {} records to {} ({} rows dropped)",
        stats.rows_written,
        output.display(),
        stats.dropped
    );

    Ok(stats)
}

/// Writes the merged rows of every sheet to `tmp_path`.
fn merge_sheets(
    sheets: &[PathBuf],
    layout: SheetLayout,
    tmp_path: &Path,
) -> Result<CacheStats, SourceError> {
    let mut writer = csv::Writer::from_path(tmp_path).map_err(|e| SourceError::csv(tmp_path, e))?;
    writer
        .write_record(CACHE_HEADER)
        .map_err(|e| SourceError::csv(tmp_path, e))?;

    let mut stats = CacheStats {
        sheets: sheets.len(),
        ..CacheStats::default()
    };

    for sheet in sheets {
        log::info!("Merging sheet {}", sheet.display());
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(sheet)
            .map_err(|e| SourceError::csv(sheet, e))?;

        let mut sheet_rows = 0u64;
        for result in reader.records() {
            let row = result.map_err(|e| SourceError::csv(sheet, e))?;
            stats.rows_read += 1;
            sheet_rows += 1;

            let cell = |i: usize| row.get(i).unwrap_or("");
            let Some(record) = parse_record(
                cell(layout.date),
                cell(layout.latitude),
                cell(layout.longitude),
                cell(layout.severity),
            ) else {
                log::trace!("  dropping unusable row {sheet_rows} of {}", sheet.display());
                stats.dropped += 1;
                continue;
            };

            writer
                .write_record([
                    record.date.format("%Y-%m-%d").to_string(),
                    record.latitude.to_string(),
                    record.longitude.to_string(),
                    record.severity.map(|s| s.to_string()).unwrap_or_default(),
                ])
                .map_err(|e| SourceError::csv(tmp_path, e))?;
            stats.rows_written += 1;
        }
        log::debug!("  {sheet_rows} rows in {}", sheet.display());
    }

    writer.flush().map_err(|e| SourceError::io(tmp_path, e))?;
    Ok(stats)
}

/// Rebuilds the cache only when needed.
///
/// A rebuild happens if `force` is set, the cache or its manifest is
/// missing, the manifest version or layout differs, or any sheet's size or
/// modification time changed. With no sheets configured an existing cache
/// is used as-is.
///
/// # Errors
///
/// Returns [`SourceError`] if a sheet cannot be inspected, the build fails,
/// or there is neither a sheet nor an existing cache.
pub fn ensure_cache(
    sheets: &[PathBuf],
    layout: SheetLayout,
    output: &Path,
    force: bool,
) -> Result<CacheStatus, SourceError> {
    if sheets.is_empty() {
        if output.exists() {
            log::info!("No sheets configured, using existing cache {}", output.display());
            return Ok(CacheStatus::Fresh);
        }
        return Err(SourceError::NoSheets(output.display().to_string()));
    }

    let fingerprints = sheets
        .iter()
        .map(|s| fingerprint(s))
        .collect::<Result<Vec<_>, _>>()?;

    let manifest_path = sibling_path(output, ".manifest.json");
    let manifest = load_manifest(&manifest_path);

    if !cache_needs_rebuild(manifest.as_ref(), &fingerprints, layout, output, force) {
        log::info!("Cache {} is up to date", output.display());
        return Ok(CacheStatus::Fresh);
    }

    let stats = build_cache(sheets, layout, output)?;

    save_manifest(
        &manifest_path,
        &CacheManifest {
            version: MANIFEST_VERSION,
            layout,
            sheets: fingerprints,
            built_at: Utc::now().to_rfc3339(),
        },
    )?;

    Ok(CacheStatus::Rebuilt(stats))
}

fn cache_needs_rebuild(
    manifest: Option<&CacheManifest>,
    fingerprints: &[SheetFingerprint],
    layout: SheetLayout,
    output: &Path,
    force: bool,
) -> bool {
    if force {
        return true;
    }

    let Some(m) = manifest else {
        return true;
    };

    if m.version != MANIFEST_VERSION {
        return true;
    }

    if m.layout != layout {
        return true;
    }

    if m.sheets != fingerprints {
        return true;
    }

    !output.exists()
}

fn fingerprint(path: &Path) -> Result<SheetFingerprint, SourceError> {
    let meta = std::fs::metadata(path).map_err(|e| SourceError::io(path, e))?;
    let modified = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());
    Ok(SheetFingerprint {
        path: path.display().to_string(),
        size: meta.len(),
        modified,
    })
}

fn load_manifest(path: &Path) -> Option<CacheManifest> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        log::debug!("No existing cache manifest at {}", path.display());
        return None;
    };
    match serde_json::from_str(&contents) {
        Ok(m) => Some(m),
        Err(e) => {
            log::warn!("Failed to parse cache manifest {}: {e}", path.display());
            None
        }
    }
}

fn save_manifest(path: &Path, manifest: &CacheManifest) -> Result<(), SourceError> {
    let tmp_path = sibling_path(path, ".tmp");
    let contents = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&tmp_path, contents).map_err(|e| SourceError::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| SourceError::io(path, e))?;
    log::debug!("Saved cache manifest to {}", path.display());
    Ok(())
}

/// `path` with `suffix` appended to its file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use bridge_accidents_accident_models::SeverityCode;

    use super::*;
    use crate::loader::load_records;

    const SHEET_2007: &str = "\
id,district,route,date,lat,lon,light,weather,sev
1,A,I-35E,2007-01-28,44.9400,-93.0760,day,clear,2
2,A,I-35E,2007-03-01,44.9401,.,day,clear,3
3,A,I-35E,2007-04-05,0,0,night,snow,1
";

    const SHEET_2016: &str = "\
id,district,route,date,lat,lon,light,weather,sev
1,B,TH-52,2016-04-03 00:00:00,44.9510,-93.0815,day,rain,4.0
";

    fn setup(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("2007-2015.csv"), SHEET_2007).unwrap();
        std::fs::write(tmp.join("2016-2018.csv"), SHEET_2016).unwrap();
        tmp
    }

    fn sheets(tmp: &Path) -> Vec<PathBuf> {
        vec![tmp.join("2007-2015.csv"), tmp.join("2016-2018.csv")]
    }

    #[test]
    fn merges_sheets_and_drops_bad_rows() {
        let tmp = setup("bridge_accidents_cache_merge");
        let output = tmp.join("cache/accidents.csv");

        let stats = build_cache(&sheets(&tmp), SheetLayout::default(), &output).unwrap();
        assert_eq!(stats.sheets, 2);
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.rows_written, 2);
        assert_eq!(stats.dropped, 2);

        let loaded = load_records(&output).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.dropped, 0);
        assert_eq!(loaded.records[1].date.to_string(), "2016-04-03");
        assert_eq!(loaded.records[1].severity, Some(SeverityCode(4)));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn keeps_rows_without_severity() {
        let tmp = setup("bridge_accidents_cache_blank_severity");
        std::fs::write(
            tmp.join("2016-2018.csv"),
            format!("{SHEET_2016}2,B,TH-52,2017-06-01,44.9500,-93.0810,day,clear,\n"),
        )
        .unwrap();
        let output = tmp.join("accidents.csv");

        let stats = build_cache(&sheets(&tmp), SheetLayout::default(), &output).unwrap();
        assert_eq!(stats.rows_written, 3);
        assert_eq!(stats.dropped, 2);

        let loaded = load_records(&output).unwrap();
        assert_eq!(loaded.records.len(), 3);
        assert_eq!(loaded.dropped, 0);
        assert_eq!(loaded.records[2].date.to_string(), "2017-06-01");
        assert_eq!(loaded.records[2].severity, None);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn failed_build_removes_partial_cache() {
        let tmp = setup("bridge_accidents_cache_failed");
        let output = tmp.join("accidents.csv");
        let missing = tmp.join("missing.csv");

        let err = build_cache(
            &[tmp.join("2007-2015.csv"), missing],
            SheetLayout::default(),
            &output,
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Csv { .. }));
        assert!(!sibling_path(&output, ".tmp").exists());
        assert!(!output.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn reuses_fresh_cache() {
        let tmp = setup("bridge_accidents_cache_fresh");
        let output = tmp.join("accidents.csv");
        let layout = SheetLayout::default();

        let first = ensure_cache(&sheets(&tmp), layout, &output, false).unwrap();
        assert!(matches!(first, CacheStatus::Rebuilt(_)));

        let second = ensure_cache(&sheets(&tmp), layout, &output, false).unwrap();
        assert_eq!(second, CacheStatus::Fresh);

        let forced = ensure_cache(&sheets(&tmp), layout, &output, true).unwrap();
        assert!(matches!(forced, CacheStatus::Rebuilt(_)));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rebuilds_when_sheet_changes() {
        let tmp = setup("bridge_accidents_cache_changed");
        let output = tmp.join("accidents.csv");
        let layout = SheetLayout::default();

        ensure_cache(&sheets(&tmp), layout, &output, false).unwrap();

        let extra = format!("{SHEET_2016}2,B,TH-52,2017-06-01,44.9500,-93.0810,day,clear,2\n");
        std::fs::write(tmp.join("2016-2018.csv"), extra).unwrap();

        let status = ensure_cache(&sheets(&tmp), layout, &output, false).unwrap();
        let CacheStatus::Rebuilt(stats) = status else {
            panic!("expected rebuild after sheet change");
        };
        assert_eq!(stats.rows_written, 3);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rebuilds_when_layout_changes() {
        let tmp = setup("bridge_accidents_cache_layout");
        let output = tmp.join("accidents.csv");

        ensure_cache(&sheets(&tmp), SheetLayout::default(), &output, false).unwrap();
        let other = SheetLayout {
            severity: 7,
            ..SheetLayout::default()
        };
        let status = ensure_cache(&sheets(&tmp), other, &output, false).unwrap();
        assert!(matches!(status, CacheStatus::Rebuilt(_)));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn cache_only_study_without_sheets() {
        let tmp = setup("bridge_accidents_cache_only");
        let output = tmp.join("accidents.csv");

        assert!(matches!(
            ensure_cache(&[], SheetLayout::default(), &output, false),
            Err(SourceError::NoSheets(_))
        ));

        std::fs::write(&output, "date,latitude,longitude,severity\n").unwrap();
        assert_eq!(
            ensure_cache(&[], SheetLayout::default(), &output, false).unwrap(),
            CacheStatus::Fresh
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn sibling_paths_append_suffix() {
        let p = sibling_path(Path::new("data/accidents.csv"), ".manifest.json");
        assert_eq!(p, Path::new("data/accidents.csv.manifest.json"));
    }
}
