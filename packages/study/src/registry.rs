//! Study registry: loads the study definitions embedded at compile time.
//!
//! Each `.toml` file in `packages/study/studies/` is baked into the binary
//! via [`include_str!`]. Adding a study means adding a TOML file and an entry
//! to the list below.

use crate::StudyError;
use crate::definition::{StudyDefinition, parse_study_toml};

/// TOML configs embedded at compile time.
const STUDY_TOMLS: &[(&str, &str)] = &[(
    "lafayette_bridge",
    include_str!("../studies/lafayette_bridge.toml"),
)];

/// Id of the study used when none is selected.
pub const DEFAULT_STUDY_ID: &str = "lafayette_bridge";

/// Total number of embedded studies (used in tests).
#[cfg(test)]
const EXPECTED_STUDY_COUNT: usize = 1;

/// Returns all embedded study definitions.
///
/// # Panics
///
/// Panics if an embedded TOML is malformed. The configs are compiled in, so
/// this is caught by the tests below.
#[must_use]
pub fn all_studies() -> Vec<StudyDefinition> {
    STUDY_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_study_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Returns the embedded study with the given id.
#[must_use]
pub fn find_study(id: &str) -> Option<StudyDefinition> {
    all_studies().into_iter().find(|s| s.id == id)
}

/// Returns the embedded study with the given id, validated.
///
/// # Errors
///
/// * [`StudyError::UnknownStudy`] if no embedded study has that id
/// * any validation error
pub fn embedded_study(id: &str) -> Result<StudyDefinition, StudyError> {
    checked(id, find_study(id))
}

/// Returns the default embedded study, validated.
///
/// # Errors
///
/// * [`StudyError::UnknownStudy`] if the default id is not embedded
/// * any validation error
pub fn default_study() -> Result<StudyDefinition, StudyError> {
    embedded_study(DEFAULT_STUDY_ID)
}

fn checked(id: &str, study: Option<StudyDefinition>) -> Result<StudyDefinition, StudyError> {
    let study = study.ok_or_else(|| StudyError::UnknownStudy(id.to_string()))?;
    study.validate()?;
    Ok(study)
}

#[cfg(test)]
mod tests {
    use bridge_accidents_accident_models::ConstructionState;
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn loads_all_studies() {
        let studies = all_studies();
        assert_eq!(studies.len(), EXPECTED_STUDY_COUNT);
        for study in &studies {
            study.validate().unwrap();
        }
    }

    #[test]
    fn study_ids_are_unique_and_match_file_names() {
        let studies = all_studies();
        let mut ids: Vec<&str> = studies.iter().map(|s| s.id.as_str()).collect();
        for ((name, _), id) in STUDY_TOMLS.iter().zip(&ids) {
            assert_eq!(name, id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), EXPECTED_STUDY_COUNT);
    }

    #[test]
    fn lafayette_bridge_constants() {
        let study = default_study().unwrap();
        assert_eq!(study.source.sheets.len(), 2);
        assert_eq!(study.source.layout.severity, 8);

        let corridor = study.corridor().unwrap();
        assert!((corridor.width() - 0.0011).abs() < 1e-9);
        assert!(corridor.is_within(44.9460, -93.0789));
        assert!(!corridor.is_within(44.9460, -93.0700));

        let window = study.window().unwrap();
        assert!(window.is_in_scope(date(2010, 12, 31)));
        assert!(!window.is_in_scope(date(2011, 1, 1)));
        assert!(!window.is_in_scope(date(2016, 4, 1)));
        assert!(window.is_in_scope(date(2016, 4, 2)));
        assert_eq!(study.split_date(), date(2011, 1, 1));

        assert_eq!(study.labels.for_state(ConstructionState::Before), "old bridge");
        assert_eq!(study.labels.for_state(ConstructionState::After), "new bridge");
        assert!(study.map.bounds.is_some());
        assert_eq!(study.animation.window_height, 625);
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(find_study("golden_gate").is_none());
        assert!(matches!(
            embedded_study("golden_gate"),
            Err(StudyError::UnknownStudy(_))
        ));
    }

    #[test]
    fn embedded_lookup_rejects_invalid_definition() {
        let mut study = find_study(DEFAULT_STUDY_ID).unwrap();
        study.construction.split = Some(date(2017, 6, 1));
        match checked(DEFAULT_STUDY_ID, Some(study)) {
            Err(StudyError::Invalid { field, .. }) => assert_eq!(field, "construction.split"),
            other => panic!("expected invalid split, got {other:?}"),
        }
        assert_eq!(embedded_study(DEFAULT_STUDY_ID).unwrap().id, DEFAULT_STUDY_ID);
    }
}
