#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident record types shared across the bridge accident toolchain.
//!
//! An [`AccidentRecord`] is the cleaned form of a single row from the public
//! accident spreadsheet. Records are split around a [`ConstructionWindow`]
//! into [`ConstructionState::Before`] and [`ConstructionState::After`] and
//! bucketed by year-quarter via [`PeriodLabel`].

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity code as recorded in the source spreadsheet.
///
/// The data dictionary for these codes is not published alongside the
/// dataset, so the value is carried through as an opaque small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityCode(pub u8);

impl SeverityCode {
    /// Code noted as "serious injury" in the source data.
    pub const SERIOUS_INJURY: Self = Self(2);

    /// Returns the raw numeric code.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for SeverityCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single cleaned accident record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentRecord {
    /// Calendar date the accident occurred.
    pub date: NaiveDate,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Severity code from the source data, `None` when the cell was blank
    /// or not a code. Such records still count toward totals and rates.
    pub severity: Option<SeverityCode>,
}

/// Whether an in-scope record occurred before or after construction.
///
/// Variants are declared in display order, so the derived [`Ord`] sorts
/// `Before` ahead of `After`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConstructionState {
    /// Accident occurred before construction started.
    Before,
    /// Accident occurred after construction finished.
    After,
}

impl ConstructionState {
    /// All states in display order.
    pub const ALL: &[Self] = &[Self::Before, Self::After];

    /// Marker color used by the map renderers.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Before => "blue",
            Self::After => "red",
        }
    }
}

/// Inclusive date range during which the bridge was under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConstructionWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ConstructionWindow {
    /// Creates a window from its first and last construction day.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWindowError`] if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidWindowError> {
        if start > end {
            return Err(InvalidWindowError { start, end });
        }
        Ok(Self { start, end })
    }

    /// First day of construction.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of construction.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns `true` if `date` falls inside the closed construction window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Returns `true` if `date` is strictly before the window or strictly
    /// after it.
    #[must_use]
    pub fn is_in_scope(&self, date: NaiveDate) -> bool {
        date < self.start || date > self.end
    }
}

/// Error returned when a [`ConstructionWindow`] would end before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidWindowError {
    /// The requested start date.
    pub start: NaiveDate,
    /// The requested end date.
    pub end: NaiveDate,
}

impl std::fmt::Display for InvalidWindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid construction window: start {} is after end {}",
            self.start, self.end
        )
    }
}

impl std::error::Error for InvalidWindowError {}

/// Year-quarter bucket used for chart grouping, displayed as `YYYY-Qn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodLabel {
    year: i32,
    quarter: u8,
}

impl PeriodLabel {
    /// Buckets a calendar date into its year-quarter.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let quarter = (date.month0() / 3 + 1) as u8;
        Self {
            year: date.year(),
            quarter,
        }
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Quarter of the year, 1 through 4.
    #[must_use]
    pub const fn quarter(&self) -> u8 {
        self.quarter
    }
}

impl std::fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}

impl FromStr for PeriodLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, quarter) = s
            .split_once("-Q")
            .ok_or_else(|| format!("invalid period label '{s}': expected YYYY-Qn"))?;
        let year = year
            .parse::<i32>()
            .map_err(|e| format!("invalid period year in '{s}': {e}"))?;
        let quarter = quarter
            .parse::<u8>()
            .map_err(|e| format!("invalid period quarter in '{s}': {e}"))?;
        if !(1..=4).contains(&quarter) {
            return Err(format!("invalid period quarter in '{s}': expected 1-4"));
        }
        Ok(Self { year, quarter })
    }
}

impl Serialize for PeriodLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An in-scope accident record labeled with its state and period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedRecord {
    /// The underlying accident.
    #[serde(flatten)]
    pub record: AccidentRecord,
    /// Before/after construction.
    pub state: ConstructionState,
    /// Year-quarter bucket.
    pub period: PeriodLabel,
}
