#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Corridor geometry for selecting accidents on a bridge.
//!
//! A [`Corridor`] is the strip between two bridge endpoints, widened by a
//! fixed lateral width. For any latitude between the endpoints, the bridge
//! centerline longitude is linearly interpolated and a point is inside when
//! its longitude lies strictly within half the width of that centerline.
//!
//! This is a latitude-parameterized approximation of the bridge footprint,
//! not a rotated rectangle or a geodesic buffer.

use geo::{BoundingRect, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair as written in study configs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// WGS84 latitude.
    pub lat: f64,
    /// WGS84 longitude.
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a point from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    const fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Self::new(p.lon, p.lat)
    }
}

/// Errors from building corridor geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CorridorError {
    /// Both endpoints share a latitude, so the corridor has no extent.
    #[error("corridor endpoints share latitude {lat}; the corridor must span a latitude range")]
    DegenerateLatitude {
        /// The shared latitude.
        lat: f64,
    },

    /// An endpoint coordinate is NaN or infinite.
    #[error("corridor endpoint ({lat}, {lon}) is not finite")]
    NonFiniteEndpoint {
        /// Endpoint latitude.
        lat: f64,
        /// Endpoint longitude.
        lon: f64,
    },

    /// Width is negative, NaN, or infinite.
    #[error("invalid corridor width {0}: expected a finite, non-negative value")]
    InvalidWidth(f64),

    /// Calibration buffer factor is not a positive finite number.
    #[error("invalid width buffer factor {0}: expected a finite, positive value")]
    InvalidBufferFactor(f64),
}

/// The strip of road around a bridge within which accidents are counted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    a: GeoPoint,
    b: GeoPoint,
    width: f64,
    half_width: f64,
}

impl Corridor {
    /// Builds a corridor between two bridge endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError`] if the endpoints share a latitude, if any
    /// coordinate is not finite, or if `width` is negative or not finite.
    #[allow(clippy::float_cmp)]
    pub fn new(a: GeoPoint, b: GeoPoint, width: f64) -> Result<Self, CorridorError> {
        for p in [a, b] {
            if !p.is_finite() {
                return Err(CorridorError::NonFiniteEndpoint {
                    lat: p.lat,
                    lon: p.lon,
                });
            }
        }

        if a.lat == b.lat {
            return Err(CorridorError::DegenerateLatitude { lat: a.lat });
        }

        if !width.is_finite() || width < 0.0 {
            return Err(CorridorError::InvalidWidth(width));
        }

        log::debug!(
            "Corridor ({}, {}) -> ({}, {}), width {width}",
            a.lat,
            a.lon,
            b.lat,
            b.lon
        );

        Ok(Self {
            a,
            b,
            width,
            half_width: width / 2.0,
        })
    }

    /// First endpoint.
    #[must_use]
    pub const fn a(&self) -> GeoPoint {
        self.a
    }

    /// Second endpoint.
    #[must_use]
    pub const fn b(&self) -> GeoPoint {
        self.b
    }

    /// Full lateral width in degrees of longitude.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Half of the lateral width.
    #[must_use]
    pub const fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Southern and northern latitude limits, in that order.
    #[must_use]
    pub fn lat_bounds(&self) -> (f64, f64) {
        (self.a.lat.min(self.b.lat), self.a.lat.max(self.b.lat))
    }

    /// Longitude of the bridge centerline at `lat`.
    ///
    /// When both endpoints share a longitude the slope is infinite and the
    /// centerline is constant.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn centerline_lon(&self, lat: f64) -> f64 {
        if self.a.lon == self.b.lon {
            return self.a.lon;
        }

        let slope = (self.b.lat - self.a.lat) / (self.b.lon - self.a.lon);
        self.a.lon + (lat - self.a.lat) / slope
    }

    /// Returns `true` if the point lies inside the corridor.
    ///
    /// The latitude range is closed; the longitude band is open.
    #[must_use]
    pub fn is_within(&self, lat: f64, lon: f64) -> bool {
        let (lat_min, lat_max) = self.lat_bounds();
        if !(lat_min..=lat_max).contains(&lat) {
            return false;
        }

        let center = self.centerline_lon(lat);
        lon > center - self.half_width && lon < center + self.half_width
    }

    /// [`Self::is_within`] for a `geo` point (x = longitude, y = latitude).
    #[must_use]
    pub fn contains_point(&self, point: &Point<f64>) -> bool {
        self.is_within(point.y(), point.x())
    }

    /// The four-corner outline of the corridor, for drawing.
    #[must_use]
    pub fn outline(&self) -> Polygon<f64> {
        let (a, b, hw) = (self.a, self.b, self.half_width);
        let exterior = LineString::from(vec![
            (a.lon - hw, a.lat),
            (a.lon + hw, a.lat),
            (b.lon + hw, b.lat),
            (b.lon - hw, b.lat),
            (a.lon - hw, a.lat),
        ]);
        Polygon::new(exterior, vec![])
    }

    /// South-west and north-east corners of the outline, padded by
    /// `padding` degrees on every side.
    #[must_use]
    pub fn padded_bounds(&self, padding: f64) -> (GeoPoint, GeoPoint) {
        let outline = self.outline();
        outline.bounding_rect().map_or_else(
            || (self.a, self.b),
            |rect| {
                (
                    GeoPoint::new(rect.min().y - padding, rect.min().x - padding),
                    GeoPoint::new(rect.max().y + padding, rect.max().x + padding),
                )
            },
        )
    }
}

/// Derives a corridor width from two reference points placed on either side
/// of the bridge deck, scaled by `buffer_factor`.
///
/// The distance is planar, in degrees.
///
/// # Errors
///
/// Returns [`CorridorError::InvalidBufferFactor`] if `buffer_factor` is not a
/// positive finite number, or [`CorridorError::InvalidWidth`] if the points
/// produce a non-finite distance.
pub fn calibrated_width(
    left: GeoPoint,
    right: GeoPoint,
    buffer_factor: f64,
) -> Result<f64, CorridorError> {
    if !buffer_factor.is_finite() || buffer_factor <= 0.0 {
        return Err(CorridorError::InvalidBufferFactor(buffer_factor));
    }

    let distance = (left.lat - right.lat).hypot(left.lon - right.lon);
    let width = distance * buffer_factor;
    if !width.is_finite() {
        return Err(CorridorError::InvalidWidth(width));
    }
    Ok(width)
}
