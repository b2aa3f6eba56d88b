//! Leaflet map pages and the `GeoJSON` behind them.
//!
//! The same page template serves the static map and every animation frame:
//! a tile layer fitted to the study bounds, a legend, an optional date
//! label, and a `FeatureCollection` of circles (plus the corridor outline on
//! the static map).

use std::fmt::Write as _;
use std::path::Path;

use bridge_accidents_accident_models::{ClassifiedRecord, ConstructionState, SeverityCode};
use bridge_accidents_analytics_models::AggregateRow;
use bridge_accidents_spatial::{Corridor, GeoPoint};
use bridge_accidents_study::StudyDefinition;
use bridge_accidents_study::definition::{Labels, MapBounds};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use serde::Serialize;

use crate::{ACCIDENTS_GEOJSON, GenerateError, MAP_HTML, escape_html, write_output};

/// Leaflet version loaded from the CDN.
const LEAFLET_VERSION: &str = "1.9.4";

/// Circle size and fill opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    /// Radius in meters.
    pub radius: f64,
    /// Fill opacity in `[0, 1]`.
    pub opacity: f64,
}

/// Everything about a map page that does not depend on the circles drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct MapScene {
    /// Page title.
    pub title: String,
    /// Map width in pixels.
    pub width: u32,
    /// Map height in pixels.
    pub height: u32,
    /// Tile URL template.
    pub tiles: String,
    /// Tile attribution HTML.
    pub attribution: String,
    /// View bounds.
    pub bounds: MapBounds,
    /// Where the legend is pinned.
    pub legend_anchor: GeoPoint,
    /// Where the date label is pinned in animation frames.
    pub date_label_anchor: GeoPoint,
    /// Legend markup.
    pub legend_html: String,
}

impl MapScene {
    /// Builds the scene for a study, falling back to the padded corridor for
    /// bounds and to the view corners for the legend and date label.
    #[must_use]
    pub fn new(study: &StudyDefinition, corridor: &Corridor, rows: &[AggregateRow]) -> Self {
        let cfg = &study.map;
        let bounds = cfg.bounds.unwrap_or_else(|| {
            let (south_west, north_east) = corridor.padded_bounds(cfg.padding);
            MapBounds {
                south_west,
                north_east,
            }
        });

        Self {
            title: study.name.clone(),
            width: cfg.width,
            height: cfg.height,
            tiles: cfg.tiles.clone(),
            attribution: cfg.attribution.clone(),
            bounds,
            legend_anchor: cfg.legend.unwrap_or(GeoPoint::new(
                bounds.north_east.lat,
                bounds.south_west.lon,
            )),
            date_label_anchor: cfg.date_label.unwrap_or(bounds.south_west),
            legend_html: legend_html(rows, &study.labels),
        }
    }
}

/// Builds the legend: one colored entry per state with its date range,
/// count over span, and daily rate.
#[must_use]
pub fn legend_html(rows: &[AggregateRow], labels: &Labels) -> String {
    let entries: Vec<String> = rows
        .iter()
        .map(|row| {
            format!(
                "<span class=\"swatch\" style=\"background-color: {color}\"></span>\
                 <strong> {label}</strong><br/>\
                 {min} to {max}<br/>\
                 {count} accidents/{span} days<br/>\
                 {rate:.3} accidents/day<br/>",
                color = row.state.color(),
                label = escape_html(labels.for_state(row.state)),
                min = row.min_date,
                max = row.max_date,
                count = row.count,
                span = row.span_days,
                rate = row.rate,
            )
        })
        .collect();

    format!(
        "<div class=\"legend\">\n{}\n</div>",
        entries.join("\n<br/>\n")
    )
}

fn properties(pairs: impl IntoIterator<Item = (&'static str, JsonValue)>) -> JsonObject {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// A circle for one accident, colored by `color_state`.
#[must_use]
pub fn accident_feature(
    record: &ClassifiedRecord,
    color_state: ConstructionState,
    marker: Marker,
) -> Feature {
    let r = &record.record;
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![r.longitude, r.latitude]))),
        id: None,
        properties: Some(properties([
            ("kind", JsonValue::from("accident")),
            ("state", JsonValue::from(record.state.as_ref())),
            ("date", JsonValue::from(r.date.to_string())),
            ("severity", JsonValue::from(r.severity.map(SeverityCode::value))),
            ("period", JsonValue::from(record.period.to_string())),
            ("color", JsonValue::from(color_state.color())),
            ("radius", JsonValue::from(marker.radius)),
            ("opacity", JsonValue::from(marker.opacity)),
        ])),
        foreign_members: None,
    }
}

/// The corridor outline as a polygon feature.
#[must_use]
pub fn corridor_feature(corridor: &Corridor) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&corridor.outline()))),
        id: None,
        properties: Some(properties([
            ("kind", JsonValue::from("corridor")),
            ("width", JsonValue::from(corridor.width())),
        ])),
        foreign_members: None,
    }
}

/// Builds the static map's features: one circle per accident, optionally
/// restricted to a single severity code, plus the corridor outline.
#[must_use]
pub fn accidents_feature_collection(
    classified: &[ClassifiedRecord],
    corridor: Option<&Corridor>,
    severity_filter: Option<SeverityCode>,
    marker: Marker,
) -> FeatureCollection {
    let mut features: Vec<Feature> = classified
        .iter()
        .filter(|c| severity_filter.is_none_or(|sev| c.record.severity == Some(sev)))
        .map(|c| accident_feature(c, c.state, marker))
        .collect();

    if let Some(sev) = severity_filter {
        log::info!("{} accidents with severity {sev}", features.len());
    }

    if let Some(corridor) = corridor {
        features.push(corridor_feature(corridor));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageConfig<'a> {
    tiles: &'a str,
    attribution: &'a str,
    bounds: [[f64; 2]; 2],
    legend: &'a str,
    legend_anchor: [f64; 2],
    date_label: Option<String>,
    date_label_anchor: [f64; 2],
}

/// Serializes `value` for inline use inside a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String, GenerateError> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Renders a standalone Leaflet page.
///
/// # Errors
///
/// Returns [`GenerateError::Json`] if the scene or features cannot be
/// serialized.
pub fn render_map_html(
    scene: &MapScene,
    features: &FeatureCollection,
    date_label: Option<&str>,
) -> Result<String, GenerateError> {
    let b = &scene.bounds;
    let config = PageConfig {
        tiles: &scene.tiles,
        attribution: &scene.attribution,
        bounds: [
            [b.south_west.lat, b.south_west.lon],
            [b.north_east.lat, b.north_east.lon],
        ],
        legend: &scene.legend_html,
        legend_anchor: [scene.legend_anchor.lat, scene.legend_anchor.lon],
        date_label: date_label.map(escape_html),
        date_label_anchor: [scene.date_label_anchor.lat, scene.date_label_anchor.lon],
    };

    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js"></script>
<style>
  html, body {{ margin: 0; padding: 0; }}
  #map {{ width: {width}px; height: {height}px; }}
  .label {{ font-family: hack, monospace; color: black; font-size: 1.5em; white-space: nowrap; }}
  .legend {{ width: 280px; background-color: white; padding: 5px; white-space: normal; }}
  .swatch {{ border-radius: 50%; height: 15px; width: 15px; display: inline-block; }}
</style>
</head>
<body>
<div id="map"></div>
<script>
const config = {config};
const data = {data};
const map = L.map('map', {{ zoomControl: false }});
L.tileLayer(config.tiles, {{ attribution: config.attribution, subdomains: 'abcd', maxZoom: 20 }}).addTo(map);
map.fitBounds(config.bounds);
L.geoJSON(data, {{
  filter: (f) => f.properties.kind === 'corridor',
  style: {{ color: '#555555', weight: 1, dashArray: '4 4', fill: false }},
}}).addTo(map);
L.geoJSON(data, {{
  filter: (f) => f.properties.kind === 'accident',
  pointToLayer: (f, latlng) => L.circle(latlng, {{
    radius: f.properties.radius,
    stroke: false,
    fill: true,
    fillColor: f.properties.color,
    fillOpacity: f.properties.opacity,
  }}),
}}).addTo(map);
const label = (html) => L.divIcon({{ html, className: 'label', iconSize: null }});
L.marker(config.legendAnchor, {{ icon: label(config.legend), interactive: false }}).addTo(map);
if (config.dateLabel !== null) {{
  L.marker(config.dateLabelAnchor, {{ icon: label(config.dateLabel), interactive: false }}).addTo(map);
}}
</script>
</body>
</html>
"#,
        title = escape_html(&scene.title),
        width = scene.width,
        height = scene.height,
        config = script_json(&config)?,
        data = script_json(features)?,
    );

    Ok(html)
}

/// Writes `accidents.geojson` and `accident-map.html` under `out_dir`.
///
/// # Errors
///
/// Returns [`GenerateError`] if serialization or a write fails.
pub fn write_map(
    out_dir: &Path,
    scene: &MapScene,
    features: &FeatureCollection,
) -> Result<(), GenerateError> {
    write_output(
        &out_dir.join(ACCIDENTS_GEOJSON),
        &serde_json::to_string_pretty(features)?,
    )?;

    let path = out_dir.join(MAP_HTML);
    write_output(&path, &render_map_html(scene, features, None)?)?;
    log::info!(
        "Map with {} features written to {}",
        features.features.len(),
        path.display()
    );
    Ok(())
}
