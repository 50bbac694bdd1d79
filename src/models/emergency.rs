//! Emergency Feed Models
//!
//! GeoJSON-like hazard features returned by the emergency-check endpoint and
//! handed to the map layer as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    Polygon,
    GeometryCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyGeometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    #[serde(default)]
    pub coordinates: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometries: Option<Vec<Value>>,
}

impl EmergencyGeometry {
    /// `(latitude, longitude)` of a `Point` geometry. GeoJSON stores
    /// positions as `[longitude, latitude]`.
    pub fn point(&self) -> Option<(f64, f64)> {
        if self.kind != GeometryKind::Point {
            return None;
        }
        let position = self.coordinates.as_ref()?.as_array()?;
        match position.as_slice() {
            [lon, lat, ..] => Some((lat.as_f64()?, lon.as_f64()?)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyProperties {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub feed_type: String,
    #[serde(default)]
    pub source_org: String,
    #[serde(default)]
    pub category1: String,
    #[serde(default)]
    pub category2: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One hazard feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emergency {
    #[serde(rename = "type", default = "feature_type")]
    pub feature_type: String,
    pub properties: EmergencyProperties,
    pub geometry: EmergencyGeometry,
}

fn feature_type() -> String {
    "Feature".to_string()
}

impl Emergency {
    /// Short label for list output: headline when present, else categories.
    pub fn headline(&self) -> String {
        match &self.properties.web_headline {
            Some(headline) if !headline.is_empty() => headline.clone(),
            _ => format!(
                "{} / {} at {}",
                self.properties.category1, self.properties.category2, self.properties.location
            ),
        }
    }
}
