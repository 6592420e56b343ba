use earshot_core::config::ConfigSource;
use earshot_core::models::SpatialFeature;
use earshot_geo::PointDistanceBearing;
use serde::Serialize;
use tabled::Tabled;

/// One row of `near` output
#[derive(Debug, Serialize, Tabled)]
pub struct NearbyFeatureRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Distance (m)", display_with = "display_meters")]
    pub distance_m: f64,
    #[tabled(rename = "Bearing", display_with = "display_degrees")]
    pub bearing: f64,
    #[tabled(rename = "Id", display_with = "display_id")]
    pub external_id: Option<u64>,
    #[tabled(rename = "Layer", display_with = "display_layer")]
    pub layer: Option<String>,
}

impl NearbyFeatureRow {
    pub fn new(feature: &SpatialFeature, nearest: &PointDistanceBearing) -> Self {
        Self {
            name: feature.name().unwrap_or("(unnamed)").to_string(),
            kind: feature.kind.to_string(),
            distance_m: nearest.distance,
            bearing: nearest.bearing,
            external_id: feature.external_id,
            layer: feature.layer.clone(),
        }
    }
}

/// One callout emitted by `walk`
#[derive(Debug, Serialize, Tabled)]
pub struct CalloutRow {
    #[tabled(rename = "Step")]
    pub step: usize,
    #[tabled(rename = "Callout")]
    pub text: String,
    #[tabled(rename = "Distance (m)", display_with = "display_meters")]
    pub distance_m: f64,
    #[tabled(rename = "Bearing", display_with = "display_degrees")]
    pub bearing: f64,
    #[tabled(skip)]
    pub longitude: f64,
    #[tabled(skip)]
    pub latitude: f64,
}

/// One resolved configuration value
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source", display_with = "display_source")]
    pub source: ConfigSource,
}

fn display_meters(value: &f64) -> String {
    format!("{:.1}", value)
}

fn display_degrees(value: &f64) -> String {
    format!("{:.0}°", value)
}

fn display_id(value: &Option<u64>) -> String {
    value.map(|id| id.to_string()).unwrap_or_default()
}

fn display_layer(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn display_source(source: &ConfigSource) -> String {
    format!("{:?}", source)
}
