//! Feature kind classification from layer names and tags.

use earshot_core::models::{FeatureKind, Properties};

const PATH_CLASSES: &[&str] =
    &["path", "footway", "pedestrian", "steps", "track", "cycleway", "bridleway"];

const TRANSIT_VALUES: &[&str] = &[
    "bus",
    "bus_stop",
    "railway",
    "station",
    "halt",
    "tram_stop",
    "subway",
    "subway_entrance",
    "ferry_terminal",
];

fn tag<'a>(properties: &'a Properties, key: &str) -> Option<&'a str> {
    properties.get(key).and_then(|v| v.as_str())
}

/// Derive a feature's kind from the layer it came from and its
/// `class`/`subclass` tags
pub fn classify(layer: &str, properties: &Properties) -> FeatureKind {
    let class = tag(properties, "class");
    let subclass = tag(properties, "subclass");

    match layer {
        "transportation" | "transportation_name" | "roads" => {
            if class.is_some_and(|c| PATH_CLASSES.contains(&c))
                || subclass.is_some_and(|s| PATH_CLASSES.contains(&s))
            {
                FeatureKind::Path
            } else {
                FeatureKind::Road
            }
        }
        "poi" | "pois" => {
            if class.is_some_and(|c| TRANSIT_VALUES.contains(&c))
                || subclass.is_some_and(|s| TRANSIT_VALUES.contains(&s))
            {
                FeatureKind::TransitStop
            } else {
                FeatureKind::Poi
            }
        }
        "transit" | "transit_stops" => FeatureKind::TransitStop,
        "building" | "buildings" => FeatureKind::Building,
        "water" | "waterway" | "water_name" => FeatureKind::Water,
        "intersection" | "intersections" => FeatureKind::Intersection,
        _ => FeatureKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earshot_core::models::PropertyValue;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs.iter().map(|(k, v)| (k.to_string(), PropertyValue::from(*v))).collect()
    }

    #[test]
    fn test_transportation_classes() {
        assert_eq!(classify("transportation", &props(&[("class", "primary")])), FeatureKind::Road);
        assert_eq!(classify("transportation", &props(&[("class", "path")])), FeatureKind::Path);
        assert_eq!(
            classify("transportation", &props(&[("class", "minor"), ("subclass", "footway")])),
            FeatureKind::Path
        );
        assert_eq!(classify("transportation", &Properties::new()), FeatureKind::Road);
    }

    #[test]
    fn test_poi_classes() {
        assert_eq!(classify("poi", &props(&[("class", "cafe")])), FeatureKind::Poi);
        assert_eq!(classify("poi", &props(&[("class", "bus"), ("subclass", "bus_stop")])), FeatureKind::TransitStop);
        assert_eq!(classify("poi", &props(&[("subclass", "station")])), FeatureKind::TransitStop);
    }

    #[test]
    fn test_other_layers() {
        assert_eq!(classify("building", &Properties::new()), FeatureKind::Building);
        assert_eq!(classify("waterway", &Properties::new()), FeatureKind::Water);
        assert_eq!(classify("intersections", &Properties::new()), FeatureKind::Intersection);
        assert_eq!(classify("landcover", &props(&[("class", "grass")])), FeatureKind::Other);
    }
}
