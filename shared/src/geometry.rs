use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `[lon, lat]`, the axis order every geometry consumer expects.
pub type Position = [f64; 2];

/// The subset of GeoJSON the map overlays exchange: points for heat samples,
/// single and multi-part lines for routes, and the two wrapper forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    Point {
        coordinates: Position,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    Feature {
        geometry: Option<Box<GeoJson>>,
        #[serde(default)]
        properties: Option<Map<String, Value>>,
    },
    FeatureCollection {
        features: Vec<GeoJson>,
    },
}

impl GeoJson {
    pub fn empty_collection() -> Self {
        GeoJson::FeatureCollection {
            features: Vec::new(),
        }
    }

    pub fn line_string(coordinates: Vec<Position>) -> Self {
        GeoJson::LineString { coordinates }
    }

    pub fn point_feature(coordinates: Position, properties: Map<String, Value>) -> Self {
        GeoJson::Feature {
            geometry: Some(Box::new(GeoJson::Point { coordinates })),
            properties: Some(properties),
        }
    }

    /// Line parts contained in this value, in document order. Points contribute nothing.
    pub fn line_parts(&self) -> Vec<&[Position]> {
        let mut parts = Vec::new();
        self.collect_line_parts(&mut parts);
        parts
    }

    fn collect_line_parts<'a>(&'a self, out: &mut Vec<&'a [Position]>) {
        match self {
            GeoJson::Point { .. } => {}
            GeoJson::LineString { coordinates } => out.push(coordinates.as_slice()),
            GeoJson::MultiLineString { coordinates } => {
                out.extend(coordinates.iter().map(Vec::as_slice));
            }
            GeoJson::Feature { geometry, .. } => {
                if let Some(geometry) = geometry {
                    geometry.collect_line_parts(out);
                }
            }
            GeoJson::FeatureCollection { features } => {
                for feature in features {
                    feature.collect_line_parts(out);
                }
            }
        }
    }
}
