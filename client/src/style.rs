use std::collections::BTreeMap;

use safestreets_shared::GeoJson;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type PropertyMap = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    Background,
    Fill,
    Line,
    Symbol,
    Circle,
    Heatmap,
    FillExtrusion,
    Raster,
    Hillshade,
    Sky,
    #[serde(other)]
    Other,
}

impl LayerKind {
    fn property_prefixes(self) -> &'static [&'static str] {
        match self {
            LayerKind::Background => &["background-"],
            LayerKind::Fill => &["fill-"],
            LayerKind::Line => &["line-"],
            LayerKind::Symbol => &["text-", "icon-", "symbol-"],
            LayerKind::Circle => &["circle-"],
            LayerKind::Heatmap => &["heatmap-"],
            LayerKind::FillExtrusion => &["fill-extrusion-"],
            LayerKind::Raster => &["raster-"],
            LayerKind::Hillshade => &["hillshade-"],
            LayerKind::Sky => &["sky-"],
            LayerKind::Other => &[""],
        }
    }

    /// Whether a paint/layout key belongs to this layer type.
    pub fn accepts_property(self, key: &str) -> bool {
        if key == "visibility" {
            return true;
        }
        if self == LayerKind::Fill && key.starts_with("fill-extrusion-") {
            return false;
        }
        self.property_prefixes()
            .iter()
            .any(|prefix| key.starts_with(prefix))
    }
}

/// One entry of a style document's `layers` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(
        default,
        rename = "source-layer",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub paint: PropertyMap,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: PropertyMap,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            source: None,
            source_layer: None,
            minzoom: None,
            filter: None,
            paint: Map::new(),
            layout: Map::new(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn source_layer(mut self, source_layer: impl Into<String>) -> Self {
        self.source_layer = Some(source_layer.into());
        self
    }

    pub fn minzoom(mut self, minzoom: f64) -> Self {
        self.minzoom = Some(minzoom);
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn paint(mut self, key: &str, value: Value) -> Self {
        self.paint.insert(key.to_string(), value);
        self
    }

    pub fn layout(mut self, key: &str, value: Value) -> Self {
        self.layout.insert(key.to_string(), value);
        self
    }

    pub fn is_visible(&self) -> bool {
        self.layout.get("visibility").and_then(Value::as_str) != Some("none")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceSpec {
    Geojson {
        data: GeoJson,
    },
    Vector {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Raster {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    RasterDem {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

/// A basemap style: sources plus an ordered (bottom to top) layer list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fog: Option<Value>,
}

impl StyleDocument {
    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn layer_mut(&mut self, id: &str) -> Option<&mut LayerSpec> {
        self.layers.iter_mut().find(|layer| layer.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }
}
