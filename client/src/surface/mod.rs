//! The map surface the engine drives: an opaque renderer that holds a style
//! document, named sources/layers, a camera, and markers.

pub mod memory;

use safestreets_shared::GeoJson;
use serde_json::Value;

use crate::geo::{LngLat, LngLatBounds};
use crate::style::{LayerKind, LayerSpec, PropertyMap, SourceSpec};

pub use memory::MemorySurface;

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub id: String,
    pub kind: LayerKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerProperties {
    pub paint: PropertyMap,
    pub layout: PropertyMap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: LngLat::new(-73.9857, 40.7484),
            zoom: 12.0,
            bearing: 0.0,
            pitch: 0.0,
        }
    }
}

/// Animated camera move. `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraTarget {
    pub center: Option<LngLat>,
    pub zoom: Option<f64>,
    pub bearing: Option<f64>,
    pub pitch: Option<f64>,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding: f64,
    pub max_zoom: f64,
    pub duration_ms: u32,
}

/// Everything the engine needs from the renderer. Structural mutations
/// report failures as `Err(String)`; camera and marker calls cannot fail.
///
/// `load_style` swaps the whole document and destroys every layer the engine
/// added. The host must call `Engine::on_style_load` once the new document
/// finishes loading.
pub trait MapSurface {
    fn is_style_loaded(&self) -> bool;

    /// Layers bottom to top.
    fn layers(&self) -> Vec<LayerSummary>;
    fn layer_properties(&self, id: &str) -> Option<LayerProperties>;
    fn has_layer(&self, id: &str) -> bool;
    fn has_source(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), String>;
    fn set_source_data(&mut self, id: &str, data: GeoJson) -> Result<(), String>;
    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> Result<(), String>;
    fn remove_layer(&mut self, id: &str) -> Result<(), String>;
    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), String>;
    fn set_paint_property(&mut self, layer: &str, key: &str, value: Value) -> Result<(), String>;
    fn set_layout_property(&mut self, layer: &str, key: &str, value: Value)
    -> Result<(), String>;

    /// Fog and sky effects.
    fn atmosphere_enabled(&self) -> bool;
    fn set_atmosphere(&mut self, enabled: bool) -> Result<(), String>;

    fn camera(&self) -> Camera;
    fn ease_to(&mut self, target: CameraTarget);
    fn fit_bounds(&mut self, bounds: LngLatBounds, options: FitOptions);
    /// Drag-rotate and touch pitch.
    fn set_rotation_enabled(&mut self, enabled: bool);

    /// Place or move the marker with this id.
    fn set_marker(&mut self, id: &str, at: LngLat);

    fn load_style(&mut self, url: &str);
}
