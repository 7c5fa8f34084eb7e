use std::collections::{BTreeMap, HashMap};

use safestreets_shared::GeoJson;
use serde_json::Value;

use crate::config::{MAX_ZOOM, MIN_ZOOM};
use crate::geo::{LngLat, LngLatBounds};
use crate::style::{LayerSpec, SourceSpec, StyleDocument};
use crate::surface::{
    Camera, CameraTarget, FitOptions, LayerProperties, LayerSummary, MapSurface,
};

const VIEW_WIDTH_PX: f64 = 1280.0;
const VIEW_HEIGHT_PX: f64 = 800.0;
const TILE_SIZE_PX: f64 = 256.0;

/// Headless surface holding a style document in memory. Camera moves land
/// immediately; style loads stay pending until `finish_style_load`.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    style: StyleDocument,
    loaded: bool,
    styles: HashMap<String, StyleDocument>,
    requested_styles: Vec<String>,
    camera: Camera,
    atmosphere: bool,
    rotation_enabled: bool,
    markers: BTreeMap<String, LngLat>,
    last_fit: Option<(LngLatBounds, FitOptions)>,
}

impl MemorySurface {
    /// A surface that has already finished loading `style`.
    pub fn new(style: StyleDocument) -> Self {
        let atmosphere = style.fog.is_some();
        Self {
            style,
            loaded: true,
            atmosphere,
            ..Self::default()
        }
    }

    /// Make a document available to `load_style(url)`.
    pub fn register_style(&mut self, url: impl Into<String>, style: StyleDocument) {
        self.styles.insert(url.into(), style);
    }

    /// Basemap swap driven by the host (e.g. a style picker): the document is
    /// replaced and loaded in one step.
    pub fn replace_style(&mut self, style: StyleDocument) {
        self.atmosphere = style.fog.is_some();
        self.style = style;
        self.loaded = true;
    }

    pub fn finish_style_load(&mut self) {
        self.loaded = true;
    }

    pub fn style(&self) -> &StyleDocument {
        &self.style
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.style.layers.iter().map(|layer| layer.id.as_str()).collect()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.style.layer(id)
    }

    pub fn layer_visible(&self, id: &str) -> Option<bool> {
        self.style.layer(id).map(LayerSpec::is_visible)
    }

    pub fn source_data(&self, id: &str) -> Option<&GeoJson> {
        match self.style.sources.get(id) {
            Some(SourceSpec::Geojson { data }) => Some(data),
            _ => None,
        }
    }

    pub fn requested_styles(&self) -> &[String] {
        &self.requested_styles
    }

    pub fn rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    pub fn marker(&self, id: &str) -> Option<LngLat> {
        self.markers.get(id).copied()
    }

    pub fn last_fit(&self) -> Option<(LngLatBounds, FitOptions)> {
        self.last_fit
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    fn insert_index(&self, before: Option<&str>) -> Result<usize, String> {
        match before {
            Some(before) => self.style.position(before).ok_or_else(|| {
                format!("cannot place layer before non-existing layer \"{before}\"")
            }),
            None => Ok(self.style.layers.len()),
        }
    }
}

fn fit_zoom(bounds: LngLatBounds, options: FitOptions) -> f64 {
    let usable_w = (VIEW_WIDTH_PX - 2.0 * options.padding).max(1.0);
    let usable_h = (VIEW_HEIGHT_PX - 2.0 * options.padding).max(1.0);
    let lng_span = (bounds.ne.lng - bounds.sw.lng).max(1e-9);
    let lat_span = (bounds.ne.lat - bounds.sw.lat).max(1e-9);
    let zoom_x = (usable_w * 360.0 / (TILE_SIZE_PX * lng_span)).log2();
    let zoom_y = (usable_h * 180.0 / (TILE_SIZE_PX * lat_span)).log2();
    zoom_x
        .min(zoom_y)
        .min(options.max_zoom)
        .clamp(MIN_ZOOM, MAX_ZOOM)
}

impl MapSurface for MemorySurface {
    fn is_style_loaded(&self) -> bool {
        self.loaded
    }

    fn layers(&self) -> Vec<LayerSummary> {
        self.style
            .layers
            .iter()
            .map(|layer| LayerSummary {
                id: layer.id.clone(),
                kind: layer.kind,
            })
            .collect()
    }

    fn layer_properties(&self, id: &str) -> Option<LayerProperties> {
        self.style.layer(id).map(|layer| LayerProperties {
            paint: layer.paint.clone(),
            layout: layer.layout.clone(),
        })
    }

    fn has_layer(&self, id: &str) -> bool {
        self.style.layer(id).is_some()
    }

    fn has_source(&self, id: &str) -> bool {
        self.style.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), String> {
        if self.style.sources.contains_key(id) {
            return Err(format!("source \"{id}\" already exists"));
        }
        self.style.sources.insert(id.to_string(), source);
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: GeoJson) -> Result<(), String> {
        match self.style.sources.get_mut(id) {
            Some(SourceSpec::Geojson { data: current }) => {
                *current = data;
                Ok(())
            }
            Some(_) => Err(format!("source \"{id}\" is not a geojson source")),
            None => Err(format!("source \"{id}\" does not exist")),
        }
    }

    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> Result<(), String> {
        if self.has_layer(&layer.id) {
            return Err(format!("layer \"{}\" already exists", layer.id));
        }
        if let Some(source) = layer.source.as_deref()
            && !self.style.sources.contains_key(source)
        {
            return Err(format!(
                "layer \"{}\" references missing source \"{source}\"",
                layer.id
            ));
        }
        let index = self.insert_index(before)?;
        self.style.layers.insert(index, layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), String> {
        let index = self
            .style
            .position(id)
            .ok_or_else(|| format!("layer \"{id}\" does not exist"))?;
        self.style.layers.remove(index);
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), String> {
        if before == Some(id) {
            return Ok(());
        }
        let from = self
            .style
            .position(id)
            .ok_or_else(|| format!("layer \"{id}\" does not exist"))?;
        // Validate the anchor before touching the list.
        self.insert_index(before)?;
        let layer = self.style.layers.remove(from);
        let to = self.insert_index(before)?;
        self.style.layers.insert(to, layer);
        Ok(())
    }

    fn set_paint_property(&mut self, layer: &str, key: &str, value: Value) -> Result<(), String> {
        let spec = self
            .style
            .layer_mut(layer)
            .ok_or_else(|| format!("layer \"{layer}\" does not exist"))?;
        if key == "visibility" || !spec.kind.accepts_property(key) {
            return Err(format!(
                "layer \"{layer}\" does not support paint property \"{key}\""
            ));
        }
        spec.paint.insert(key.to_string(), value);
        Ok(())
    }

    fn set_layout_property(
        &mut self,
        layer: &str,
        key: &str,
        value: Value,
    ) -> Result<(), String> {
        let spec = self
            .style
            .layer_mut(layer)
            .ok_or_else(|| format!("layer \"{layer}\" does not exist"))?;
        if !spec.kind.accepts_property(key) {
            return Err(format!(
                "layer \"{layer}\" does not support layout property \"{key}\""
            ));
        }
        if key == "visibility" && !matches!(value.as_str(), Some("visible" | "none")) {
            return Err(format!("invalid visibility value {value}"));
        }
        spec.layout.insert(key.to_string(), value);
        Ok(())
    }

    fn atmosphere_enabled(&self) -> bool {
        self.atmosphere
    }

    fn set_atmosphere(&mut self, enabled: bool) -> Result<(), String> {
        self.atmosphere = enabled;
        Ok(())
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    fn ease_to(&mut self, target: CameraTarget) {
        if let Some(center) = target.center {
            self.camera.center = center;
        }
        if let Some(zoom) = target.zoom {
            self.camera.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
        if let Some(bearing) = target.bearing {
            self.camera.bearing = bearing;
        }
        if let Some(pitch) = target.pitch {
            self.camera.pitch = pitch;
        }
    }

    fn fit_bounds(&mut self, bounds: LngLatBounds, options: FitOptions) {
        self.camera.center = bounds.sw.lerp(bounds.ne, 0.5);
        self.camera.zoom = fit_zoom(bounds, options);
        self.last_fit = Some((bounds, options));
    }

    fn set_rotation_enabled(&mut self, enabled: bool) {
        self.rotation_enabled = enabled;
    }

    fn set_marker(&mut self, id: &str, at: LngLat) {
        self.markers.insert(id.to_string(), at);
    }

    fn load_style(&mut self, url: &str) {
        self.requested_styles.push(url.to_string());
        let style = self.styles.get(url).cloned().unwrap_or_default();
        self.atmosphere = style.fog.is_some();
        self.style = style;
        self.loaded = false;
    }
}
