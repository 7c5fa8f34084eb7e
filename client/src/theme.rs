//! Reversible "night" theme over an opaque basemap.
//!
//! `activate` snapshots every base layer's paint and layout, repaints them
//! from [`THEME_RULES`], tilts the camera and adds a 3D building layer.
//! `deactivate` writes the snapshot back verbatim. Keys that did not exist at
//! capture time are not tracked and survive deactivation.

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{
    CAMERA_ANIMATION_MS, EXTRUSION_MIN_ZOOM, RESTORE_MIN_LAYER_RATIO, TALL_BUILDING_HEIGHT_M,
    THEME_BEARING, THEME_PITCH,
};
use crate::overlay::{self, is_overlay_layer, try_set_layout, try_set_paint};
use crate::style::{LayerKind, LayerSpec, PropertyMap};
use crate::surface::{CameraTarget, LayerSummary, MapSurface};

pub const EXTRUSION_LAYER_ID: &str = "theme-3d-buildings";
const BUILDING_SOURCE_ID: &str = "composite";
const BUILDING_SOURCE_LAYER: &str = "building";

const EXTRUSION_COLOR: &str = "#4c5a8a";
const EXTRUSION_TALL_COLOR: &str = "#9f7aea";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemeState {
    #[default]
    Off,
    On,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSnapshot {
    pub id: String,
    pub paint: PropertyMap,
    pub layout: PropertyMap,
}

/// Pristine basemap state taken right before the first repaint.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeSnapshot {
    pub layers: Vec<LayerSnapshot>,
    pub bearing: f64,
    pub pitch: f64,
    pub atmosphere: bool,
}

impl ThemeSnapshot {
    /// Engine-owned overlays are left out so heat and routes never get
    /// rewritten by a restore.
    pub fn capture<S: MapSurface + ?Sized>(surface: &S) -> Self {
        let layers = surface
            .layers()
            .into_iter()
            .filter(|layer| !is_overlay_layer(&layer.id))
            .filter_map(|layer| {
                let properties = surface.layer_properties(&layer.id)?;
                Some(LayerSnapshot {
                    id: layer.id,
                    paint: properties.paint,
                    layout: properties.layout,
                })
            })
            .collect();
        let camera = surface.camera();
        Self {
            layers,
            bearing: camera.bearing,
            pitch: camera.pitch,
            atmosphere: surface.atmosphere_enabled(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeCategory {
    Background,
    Water,
    Park,
    Building,
    Road,
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTarget {
    Paint(&'static str),
    Layout(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThemeValue {
    Color(&'static str),
    Number(f64),
    Keyword(&'static str),
}

impl ThemeValue {
    pub fn to_value(self) -> Value {
        match self {
            ThemeValue::Color(color) => Value::from(color),
            ThemeValue::Number(n) => json!(n),
            ThemeValue::Keyword(word) => Value::from(word),
        }
    }
}

/// A layer matches when its type is in `kinds` and its id contains one of
/// `patterns`, ignoring case. Empty `patterns` matches any id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeRule {
    pub category: ThemeCategory,
    pub kinds: &'static [LayerKind],
    pub patterns: &'static [&'static str],
    pub target: PropertyTarget,
    pub value: ThemeValue,
}

impl ThemeRule {
    pub fn matches(&self, layer: &LayerSummary) -> bool {
        if !self.kinds.contains(&layer.kind) {
            return false;
        }
        if self.patterns.is_empty() {
            return true;
        }
        let id = layer.id.to_ascii_lowercase();
        self.patterns.iter().any(|pattern| id.contains(pattern))
    }
}

const PARK_PATTERNS: &[&str] = &["park", "landuse", "landcover", "grass", "wood"];
const ROAD_PATTERNS: &[&str] = &["road", "street", "motorway", "bridge", "tunnel", "highway"];

/// Applied in order; later rules win when two target the same property.
pub const THEME_RULES: &[ThemeRule] = &[
    ThemeRule {
        category: ThemeCategory::Background,
        kinds: &[LayerKind::Background],
        patterns: &[],
        target: PropertyTarget::Paint("background-color"),
        value: ThemeValue::Color("#0b1020"),
    },
    ThemeRule {
        category: ThemeCategory::Water,
        kinds: &[LayerKind::Fill],
        patterns: &["water"],
        target: PropertyTarget::Paint("fill-color"),
        value: ThemeValue::Color("#123a5c"),
    },
    ThemeRule {
        category: ThemeCategory::Water,
        kinds: &[LayerKind::Line],
        patterns: &["water"],
        target: PropertyTarget::Paint("line-color"),
        value: ThemeValue::Color("#1c4f7a"),
    },
    ThemeRule {
        category: ThemeCategory::Park,
        kinds: &[LayerKind::Fill],
        patterns: PARK_PATTERNS,
        target: PropertyTarget::Paint("fill-color"),
        value: ThemeValue::Color("#16352a"),
    },
    ThemeRule {
        category: ThemeCategory::Building,
        kinds: &[LayerKind::Fill],
        patterns: &["building"],
        target: PropertyTarget::Paint("fill-color"),
        value: ThemeValue::Color("#2a2f45"),
    },
    ThemeRule {
        category: ThemeCategory::Building,
        kinds: &[LayerKind::Fill],
        patterns: &["building"],
        target: PropertyTarget::Paint("fill-opacity"),
        value: ThemeValue::Number(0.9),
    },
    ThemeRule {
        category: ThemeCategory::Building,
        kinds: &[LayerKind::FillExtrusion],
        patterns: &["building"],
        target: PropertyTarget::Paint("fill-extrusion-color"),
        value: ThemeValue::Color(EXTRUSION_COLOR),
    },
    ThemeRule {
        category: ThemeCategory::Road,
        kinds: &[LayerKind::Line],
        patterns: ROAD_PATTERNS,
        target: PropertyTarget::Paint("line-color"),
        value: ThemeValue::Color("#3d4466"),
    },
    ThemeRule {
        category: ThemeCategory::Label,
        kinds: &[LayerKind::Symbol],
        patterns: &[],
        target: PropertyTarget::Paint("text-color"),
        value: ThemeValue::Color("#e6ecff"),
    },
    ThemeRule {
        category: ThemeCategory::Label,
        kinds: &[LayerKind::Symbol],
        patterns: &[],
        target: PropertyTarget::Paint("text-halo-color"),
        value: ThemeValue::Color("#0b1020"),
    },
    ThemeRule {
        category: ThemeCategory::Label,
        kinds: &[LayerKind::Symbol],
        patterns: &["road"],
        target: PropertyTarget::Layout("text-transform"),
        value: ThemeValue::Keyword("uppercase"),
    },
];

pub fn matching_rules(layer: &LayerSummary) -> impl Iterator<Item = &'static ThemeRule> + '_ {
    THEME_RULES.iter().filter(move |rule| rule.matches(layer))
}

/// Repaint every base layer. Returns how many properties were applied.
pub fn apply_rules<S: MapSurface + ?Sized>(surface: &mut S) -> usize {
    let mut applied = 0;
    for layer in surface.layers() {
        if is_overlay_layer(&layer.id) {
            continue;
        }
        for rule in matching_rules(&layer) {
            let ok = match rule.target {
                PropertyTarget::Paint(key) => {
                    try_set_paint(surface, &layer.id, key, rule.value.to_value())
                }
                PropertyTarget::Layout(key) => {
                    try_set_layout(surface, &layer.id, key, rule.value.to_value())
                }
            };
            applied += usize::from(ok);
        }
    }
    applied
}

pub fn extrusion_layer_spec() -> LayerSpec {
    LayerSpec::new(EXTRUSION_LAYER_ID, LayerKind::FillExtrusion)
        .source(BUILDING_SOURCE_ID)
        .source_layer(BUILDING_SOURCE_LAYER)
        .minzoom(EXTRUSION_MIN_ZOOM)
        .filter(json!(["==", ["get", "extrude"], "true"]))
        .paint(
            "fill-extrusion-color",
            json!([
                "case",
                [">=", ["get", "height"], TALL_BUILDING_HEIGHT_M],
                EXTRUSION_TALL_COLOR,
                EXTRUSION_COLOR
            ]),
        )
        .paint("fill-extrusion-height", json!(["get", "height"]))
        .paint("fill-extrusion-base", json!(["get", "min_height"]))
        .paint("fill-extrusion-opacity", json!(0.85))
}

/// Off/On state machine. The surface carries no theme flags; everything
/// lives here.
#[derive(Debug, Clone, Default)]
pub struct ThemeController {
    state: ThemeState,
    snapshot: Option<ThemeSnapshot>,
    patch_pending: bool,
    fallback_pending: bool,
}

impl ThemeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ThemeState {
        self.state
    }

    pub fn snapshot(&self) -> Option<&ThemeSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_patch_pending(&self) -> bool {
        self.patch_pending
    }

    pub fn activate<S: MapSurface + ?Sized>(&mut self, surface: &mut S) {
        if self.state == ThemeState::On {
            debug!("theme already on");
            return;
        }
        self.state = ThemeState::On;
        if surface.is_style_loaded() {
            self.apply(surface);
        } else {
            debug!("style still loading, deferring theme");
            self.patch_pending = true;
        }
    }

    /// Call after every style load. Applies a deferred patch, or re-applies
    /// the theme when a basemap swap wiped it while on.
    pub fn on_style_load<S: MapSurface + ?Sized>(&mut self, surface: &mut S) {
        if self.state != ThemeState::On {
            return;
        }
        if self.patch_pending || !surface.has_layer(EXTRUSION_LAYER_ID) {
            self.apply(surface);
        }
    }

    pub fn deactivate<S: MapSurface + ?Sized>(&mut self, surface: &mut S, default_style_url: &str) {
        if self.state == ThemeState::Off {
            debug!("theme already off");
            return;
        }
        self.state = ThemeState::Off;
        self.patch_pending = false;
        let Some(snapshot) = self.snapshot.take() else {
            debug!("theme was never applied, nothing to restore");
            return;
        };

        if surface.has_layer(EXTRUSION_LAYER_ID)
            && let Err(e) = surface.remove_layer(EXTRUSION_LAYER_ID)
        {
            warn!(error = %e, "failed to remove extrusion layer");
        }

        match restore_layers(surface, &snapshot) {
            Ok(restored) => debug!(restored, "theme reverted"),
            Err(e) => {
                warn!(error = %e, style = default_style_url, "theme restore failed, reloading default style");
                self.fallback_pending = true;
                surface.load_style(default_style_url);
            }
        }

        surface.ease_to(CameraTarget {
            bearing: Some(snapshot.bearing),
            pitch: Some(snapshot.pitch),
            duration_ms: CAMERA_ANIMATION_MS,
            ..CameraTarget::default()
        });
        surface.set_rotation_enabled(false);
        if let Err(e) = surface.set_atmosphere(snapshot.atmosphere) {
            warn!(error = %e, "failed to restore atmosphere");
        }
        overlay::reassert_order(surface);
    }

    /// True once after a fallback reload was requested.
    pub fn take_fallback(&mut self) -> bool {
        std::mem::take(&mut self.fallback_pending)
    }

    fn apply<S: MapSurface + ?Sized>(&mut self, surface: &mut S) {
        self.patch_pending = false;
        if self.snapshot.is_none() {
            self.snapshot = Some(ThemeSnapshot::capture(surface));
        }

        if let Err(e) = surface.set_atmosphere(false) {
            warn!(error = %e, "failed to disable atmosphere");
        }
        surface.ease_to(CameraTarget {
            bearing: Some(THEME_BEARING),
            pitch: Some(THEME_PITCH),
            duration_ms: CAMERA_ANIMATION_MS,
            ..CameraTarget::default()
        });
        surface.set_rotation_enabled(true);

        let applied = apply_rules(surface);

        if !surface.has_layer(EXTRUSION_LAYER_ID) {
            let label = overlay::first_label_layer(surface);
            if let Err(e) = surface.add_layer(extrusion_layer_spec(), label.as_deref()) {
                warn!(error = %e, "failed to add extrusion layer");
            }
        }
        overlay::reassert_order(surface);
        info!(applied, "theme applied");
    }
}

/// Write snapshot values back onto layers that still exist. Errs when the
/// live style no longer resembles the one captured.
fn restore_layers<S: MapSurface + ?Sized>(
    surface: &mut S,
    snapshot: &ThemeSnapshot,
) -> Result<usize, String> {
    if !surface.is_style_loaded() {
        return Err("style is not loaded".to_string());
    }
    let live = surface
        .layers()
        .iter()
        .filter(|layer| !is_overlay_layer(&layer.id))
        .count();
    let expected = snapshot.layers.len();
    if (live as f64) < expected as f64 * RESTORE_MIN_LAYER_RATIO {
        return Err(format!(
            "live style has {live} layers, snapshot has {expected}"
        ));
    }

    let mut restored = 0;
    for layer in &snapshot.layers {
        if !surface.has_layer(&layer.id) {
            continue;
        }
        for (key, value) in &layer.paint {
            try_set_paint(surface, &layer.id, key, value.clone());
        }
        for (key, value) in &layer.layout {
            try_set_layout(surface, &layer.id, key, value.clone());
        }
        restored += 1;
    }
    Ok(restored)
}
