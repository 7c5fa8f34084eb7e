//! Custom sources and layers the engine keeps alive on top of any basemap:
//! the risk heatmap and the three route lines.
//!
//! Creation is idempotent. An existing layer still gets its paint and
//! visibility re-applied, since the renderer may have reverted them.

use safestreets_shared::{GeoJson, RouteKind};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::routes::RouteSet;
use crate::style::{LayerKind, LayerSpec, SourceSpec};
use crate::surface::MapSurface;
use crate::theme::EXTRUSION_LAYER_ID;

pub const HEAT_SOURCE_ID: &str = "risk-heat";
pub const HEAT_LAYER_ID: &str = "risk-heat-layer";

/// Heat ramp over `heatmap-density`, cold blue to hot red.
const HEAT_STOPS: &[(f64, &str)] = &[
    (0.0, "rgba(30, 80, 220, 0)"),
    (0.25, "rgb(40, 200, 240)"),
    (0.5, "rgb(245, 220, 70)"),
    (0.75, "rgb(245, 140, 50)"),
    (1.0, "rgb(220, 40, 35)"),
];

pub fn route_source_id(kind: RouteKind) -> &'static str {
    match kind {
        RouteKind::Fastest => "route-fastest",
        RouteKind::Safest => "route-safest",
        RouteKind::Weighted => "route-weighted",
    }
}

pub fn route_layer_id(kind: RouteKind) -> &'static str {
    match kind {
        RouteKind::Fastest => "route-fastest-line",
        RouteKind::Safest => "route-safest-line",
        RouteKind::Weighted => "route-weighted-line",
    }
}

fn route_color(kind: RouteKind) -> &'static str {
    match kind {
        RouteKind::Fastest => "#3b82f6",
        RouteKind::Safest => "#22c55e",
        RouteKind::Weighted => "#f59e0b",
    }
}

/// Layers owned by the engine rather than the basemap.
pub fn is_overlay_layer(id: &str) -> bool {
    id == HEAT_LAYER_ID
        || id == EXTRUSION_LAYER_ID
        || RouteKind::ALL
            .iter()
            .any(|kind| route_layer_id(*kind) == id)
}

/// What the engine wants on the surface, independent of the current style
/// document. Reasserted after every style replacement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayIntent {
    pub heat_visible: bool,
    /// Last heat payload written, reused when the style is swapped.
    pub heat_data: Option<GeoJson>,
    pub routes: RouteSet,
}

fn visibility_value(visible: bool) -> Value {
    Value::from(if visible { "visible" } else { "none" })
}

pub fn heat_layer_spec(visible: bool) -> LayerSpec {
    let mut color = vec![json!("interpolate"), json!(["linear"]), json!(["heatmap-density"])];
    for (stop, rgb) in HEAT_STOPS {
        color.push(json!(stop));
        color.push(json!(rgb));
    }

    LayerSpec::new(HEAT_LAYER_ID, LayerKind::Heatmap)
        .source(HEAT_SOURCE_ID)
        .paint("heatmap-weight", json!(["get", "weight"]))
        .paint(
            "heatmap-intensity",
            json!(["interpolate", ["linear"], ["zoom"], 10, 0.6, 16, 1.4]),
        )
        .paint(
            "heatmap-radius",
            json!(["interpolate", ["linear"], ["zoom"], 10, 6, 16, 18]),
        )
        .paint("heatmap-color", Value::Array(color))
        .paint("heatmap-opacity", json!(0.85))
        .layout("visibility", visibility_value(visible))
}

pub fn route_layer_spec(kind: RouteKind, visible: bool, active: bool) -> LayerSpec {
    LayerSpec::new(route_layer_id(kind), LayerKind::Line)
        .source(route_source_id(kind))
        .paint("line-color", json!(route_color(kind)))
        .paint("line-width", json!(if active { 6.0 } else { 4.0 }))
        .paint("line-opacity", json!(if active { 0.95 } else { 0.55 }))
        .layout("line-join", json!("round"))
        .layout("line-cap", json!("round"))
        .layout("visibility", visibility_value(visible))
}

/// Set one paint property, logging instead of failing.
pub fn try_set_paint<S: MapSurface + ?Sized>(
    surface: &mut S,
    layer: &str,
    key: &str,
    value: Value,
) -> bool {
    match surface.set_paint_property(layer, key, value) {
        Ok(()) => true,
        Err(e) => {
            warn!(layer, key, error = %e, "paint property not applied");
            false
        }
    }
}

/// Set one layout property, logging instead of failing.
pub fn try_set_layout<S: MapSurface + ?Sized>(
    surface: &mut S,
    layer: &str,
    key: &str,
    value: Value,
) -> bool {
    match surface.set_layout_property(layer, key, value) {
        Ok(()) => true,
        Err(e) => {
            warn!(layer, key, error = %e, "layout property not applied");
            false
        }
    }
}

/// Add an empty GeoJSON source unless one with this id already exists.
pub fn ensure_source<S: MapSurface + ?Sized>(surface: &mut S, id: &str) {
    if surface.has_source(id) {
        return;
    }
    let source = SourceSpec::Geojson {
        data: GeoJson::empty_collection(),
    };
    if let Err(e) = surface.add_source(id, source) {
        warn!(source = id, error = %e, "failed to add overlay source");
    }
}

pub fn write_source<S: MapSurface + ?Sized>(surface: &mut S, id: &str, data: GeoJson) {
    ensure_source(surface, id);
    if let Err(e) = surface.set_source_data(id, data) {
        warn!(source = id, error = %e, "failed to update overlay source");
    }
}

/// Add `layer` (below `before`, or on top) if missing; otherwise re-apply
/// its paint and layout over the existing layer.
pub fn ensure_layer<S: MapSurface + ?Sized>(
    surface: &mut S,
    layer: &LayerSpec,
    before: Option<&str>,
) {
    if !surface.has_layer(&layer.id) {
        if let Err(e) = surface.add_layer(layer.clone(), before) {
            warn!(layer = %layer.id, error = %e, "failed to add overlay layer");
        }
        return;
    }
    for (key, value) in &layer.paint {
        try_set_paint(surface, &layer.id, key, value.clone());
    }
    for (key, value) in &layer.layout {
        try_set_layout(surface, &layer.id, key, value.clone());
    }
}

pub fn set_visibility<S: MapSurface + ?Sized>(surface: &mut S, id: &str, visible: bool) {
    try_set_layout(surface, id, "visibility", visibility_value(visible));
}

/// First basemap symbol layer, bottom to top.
pub fn first_label_layer<S: MapSurface + ?Sized>(surface: &S) -> Option<String> {
    surface
        .layers()
        .into_iter()
        .find(|layer| layer.kind == LayerKind::Symbol && !is_overlay_layer(&layer.id))
        .map(|layer| layer.id)
}

/// Keep the heatmap directly beneath the first label layer of the current
/// style: above roads and buildings, below text.
pub fn reassert_order<S: MapSurface + ?Sized>(surface: &mut S) {
    if !surface.has_layer(HEAT_LAYER_ID) {
        return;
    }
    let Some(label) = first_label_layer(surface) else {
        debug!("style has no label layer, leaving heat layer in place");
        return;
    };
    if let Err(e) = surface.move_layer(HEAT_LAYER_ID, Some(&label)) {
        warn!(error = %e, anchor = %label, "failed to reorder heat layer");
    }
}

/// Rebuild every overlay from `intent`. Safe to call on a surface that
/// already has them.
pub fn recreate_all<S: MapSurface + ?Sized>(surface: &mut S, intent: &OverlayIntent) {
    let heat_data = intent
        .heat_data
        .clone()
        .unwrap_or_else(GeoJson::empty_collection);
    write_source(surface, HEAT_SOURCE_ID, heat_data);
    let label = first_label_layer(surface);
    ensure_layer(surface, &heat_layer_spec(intent.heat_visible), label.as_deref());

    sync_routes(surface, &intent.routes);
    reassert_order(surface);
}

/// Write all three route sources and their layers. Kinds without geometry
/// get an empty source and a hidden layer.
pub fn sync_routes<S: MapSurface + ?Sized>(surface: &mut S, routes: &RouteSet) {
    for kind in RouteKind::ALL {
        let data = routes
            .geometry(kind)
            .cloned()
            .unwrap_or_else(GeoJson::empty_collection);
        write_source(surface, route_source_id(kind), data);
        let spec = route_layer_spec(kind, routes.has_geometry(kind), routes.active == kind);
        ensure_layer(surface, &spec, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use crate::surface::memory::fixtures::{dark_style, streets_style};

    fn overlay_ids(surface: &MemorySurface) -> Vec<String> {
        surface
            .layer_ids()
            .into_iter()
            .filter(|id| is_overlay_layer(id))
            .map(str::to_string)
            .collect()
    }

    fn position(surface: &MemorySurface, id: &str) -> usize {
        surface.style().position(id).unwrap_or(usize::MAX)
    }

    #[test]
    fn heat_layer_sits_directly_below_first_label() {
        let mut surface = MemorySurface::new(streets_style());
        recreate_all(
            &mut surface,
            &OverlayIntent {
                heat_visible: true,
                ..OverlayIntent::default()
            },
        );
        assert_eq!(
            position(&surface, HEAT_LAYER_ID) + 1,
            position(&surface, "road-label")
        );
    }

    #[test]
    fn recreate_all_is_idempotent() {
        let mut surface = MemorySurface::new(streets_style());
        let intent = OverlayIntent {
            heat_visible: true,
            ..OverlayIntent::default()
        };
        recreate_all(&mut surface, &intent);
        let first = surface.layer_ids().len();
        recreate_all(&mut surface, &intent);
        recreate_all(&mut surface, &intent);
        assert_eq!(surface.layer_ids().len(), first);
        assert_eq!(overlay_ids(&surface).len(), 4);
    }

    #[test]
    fn ensure_layer_reapplies_reverted_paint() {
        let mut surface = MemorySurface::new(streets_style());
        recreate_all(&mut surface, &OverlayIntent::default());
        surface
            .set_paint_property(HEAT_LAYER_ID, "heatmap-opacity", json!(0.1))
            .expect("set opacity");

        ensure_layer(&mut surface, &heat_layer_spec(false), None);
        let layer = surface.layer(HEAT_LAYER_ID).expect("heat layer");
        assert_eq!(layer.paint.get("heatmap-opacity"), Some(&json!(0.85)));
    }

    #[test]
    fn ensure_layer_keeps_going_past_a_rejected_property() {
        let mut surface = MemorySurface::new(streets_style());
        recreate_all(&mut surface, &OverlayIntent::default());
        let id = route_layer_id(RouteKind::Safest);

        let spec = LayerSpec::new(id, LayerKind::Line)
            .paint("fill-color", json!("#ff0000"))
            .paint("line-color", json!("#00ff00"))
            .paint("line-width", json!(9.0))
            .layout("fill-sort-key", json!(1))
            .layout("line-cap", json!("butt"));
        ensure_layer(&mut surface, &spec, None);

        let layer = surface.layer(id).expect("route layer");
        assert_eq!(layer.paint.get("fill-color"), None);
        assert_eq!(layer.paint.get("line-color"), Some(&json!("#00ff00")));
        assert_eq!(layer.paint.get("line-width"), Some(&json!(9.0)));
        assert_eq!(layer.layout.get("fill-sort-key"), None);
        assert_eq!(layer.layout.get("line-cap"), Some(&json!("butt")));
    }

    #[test]
    fn style_replacement_restores_ids_and_visibility() {
        let mut surface = MemorySurface::new(streets_style());
        let mut intent = OverlayIntent {
            heat_visible: false,
            ..OverlayIntent::default()
        };
        intent.routes.safest = Some(GeoJson::line_string(vec![
            [-73.99, 40.75],
            [-73.98, 40.76],
        ]));
        recreate_all(&mut surface, &intent);
        let before_ids = overlay_ids(&surface);
        let before_visibility: Vec<Option<bool>> = before_ids
            .iter()
            .map(|id| surface.layer_visible(id))
            .collect();

        surface.replace_style(dark_style());
        assert!(overlay_ids(&surface).is_empty());

        recreate_all(&mut surface, &intent);
        let mut after_ids = overlay_ids(&surface);
        let mut expected = before_ids.clone();
        after_ids.sort();
        expected.sort();
        assert_eq!(after_ids, expected);
        let after_visibility: Vec<Option<bool>> = before_ids
            .iter()
            .map(|id| surface.layer_visible(id))
            .collect();
        assert_eq!(after_visibility, before_visibility);
        assert_eq!(surface.layer_visible(HEAT_LAYER_ID), Some(false));
        assert_eq!(
            surface.layer_visible(route_layer_id(RouteKind::Safest)),
            Some(true)
        );
        assert_eq!(
            position(&surface, HEAT_LAYER_ID) + 1,
            position(&surface, "place-label")
        );
    }

    #[test]
    fn reassert_order_follows_the_new_first_label() {
        let mut surface = MemorySurface::new(streets_style());
        recreate_all(&mut surface, &OverlayIntent::default());
        surface
            .move_layer("poi-label", Some("land"))
            .expect("reorder labels");

        reassert_order(&mut surface);
        assert_eq!(
            position(&surface, HEAT_LAYER_ID) + 1,
            position(&surface, "poi-label")
        );
    }

    #[test]
    fn set_visibility_toggles_layout() {
        let mut surface = MemorySurface::new(streets_style());
        recreate_all(
            &mut surface,
            &OverlayIntent {
                heat_visible: true,
                ..OverlayIntent::default()
            },
        );
        set_visibility(&mut surface, HEAT_LAYER_ID, false);
        assert_eq!(surface.layer_visible(HEAT_LAYER_ID), Some(false));
        // Missing layer: logged, not fatal.
        set_visibility(&mut surface, "not-there", true);
    }

    #[test]
    fn active_route_is_emphasized() {
        let spec = route_layer_spec(RouteKind::Fastest, true, true);
        assert_eq!(spec.paint.get("line-width"), Some(&json!(6.0)));
        let spec = route_layer_spec(RouteKind::Fastest, true, false);
        assert_eq!(spec.paint.get("line-opacity"), Some(&json!(0.55)));
    }
}
