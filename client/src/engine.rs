//! Wires the overlay engine to the host surface's event stream.
//!
//! The host forwards surface events (`on_map_load`, `on_style_load`,
//! `on_zoom_end`) and either pumps `drain_commands` from its event loop or
//! awaits `run`. All state lives in [`EngineState`]; nothing is stashed on the
//! surface.

use std::sync::Arc;

use tracing::{debug, info};

use crate::commands::{self, Command, CommandQueue, Commands};
use crate::config::{CAMERA_ANIMATION_MS, EngineConfig, GEOLOCATE_ZOOM, MAX_ZOOM, MIN_ZOOM};
use crate::density::{HeatSampleCache, to_feature_collection};
use crate::geo::LngLat;
use crate::overlay::{self, HEAT_LAYER_ID, HEAT_SOURCE_ID, OverlayIntent};
use crate::routes::{self, RouteSet};
use crate::segments::{EdgeSource, RiskEdge, SegmentCache};
use crate::surface::{CameraTarget, MapSurface};
use crate::theme::ThemeController;

#[derive(Debug, Default)]
pub struct EngineState {
    pub overlays: OverlayIntent,
    pub heat_cache: HeatSampleCache,
    pub theme: ThemeController,
    pub edges: Option<Arc<[RiskEdge]>>,
    pub map_loaded: bool,
    pub torn_down: bool,
}

pub struct Engine<S: MapSurface> {
    surface: S,
    state: EngineState,
    config: EngineConfig,
    queue: CommandQueue,
}

impl<S: MapSurface> Engine<S> {
    pub fn new(surface: S, config: EngineConfig) -> (Self, Commands) {
        let (commands, queue) = commands::channel();
        let mut state = EngineState::default();
        state.overlays.heat_visible = config.heat_on_start;
        let engine = Self {
            surface,
            state,
            config,
            queue,
        };
        (engine, commands)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Host-side access, e.g. to finish a style load or move the camera.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn on_map_load(&mut self) {
        if self.state.torn_down {
            return;
        }
        self.state.map_loaded = true;
        overlay::recreate_all(&mut self.surface, &self.state.overlays);
        // Style loads that fired before this were skipped; a theme requested
        // during them is still pending.
        if self.surface.is_style_loaded() {
            self.state.theme.on_style_load(&mut self.surface);
        }
        self.refresh_heat();
    }

    /// A style document finished loading; every overlay it wiped is rebuilt.
    pub fn on_style_load(&mut self) {
        if self.state.torn_down || !self.state.map_loaded {
            return;
        }
        if self.state.theme.take_fallback() {
            info!("default style reloaded, rebuilding overlays");
        }
        overlay::recreate_all(&mut self.surface, &self.state.overlays);
        self.state.theme.on_style_load(&mut self.surface);
        self.refresh_heat();
    }

    pub fn on_zoom_end(&mut self) {
        if self.state.torn_down {
            return;
        }
        self.refresh_heat();
    }

    pub fn on_edges_loaded(&mut self, edges: Arc<[RiskEdge]>) {
        if self.state.torn_down {
            return;
        }
        info!(count = edges.len(), "risk edges ready");
        self.state.edges = Some(edges);
        self.state.heat_cache.invalidate();
        self.refresh_heat();
    }

    pub async fn load_edges<E>(&mut self, cache: &SegmentCache, source: &E)
    where
        E: EdgeSource + ?Sized,
    {
        let edges = cache.load(source).await;
        self.on_edges_loaded(edges);
    }

    /// Resample only when heat is showing and the zoom bucket moved since the
    /// last render.
    fn refresh_heat(&mut self) {
        if !self.state.map_loaded || !self.state.overlays.heat_visible {
            return;
        }
        let Some(edges) = self.state.edges.as_deref() else {
            return;
        };
        let zoom = self.surface.camera().zoom;
        let Some(points) = self.state.heat_cache.refresh(edges, zoom) else {
            return;
        };
        debug!(zoom, points = points.len(), "heat resampled");
        let data = to_feature_collection(&points);
        overlay::write_source(&mut self.surface, HEAT_SOURCE_ID, data.clone());
        self.state.overlays.heat_data = Some(data);
    }

    pub fn handle(&mut self, command: Command) {
        if self.state.torn_down {
            return;
        }
        debug!(command = command.name(), "handling command");
        match command {
            Command::ToggleHeat => self.toggle_heat(),
            Command::ToggleTheme { enabled: true } => self.state.theme.activate(&mut self.surface),
            Command::ToggleTheme { enabled: false } => self
                .state
                .theme
                .deactivate(&mut self.surface, &self.config.default_style_url),
            Command::DrawRoutes(detail) => routes::apply_route_set(
                &mut self.surface,
                &mut self.state.overlays,
                RouteSet::from(detail),
            ),
            Command::SetDestination(at) => routes::set_destination(&mut self.surface, at.into()),
            Command::FitRoutePoints(points) => routes::fit_route_points(
                &mut self.surface,
                points.origin.into(),
                points.destination.into(),
            ),
            Command::ZoomIn => self.zoom_by(1.0),
            Command::ZoomOut => self.zoom_by(-1.0),
            Command::Geolocate(center) => self.geolocate(center.map(LngLat::from)),
        }
    }

    fn toggle_heat(&mut self) {
        let visible = !self.state.overlays.heat_visible;
        self.state.overlays.heat_visible = visible;
        if self.surface.has_layer(HEAT_LAYER_ID) {
            overlay::set_visibility(&mut self.surface, HEAT_LAYER_ID, visible);
        }
        if visible {
            self.refresh_heat();
        }
    }

    fn zoom_by(&mut self, delta: f64) {
        let zoom = (self.surface.camera().zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        self.surface.ease_to(CameraTarget {
            zoom: Some(zoom),
            duration_ms: CAMERA_ANIMATION_MS,
            ..CameraTarget::default()
        });
    }

    fn geolocate(&mut self, center: Option<LngLat>) {
        let Some(center) = center.filter(|c| c.is_valid()) else {
            debug!("geolocate without a usable position");
            return;
        };
        self.surface.ease_to(CameraTarget {
            center: Some(center),
            zoom: Some(GEOLOCATE_ZOOM),
            duration_ms: CAMERA_ANIMATION_MS,
            ..CameraTarget::default()
        });
    }

    /// Handle everything queued so far without waiting.
    pub fn drain_commands(&mut self) -> usize {
        let mut handled = 0;
        while let Some(command) = self.queue.try_next() {
            self.handle(command);
            handled += 1;
        }
        handled
    }

    /// Handle commands until every `Commands` handle is dropped or the
    /// engine is torn down.
    pub async fn run(&mut self) {
        while !self.state.torn_down {
            let Some(command) = self.queue.next().await else {
                break;
            };
            self.handle(command);
        }
    }

    /// Stop listening. Queued and future commands are dropped.
    pub fn teardown(&mut self) {
        if self.state.torn_down {
            return;
        }
        self.state.torn_down = true;
        let dropped = self.queue.close();
        info!(dropped, "overlay engine torn down");
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use safestreets_shared::{
        DrawRoutesDetail, GeoJson, HeatmapEdge, LngLatDetail, RouteKind,
    };
    use serde_json::json;

    use super::*;
    use crate::config::THEME_PITCH;
    use crate::density::ZoomBucket;
    use crate::overlay::is_overlay_layer;
    use crate::routes::DESTINATION_MARKER_ID;
    use crate::segments::ingest;
    use crate::surface::memory::fixtures::{dark_style, streets_style};
    use crate::surface::{Camera, MemorySurface};
    use crate::theme::{EXTRUSION_LAYER_ID, ThemeState};

    const DEFAULT_URL: &str = "test://default";

    fn scenario_edges() -> Arc<[RiskEdge]> {
        let wire = [HeatmapEdge {
            from: [40.0, -73.0],
            to: [40.01, -73.0],
            risk_score: 0.5,
        }];
        Arc::from(ingest(&wire))
    }

    fn engine(heat_on_start: bool) -> (Engine<MemorySurface>, Commands) {
        let mut surface = MemorySurface::new(streets_style());
        surface.register_style(DEFAULT_URL, streets_style());
        let config = EngineConfig {
            heat_on_start,
            default_style_url: DEFAULT_URL.to_string(),
        };
        let (mut engine, commands) = Engine::new(surface, config);
        engine.on_map_load();
        (engine, commands)
    }

    fn set_zoom(engine: &mut Engine<MemorySurface>, zoom: f64) {
        let camera = engine.surface().camera();
        engine.surface_mut().set_camera(Camera { zoom, ..camera });
        engine.on_zoom_end();
    }

    fn heat_point_count(engine: &Engine<MemorySurface>) -> usize {
        match engine.surface().source_data(HEAT_SOURCE_ID) {
            Some(GeoJson::FeatureCollection { features }) => features.len(),
            _ => 0,
        }
    }

    fn overlay_ids(surface: &MemorySurface) -> Vec<String> {
        let mut ids: Vec<String> = surface
            .layer_ids()
            .into_iter()
            .filter(|id| is_overlay_layer(id))
            .map(str::to_string)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn toggle_heat_twice_resamples_at_most_once() {
        let (mut engine, commands) = engine(false);
        engine.on_edges_loaded(scenario_edges());
        assert_eq!(engine.state().heat_cache.samples_computed(), 0);

        commands.toggle_heat();
        commands.toggle_heat();
        assert_eq!(engine.drain_commands(), 2);

        assert!(!engine.state().overlays.heat_visible);
        assert_eq!(engine.surface().layer_visible(HEAT_LAYER_ID), Some(false));
        assert!(engine.state().heat_cache.samples_computed() <= 1);
    }

    #[test]
    fn toggle_heat_twice_from_visible_does_not_resample() {
        let (mut engine, commands) = engine(true);
        engine.on_edges_loaded(scenario_edges());
        assert_eq!(engine.state().heat_cache.samples_computed(), 1);

        commands.toggle_heat();
        commands.toggle_heat();
        engine.drain_commands();

        assert_eq!(engine.surface().layer_visible(HEAT_LAYER_ID), Some(true));
        assert_eq!(engine.state().heat_cache.samples_computed(), 1);
    }

    #[test]
    fn zoom_end_resamples_only_on_bucket_change() {
        let (mut engine, _commands) = engine(true);
        engine.on_edges_loaded(scenario_edges());

        set_zoom(&mut engine, 16.2);
        assert_eq!(engine.state().heat_cache.last_rendered(), Some(ZoomBucket::Street));
        assert_eq!(heat_point_count(&engine), 138);
        set_zoom(&mut engine, 16.9);
        assert_eq!(engine.state().heat_cache.samples_computed(), 2);

        set_zoom(&mut engine, 8.0);
        assert_eq!(heat_point_count(&engine), 1);
        set_zoom(&mut engine, 16.5);
        assert_eq!(engine.state().heat_cache.samples_computed(), 3);
        assert_eq!(heat_point_count(&engine), 138);
    }

    #[test]
    fn style_swap_keeps_overlays_and_heat_data() {
        let (mut engine, commands) = engine(true);
        engine.on_edges_loaded(scenario_edges());
        commands.toggle_heat();
        engine.drain_commands();
        let before = overlay_ids(engine.surface());

        engine.surface_mut().replace_style(dark_style());
        engine.on_style_load();

        assert_eq!(overlay_ids(engine.surface()), before);
        assert_eq!(engine.surface().layer_visible(HEAT_LAYER_ID), Some(false));
        assert_eq!(
            engine.surface().source_data(HEAT_SOURCE_ID),
            engine.state().overlays.heat_data.as_ref()
        );
        let ids = engine.surface().layer_ids();
        let heat = ids.iter().position(|id| *id == HEAT_LAYER_ID);
        let label = ids.iter().position(|id| *id == "place-label");
        assert_eq!(heat.map(|i| i + 1), label);
    }

    #[test]
    fn draw_routes_scenario() {
        let (mut engine, commands) = engine(true);
        let command: Command = serde_json::from_value(json!({
            "type": "draw-routes",
            "detail": {
                "active": "safest",
                "safest": {"type": "LineString", "coordinates": [[-73.99, 40.75], [-73.98, 40.76]]}
            }
        }))
        .expect("command parses");
        commands.send(command);
        engine.drain_commands();

        let (bounds, _) = engine.surface().last_fit().expect("camera fitted");
        assert_eq!(bounds.to_array(), [[-73.99, 40.75], [-73.98, 40.76]]);
        assert_eq!(
            engine.surface().marker(DESTINATION_MARKER_ID),
            Some(LngLat::new(-73.98, 40.76))
        );
        assert!(engine.state().overlays.routes.has_geometry(RouteKind::Safest));
    }

    #[test]
    fn routes_survive_style_swap() {
        let (mut engine, commands) = engine(true);
        commands.draw_routes(DrawRoutesDetail {
            fastest: Some(GeoJson::line_string(vec![[-73.99, 40.75], [-73.98, 40.76]])),
            active: Some(RouteKind::Fastest),
            ..DrawRoutesDetail::default()
        });
        engine.drain_commands();

        engine.surface_mut().replace_style(dark_style());
        engine.on_style_load();

        let source = engine
            .surface()
            .source_data(overlay::route_source_id(RouteKind::Fastest));
        assert_eq!(source, engine.state().overlays.routes.fastest.as_ref());
        assert_eq!(
            engine
                .surface()
                .layer_visible(overlay::route_layer_id(RouteKind::Fastest)),
            Some(true)
        );
    }

    #[test]
    fn theme_fallback_rebuilds_overlays_once_default_loads() {
        let (mut engine, commands) = engine(true);
        commands.toggle_theme(true);
        engine.drain_commands();
        assert_eq!(engine.state().theme.state(), ThemeState::On);

        // The host swaps in a much smaller basemap while the theme is on.
        engine.surface_mut().replace_style(dark_style());
        engine.on_style_load();
        commands.toggle_theme(false);
        engine.drain_commands();

        assert_eq!(engine.surface().requested_styles(), [DEFAULT_URL.to_string()]);
        assert!(!engine.surface().is_style_loaded());

        engine.surface_mut().finish_style_load();
        engine.on_style_load();

        let ids = overlay_ids(engine.surface());
        let mut unique = ids.clone();
        unique.dedup();
        assert_eq!(ids, unique);
        assert_eq!(ids.len(), 4);
        assert!(!engine.surface().has_layer(EXTRUSION_LAYER_ID));
        assert_eq!(engine.state().theme.state(), ThemeState::Off);
    }

    #[test]
    fn theme_requested_before_map_load_applies_on_map_load() {
        let mut surface = MemorySurface::new(streets_style());
        surface.register_style(DEFAULT_URL, streets_style());
        surface.load_style(DEFAULT_URL);
        let config = EngineConfig {
            heat_on_start: true,
            default_style_url: DEFAULT_URL.to_string(),
        };
        let (mut engine, commands) = Engine::new(surface, config);

        commands.toggle_theme(true);
        engine.drain_commands();
        assert!(engine.state().theme.is_patch_pending());

        engine.surface_mut().finish_style_load();
        engine.on_style_load();
        assert!(!engine.surface().has_layer(EXTRUSION_LAYER_ID));

        engine.on_map_load();

        assert_eq!(engine.state().theme.state(), ThemeState::On);
        assert!(!engine.state().theme.is_patch_pending());
        assert!(engine.surface().has_layer(EXTRUSION_LAYER_ID));
        assert_eq!(engine.surface().camera().pitch, THEME_PITCH);
        assert!(engine.surface().has_layer(HEAT_LAYER_ID));
    }

    #[test]
    fn camera_commands_clamp_and_geolocate() {
        let (mut engine, commands) = engine(true);
        set_zoom(&mut engine, MAX_ZOOM);
        commands.zoom_in();
        engine.drain_commands();
        assert_eq!(engine.surface().camera().zoom, MAX_ZOOM);

        commands.zoom_out();
        engine.drain_commands();
        assert_eq!(engine.surface().camera().zoom, MAX_ZOOM - 1.0);

        commands.geolocate(None);
        engine.drain_commands();
        assert_eq!(engine.surface().camera().zoom, MAX_ZOOM - 1.0);

        commands.geolocate(Some(LngLatDetail {
            lng: -73.97,
            lat: 40.78,
        }));
        engine.drain_commands();
        let camera = engine.surface().camera();
        assert_eq!(camera.center, LngLat::new(-73.97, 40.78));
        assert_eq!(camera.zoom, GEOLOCATE_ZOOM);
    }

    #[test]
    fn teardown_stops_all_handling() {
        let (mut engine, commands) = engine(true);
        commands.zoom_in();
        engine.teardown();

        commands.zoom_in();
        assert!(commands.is_closed());
        assert_eq!(engine.drain_commands(), 0);
        engine.handle(Command::ZoomIn);
        assert_eq!(engine.surface().camera().zoom, Camera::default().zoom);
    }

    struct StaticEdges;

    impl EdgeSource for StaticEdges {
        fn fetch_edges(&self) -> BoxFuture<'_, Result<Vec<HeatmapEdge>, String>> {
            async {
                Ok(vec![HeatmapEdge {
                    from: [40.0, -73.0],
                    to: [40.01, -73.0],
                    risk_score: 0.5,
                }])
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn loaded_edges_reach_the_heat_source() {
        let (mut engine, _commands) = engine(true);
        let cache = SegmentCache::new();

        engine.load_edges(&cache, &StaticEdges).await;

        assert_eq!(engine.state().edges.as_ref().map(|e| e.len()), Some(1));
        // Default camera sits in the 12-13 band: 60 m spacing.
        assert_eq!(heat_point_count(&engine), 18);
    }

    #[tokio::test]
    async fn run_exits_when_handles_drop() {
        let (mut engine, commands) = engine(true);
        commands.zoom_in();
        drop(commands);

        engine.run().await;

        assert_eq!(engine.surface().camera().zoom, Camera::default().zoom + 1.0);
    }
}
