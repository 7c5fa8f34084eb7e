use safestreets_shared::{DrawRoutesDetail, GeoJson, RouteKind};
use tracing::debug;

use crate::config::{
    CAMERA_ANIMATION_MS, POINTS_FIT_MAX_ZOOM, ROUTE_FIT_MAX_ZOOM, ROUTE_FIT_PADDING_PX,
};
use crate::geo::{LngLat, LngLatBounds};
use crate::overlay::{self, OverlayIntent};
use crate::surface::{FitOptions, MapSurface};

/// The single persistent marker for the trip's destination / route end.
pub const DESTINATION_MARKER_ID: &str = "destination";

/// Three independently optional route geometries plus the one in focus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSet {
    pub fastest: Option<GeoJson>,
    pub safest: Option<GeoJson>,
    pub weighted: Option<GeoJson>,
    pub active: RouteKind,
}

impl RouteSet {
    pub fn geometry(&self, kind: RouteKind) -> Option<&GeoJson> {
        match kind {
            RouteKind::Fastest => self.fastest.as_ref(),
            RouteKind::Safest => self.safest.as_ref(),
            RouteKind::Weighted => self.weighted.as_ref(),
        }
    }

    pub fn set_geometry(&mut self, kind: RouteKind, geometry: Option<GeoJson>) {
        match kind {
            RouteKind::Fastest => self.fastest = geometry,
            RouteKind::Safest => self.safest = geometry,
            RouteKind::Weighted => self.weighted = geometry,
        }
    }

    /// True when the kind has at least one usable vertex.
    pub fn has_geometry(&self, kind: RouteKind) -> bool {
        self.geometry(kind)
            .is_some_and(|geometry| segments(geometry).iter().any(|part| !part.is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        !RouteKind::ALL.iter().any(|kind| self.has_geometry(*kind))
    }

    pub fn active_geometry(&self) -> Option<&GeoJson> {
        self.geometry(self.active)
    }
}

impl From<DrawRoutesDetail> for RouteSet {
    fn from(detail: DrawRoutesDetail) -> Self {
        Self {
            fastest: detail.fastest,
            safest: detail.safest,
            weighted: detail.weighted,
            active: detail.active.unwrap_or_default(),
        }
    }
}

/// Line parts with their valid vertices, in document order. Works for bare
/// LineString/MultiLineString and for Feature/FeatureCollection wrappers.
pub fn segments(geometry: &GeoJson) -> Vec<Vec<LngLat>> {
    geometry
        .line_parts()
        .into_iter()
        .map(|part| {
            part.iter()
                .filter_map(|position| LngLat::from_position(*position))
                .collect()
        })
        .collect()
}

pub fn route_bounds(parts: &[Vec<LngLat>]) -> Option<LngLatBounds> {
    LngLatBounds::from_points(parts.iter().flatten().copied())
}

/// Last vertex of the last non-empty part.
pub fn route_endpoint(parts: &[Vec<LngLat>]) -> Option<LngLat> {
    parts.iter().rev().find_map(|part| part.last().copied())
}

/// Draw the route set, then frame the active route and pin its end.
pub fn apply_route_set<S: MapSurface + ?Sized>(
    surface: &mut S,
    intent: &mut OverlayIntent,
    set: RouteSet,
) {
    if set.is_empty() {
        debug!("ignoring route set without geometry");
        return;
    }
    intent.routes = set;
    overlay::sync_routes(surface, &intent.routes);

    let Some(geometry) = intent.routes.active_geometry() else {
        debug!(active = intent.routes.active.as_str(), "active route has no geometry");
        return;
    };
    let parts = segments(geometry);
    let Some(bounds) = route_bounds(&parts) else {
        debug!(active = intent.routes.active.as_str(), "active route has no vertices");
        return;
    };
    surface.fit_bounds(
        bounds,
        FitOptions {
            padding: ROUTE_FIT_PADDING_PX,
            max_zoom: ROUTE_FIT_MAX_ZOOM,
            duration_ms: CAMERA_ANIMATION_MS,
        },
    );
    if let Some(end) = route_endpoint(&parts) {
        surface.set_marker(DESTINATION_MARKER_ID, end);
    }
}

/// Frame an origin and destination before any route geometry exists.
pub fn fit_route_points<S: MapSurface + ?Sized>(
    surface: &mut S,
    origin: LngLat,
    destination: LngLat,
) {
    if !origin.is_valid() || !destination.is_valid() {
        debug!("ignoring fit request with invalid points");
        return;
    }
    let bounds = LngLatBounds::from_points([origin, destination]);
    if let Some(bounds) = bounds {
        surface.fit_bounds(
            bounds,
            FitOptions {
                padding: ROUTE_FIT_PADDING_PX,
                max_zoom: POINTS_FIT_MAX_ZOOM,
                duration_ms: CAMERA_ANIMATION_MS,
            },
        );
    }
}

pub fn set_destination<S: MapSurface + ?Sized>(surface: &mut S, at: LngLat) {
    if !at.is_valid() {
        debug!(lng = at.lng, lat = at.lat, "ignoring invalid destination");
        return;
    }
    surface.set_marker(DESTINATION_MARKER_ID, at);
}
