pub mod events;
pub mod geometry;
pub mod heatmap;
pub mod route;

pub use events::*;
pub use geometry::{GeoJson, Position};
pub use heatmap::HeatmapEdge;
pub use route::{RouteKind, RouteRequest, RouteResponse};
