//! Overlay synchronization engine for the SafeStreets map.
//!
//! Turns the backend's risk edges into zoom-appropriate heat points, keeps the
//! heat and route overlays alive across basemap reloads, and applies a
//! reversible night theme over whatever style the surface holds.

pub mod backend;
pub mod commands;
pub mod config;
pub mod density;
pub mod engine;
pub mod geo;
pub mod overlay;
pub mod routes;
pub mod segments;
pub mod style;
pub mod surface;
pub mod theme;

pub use backend::HttpBackend;
pub use commands::{Command, CommandQueue, Commands};
pub use config::EngineConfig;
pub use engine::{Engine, EngineState};
pub use geo::{LngLat, LngLatBounds};
pub use routes::RouteSet;
pub use segments::{EdgeSource, RiskEdge, SegmentCache};
pub use surface::{MapSurface, MemorySurface};
pub use theme::{ThemeController, ThemeState};
