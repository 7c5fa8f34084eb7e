use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STYLE_URL: &str = "mapbox://styles/mapbox/standard";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;

// Heat sampling: linear spacing (meters) per zoom bucket, finest first.
pub const SPACING_Z16_M: f64 = 8.0;
pub const SPACING_Z15_M: f64 = 15.0;
pub const SPACING_Z14_M: f64 = 30.0;
pub const SPACING_Z12_M: f64 = 60.0;
pub const SPACING_Z10_M: f64 = 120.0;

// Camera
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;
pub const ROUTE_FIT_PADDING_PX: f64 = 60.0;
pub const ROUTE_FIT_MAX_ZOOM: f64 = 16.0;
pub const POINTS_FIT_MAX_ZOOM: f64 = 14.0;
pub const GEOLOCATE_ZOOM: f64 = 15.0;
pub const CAMERA_ANIMATION_MS: u32 = 1200;

// Theme
pub const THEME_PITCH: f64 = 60.0;
pub const THEME_BEARING: f64 = -17.6;
pub const TALL_BUILDING_HEIGHT_M: f64 = 120.0;
pub const EXTRUSION_MIN_ZOOM: f64 = 14.0;
/// A live style with fewer base layers than this fraction of the snapshot is
/// treated as a different document.
pub const RESTORE_MIN_LAYER_RATIO: f64 = 0.5;

pub fn api_url() -> String {
    std::env::var("SAFESTREETS_API_URL")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

pub fn default_style_url() -> String {
    std::env::var("SAFESTREETS_DEFAULT_STYLE")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_STYLE_URL.to_string())
}

pub fn heat_on_start() -> bool {
    std::env::var("SAFESTREETS_HEAT_ON_START")
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(true)
}

pub fn http_timeout() -> Duration {
    std::env::var("SAFESTREETS_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
}

pub fn connect_timeout() -> Duration {
    std::env::var("SAFESTREETS_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
}

/// Settings the engine reads once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub heat_on_start: bool,
    pub default_style_url: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            heat_on_start: heat_on_start(),
            default_style_url: default_style_url(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heat_on_start: true,
            default_style_url: DEFAULT_STYLE_URL.to_string(),
        }
    }
}
