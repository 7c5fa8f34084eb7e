pub const DEFAULT_EDGES_PATH: &str = "data/edges_table.json";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
/// Endpoints farther than this from the nearest graph node still attach, but
/// get logged.
pub const DEFAULT_ROUTE_ATTACH_MAX_M: f64 = 25.0;
/// Safest route cost is `length * (1 + penalty * risk)`.
pub const DEFAULT_RISK_PENALTY: f64 = 4.0;
pub const HEATMAP_CACHE_CONTROL: &str = "public, max-age=60";

pub fn edges_path() -> String {
    std::env::var("EDGES_PATH")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_EDGES_PATH.to_string())
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn route_attach_max_m() -> f64 {
    std::env::var("ROUTE_ATTACH_MAX_M")
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(DEFAULT_ROUTE_ATTACH_MAX_M)
}

pub fn risk_penalty() -> f64 {
    std::env::var("RISK_PENALTY")
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(DEFAULT_RISK_PENALTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        temp_env::with_vars_unset(
            ["EDGES_PATH", "SERVER_PORT", "ROUTE_ATTACH_MAX_M", "RISK_PENALTY"],
            || {
                assert_eq!(edges_path(), DEFAULT_EDGES_PATH);
                assert_eq!(server_port(), DEFAULT_SERVER_PORT);
                assert_eq!(route_attach_max_m(), DEFAULT_ROUTE_ATTACH_MAX_M);
                assert_eq!(risk_penalty(), DEFAULT_RISK_PENALTY);
            },
        );
    }

    #[test]
    fn invalid_values_fall_back() {
        temp_env::with_vars(
            [
                ("EDGES_PATH", Some("  ")),
                ("SERVER_PORT", Some("0")),
                ("ROUTE_ATTACH_MAX_M", Some("-5")),
                ("RISK_PENALTY", Some("NaN")),
            ],
            || {
                assert_eq!(edges_path(), DEFAULT_EDGES_PATH);
                assert_eq!(server_port(), DEFAULT_SERVER_PORT);
                assert_eq!(route_attach_max_m(), DEFAULT_ROUTE_ATTACH_MAX_M);
                assert_eq!(risk_penalty(), DEFAULT_RISK_PENALTY);
            },
        );
    }

    #[test]
    fn overrides_are_parsed() {
        temp_env::with_vars(
            [
                ("EDGES_PATH", Some("/srv/edges.json")),
                ("SERVER_PORT", Some("9100")),
                ("RISK_PENALTY", Some("2.5")),
            ],
            || {
                assert_eq!(edges_path(), "/srv/edges.json");
                assert_eq!(server_port(), 9100);
                assert_eq!(risk_penalty(), 2.5);
            },
        );
    }
}
