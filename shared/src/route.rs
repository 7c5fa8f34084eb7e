use serde::{Deserialize, Serialize};

/// The three alternative routes the backend computes for one trip.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Fastest,
    #[default]
    Safest,
    Weighted,
}

impl RouteKind {
    pub const ALL: [RouteKind; 3] = [RouteKind::Fastest, RouteKind::Safest, RouteKind::Weighted];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Fastest => "fastest",
            RouteKind::Safest => "safest",
            RouteKind::Weighted => "weighted",
        }
    }
}

/// Body of `POST /route`. Both points are `[lat, lon]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub from: [f64; 2],
    pub to: [f64; 2],
}

/// Named path arrays of `[lat, lon]` pairs. A kind is `None` when the backend
/// could not connect the two points under that cost model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub fastest: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub safest: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub weighted: Option<Vec<[f64; 2]>>,
}

impl RouteResponse {
    pub fn path(&self, kind: RouteKind) -> Option<&[[f64; 2]]> {
        match kind {
            RouteKind::Fastest => self.fastest.as_deref(),
            RouteKind::Safest => self.safest.as_deref(),
            RouteKind::Weighted => self.weighted.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        RouteKind::ALL
            .iter()
            .all(|kind| self.path(*kind).is_none_or(|path| path.is_empty()))
    }
}
