use std::collections::HashMap;
use std::sync::Arc;

use safestreets_shared::GeoJson;
use serde_json::{Map, Value};

use crate::config::{SPACING_Z10_M, SPACING_Z12_M, SPACING_Z14_M, SPACING_Z15_M, SPACING_Z16_M};
use crate::geo::LngLat;
use crate::segments::RiskEdge;

/// Per-edge sample cap. Longer edges get wider spacing instead of more points.
const MAX_POINTS_PER_EDGE: usize = 4096;

/// Discrete zoom band that controls heat sampling density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZoomBucket {
    /// Below 10: one midpoint per edge.
    Far,
    Z10To11,
    Z12To13,
    Z14,
    Z15,
    /// 16 and above.
    Street,
}

impl ZoomBucket {
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom.is_nan() || zoom < 10.0 {
            ZoomBucket::Far
        } else if zoom < 12.0 {
            ZoomBucket::Z10To11
        } else if zoom < 14.0 {
            ZoomBucket::Z12To13
        } else if zoom < 15.0 {
            ZoomBucket::Z14
        } else if zoom < 16.0 {
            ZoomBucket::Z15
        } else {
            ZoomBucket::Street
        }
    }

    /// Point spacing along an edge, or `None` for the midpoint-only bucket.
    pub fn spacing_m(self) -> Option<f64> {
        match self {
            ZoomBucket::Far => None,
            ZoomBucket::Z10To11 => Some(SPACING_Z10_M),
            ZoomBucket::Z12To13 => Some(SPACING_Z12_M),
            ZoomBucket::Z14 => Some(SPACING_Z14_M),
            ZoomBucket::Z15 => Some(SPACING_Z15_M),
            ZoomBucket::Street => Some(SPACING_Z16_M),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPoint {
    pub coordinate: LngLat,
    pub weight: f64,
}

pub fn sample(edges: &[RiskEdge], zoom: f64) -> Vec<HeatPoint> {
    sample_bucket(edges, ZoomBucket::from_zoom(zoom))
}

/// Spread each edge's risk over evenly spaced interior points. Endpoints are
/// never emitted, so edges sharing a vertex do not double-weight it, and every
/// edge with a non-zero length contributes at least its midpoint. Output
/// follows input order.
pub fn sample_bucket(edges: &[RiskEdge], bucket: ZoomBucket) -> Vec<HeatPoint> {
    let mut points = Vec::with_capacity(edges.len());
    for edge in edges {
        if !edge.from.is_valid() || !edge.to.is_valid() {
            continue;
        }
        let distance = edge.from.haversine_m(edge.to);
        if distance.is_nan() || distance <= 0.0 {
            continue;
        }
        let weight = edge.risk.clamp(0.0, 1.0);

        let Some(spacing) = bucket.spacing_m() else {
            points.push(HeatPoint {
                coordinate: edge.from.lerp(edge.to, 0.5),
                weight,
            });
            continue;
        };

        let n = ((distance / spacing).floor() as usize).clamp(1, MAX_POINTS_PER_EDGE);
        let denom = (n + 1) as f64;
        points.extend((1..=n).map(|i| HeatPoint {
            coordinate: edge.from.lerp(edge.to, i as f64 / denom),
            weight,
        }));
    }
    points
}

/// Heat source payload: a point feature per sample carrying a `weight` property.
pub fn to_feature_collection(points: &[HeatPoint]) -> GeoJson {
    let features = points
        .iter()
        .map(|point| {
            let mut properties = Map::new();
            properties.insert("weight".to_string(), Value::from(point.weight));
            GeoJson::point_feature(point.coordinate.to_position(), properties)
        })
        .collect();
    GeoJson::FeatureCollection { features }
}

/// Memoized samples keyed by bucket. A resample is only produced when the
/// bucket differs from the one last handed out for rendering.
#[derive(Debug, Default)]
pub struct HeatSampleCache {
    by_bucket: HashMap<ZoomBucket, Arc<[HeatPoint]>>,
    last_rendered: Option<ZoomBucket>,
    samples_computed: usize,
}

impl HeatSampleCache {
    pub fn refresh(&mut self, edges: &[RiskEdge], zoom: f64) -> Option<Arc<[HeatPoint]>> {
        let bucket = ZoomBucket::from_zoom(zoom);
        if self.last_rendered == Some(bucket) {
            return None;
        }
        let points = match self.by_bucket.get(&bucket) {
            Some(points) => Arc::clone(points),
            None => {
                let points: Arc<[HeatPoint]> = Arc::from(sample_bucket(edges, bucket));
                self.samples_computed += 1;
                self.by_bucket.insert(bucket, Arc::clone(&points));
                points
            }
        };
        self.last_rendered = Some(bucket);
        Some(points)
    }

    /// Drop everything; used when the edge set itself changes.
    pub fn invalidate(&mut self) {
        self.by_bucket.clear();
        self.last_rendered = None;
    }

    pub fn last_rendered(&self) -> Option<ZoomBucket> {
        self.last_rendered
    }

    pub fn samples_computed(&self) -> usize {
        self.samples_computed
    }
}
