use safestreets_shared::{LngLatDetail, Position};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A coordinate in `[lon, lat]` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Build from a backend `[lat, lon]` pair. This is the only place the
    /// axis order is swapped; `None` for non-finite or out-of-range values.
    pub fn from_lat_lon(pair: [f64; 2]) -> Option<Self> {
        let [lat, lng] = pair;
        Self::new(lng, lat).validated()
    }

    /// Build from a geometry `[lon, lat]` position.
    pub fn from_position(position: Position) -> Option<Self> {
        let [lng, lat] = position;
        Self::new(lng, lat).validated()
    }

    pub fn to_position(self) -> Position {
        [self.lng, self.lat]
    }

    pub fn is_valid(self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }

    fn validated(self) -> Option<Self> {
        self.is_valid().then_some(self)
    }

    /// Great-circle distance in meters.
    pub fn haversine_m(self, other: LngLat) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }

    /// Linear interpolation; adequate for street-length edges.
    pub fn lerp(self, other: LngLat, t: f64) -> LngLat {
        LngLat::new(
            self.lng + (other.lng - self.lng) * t,
            self.lat + (other.lat - self.lat) * t,
        )
    }
}

impl From<LngLatDetail> for LngLat {
    fn from(detail: LngLatDetail) -> Self {
        LngLat::new(detail.lng, detail.lat)
    }
}

/// Inclusive `[south-west, north-east]` box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLatBounds {
    pub sw: LngLat,
    pub ne: LngLat,
}

impl LngLatBounds {
    pub fn from_point(point: LngLat) -> Self {
        Self {
            sw: point,
            ne: point,
        }
    }

    pub fn extend(&mut self, point: LngLat) {
        self.sw.lng = self.sw.lng.min(point.lng);
        self.sw.lat = self.sw.lat.min(point.lat);
        self.ne.lng = self.ne.lng.max(point.lng);
        self.ne.lat = self.ne.lat.max(point.lat);
    }

    pub fn from_points<I: IntoIterator<Item = LngLat>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn to_array(self) -> [[f64; 2]; 2] {
        [self.sw.to_position(), self.ne.to_position()]
    }
}
