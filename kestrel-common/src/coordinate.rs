//! Fixed-precision coordinates

use std::fmt;

/// Scale between degrees and the stored integer representation
pub const COORDINATE_PRECISION: f64 = 1_000_000.0;

/// Latitude/longitude stored as integers scaled by [`COORDINATE_PRECISION`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedPointCoordinate {
    pub lat: i32,
    pub lon: i32,
}

impl FixedPointCoordinate {
    pub const fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * COORDINATE_PRECISION).round() as i32,
            lon: (lon * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }

    pub fn is_valid(&self) -> bool {
        let max_lat = (90.0 * COORDINATE_PRECISION) as i32;
        let max_lon = (180.0 * COORDINATE_PRECISION) as i32;
        (-max_lat..=max_lat).contains(&self.lat) && (-max_lon..=max_lon).contains(&self.lon)
    }
}

impl fmt::Display for FixedPointCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat_degrees(), self.lon_degrees())
    }
}
