//! Geodesic helpers shared by graph construction and snapping

use geo::{HaversineBearing, HaversineDistance, Point};
use kestrel_common::FixedPointCoordinate;

/// Mean earth radius in metres used by the local planar projection
pub const EARTH_RADIUS: f64 = 6_372_797.560_856;

fn to_point(c: FixedPointCoordinate) -> Point<f64> {
    Point::new(c.lon_degrees(), c.lat_degrees())
}

/// Great-circle distance in metres
pub fn haversine_distance(a: FixedPointCoordinate, b: FixedPointCoordinate) -> f64 {
    to_point(a).haversine_distance(&to_point(b))
}

/// Initial bearing from `a` to `b` in degrees, 0 = north, clockwise, in [0, 360)
pub fn bearing(a: FixedPointCoordinate, b: FixedPointCoordinate) -> f64 {
    let raw = to_point(a).haversine_bearing(to_point(b));
    raw.rem_euclid(360.0)
}

/// Signed turn angle at `via` for travel `from -> via -> to`
///
/// 0 = straight on, positive = right turn, negative = left turn, -180 = u-turn.
pub fn turn_angle(
    from: FixedPointCoordinate,
    via: FixedPointCoordinate,
    to: FixedPointCoordinate,
) -> f64 {
    if from == via || via == to {
        return 0.0;
    }
    let mut delta = bearing(via, to) - bearing(from, via);
    while delta >= 180.0 {
        delta -= 360.0;
    }
    while delta < -180.0 {
        delta += 360.0;
    }
    delta
}

/// Equirectangular projection centred on a query point
///
/// Affine in (lat, lon), so axis-aligned rectangles stay rectangles and
/// interpolation along a segment matches interpolation of the coordinates.
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    origin: FixedPointCoordinate,
    lon_scale: f64,
    lat_scale: f64,
}

impl LocalProjection {
    pub fn new(origin: FixedPointCoordinate) -> Self {
        let metres_per_degree = EARTH_RADIUS.to_radians();
        Self {
            origin,
            lon_scale: metres_per_degree * origin.lat_degrees().to_radians().cos(),
            lat_scale: metres_per_degree,
        }
    }

    /// Planar (x, y) in metres relative to the origin
    pub fn project(&self, c: FixedPointCoordinate) -> (f64, f64) {
        (
            (c.lon_degrees() - self.origin.lon_degrees()) * self.lon_scale,
            (c.lat_degrees() - self.origin.lat_degrees()) * self.lat_scale,
        )
    }

    /// Distance from the origin to the rectangle `[min, max]`, 0 if inside
    pub fn distance_to_rect(&self, min: FixedPointCoordinate, max: FixedPointCoordinate) -> f64 {
        let (x0, y0) = self.project(min);
        let (x1, y1) = self.project(max);
        let dx = if x0 > 0.0 {
            x0
        } else if x1 < 0.0 {
            -x1
        } else {
            0.0
        };
        let dy = if y0 > 0.0 {
            y0
        } else if y1 < 0.0 {
            -y1
        } else {
            0.0
        };
        dx.hypot(dy)
    }

    pub fn distance_to_point(&self, c: FixedPointCoordinate) -> f64 {
        let (x, y) = self.project(c);
        x.hypot(y)
    }

    /// Perpendicular foot of the origin on segment `a`-`b`
    pub fn project_onto_segment(
        &self,
        a: FixedPointCoordinate,
        b: FixedPointCoordinate,
    ) -> SegmentProjection {
        let (ax, ay) = self.project(a);
        let (bx, by) = self.project(b);
        let (dx, dy) = (bx - ax, by - ay);
        let length_sq = dx * dx + dy * dy;

        let ratio = if length_sq <= f64::EPSILON {
            0.0
        } else {
            ((-ax * dx - ay * dy) / length_sq).clamp(0.0, 1.0)
        };
        let (px, py) = (ax + ratio * dx, ay + ratio * dy);
        let location = FixedPointCoordinate::new(
            interpolate(a.lat, b.lat, ratio),
            interpolate(a.lon, b.lon, ratio),
        );
        SegmentProjection {
            distance: px.hypot(py),
            ratio,
            location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Planar distance in metres from the projection origin
    pub distance: f64,
    /// Position along the segment, 0 at `a`, 1 at `b`
    pub ratio: f64,
    pub location: FixedPointCoordinate,
}

fn interpolate(a: i32, b: i32, ratio: f64) -> i32 {
    (a as f64 + (b as f64 - a as f64) * ratio).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> FixedPointCoordinate {
        FixedPointCoordinate::from_degrees(lat, lon)
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance(c(0.0, 0.0), c(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = c(10.0, 10.0);
        assert!(bearing(origin, c(10.01, 10.0)).abs() < 0.5);
        assert!((bearing(origin, c(10.0, 10.01)) - 90.0).abs() < 0.5);
        assert!((bearing(origin, c(9.99, 10.0)) - 180.0).abs() < 0.5);
        assert!((bearing(origin, c(10.0, 9.99)) - 270.0).abs() < 0.5);
    }

    #[test]
    fn test_turn_angle_sign() {
        let south = c(0.0, 0.0);
        let via = c(0.001, 0.0);
        // heading north, turning east is a right turn
        assert!((turn_angle(south, via, c(0.001, 0.001)) - 90.0).abs() < 1.0);
        assert!((turn_angle(south, via, c(0.001, -0.001)) + 90.0).abs() < 1.0);
        assert!(turn_angle(south, via, c(0.002, 0.0)).abs() < 1.0);
        assert!((turn_angle(south, via, south).abs() - 180.0).abs() < 1.0);
    }

    #[test]
    fn test_projection_onto_segment() {
        let proj = LocalProjection::new(c(0.0005, 0.0001));
        let p = proj.project_onto_segment(c(0.0, 0.0), c(0.001, 0.0));
        assert!((p.ratio - 0.5).abs() < 1e-6);
        assert_eq!(p.location, c(0.0005, 0.0));
        assert!((p.distance - 11.12).abs() < 0.1, "got {}", p.distance);

        // beyond the end clamps to the endpoint
        let proj = LocalProjection::new(c(0.002, 0.0));
        let p = proj.project_onto_segment(c(0.0, 0.0), c(0.001, 0.0));
        assert_eq!(p.ratio, 1.0);
        assert_eq!(p.location, c(0.001, 0.0));
    }

    #[test]
    fn test_rect_distance_is_lower_bound() {
        let proj = LocalProjection::new(c(0.0, 0.0));
        let min = c(0.001, 0.001);
        let max = c(0.002, 0.003);
        let rect = proj.distance_to_rect(min, max);
        assert!(rect <= proj.distance_to_point(min) + 1e-9);
        assert!(rect <= proj.project_onto_segment(min, max).distance + 1e-9);
        assert_eq!(proj.distance_to_rect(c(-1.0, -1.0), c(1.0, 1.0)), 0.0);
    }
}
