//! Great-circle helpers on a spherical earth with mean radius.
//!
//! Positions are `geo::Point` with `x` = longitude and `y` = latitude in
//! degrees. Distances cross the API in nautical miles.

use geo::{point, Bearing as _, Destination as _, Distance as _, Haversine, Point};
use itertools::Itertools;
use uom::si::f64::Length;
use uom::si::length::{meter, nautical_mile};

/// Great-circle distance in nautical miles.
pub fn distance_nm(from: Point, to: Point) -> f64 {
    Length::new::<meter>(Haversine.distance(from, to)).get::<nautical_mile>()
}

/// Initial true course from `from` to `to` in `[0, 360)`.
pub fn bearing_deg(from: Point, to: Point) -> f64 {
    normalize_bearing(Haversine.bearing(from, to))
}

/// Position reached after travelling `distance_nm` on the initial course
/// `bearing_deg` (any value, folded into `[0, 360)`).
pub fn point_distance_bearing(from: Point, distance_nm: f64, bearing_deg: f64) -> Point {
    let distance = Length::new::<nautical_mile>(distance_nm);
    let to = Haversine.destination(
        from,
        normalize_bearing(bearing_deg),
        distance.get::<meter>(),
    );
    point! { x: normalize_longitude(to.x()), y: to.y() }
}

/// Cumulative distance along consecutive points.
pub fn path_distance_nm<'a>(points: impl IntoIterator<Item = &'a Point>) -> f64 {
    points
        .into_iter()
        .tuple_windows()
        .map(|(a, b)| distance_nm(*a, *b))
        .sum()
}

/// Position `along_nm` along the polyline, clamped to its last point.
/// Returns the position and the index of the point that follows it.
pub fn point_along_path(points: &[Point], along_nm: f64) -> Option<(Point, usize)> {
    let first = *points.first()?;
    let mut remaining = along_nm.max(0.);
    for (index, (a, b)) in points.iter().tuple_windows().enumerate() {
        let leg = distance_nm(*a, *b);
        if remaining <= leg {
            if leg <= f64::EPSILON {
                return Some((*b, index + 1));
            }
            return Some((point_distance_bearing(*a, remaining, bearing_deg(*a, *b)), index + 1));
        }
        remaining -= leg;
    }
    Some((points.last().copied().unwrap_or(first), points.len()))
}

pub fn normalize_bearing(bearing: f64) -> f64 {
    let normalized = bearing.rem_euclid(360.);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360. {
        0.
    } else {
        normalized
    }
}

pub fn normalize_longitude(longitude: f64) -> f64 {
    (longitude + 180.).rem_euclid(360.) - 180.
}

#[cfg(test)]
mod test {
    use geo::point;

    use super::{
        bearing_deg, distance_nm, normalize_bearing, normalize_longitude, path_distance_nm,
        point_along_path, point_distance_bearing,
    };

    fn assert_close(left: f64, right: f64, epsilon: f64) {
        assert!(
            (left - right).abs() < epsilon,
            "left: {left:?} not within {epsilon} of right: {right:?}"
        );
    }

    #[test]
    fn test_zero_distance() {
        for (lat, lon) in [(0., 0.), (50.03, 8.57), (-89.9, 179.9), (89.99, -180.)] {
            let p = point! { x: lon, y: lat };
            assert!(distance_nm(p, p).abs() < 1e-9);
        }
    }

    #[test]
    fn test_one_degree_of_latitude_is_sixty_nm() {
        let a = point! { x: 8.0, y: 50.0 };
        let b = point! { x: 8.0, y: 51.0 };
        assert_close(distance_nm(a, b), 60.04, 0.05);
    }

    #[test]
    fn test_frankfurt_munich() {
        let eddf = point! { x: 8.570_556, y: 50.033_333 };
        let eddm = point! { x: 11.786_086, y: 48.353_783 };
        assert_close(distance_nm(eddf, eddm), 161.5, 1.5);
        assert_close(bearing_deg(eddf, eddm), 127.2, 1.0);
    }

    #[test]
    fn test_roundtrip_on_meridian() {
        let start = point! { x: 8.57, y: 50.03 };
        let there = point_distance_bearing(start, 120., 0.);
        let back = point_distance_bearing(there, 120., 180.);
        assert_close(back.y(), start.y(), 1e-6);
        assert_close(back.x(), start.x(), 1e-6);
    }

    #[test]
    fn test_roundtrip_short_legs() {
        let start = point! { x: -122.31, y: 47.45 };
        for bearing in [10., 95., 200., 359.] {
            let there = point_distance_bearing(start, 5., bearing);
            let back = point_distance_bearing(there, 5., bearing + 180.);
            assert_close(back.y(), start.y(), 1e-3);
            assert_close(back.x(), start.x(), 1e-3);
        }
    }

    #[test]
    fn test_roundtrip_with_reverse_course() {
        let start = point! { x: 8.57, y: 50.03 };
        let there = point_distance_bearing(start, 800., 75.);
        let back = point_distance_bearing(there, 800., bearing_deg(there, start));
        assert_close(back.y(), start.y(), 1e-6);
        assert_close(back.x(), start.x(), 1e-6);
    }

    #[test]
    fn test_antimeridian_wraps() {
        let start = point! { x: 179.5, y: 0. };
        let there = point_distance_bearing(start, 60., 90.);
        assert_close(there.x(), -179.5, 1e-2);
        assert!(distance_nm(start, there) < 60.1);

        let back = point_distance_bearing(there, 60., 270.);
        assert_close(back.x(), 179.5, 1e-2);
    }

    #[test]
    fn test_bearing_boundaries() {
        assert_close(normalize_bearing(360.), 0., f64::EPSILON);
        assert_close(normalize_bearing(-90.), 270., f64::EPSILON);
        assert_close(normalize_bearing(725.), 5., 1e-9);
        assert!(normalize_bearing(-1e-18) < 360.);
        assert_close(normalize_longitude(190.), -170., 1e-9);
        assert_close(normalize_longitude(-180.), -180., 1e-9);

        let start = point! { x: 0., y: 10. };
        let north = point! { x: 0., y: 11. };
        let bearing = bearing_deg(start, north);
        assert!(!(1e-6..=359.999_999).contains(&bearing), "{bearing}");
    }

    #[test]
    fn test_path_helpers() {
        let path = [
            point! { x: 0., y: 0. },
            point! { x: 0., y: 1. },
            point! { x: 0., y: 2. },
        ];
        assert_close(path_distance_nm(&path), 120.08, 0.1);

        let (p, next) = point_along_path(&path, 90.).unwrap();
        assert_eq!(next, 2);
        assert_close(p.y(), 1.5, 1e-2);

        let (p, next) = point_along_path(&path, 1000.).unwrap();
        assert_eq!(next, 3);
        assert_close(p.y(), 2., 1e-9);

        assert!(point_along_path(&[], 10.).is_none());
    }
}
