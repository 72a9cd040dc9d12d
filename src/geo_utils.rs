//! Geographic utilities: distances, bearings and bounding boxes.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, GpsPoint};

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Mean earth radius used by the haversine metric.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Padding applied to search boxes so float error never clips a point that
/// sits right on the radius.
pub(crate) const ENVELOPE_SLACK: f64 = 1.01;

/// Calculate haversine distance between two GPS points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Initial great-circle bearing from `from` to `to`, in degrees [0, 360).
pub fn initial_bearing(from: &GpsPoint, to: &GpsPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlng = (to.longitude - from.longitude).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Compute bounds of a set of points. Empty input yields a zero box at the origin.
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    Bounds::from_points(points).unwrap_or(Bounds {
        min_lat: 0.0,
        max_lat: 0.0,
        min_lng: 0.0,
        max_lng: 0.0,
    })
}

/// Arithmetic mean of the coordinates. Empty input yields (0, 0).
pub fn compute_center(points: &[GpsPoint]) -> GpsPoint {
    if points.is_empty() {
        return GpsPoint::new(0.0, 0.0);
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.longitude).sum::<f64>() / n;
    GpsPoint::new(lat, lng)
}

/// Convert a distance in meters to degrees of longitude at the given latitude.
///
/// At the equator this is also degrees of latitude. Near the poles the
/// cosine is floored so the result stays finite.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos().abs().max(0.01);
    meters / (METERS_PER_DEGREE * cos_lat)
}

/// Degree-space boxes that together cover every point within
/// `radius_meters` of `center` by haversine distance.
///
/// Returns two boxes when the circle crosses the antimeridian, and a
/// full-longitude band when it reaches a pole.
pub fn search_boxes(center: &GpsPoint, radius_meters: f64) -> Vec<Bounds> {
    let angular = (radius_meters.max(0.0) / EARTH_RADIUS_METERS) * ENVELOPE_SLACK;
    let lat_delta = angular.to_degrees();
    let min_lat = center.latitude - lat_delta;
    let max_lat = center.latitude + lat_delta;

    let cos_lat = center.latitude.to_radians().cos();
    let reaches_pole = min_lat <= -90.0 || max_lat >= 90.0 || angular.sin() >= cos_lat;
    let lng_delta = if reaches_pole {
        180.0
    } else {
        (angular.sin() / cos_lat).asin().to_degrees()
    };

    let min_lat = min_lat.max(-90.0);
    let max_lat = max_lat.min(90.0);
    let band = |min_lng: f64, max_lng: f64| Bounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    };

    if lng_delta >= 180.0 {
        return vec![band(-180.0, 180.0)];
    }

    let min_lng = center.longitude - lng_delta;
    let max_lng = center.longitude + lng_delta;
    if min_lng < -180.0 {
        vec![band(min_lng + 360.0, 180.0), band(-180.0, max_lng)]
    } else if max_lng > 180.0 {
        vec![band(min_lng, 180.0), band(-180.0, max_lng - 360.0)]
    } else {
        vec![band(min_lng, max_lng)]
    }
}

/// Check if two bounding boxes overlap, with a buffer in meters.
pub fn bounds_overlap(a: &Bounds, b: &Bounds, buffer_meters: f64, ref_lat: f64) -> bool {
    let lat_buffer = meters_to_degrees(buffer_meters, 0.0);
    let lng_buffer = meters_to_degrees(buffer_meters, ref_lat);

    a.min_lat - lat_buffer <= b.max_lat
        && a.max_lat + lat_buffer >= b.min_lat
        && a.min_lng - lng_buffer <= b.max_lng
        && a.max_lng + lng_buffer >= b.min_lng
}

/// Value at the given percentile (0-100) using the nearest-rank method.
///
/// Returns 0.0 for empty input.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((pct.clamp(0.0, 100.0) / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
