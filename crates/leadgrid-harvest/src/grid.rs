//! Geographic grid generation over a disk-shaped search area.
//!
//! Produces a deterministic, row-major sequence of lat/lng sample points
//! around a center coordinate. The ordering is load-bearing: checkpoint
//! resume indexes into this sequence with a plain integer, so two calls with
//! identical inputs must yield identical orderings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// One lat/lng sample location, used for one nearby-search query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Grid density: controls the odd side length of the point grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Low,
    Medium,
    High,
}

impl Density {
    /// Grid side length. Always odd, so the exact center is a grid point.
    #[must_use]
    pub fn side(self) -> i32 {
        match self {
            Density::Low => 3,
            Density::Medium => 5,
            Density::High => 7,
        }
    }
}

impl std::fmt::Display for Density {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Density::Low => write!(f, "low"),
            Density::Medium => write!(f, "medium"),
            Density::High => write!(f, "high"),
        }
    }
}

impl FromStr for Density {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Density::Low),
            "medium" => Ok(Density::Medium),
            "high" => Ok(Density::High),
            other => Err(format!(
                "unknown density \"{other}\" (expected low, medium, or high)"
            )),
        }
    }
}

/// Generate the grid of search points for a disk of `radius_km` around
/// `center`.
///
/// Offsets `i, j` range over `[-half, half]` in row-major order (`i` outer,
/// `j` inner). Each offset maps to a destination point at great-circle
/// distance `radius_km * hypot(i, j) / half` along bearing `atan2(j, i)`
/// (0 = north, east positive), computed with the standard spherical
/// destination-point formula. The `(0, 0)` offset is the exact center.
///
/// `radius_km = 0` degenerates to `side²` copies of the center; duplicates
/// are legal at this layer and are not deduplicated.
#[must_use]
pub fn generate_grid(center: GridPoint, radius_km: f64, density: Density) -> Vec<GridPoint> {
    let side = density.side();
    let half = (side - 1) / 2;
    let mut points = Vec::with_capacity((side * side).unsigned_abs() as usize);

    for i in -half..=half {
        for j in -half..=half {
            points.push(offset_point(center, radius_km, half, i, j));
        }
    }
    points
}

fn offset_point(center: GridPoint, radius_km: f64, half: i32, i: i32, j: i32) -> GridPoint {
    let distance_km = radius_km * f64::hypot(f64::from(i), f64::from(j)) / f64::from(half);
    if distance_km == 0.0 {
        // Bit-exact center for the (0, 0) offset and for the radius-0 grid.
        return center;
    }

    let bearing = f64::atan2(f64::from(j), f64::from(i));
    let delta = distance_km / EARTH_RADIUS_KM;

    let lat1 = center.lat.to_radians();
    let lng1 = center.lng.to_radians();

    let lat2 = f64::asin(lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos());
    let lng2 = lng1
        + f64::atan2(
            bearing.sin() * delta.sin() * lat1.cos(),
            delta.cos() - lat1.sin() * lat2.sin(),
        );

    GridPoint {
        lat: lat2.to_degrees(),
        lng: lng2.to_degrees(),
    }
}
