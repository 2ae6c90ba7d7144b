// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Number of decimal places kept by [snap], ≈1 cm at the equator.
pub const SNAP_PRECISION: i32 = 7;

/// `10^SNAP_PRECISION`, the number of snapping grid cells per degree.
pub(crate) const SNAP_GRID: i64 = 10i64.pow(SNAP_PRECISION as u32);

const SNAP_SCALE: f64 = SNAP_GRID as f64;

/// A (longitude, latitude) position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Returns true if both components are finite and within the WGS84 value range.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Canonical identity of a graph point: a [Coordinate] rounded to
/// [SNAP_PRECISION] decimal places, stored as integer multiples of 1e-7°.
///
/// Two coordinates describe the same graph node iff their keys are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapKey {
    pub lon: i64,
    pub lat: i64,
}

impl SnapKey {
    /// Returns the position of the grid point this key represents.
    pub fn to_coordinate(self) -> Coordinate {
        Coordinate {
            lon: self.lon as f64 / SNAP_SCALE,
            lat: self.lat as f64 / SNAP_SCALE,
        }
    }

    #[inline]
    pub(crate) fn as_point(self) -> [i64; 2] {
        [self.lon, self.lat]
    }
}

/// Rounds both components of a coordinate to [SNAP_PRECISION] decimal places.
///
/// Total for finite input; non-finite coordinates must be rejected by the caller
/// (see [Coordinate::is_valid]).
#[inline]
pub fn snap(c: Coordinate) -> SnapKey {
    debug_assert!(c.lon.is_finite() && c.lat.is_finite());
    SnapKey {
        lon: (c.lon * SNAP_SCALE).round() as i64,
        lat: (c.lat * SNAP_SCALE).round() as i64,
    }
}
