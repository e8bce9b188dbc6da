//! Geographic projection between (longitude, latitude) and planar map space
//!
//! Planar space follows screen conventions: x grows east, y grows south.
//! Both projections are pure functions of their scale and translate, so the
//! inverse is exact up to floating-point precision.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometres, used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Latitude limit for the Mercator variant (the square-world cutoff)
pub const MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Which cylindrical projection to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectionKind {
    /// Plate carrée: planar distance is proportional to angular distance
    #[default]
    Equirectangular,
    /// Web-Mercator style; latitude is clamped to [`MERCATOR_MAX_LATITUDE`]
    Mercator,
}

/// A fixed scale/translate projection pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoProjection {
    /// Projection variant
    pub kind: ProjectionKind,
    /// Planar units per radian
    pub scale: f64,
    /// Planar offset of (0°, 0°)
    pub translate: DVec2,
}

impl Default for GeoProjection {
    fn default() -> Self {
        Self {
            kind: ProjectionKind::Equirectangular,
            scale: 100.0,
            translate: DVec2::new(480.0, 250.0),
        }
    }
}

impl GeoProjection {
    /// Create a projection with the given scale and translate
    pub fn new(kind: ProjectionKind, scale: f64, translate: DVec2) -> Self {
        Self {
            kind,
            scale,
            translate,
        }
    }

    /// Project a (longitude, latitude) pair in degrees to planar coordinates
    ///
    /// ```
    /// use rust_node_network::GeoProjection;
    ///
    /// let projection = GeoProjection::default();
    /// let origin = projection.project(0.0, 0.0);
    /// assert_eq!(origin, projection.translate);
    /// ```
    pub fn project(&self, lon: f64, lat: f64) -> DVec2 {
        let x = lon.to_radians() * self.scale + self.translate.x;
        let y = match self.kind {
            ProjectionKind::Equirectangular => -lat.to_radians() * self.scale + self.translate.y,
            ProjectionKind::Mercator => {
                let lat = lat.clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE).to_radians();
                let merc = (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
                -merc * self.scale + self.translate.y
            }
        };
        DVec2::new(x, y)
    }

    /// Inverse of [`GeoProjection::project`], returning (longitude, latitude) in degrees
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = ((x - self.translate.x) / self.scale).to_degrees();
        let v = -(y - self.translate.y) / self.scale;
        let lat = match self.kind {
            ProjectionKind::Equirectangular => v.to_degrees(),
            ProjectionKind::Mercator => {
                (2.0 * v.exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees()
            }
        };
        (lon, lat)
    }

    /// Project a `[lon, lat]` pair
    #[inline]
    pub fn project_coords(&self, coords: [f64; 2]) -> DVec2 {
        self.project(coords[0], coords[1])
    }
}

/// Memoises a projection keyed by its scale
///
/// Hosts that zoom continuously ask for a projection every frame; the
/// cached value is reused until the scale moves.
#[derive(Debug, Clone)]
pub struct ProjectionCache {
    kind: ProjectionKind,
    translate: DVec2,
    cached: Option<GeoProjection>,
}

impl ProjectionCache {
    /// Create an empty cache for the given projection family
    pub fn new(kind: ProjectionKind, translate: DVec2) -> Self {
        Self {
            kind,
            translate,
            cached: None,
        }
    }

    /// Get the projection for `scale`, rebuilding only if the scale changed
    pub fn get(&mut self, scale: f64) -> GeoProjection {
        match self.cached {
            Some(projection) if projection.scale == scale => projection,
            _ => {
                let projection = GeoProjection::new(self.kind, scale, self.translate);
                self.cached = Some(projection);
                projection
            }
        }
    }
}

/// Great-circle distance between two `[lon, lat]` pairs in kilometres (haversine)
pub fn great_circle_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lon1, lat1) = (a[0].to_radians(), a[1].to_radians());
    let (lon2, lat2) = (b[0].to_radians(), b[1].to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp to avoid numerical issues with asin
    2.0 * EARTH_RADIUS_KM * h.sqrt().clamp(0.0, 1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_equirectangular_axes() {
        let projection = GeoProjection::new(ProjectionKind::Equirectangular, 1.0, DVec2::ZERO);
        let east = projection.project(90.0, 0.0);
        assert!((east.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        // North is up, so y decreases
        let north = projection.project(0.0, 45.0);
        assert!(north.y < 0.0);
    }

    #[test]
    fn test_mercator_clamps_poles() {
        let projection = GeoProjection::new(ProjectionKind::Mercator, 1.0, DVec2::ZERO);
        let pole = projection.project(0.0, 90.0);
        assert!(pole.y.is_finite());
        let (_, lat) = projection.unproject(pole.x, pole.y);
        assert!((lat - MERCATOR_MAX_LATITUDE).abs() < 1e-9);
    }

    #[test]
    fn test_cache_rebuilds_on_scale_change() {
        let mut cache = ProjectionCache::new(ProjectionKind::Equirectangular, DVec2::ZERO);
        assert_eq!(cache.get(2.0).scale, 2.0);
        assert_eq!(cache.get(2.0).scale, 2.0);
        assert_eq!(cache.get(3.0).scale, 3.0);
    }

    #[test]
    fn test_great_circle_quarter_meridian() {
        let d = great_circle_km([0.0, 0.0], [0.0, 90.0]);
        let expected = EARTH_RADIUS_KM * std::f64::consts::FRAC_PI_2;
        assert!((d - expected).abs() < 1e-6);
        assert_eq!(great_circle_km([12.5, 41.9], [12.5, 41.9]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_equirectangular_round_trip(
            lon in -180.0f64..180.0,
            lat in -90.0f64..90.0,
            scale in 0.1f64..5000.0,
        ) {
            let projection = GeoProjection::new(
                ProjectionKind::Equirectangular,
                scale,
                DVec2::new(480.0, 250.0),
            );
            let p = projection.project(lon, lat);
            let (lon2, lat2) = projection.unproject(p.x, p.y);
            prop_assert!((lon - lon2).abs() < 1e-7);
            prop_assert!((lat - lat2).abs() < 1e-7);
        }

        #[test]
        fn prop_mercator_round_trip(
            lon in -180.0f64..180.0,
            lat in -85.0f64..85.0,
            scale in 0.1f64..5000.0,
        ) {
            let projection = GeoProjection::new(ProjectionKind::Mercator, scale, DVec2::ZERO);
            let p = projection.project(lon, lat);
            let (lon2, lat2) = projection.unproject(p.x, p.y);
            prop_assert!((lon - lon2).abs() < 1e-7);
            prop_assert!((lat - lat2).abs() < 1e-7);
        }
    }
}
