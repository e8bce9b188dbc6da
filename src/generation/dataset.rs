//! Input datasets consumed by world generation
//!
//! City records, country borders and curated node overrides are opaque
//! inputs; this module only gives them types and projects the borders into
//! planar map space.

use ahash::AHashMap;
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::node::{NodeId, NodeType};
use crate::projection::GeoProjection;

/// One populated place that seeds nodes around it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRecord {
    /// `[longitude, latitude]` in degrees
    pub earth_coords: [f64; 2],
    /// Country the city belongs to
    pub country: String,
    /// Head count
    pub population: f64,
    /// People per square kilometre
    pub density: f64,
}

/// A ring of `[longitude, latitude]` vertices; closing is implicit
pub type Ring = Vec<[f64; 2]>;

/// Country border geometry in geographic coordinates
///
/// Each country maps to a list of polygons, each polygon being an exterior
/// ring followed by any hole rings (GeoJSON layout).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonData {
    /// Country → polygons
    pub countries: AHashMap<String, Vec<Vec<Ring>>>,
    /// Country → countries whose rendered border path it shares
    #[serde(default)]
    pub shared_borders: AHashMap<String, Vec<String>>,
}

/// Partial correction for one generated node, keyed by generation-order id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOverride {
    /// Planar x
    pub x: Option<f64>,
    /// Planar y
    pub y: Option<f64>,
    /// Replacement type
    #[serde(rename = "type")]
    pub node_type: Option<NodeType>,
    /// Replacement hack-cost multiplier
    pub scaling: Option<f64>,
}

/// Generation-order id → override
pub type NodeOverrides = AHashMap<NodeId, NodeOverride>;

/// Country borders projected into planar space, ready for containment tests
#[derive(Debug, Clone, Default)]
pub struct PolygonSet {
    shapes: AHashMap<String, MultiPolygon<f64>>,
    shared_borders: AHashMap<String, Vec<String>>,
}

impl PolygonSet {
    /// Project every country's border rings with `projection`
    pub fn project(data: &PolygonData, projection: &GeoProjection) -> Self {
        let shapes = data
            .countries
            .iter()
            .map(|(country, polygons)| {
                let polygons: Vec<Polygon<f64>> = polygons
                    .iter()
                    .filter_map(|rings| project_polygon(rings, projection))
                    .collect();
                (country.clone(), MultiPolygon::new(polygons))
            })
            .collect();

        Self {
            shapes,
            shared_borders: data.shared_borders.clone(),
        }
    }

    /// Shapes associated with a country: its own, then any shared-border neighbours
    pub fn shapes_for(&self, country: &str) -> Vec<&MultiPolygon<f64>> {
        let shared = self
            .shared_borders
            .get(country)
            .map(|names| names.as_slice())
            .unwrap_or(&[]);

        std::iter::once(country)
            .chain(shared.iter().map(String::as_str))
            .filter_map(|name| self.shapes.get(name))
            .collect()
    }

    /// Whether `point` lies inside any shape associated with `country`
    pub fn contains(&self, country: &str, point: DVec2) -> bool {
        shapes_contain(&self.shapes_for(country), point)
    }

    /// First country (in name order) whose own border contains `point`
    pub fn country_at(&self, point: DVec2) -> Option<&str> {
        let p = Point::new(point.x, point.y);
        let mut hits: Vec<&str> = self
            .shapes
            .iter()
            .filter(|(_, shape)| shape.contains(&p))
            .map(|(name, _)| name.as_str())
            .collect();
        hits.sort_unstable();
        hits.first().copied()
    }
}

/// Point-in-polygon test against a list of shapes
pub fn shapes_contain(shapes: &[&MultiPolygon<f64>], point: DVec2) -> bool {
    let p = Point::new(point.x, point.y);
    shapes.iter().any(|shape| shape.contains(&p))
}

fn project_polygon(rings: &[Ring], projection: &GeoProjection) -> Option<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        let coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&c| {
                let p = projection.project_coords(c);
                Coord { x: p.x, y: p.y }
            })
            .collect();
        LineString::new(coords)
    });

    let exterior = rings.next()?;
    if exterior.0.len() < 3 {
        return None;
    }
    Some(Polygon::new(exterior, rings.collect()))
}
