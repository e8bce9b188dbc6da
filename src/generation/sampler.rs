//! Rejection sampling of node positions inside country borders
//!
//! Candidates are drawn uniformly by area from a disk around the city
//! centre (`r = radius * sqrt(u)`), then kept only if they fall inside one
//! of the country's polygons.

use std::f64::consts::TAU;

use geo::MultiPolygon;
use glam::DVec2;
use rand::Rng;

use super::dataset::shapes_contain;
use crate::node::NodeType;

/// Parameters for sampling one city
#[derive(Debug, Clone, Copy)]
pub struct SampleRequest {
    /// Planar centre of the sampling disk
    pub center: DVec2,
    /// Planar radius of the sampling disk
    pub radius: f64,
    /// Points wanted
    pub count: usize,
    /// Force the first accepted point to be a bank
    pub bank_eligible: bool,
}

/// A sampled (or merged) planar point awaiting an id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterPoint {
    /// Planar position
    pub position: DVec2,
    /// Node type
    pub node_type: NodeType,
    /// Number of raw samples this point stands for
    pub weight: usize,
    /// Display radius, `min(0.25, weight / 10)`
    pub radius: f64,
}

impl ClusterPoint {
    /// A fresh single sample
    pub fn single(position: DVec2, node_type: NodeType) -> Self {
        Self {
            position,
            node_type,
            weight: 1,
            radius: cluster_radius(1),
        }
    }
}

/// Display radius of a cluster made of `size` samples
#[inline]
pub fn cluster_radius(size: usize) -> f64 {
    (size as f64 / 10.0).min(0.25)
}

/// Sample up to `request.count` points inside `shapes`
///
/// Gives up after `max_failures` consecutive rejections, so a disk that
/// barely overlaps its country yields fewer points instead of looping.
pub fn sample_in_polygons<R: Rng>(
    shapes: &[&MultiPolygon<f64>],
    request: &SampleRequest,
    rich_probability: f64,
    max_failures: usize,
    rng: &mut R,
) -> Vec<ClusterPoint> {
    let mut accepted = Vec::with_capacity(request.count);
    if shapes.is_empty() {
        return accepted;
    }

    let mut failures = 0;
    while accepted.len() < request.count && failures < max_failures {
        let angle = rng.gen::<f64>() * TAU;
        let r = request.radius * rng.gen::<f64>().sqrt();
        let candidate = request.center + DVec2::new(angle.cos(), angle.sin()) * r;

        if !shapes_contain(shapes, candidate) {
            failures += 1;
            continue;
        }
        failures = 0;

        let node_type = if accepted.is_empty() && request.bank_eligible {
            NodeType::Bank
        } else if rng.gen_bool(rich_probability) {
            NodeType::Rich
        } else {
            NodeType::Basic
        };
        accepted.push(ClusterPoint::single(candidate, node_type));
    }

    accepted
}
