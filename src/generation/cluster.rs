//! Proximity merging of sampled points
//!
//! Points closer than the threshold are linked; each connected component
//! collapses to its weighted centroid. Points are bucketed into cells the
//! size of the threshold so only the 3×3 neighbourhood is ever compared.

use ahash::AHashMap;
use glam::DVec2;

use super::sampler::{cluster_radius, ClusterPoint};

type CellKey = (i64, i64);

#[inline]
fn cell_of(position: DVec2, cell_size: f64) -> CellKey {
    (
        (position.x / cell_size).floor() as i64,
        (position.y / cell_size).floor() as i64,
    )
}

/// Merge every component of within-`threshold` points into one point
///
/// Output order follows the first member of each component in input order,
/// so the result is deterministic for a given input.
///
/// A non-positive threshold merges nothing.
///
/// Merging is not idempotent in general: a collapsed centroid can land
/// within `threshold` of a point that was out of reach of every original
/// member, so a second pass may join them.
pub fn merge_clusters(points: &[ClusterPoint], threshold: f64) -> Vec<ClusterPoint> {
    if !(threshold > 0.0) {
        return points.to_vec();
    }

    let mut cells: AHashMap<CellKey, Vec<usize>> = AHashMap::new();
    for (i, point) in points.iter().enumerate() {
        cells
            .entry(cell_of(point.position, threshold))
            .or_default()
            .push(i);
    }

    let threshold_sq = threshold * threshold;
    let mut visited = vec![false; points.len()];
    let mut merged = Vec::new();
    let mut stack = Vec::new();
    let mut component = Vec::new();

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        component.clear();

        // Flood fill over the thresholded adjacency
        while let Some(current) = stack.pop() {
            component.push(current);
            let pos = points[current].position;
            let (cx, cy) = cell_of(pos, threshold);

            for dx in -1..=1 {
                for dy in -1..=1 {
                    let Some(bucket) = cells.get(&(cx + dx, cy + dy)) else {
                        continue;
                    };
                    for &other in bucket {
                        if !visited[other]
                            && points[other].position.distance_squared(pos) <= threshold_sq
                        {
                            visited[other] = true;
                            stack.push(other);
                        }
                    }
                }
            }
        }

        merged.push(collapse(points, &component));
    }

    merged
}

fn collapse(points: &[ClusterPoint], members: &[usize]) -> ClusterPoint {
    if let [only] = members {
        return points[*only];
    }

    let mut weight = 0;
    let mut sum = DVec2::ZERO;
    let mut node_type = points[members[0]].node_type;

    for &i in members {
        let p = &points[i];
        weight += p.weight;
        sum += p.position * p.weight as f64;
        if p.node_type.rank() > node_type.rank() {
            node_type = p.node_type;
        }
    }

    ClusterPoint {
        position: sum / weight.max(1) as f64,
        node_type,
        weight,
        radius: cluster_radius(weight),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;

    fn p(x: f64, y: f64) -> ClusterPoint {
        ClusterPoint::single(DVec2::new(x, y), NodeType::Basic)
    }

    #[test]
    fn test_isolated_points_survive() {
        let points = vec![p(0.0, 0.0), p(5.0, 0.0), p(0.0, 5.0)];
        let merged = merge_clusters(&points, 1.0);
        assert_eq!(merged, points);
    }

    #[test]
    fn test_chain_merges_transitively() {
        // 0-1 and 1-2 are within threshold, 0-2 is not
        let points = vec![p(0.0, 0.0), p(0.9, 0.0), p(1.8, 0.0), p(10.0, 10.0)];
        let merged = merge_clusters(&points, 1.0);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].weight, 3);
        assert!((merged[0].position.x - 0.9).abs() < 1e-12);
        assert!((merged[0].radius - 0.25).abs() < 1e-12);
        assert_eq!(merged[1].weight, 1);
        assert!((merged[1].radius - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_merge_crosses_cell_boundaries() {
        // Straddles the x = 0 cell edge
        let points = vec![p(-0.1, 0.0), p(0.1, 0.0)];
        let merged = merge_clusters(&points, 1.0);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].position.x.abs() < 1e-12);
    }

    #[test]
    fn test_merged_type_is_highest_rank() {
        let points = vec![
            ClusterPoint::single(DVec2::new(0.0, 0.0), NodeType::Basic),
            ClusterPoint::single(DVec2::new(0.1, 0.0), NodeType::Bank),
            ClusterPoint::single(DVec2::new(0.2, 0.0), NodeType::Rich),
        ];
        let merged = merge_clusters(&points, 0.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].node_type, NodeType::Bank);
    }

    #[test]
    fn test_merge_is_idempotent_on_separated_output() {
        let points: Vec<ClusterPoint> = (0..40)
            .map(|i| {
                let group = (i / 4) as f64;
                let jitter = (i % 4) as f64 * 0.05;
                p(group * 3.0 + jitter, jitter)
            })
            .collect();

        let once = merge_clusters(&points, 0.5);
        let twice = merge_clusters(&once, 0.5);
        assert_eq!(once.len(), 10);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_remerge_can_join_centroid_with_outlier() {
        // The pair is 1.2 apart; the apex is ~1.34 from each but 1.2 from their midpoint
        let points = vec![p(-0.6, 0.0), p(0.6, 0.0), p(0.0, 1.2)];

        let once = merge_clusters(&points, 1.3);
        assert_eq!(once.len(), 2);
        assert_eq!(once[0].weight, 2);
        assert!(once[0].position.length() < 1e-12);

        let twice = merge_clusters(&once, 1.3);
        assert_eq!(twice.len(), 1);
        assert_eq!(twice[0].weight, 3);
    }

    #[test]
    fn test_weighted_centroid() {
        let mut heavy = p(0.0, 0.0);
        heavy.weight = 3;
        let light = p(0.4, 0.0);
        let merged = merge_clusters(&[heavy, light], 0.5);
        assert!((merged[0].position.x - 0.1).abs() < 1e-12);
        assert_eq!(merged[0].weight, 4);
    }

    #[test]
    fn test_empty_and_zero_threshold() {
        assert!(merge_clusters(&[], 1.0).is_empty());
        let points = vec![p(0.0, 0.0), p(0.0, 0.0)];
        assert_eq!(merge_clusters(&points, 0.0).len(), 2);
    }
}
