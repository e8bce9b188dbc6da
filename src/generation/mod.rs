//! World generation
//!
//! Samples nodes around every city inside its country's borders, merges
//! near-duplicates per country, assigns generation-order ids, applies
//! curated overrides and injects the home node.

pub mod cluster;
pub mod dataset;
pub mod sampler;

pub use cluster::merge_clusters;
pub use dataset::{CityRecord, NodeOverride, NodeOverrides, PolygonData, PolygonSet, Ring};
pub use sampler::{sample_in_polygons, ClusterPoint, SampleRequest};

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{DensityTable, WorldConfig};
use crate::node::{BaseNode, NodeId, NodeType};

/// Every external dataset generation consumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldInputs {
    /// Populated places
    pub cities: Vec<CityRecord>,
    /// Country borders
    pub polygons: PolygonData,
    /// Density tuning
    #[serde(default)]
    pub density: DensityTable,
    /// Curated per-node corrections
    #[serde(default)]
    pub overrides: NodeOverrides,
}

/// Generate the immutable base node set
///
/// Deterministic for identical inputs and `config.seed`. Cities whose
/// sampling disk barely overlaps their country produce fewer nodes than
/// requested rather than failing the pass.
pub fn generate_base_nodes(inputs: &WorldInputs, config: &WorldConfig) -> Vec<BaseNode> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let projection = &config.projection;
    let polygons = PolygonSet::project(&inputs.polygons, projection);

    // Country groups in order of first appearance
    let mut groups: Vec<(String, Vec<ClusterPoint>)> = Vec::new();
    let mut group_index: AHashMap<String, usize> = AHashMap::new();
    let mut starved = 0usize;
    let mut sampled = 0usize;

    for city in &inputs.cities {
        let shapes = polygons.shapes_for(&city.country);
        if shapes.is_empty() {
            warn!(country = %city.country, "no border geometry for city, skipping");
            continue;
        }

        let density = inputs.density.lookup(&city.country);
        let request = SampleRequest {
            center: projection.project_coords(city.earth_coords),
            radius: density.radius(city.density),
            count: density.count(city.population),
            bank_eligible: city.density > config.bank_density_threshold,
        };
        let points = sample_in_polygons(
            &shapes,
            &request,
            config.rich_probability,
            config.max_sample_failures,
            &mut rng,
        );

        if points.len() < request.count {
            starved += 1;
            debug!(
                country = %city.country,
                wanted = request.count,
                got = points.len(),
                "city sampling starved"
            );
        }
        sampled += points.len();

        let slot = *group_index.entry(city.country.clone()).or_insert_with(|| {
            groups.push((city.country.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.extend(points);
    }

    let mut nodes = Vec::with_capacity(sampled + 1);
    for (country, points) in &groups {
        for point in merge_clusters(points, config.merge_threshold) {
            let id = nodes.len() as NodeId;
            let (lon, lat) = projection.unproject(point.position.x, point.position.y);
            let mut node = BaseNode::new(id, point.position, [lon, lat], country.as_str(), point.node_type);
            node.radius = point.radius;
            nodes.push(node);
        }
    }

    apply_overrides(&mut nodes, &inputs.overrides, config);
    inject_home(&mut nodes, &polygons, config);

    info!(
        cities = inputs.cities.len(),
        sampled,
        nodes = nodes.len(),
        starved,
        "generated base nodes"
    );
    nodes
}

fn apply_overrides(nodes: &mut [BaseNode], overrides: &NodeOverrides, config: &WorldConfig) {
    for node in nodes.iter_mut() {
        let Some(fix) = overrides.get(&node.id) else {
            continue;
        };
        if fix.x.is_some() || fix.y.is_some() {
            node.position.x = fix.x.unwrap_or(node.position.x);
            node.position.y = fix.y.unwrap_or(node.position.y);
            let (lon, lat) = config.projection.unproject(node.position.x, node.position.y);
            node.earth_coords = [lon, lat];
        }
        if let Some(node_type) = fix.node_type {
            node.node_type = node_type;
        }
        if let Some(scaling) = fix.scaling {
            node.scaling = scaling.max(0.0);
        }
    }
}

fn inject_home(nodes: &mut Vec<BaseNode>, polygons: &PolygonSet, config: &WorldConfig) {
    let home = config.home;
    let position = config.projection.project_coords(home.earth_coords);
    let country = polygons.country_at(position).unwrap_or_default().to_string();

    let mut node = BaseNode::new(home.id, position, home.earth_coords, country, NodeType::Home);
    node.scaling = 0.0;

    match nodes.iter_mut().find(|n| n.id == home.id) {
        Some(slot) => *slot = node,
        None => nodes.push(node),
    }
}
