//! Example: Generate a small world and let a greedy player loose on it
//!
//! Run with `RUST_LOG=rust_node_network=debug` to see every action.

use std::sync::Arc;

use rust_node_network::config::DEFAULT_HOME_ID;
use rust_node_network::*;
use tracing_subscriber::EnvFilter;

/// Axis-aligned square country outline centred on (lon, lat)
fn square(lon: f64, lat: f64, half: f64) -> Vec<Vec<[f64; 2]>> {
    vec![vec![
        [lon - half, lat - half],
        [lon + half, lat - half],
        [lon + half, lat + half],
        [lon - half, lat + half],
    ]]
}

fn inputs() -> WorldInputs {
    let mut inputs = WorldInputs::default();
    inputs.polygons.countries.insert("Westland".into(), vec![square(-6.0, 40.0, 5.0)]);
    inputs.polygons.countries.insert("Eastland".into(), vec![square(4.0, 40.0, 5.0)]);

    for (lon, lat, country, population, density) in [
        (-8.0, 42.0, "Westland", 4_000_000.0, 3500.0),
        (-4.0, 37.0, "Westland", 900_000.0, 800.0),
        (2.0, 41.0, "Eastland", 6_000_000.0, 5000.0),
        (6.0, 38.0, "Eastland", 1_500_000.0, 1200.0),
    ] {
        inputs.cities.push(CityRecord {
            earth_coords: [lon, lat],
            country: country.into(),
            population,
            density,
        });
    }
    inputs
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = WorldConfigBuilder::new()
        .seed(42)
        .home(DEFAULT_HOME_ID, [-6.0, 40.0])
        .build()?;
    let world = Arc::new(World::generate(&config, &inputs())?);
    println!("World: {} nodes, home {}", world.len(), world.home_id());

    let store = MemoryStore::new();
    let sim_config = SimulationConfig {
        save_interval: 100,
        ..Default::default()
    };
    let mut engine = SimulationEngine::with_rng_seed(Arc::clone(&world), sim_config, 7)
        .with_store(store.clone());

    for tick in 0..600 {
        // Scan from every idle edge, hack whatever is affordable
        for id in engine.graph().edge_nodes() {
            engine.apply(Action::Scan, id);
        }
        for id in engine.rendered_node_ids() {
            engine.apply(Action::Hack, id);
        }
        for key in UpgradeKey::ALL {
            engine.buy_upgrade(key);
        }

        for event in engine.advance() {
            match event {
                SimulationEvent::Investigation { target: Some(target), disconnected, .. } => {
                    println!("[{:>3}] investigation cut node {} ({} lost)", tick, target, disconnected.len());
                }
                SimulationEvent::Saved { bytes, .. } => {
                    println!("[{:>3}] saved {} bytes", tick, bytes);
                }
                _ => {}
            }
        }
    }

    let economy = engine.economy();
    println!("\nAfter {} ticks:", engine.tick());
    println!("  Owned nodes: {}", engine.graph().owned_count());
    println!("  Discovered:  {}", engine.rendered_node_ids().len());
    println!("  Money:       {:.1}", economy.money);
    println!("  Suspicion:   {:.0}", economy.suspicion);
    for (key, level) in economy.upgrades.iter() {
        println!("  {:?} level {}", key, level);
    }

    // Resume from the last automatic save
    if let Some(payload) = store.latest() {
        let resumed = SimulationEngine::load(world, SimulationConfig::default(), &payload)?;
        println!("\nReloaded save: {} owned nodes", resumed.graph().owned_count());
    }

    Ok(())
}
