//! Drop Boxes - headless run of the rigid solver
//!
//! Spawns cubes above the ground plane and prints statistics once per
//! simulated second. Pass a YAML or JSON config path to override defaults.
//!
//! Run with: RUST_LOG=info cargo run --release --example drop_boxes [config.yaml]

use rigid3d::{test_geometry, RigidSolver, SolverConfig, TickStats};
use std::path::Path;
use std::time::Instant;

const SIM_SECONDS: f64 = 20.0;

fn load_config() -> Result<SolverConfig, Box<dyn std::error::Error>> {
    let Some(arg) = std::env::args().nth(1) else {
        return Ok(SolverConfig {
            spawn_interval: 0.25,
            target_count: 48,
            ..Default::default()
        });
    };
    let path = Path::new(&arg);
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => SolverConfig::load_json(path)?,
        _ => SolverConfig::load_yaml(path)?,
    };
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = load_config()?;
    let ticks_per_second = (1.0 / config.dt).round() as u64;
    let mut solver = RigidSolver::new(config, &test_geometry::cube(1.0))?;

    println!("=== Drop Boxes ===");
    println!(
        "Samples per body: {}, fallback: {}",
        solver.template().sample_count(),
        solver.template().used_fallback
    );

    let start = Instant::now();
    let mut window = TickStats::default();
    while solver.elapsed() < SIM_SECONDS {
        let Some(stats) = solver.step() else {
            break;
        };
        window.dropped_overflow += stats.dropped_overflow;
        window.out_of_grid += stats.out_of_grid;
        window.contacts += stats.contacts;

        if (stats.tick + 1) % ticks_per_second == 0 {
            let lowest = solver
                .instances()
                .map(|(p, _)| p.y)
                .fold(f32::INFINITY, f32::min);
            println!(
                "t = {:5.1}s  bodies {:3}  particles {:6}  contacts {:8}  dropped {:5}  outside {:5}  lowest y {:.3}",
                solver.elapsed(),
                stats.active_bodies,
                stats.particles,
                window.contacts,
                window.dropped_overflow,
                window.out_of_grid,
                lowest
            );
            window = TickStats::default();
        }
    }

    let wall = start.elapsed().as_secs_f64();
    println!(
        "{} ticks in {:.2}s ({:.1} ticks/s)",
        solver.tick(),
        wall,
        solver.tick() as f64 / wall
    );
    Ok(())
}
