//! Voxstream - headless streaming driver
//!
//! Opens a world store and walks an observer across it, streaming chunks in
//! as the window moves. Creates the world first if the store file does not
//! exist yet.
//!
//! Usage: cargo run --release -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>   World config JSON (default: assets/worlds/world.json)
//!   --steps <N>       Observer steps to simulate (default: 64)
//!   --speed <V>       Voxels moved per step (default: half a chunk)

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use voxstream::core::{logging, Result, Vec3, WorldConfig};
use voxstream::generation::create_world;
use voxstream::streaming::{ChunkStore, StreamingLoader};
use voxstream::terrain::TerrainGenerator;
use voxstream::voxel::WorldGrid;

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = parse_str_arg(&args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets/worlds/world.json"));
    let steps = parse_usize_arg(&args, "--steps").unwrap_or(64);
    let speed = parse_f32_arg(&args, "--speed");

    match run(config_path, steps, speed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: PathBuf, steps: usize, speed: Option<f32>) -> Result<()> {
    let config = if config_path.exists() {
        log::info!("Loading config from {}", config_path.display());
        WorldConfig::load(&config_path)?
    } else {
        log::info!("No config at {}, using defaults", config_path.display());
        let config = WorldConfig::default();
        config.validate()?;
        config
    };

    let dims = config.dims();
    let store = ChunkStore::new(&config.world_path);

    if !store.exists() {
        log::info!("World file {} not found, generating", store.path().display());
        let generator = TerrainGenerator::new(config.terrain.clone());
        let mut fresh = WorldGrid::new(dims, config.chunk_size);
        create_world(&generator, &mut fresh, &store)?;
        // Drop the generated grid; the run below streams like any later run
    }

    let mut grid = WorldGrid::new(dims, config.chunk_size);
    let mut loader = StreamingLoader::open(store, &grid, config.loader_config())?;

    let chunk = config.chunk_size as f32;
    let speed = speed.unwrap_or(chunk * 0.5);
    let height = dims.height as f32 * chunk * 0.5;
    let heading = Vec3::new(1.0, 0.0, 0.6).normalize();
    let mut observer = Vec3::new(chunk * 0.5, height, chunk * 0.5);

    let start = Instant::now();
    let mut total_installed = 0;
    let mut total_fallbacks = 0;
    for step in 0..steps {
        let installed = loader.update(&mut grid, observer);
        let stats = loader.last_stats();
        total_installed += installed.len();
        total_fallbacks += stats.fallbacks;

        if !installed.is_empty() {
            let solid = installed.iter().filter(|h| !h.is_empty).count();
            log::info!(
                "step {:>4}: observer ({:.1}, {:.1}, {:.1}) -> {} new chunks ({} solid), {} resident",
                step,
                observer.x,
                observer.y,
                observer.z,
                installed.len(),
                solid,
                grid.resident_count()
            );
        }
        observer += heading * speed;
    }

    log::info!(
        "Streamed {} chunks in {} steps ({} fallbacks) in {:.2?}; {}/{} resident",
        total_installed,
        steps,
        total_fallbacks,
        start.elapsed(),
        grid.resident_count(),
        grid.volume()
    );
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
