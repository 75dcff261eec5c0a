//! World generator binary — writes a fresh world store and its config.
//!
//! Usage: cargo run --release --bin generate_world -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Start from an existing config JSON
//!   --name <NAME>     World name (default: "world")
//!   --width <N>       World width in chunks
//!   --height <N>      World height in chunks
//!   --depth <N>       World depth in chunks
//!   --chunk <N>       Voxels per chunk side
//!   --seed <SEED>     Terrain seed
//!   --jobs <N>        Max parallel chunk builds (default: 4)
//!   --import <PATH>   Convert a legacy JSON world instead of generating
//!   --export-legacy <PATH>  Also write the world in the legacy JSON layout
//!
//! Output structure:
//!   assets/worlds/<name>.dat    # chunk store
//!   assets/worlds/<name>.json   # world config, read back by the driver

use std::path::PathBuf;
use std::time::Instant;

use voxstream::core::WorldConfig;
use voxstream::generation::create_world;
use voxstream::streaming::{import_legacy_world, ChunkStore, LegacyWorld};
use voxstream::terrain::TerrainGenerator;
use voxstream::voxel::WorldGrid;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let name = parse_str_arg(&args, "--name").unwrap_or_else(|| "world".to_string());
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);
    let import = parse_str_arg(&args, "--import").map(PathBuf::from);
    let export = parse_str_arg(&args, "--export-legacy").map(PathBuf::from);

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => WorldConfig::load(&PathBuf::from(path)).unwrap_or_else(|e| {
            log::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }),
        None => WorldConfig::default(),
    };
    if let Some(w) = parse_u32_arg(&args, "--width") {
        config.width = w;
    }
    if let Some(h) = parse_u32_arg(&args, "--height") {
        config.height = h;
    }
    if let Some(d) = parse_u32_arg(&args, "--depth") {
        config.depth = d;
    }
    if let Some(c) = parse_u32_arg(&args, "--chunk") {
        config.chunk_size = c;
    }
    if let Some(seed) = parse_u32_arg(&args, "--seed") {
        config.terrain.seed = seed;
    }

    let output_dir = PathBuf::from("assets/worlds");
    config.world_path = output_dir.join(format!("{}.dat", name));
    let config_path = output_dir.join(format!("{}.json", name));

    if let Err(e) = config.validate() {
        log::error!("{}", e);
        std::process::exit(1);
    }

    // Limit rayon's thread pool to cap peak memory usage
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .expect("Failed to configure thread pool");

    println!("=== Voxstream World Generator ===");
    println!("World:  {}", name);
    println!("Size:   {} x {} x {} chunks of {}^3", config.width, config.height, config.depth, config.chunk_size);
    match &import {
        Some(path) => println!("Import: {}", path.display()),
        None => println!("Seed:   {}", config.terrain.seed),
    }
    println!("Jobs:   {} parallel", jobs);
    println!("Output: {}", config.world_path.display());
    println!();

    let start = Instant::now();
    let mut grid = WorldGrid::new(config.dims(), config.chunk_size);
    let store = ChunkStore::new(&config.world_path);

    let bytes_written = match &import {
        Some(path) => import_legacy_world(path, &mut grid, &store),
        None => {
            let generator = TerrainGenerator::new(config.terrain.clone());
            create_world(&generator, &mut grid, &store).map(|summary| summary.bytes_written)
        }
    };
    let bytes_written = match bytes_written {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("World creation failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.save(&config_path) {
        log::error!("Failed to write config {}: {}", config_path.display(), e);
        std::process::exit(1);
    }

    if let Some(path) = &export {
        let exported = LegacyWorld::from_store(&store, config.dims()).and_then(|world| world.save(path));
        if let Err(e) = exported {
            log::error!("Failed to export legacy world {}: {}", path.display(), e);
            std::process::exit(1);
        }
        println!("Legacy: {}", path.display());
    }

    let non_empty = grid.resident_chunks().filter(|chunk| !chunk.is_empty()).count();
    let raw = grid.volume() as f64 * grid.chunk_volume() as f64;
    println!("=== Generation Complete ===");
    println!("Chunks: {} ({} non-empty)", grid.volume(), non_empty);
    println!("Size:   {:.1} KB on disk ({:.1}x smaller than raw)",
        bytes_written as f64 / 1024.0,
        raw / bytes_written.max(1) as f64);
    println!("Time:   {:.2}s", start.elapsed().as_secs_f64());
    println!();
    println!("To stream this world:");
    println!("  cargo run --release -- --config {}", config_path.display());
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
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
