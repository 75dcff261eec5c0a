//! Windowed chunk streaming with a bounded blocking I/O pool

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use glam::Vec3;
use tokio::runtime::Runtime;
use tokio::task::JoinSet;

use crate::core::{Error, LoaderConfig, Result, VoxelId, AIR};
use crate::streaming::disk_io::ChunkStore;
use crate::streaming::window::StreamingWindow;
use crate::voxel::chunk::{ChunkCoord, ChunkHeader};
use crate::voxel::world::WorldGrid;

/// Counters for the most recent [`StreamingLoader::update`] call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Slots inside the streaming window
    pub candidates: usize,
    /// Non-resident slots that were scheduled for loading
    pub scheduled: usize,
    /// Loads that succeeded (possibly after length normalization)
    pub loaded: usize,
    /// Loads that failed and were installed as air
    pub fallbacks: usize,
    /// Successful loads whose length had to be padded or truncated
    pub normalized: usize,
}

/// Streams chunks from a [`ChunkStore`] into a [`WorldGrid`] around an
/// observer.
///
/// Each `update` is one batch: it schedules every missing chunk in the
/// window, waits for all of them, then installs the results. Workers only
/// read the file and decode; the grid is written by the calling thread
/// after the join, so the arena needs no locking.
pub struct StreamingLoader {
    store: Arc<ChunkStore>,
    config: LoaderConfig,
    runtime: Runtime,
    last_stats: LoadStats,
}

impl StreamingLoader {
    /// Open a loader for `grid`.
    ///
    /// Fails with [`Error::ConfigurationMismatch`] when the store's chunk
    /// count differs from the grid volume: addressing would otherwise place
    /// chunks in the wrong slots.
    pub fn open(store: ChunkStore, grid: &WorldGrid, config: LoaderConfig) -> Result<Self> {
        let stored = store.chunk_count()?;
        if stored as usize != grid.volume() {
            return Err(Error::ConfigurationMismatch {
                stored,
                expected: grid.volume(),
            });
        }

        let io_workers = config.io_workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(io_workers)
            .thread_name("chunk-io")
            .build()
            .map_err(|e| Error::Streaming(format!("failed to build I/O pool: {}", e)))?;

        // Room for over-long records to show up as over-long
        let store = store.with_decode_limit(grid.chunk_volume().saturating_mul(2).max(1));

        log::info!(
            "Streaming {} chunks from {} ({} I/O workers, render distance {})",
            stored,
            store.path().display(),
            io_workers,
            config.render_distance
        );

        Ok(Self {
            store: Arc::new(store),
            config,
            runtime,
            last_stats: LoadStats::default(),
        })
    }

    pub fn config(&self) -> LoaderConfig {
        self.config
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn last_stats(&self) -> LoadStats {
        self.last_stats
    }

    /// Window the loader would stream for `observer`.
    pub fn window(&self, grid: &WorldGrid, observer: Vec3) -> StreamingWindow {
        StreamingWindow::for_observer(observer, grid.chunk_size(), self.config.render_distance, grid.dims())
    }

    /// Make every chunk in the observer's window resident.
    ///
    /// Returns the headers of chunks that became resident during this call,
    /// in no particular order. Per-chunk failures are logged and installed
    /// as air; they never abort the batch.
    ///
    /// Blocks the calling thread until the batch is done, so it must not be
    /// called from inside an async runtime.
    pub fn update(&mut self, grid: &mut WorldGrid, observer: Vec3) -> Vec<ChunkHeader> {
        let window = self.window(grid, observer);

        let pending: Vec<(usize, ChunkCoord)> = window
            .coords()
            .filter_map(|c| grid.index(c.x, c.y, c.z).map(|i| (i, c)))
            .filter(|(i, _)| !grid.is_resident(*i))
            .collect();

        let mut stats = LoadStats {
            candidates: window.len(),
            scheduled: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            self.last_stats = stats;
            return Vec::new();
        }

        let mut results = self.load_batch(pending.iter().map(|(i, _)| *i).collect());

        let volume = grid.chunk_volume();
        let mut installed = Vec::with_capacity(pending.len());
        for (index, position) in pending {
            let voxels = match results.remove(&index) {
                Some(Ok(voxels)) => {
                    stats.loaded += 1;
                    if voxels.len() != volume {
                        log::debug!(
                            "Chunk {} decoded to {} voxels, normalizing to {}",
                            index,
                            voxels.len(),
                            volume
                        );
                        stats.normalized += 1;
                    }
                    normalize(voxels, volume)
                }
                Some(Err(e)) => {
                    log::warn!("Chunk {} at {:?} failed to load, using air: {}", index, position, e);
                    stats.fallbacks += 1;
                    vec![AIR; volume]
                }
                None => {
                    log::warn!("Chunk {} at {:?} produced no result, using air", index, position);
                    stats.fallbacks += 1;
                    vec![AIR; volume]
                }
            };
            installed.push(grid.set_chunk(index, position, &voxels));
        }

        log::debug!(
            "Streamed {} chunks around {:?} ({} loaded, {} fallbacks, {} resident)",
            installed.len(),
            observer,
            stats.loaded,
            stats.fallbacks,
            grid.resident_count()
        );
        self.last_stats = stats;
        installed
    }

    /// Run one load per index on the blocking pool and wait for all of them.
    fn load_batch(&self, indices: Vec<usize>) -> HashMap<usize, Result<Vec<VoxelId>>> {
        self.runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for index in indices {
                let store = Arc::clone(&self.store);
                tasks.spawn_blocking(move || (index, load_guarded(index, || store.load_by_index(index))));
            }

            let mut results = HashMap::with_capacity(tasks.len());
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, result)) => {
                        results.insert(index, result);
                    }
                    Err(e) => {
                        log::error!("Chunk load task failed to join: {}", e);
                    }
                }
            }
            results
        })
    }
}

/// Run one chunk load, turning a panic inside it into an error so the
/// index is never lost.
fn load_guarded<F>(index: usize, load: F) -> Result<Vec<VoxelId>>
where
    F: FnOnce() -> Result<Vec<VoxelId>>,
{
    match panic::catch_unwind(AssertUnwindSafe(load)) {
        Ok(result) => result,
        Err(_) => Err(Error::Streaming(format!("load of chunk {} panicked", index))),
    }
}

/// Force a decoded chunk to exactly `volume` voxels.
///
/// Short data is padded with air; excess is dropped.
pub fn normalize(mut voxels: Vec<VoxelId>, volume: usize) -> Vec<VoxelId> {
    voxels.resize(volume, AIR);
    voxels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::logging;
    use crate::streaming::rle;
    use crate::voxel::world::WorldDims;
    use tempfile::TempDir;

    const CHUNK_SIZE: u32 = 2;
    const VOLUME: usize = 8;

    fn dims() -> WorldDims {
        WorldDims::new(10, 3, 10)
    }

    fn config() -> LoaderConfig {
        LoaderConfig {
            render_distance: 4,
            io_workers: 3,
        }
    }

    /// Chunk data that identifies its slot: first voxel carries the index.
    fn pattern(index: usize) -> Vec<VoxelId> {
        let mut data = vec![(index % 251) as u8 + 1; VOLUME];
        data[VOLUME - 1] = 0;
        data
    }

    fn saved_world(temp_dir: &TempDir) -> ChunkStore {
        let store = ChunkStore::new(temp_dir.path().join("world.dat"));
        let mut grid = WorldGrid::new(dims(), CHUNK_SIZE);
        for i in 0..grid.volume() {
            grid.set_chunk(i, grid.coord_of(i), &pattern(i));
        }
        store.save(&grid).expect("save failed");
        store
    }

    /// Observer standing in chunk (5, 1, 5)
    fn observer() -> Vec3 {
        Vec3::new(5.0 * CHUNK_SIZE as f32 + 0.5, 1.0 * CHUNK_SIZE as f32, 5.0 * CHUNK_SIZE as f32 + 0.5)
    }

    #[test]
    fn test_open_rejects_mismatched_volume() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = saved_world(&temp_dir);

        let grid = WorldGrid::new(WorldDims::new(10, 2, 10), CHUNK_SIZE);
        match StreamingLoader::open(store, &grid, config()) {
            Err(Error::ConfigurationMismatch { stored, expected }) => {
                assert_eq!(stored, 300);
                assert_eq!(expected, 200);
            }
            Err(e) => panic!("expected ConfigurationMismatch, got {:?}", e),
            Ok(_) => panic!("expected ConfigurationMismatch, got a loader"),
        }
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = ChunkStore::new(temp_dir.path().join("missing.dat"));
        let grid = WorldGrid::new(dims(), CHUNK_SIZE);
        assert!(matches!(StreamingLoader::open(store, &grid, config()), Err(Error::Io(_))));
    }

    #[test]
    fn test_update_loads_window() {
        logging::init_for_tests();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = saved_world(&temp_dir);
        let mut grid = WorldGrid::new(dims(), CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");

        let installed = loader.update(&mut grid, observer());

        assert_eq!(installed.len(), 48);
        assert_eq!(grid.resident_count(), 48);
        let stats = loader.last_stats();
        assert_eq!(stats.candidates, 48);
        assert_eq!(stats.scheduled, 48);
        assert_eq!(stats.loaded, 48);
        assert_eq!(stats.fallbacks, 0);

        for header in &installed {
            let p = header.position;
            assert!((3..7).contains(&p.x) && (3..7).contains(&p.z) && (0..3).contains(&p.y));
            assert_eq!(grid.index(p.x, p.y, p.z), Some(header.index));
            assert_eq!(grid.slice_at(header.index), &pattern(header.index)[..]);
            assert!(!header.is_empty);
        }

        // Nothing outside the window was touched
        let outside = grid.index(0, 0, 0).unwrap();
        assert!(!grid.is_resident(outside));
    }

    #[test]
    fn test_second_update_is_idempotent() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = saved_world(&temp_dir);
        let mut grid = WorldGrid::new(dims(), CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");

        assert_eq!(loader.update(&mut grid, observer()).len(), 48);
        let again = loader.update(&mut grid, observer());

        assert!(again.is_empty());
        assert_eq!(loader.last_stats().scheduled, 0);
        assert_eq!(loader.last_stats().candidates, 48);
        assert_eq!(grid.resident_count(), 48);
    }

    #[test]
    fn test_resident_slots_are_not_rescheduled() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = saved_world(&temp_dir);
        let mut grid = WorldGrid::new(dims(), CHUNK_SIZE);

        // Pre-populate two slots inside the window with different data
        let a = grid.index(3, 0, 3).unwrap();
        let b = grid.index(6, 2, 6).unwrap();
        grid.set_chunk(a, grid.coord_of(a), &[42; VOLUME]);
        grid.set_chunk(b, grid.coord_of(b), &[0; VOLUME]);

        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");
        let installed = loader.update(&mut grid, observer());

        assert_eq!(installed.len(), 46);
        assert_eq!(loader.last_stats().scheduled, 46);
        assert!(installed.iter().all(|h| h.index != a && h.index != b));
        assert_eq!(grid.slice_at(a), &[42; VOLUME]);
        assert!(grid.header(b).unwrap().is_empty);
    }

    #[test]
    fn test_moving_observer_loads_only_new_columns() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = saved_world(&temp_dir);
        let mut grid = WorldGrid::new(dims(), CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");

        loader.update(&mut grid, observer());
        let moved = observer() + Vec3::new(CHUNK_SIZE as f32, 0.0, 0.0);
        let installed = loader.update(&mut grid, moved);

        // Window slides from x in 3..7 to 4..8: one new column of 4 z by 3 y
        assert_eq!(installed.len(), 12);
        assert!(installed.iter().all(|h| h.position.x == 7));
    }

    #[test]
    fn test_corrupt_record_falls_back_to_air() {
        logging::init_for_tests();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = ChunkStore::new(temp_dir.path().join("world.dat"));
        let grid_dims = dims();
        let bad = grid_dims.index(4, 1, 4).unwrap();

        let payloads: Vec<Vec<u8>> = (0..grid_dims.volume())
            .map(|i| {
                let mut payload = rle::encode(&pattern(i));
                if i == bad {
                    // Truncated trailing run
                    payload.extend_from_slice(&[1, 0, 0]);
                }
                payload
            })
            .collect();
        store.write_payloads(payloads).unwrap();

        let mut grid = WorldGrid::new(grid_dims, CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");
        let installed = loader.update(&mut grid, observer());

        assert_eq!(installed.len(), 48);
        assert_eq!(loader.last_stats().fallbacks, 1);
        assert_eq!(loader.last_stats().loaded, 47);

        let chunk = grid.chunk(bad).resident().expect("corrupt slot should still be resident");
        assert!(chunk.is_empty());
        assert!(chunk.voxels().iter().all(|&v| v == AIR));

        for header in installed.iter().filter(|h| h.index != bad) {
            assert_eq!(grid.slice_at(header.index), &pattern(header.index)[..]);
        }
    }

    #[test]
    fn test_short_and_long_records_are_normalized() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = ChunkStore::new(temp_dir.path().join("world.dat"));
        let grid_dims = WorldDims::new(2, 1, 1);

        store
            .write_payloads(vec![
                rle::encode(&[5; 3]),
                rle::encode(&[6; VOLUME + 4]),
            ])
            .unwrap();

        let mut grid = WorldGrid::new(grid_dims, CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");
        let installed = loader.update(&mut grid, Vec3::ZERO);

        assert_eq!(installed.len(), 2);
        assert_eq!(loader.last_stats().normalized, 2);
        assert_eq!(grid.slice_at(0), &[5, 5, 5, 0, 0, 0, 0, 0]);
        assert_eq!(grid.slice_at(1), &[6; VOLUME]);
    }

    #[test]
    fn test_empty_record_installs_air() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = ChunkStore::new(temp_dir.path().join("world.dat"));
        store.write_payloads(vec![Vec::new()]).unwrap();

        let mut grid = WorldGrid::new(WorldDims::new(1, 1, 1), CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");
        let installed = loader.update(&mut grid, Vec3::ZERO);

        assert_eq!(installed.len(), 1);
        assert!(installed[0].is_empty);
        assert_eq!(loader.last_stats().fallbacks, 0);
    }

    #[test]
    fn test_observer_outside_world_loads_nothing() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = saved_world(&temp_dir);
        let mut grid = WorldGrid::new(dims(), CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");

        let installed = loader.update(&mut grid, Vec3::new(-100.0, 0.0, -100.0));
        assert!(installed.is_empty());
        assert_eq!(loader.last_stats(), LoadStats::default());

        for far in [Vec3::new(1.0e12, 0.0, 5.0), Vec3::new(5.0, 0.0, -1.0e12)] {
            assert!(loader.update(&mut grid, far).is_empty());
        }
        assert_eq!(grid.resident_count(), 0);
    }

    #[test]
    fn test_store_removed_after_open_installs_air() {
        logging::init_for_tests();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = saved_world(&temp_dir);
        let mut grid = WorldGrid::new(dims(), CHUNK_SIZE);
        let mut loader = StreamingLoader::open(store, &grid, config()).expect("open failed");

        std::fs::remove_file(loader.store().path()).unwrap();
        let installed = loader.update(&mut grid, observer());

        assert_eq!(installed.len(), 48);
        assert_eq!(loader.last_stats().fallbacks, 48);
        assert_eq!(loader.last_stats().loaded, 0);
        for header in &installed {
            assert!(header.is_empty);
            assert!(grid.slice_at(header.index).iter().all(|&v| v == AIR));
        }
    }

    #[test]
    fn test_panicking_load_becomes_error() {
        let result = load_guarded(7, || panic!("decoder bug"));
        match result {
            Err(Error::Streaming(msg)) => assert!(msg.contains("chunk 7")),
            other => panic!("expected Streaming error, got {:?}", other),
        }

        assert_eq!(load_guarded(0, || Ok(vec![1, 2])).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(vec![1, 2], 4), vec![1, 2, 0, 0]);
        assert_eq!(normalize(vec![1, 2, 3, 4, 5], 4), vec![1, 2, 3, 4]);
        assert_eq!(normalize(Vec::new(), 3), vec![0, 0, 0]);
    }
}
