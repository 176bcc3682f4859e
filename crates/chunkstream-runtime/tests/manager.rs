mod common;

use std::sync::{Arc, Barrier};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use chunkstream_blocks::Cell;
use chunkstream_geom::{Aabb, Ray, Vec3};
use chunkstream_io::ChunkStorage;
use chunkstream_runtime::LoadError;
use chunkstream_world::{ChunkKey, ChunkLayout, FlatTerrain, GenerateError, TerrainGenerator};

use common::{harness, harness_with, small_config, wait_until};

const WAIT: Duration = Duration::from_secs(5);
const ORIGIN: ChunkKey = ChunkKey::new(0, 0, 0);

fn everything(_: &Aabb) -> bool {
    true
}

#[test]
fn observer_streams_in_surrounding_region() {
    let h = harness();
    h.manager.observer_moved(Vec3::new(0.5, 0.5, 0.5), everything);
    assert_eq!(h.manager.observer_chunk(), Some(ORIGIN));

    let region: Vec<ChunkKey> = ORIGIN.neighborhood(1, 0).collect();
    assert!(wait_until(WAIT, || region.iter().all(|k| h.manager.maybe_get(*k).is_some())));
    assert!(wait_until(WAIT, || h.manager.published().len() == region.len()));
    for chunk in h.manager.published().iter() {
        assert!(chunk.is_visible());
        assert!(!chunk.needs_rebuild());
        assert!(chunk.has_render());
    }
    let stats = h.manager.stats();
    assert_eq!(stats.loads_completed as usize, region.len());
    assert_eq!(stats.cache.entries, region.len());
}

#[test]
fn moving_within_a_chunk_requests_nothing() {
    let h = harness();
    h.manager.observer_moved(Vec3::ZERO, everything);
    assert!(wait_until(WAIT, || h.manager.missing_in_region(ORIGIN).is_empty()));
    let loads = h.manager.stats().cache.misses;
    h.manager.observer_moved(Vec3::new(1.5, 0.0, 1.5), everything);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.manager.stats().cache.misses, loads);
}

#[test]
fn missing_keys_are_ordered_visible_then_nearest() {
    let h = harness();
    // Only chunks with cx >= 1 are in view.
    h.manager.set_view(|b: &Aabb| b.min.x >= 0.0);
    let order = h.manager.missing_in_region(ORIGIN);
    assert_eq!(order.len(), 9);
    assert_eq!(order[0], ChunkKey::new(1, 0, 0));
    assert!(order[1..3].iter().all(|k| k.cx == 1 && k.cz != 0));
    assert_eq!(order[3], ORIGIN);
    assert!(order[4..].iter().all(|k| k.cx != 1));
    assert!(order[4..6].iter().all(|k| k.distance_sq(ORIGIN) == 1));
}

#[test]
fn edit_sets_rebuild_until_next_update() {
    let h = harness();
    let chunk = h.manager.get_or_load(ORIGIN).unwrap();
    assert!(!chunk.is_empty());
    assert!(!chunk.needs_rebuild());
    assert!(chunk.has_render());
    assert!(!chunk.is_dirty());
    assert!(wait_until(WAIT, || chunk.is_visible()));

    // A blocked rebuild holds the chunk's data lock; only flags are read
    // until the gate opens.
    h.mesher.close();
    assert!(h.manager.set_cell(&chunk, 1, 1, 1, Cell::AIR));
    assert!(chunk.needs_rebuild());
    assert!(chunk.is_dirty());

    h.mesher.open();
    assert!(wait_until(WAIT, || !chunk.needs_rebuild()));
    assert_eq!(chunk.cell(1, 1, 1), Cell::AIR);
    assert!(chunk.is_dirty());
}

#[test]
fn out_of_range_edit_is_rejected() {
    let h = harness();
    let a = h.manager.get_or_load(ORIGIN).unwrap();
    let b = h.manager.get_or_load(ChunkKey::new(1, 0, 0)).unwrap();
    assert!(wait_until(WAIT, || !a.needs_rebuild() && !b.needs_rebuild()));
    let before = a.lock_data().cells().to_vec();

    // x == 4 would alias cell (0, 1, 2); y == 4 indexes past the array.
    assert!(!h.manager.set_cell(&a, 4, 1, 1, Cell::WATER));
    assert!(!h.manager.set_cell(&a, 0, 4, 0, Cell::SOLID));

    assert_eq!(a.lock_data().cells(), &before[..]);
    assert_eq!(a.cell(0, 1, 2), Cell::SOLID);
    assert!(!a.is_dirty());
    assert!(!a.needs_rebuild());
    assert!(!b.needs_rebuild());
    assert!(!a.is_disposed());
}

#[test]
fn boundary_edit_invalidates_face_neighbor_only() {
    let h = harness();
    let a = h.manager.get_or_load(ORIGIN).unwrap();
    let b = h.manager.get_or_load(ChunkKey::new(1, 0, 0)).unwrap();
    let c = h.manager.get_or_load(ChunkKey::new(0, 0, 1)).unwrap();
    assert!(!b.needs_rebuild() && !c.needs_rebuild());

    let b_epoch = b.flags().rebuild_epoch();
    let c_epoch = c.flags().rebuild_epoch();
    assert!(h.manager.set_cell(&a, 1, 1, 1, Cell::AIR));
    assert!(wait_until(WAIT, || !a.needs_rebuild()));
    assert_eq!(b.flags().rebuild_epoch(), b_epoch);
    assert_eq!(c.flags().rebuild_epoch(), c_epoch);
    assert!(!b.needs_rebuild());

    h.mesher.close();
    // x = 3 is on the +X face only.
    assert!(h.manager.set_cell(&a, 3, 1, 1, Cell::AIR));
    assert!(b.needs_rebuild());
    assert!(!c.needs_rebuild());
    assert!(!b.is_dirty());

    h.mesher.open();
    assert!(wait_until(WAIT, || !a.needs_rebuild() && !b.needs_rebuild()));
}

#[test]
fn empty_chunks_are_never_published() {
    let h = harness();
    let sky = h.manager.get_or_load(ChunkKey::new(0, 1, 0)).unwrap();
    let ground = h.manager.get_or_load(ORIGIN).unwrap();
    assert!(sky.is_empty());
    assert!(wait_until(WAIT, || h.manager.published().iter().any(|c| Arc::ptr_eq(c, &ground))));
    assert!(!h.manager.published().iter().any(|c| Arc::ptr_eq(c, &sky)));
    assert!(!sky.is_visible());
}

#[test]
fn held_snapshot_survives_republish() {
    let h = harness();
    for k in ORIGIN.neighborhood(1, 0) {
        h.manager.get_or_load(k).unwrap();
    }
    assert!(wait_until(WAIT, || h.manager.published().len() == 9));
    let snap = h.manager.published();
    let keys: Vec<ChunkKey> = snap.iter().map(|c| c.key()).collect();

    let manager = &h.manager;
    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..50 {
                if i % 2 == 0 {
                    manager.set_view(|_: &Aabb| false);
                } else {
                    manager.set_view(everything);
                }
                manager.request_publish();
                manager.publish_now();
            }
        });
        for _ in 0..200 {
            let now: Vec<ChunkKey> = snap.iter().map(|c| c.key()).collect();
            assert_eq!(now, keys);
        }
    });
    assert_eq!(snap.len(), 9);
}

#[test]
fn eviction_keeps_region_and_writes_back_edits() {
    let mut cfg = small_config();
    cfg.cache.capacity = 10;
    let h = harness_with(cfg, Arc::new(FlatTerrain::new(0)));
    let region: Vec<ChunkKey> = ORIGIN.neighborhood(1, 0).collect();
    for k in &region {
        h.manager.get_or_load(*k).unwrap();
    }

    let far = ChunkKey::new(10, 0, 0);
    let far_chunk = h.manager.get_or_load(far).unwrap();
    assert!(h.manager.set_cell(&far_chunk, 0, 3, 0, Cell::WATER));
    drop(far_chunk);

    for cz in 1..6 {
        h.manager.get_or_load(ChunkKey::new(10, 0, cz)).unwrap();
        assert!(region.iter().all(|k| h.manager.maybe_get(*k).is_some()));
        assert!(h.manager.stats().cache.entries <= 10);
    }
    assert!(h.manager.maybe_get(far).is_none());
    let saved = h.storage.get(far).expect("evicted edit written back");
    let layout: &ChunkLayout = h.manager.layout();
    assert_eq!(saved[layout.dims.idx(0, 3, 0)], Cell::WATER);

    // Reloading reads the saved copy.
    let back = h.manager.get_or_load(far).unwrap();
    assert_eq!(back.cell(0, 3, 0), Cell::WATER);
    assert!(!back.is_dirty());
}

#[test]
fn undersized_cache_runs_over_rather_than_evicting_region() {
    let mut cfg = small_config();
    cfg.cache.capacity = 4;
    let h = harness_with(cfg, Arc::new(FlatTerrain::new(0)));
    let region: Vec<ChunkKey> = ORIGIN.neighborhood(1, 0).collect();
    for k in &region {
        h.manager.get_or_load(*k).unwrap();
    }
    for cz in 0..3 {
        h.manager.get_or_load(ChunkKey::new(-10, 0, cz)).unwrap();
    }
    assert!(region.iter().all(|k| h.manager.maybe_get(*k).is_some()));
    assert_eq!(h.manager.stats().cache.entries, region.len() + 1);
    assert_eq!(h.manager.stats().cache.evictions, 2);
}

#[test]
fn failed_eviction_write_back_is_kept_for_retry() {
    let mut cfg = small_config();
    cfg.cache.capacity = 10;
    let h = harness_with(cfg, Arc::new(FlatTerrain::new(0)));
    for k in ORIGIN.neighborhood(1, 0) {
        h.manager.get_or_load(k).unwrap();
    }
    let far = ChunkKey::new(10, 0, 0);
    let chunk = h.manager.get_or_load(far).unwrap();
    assert!(h.manager.set_cell(&chunk, 1, 3, 1, Cell::WATER));
    drop(chunk);

    h.storage.set_fail_saves(true);
    h.manager.get_or_load(ChunkKey::new(10, 0, 1)).unwrap();
    assert!(h.manager.maybe_get(far).is_none());
    assert_eq!(h.manager.stats().unsaved, 1);
    assert_eq!(h.storage.get(far).unwrap()[h.manager.layout().dims.idx(1, 3, 1)], Cell::AIR);

    // Still failing: nothing is lost.
    assert_eq!(h.manager.flush(), 2);
    assert_eq!(h.manager.stats().unsaved, 1);

    h.storage.set_fail_saves(false);
    assert_eq!(h.manager.flush(), 0);
    assert_eq!(h.manager.stats().unsaved, 0);
    let saved = h.storage.get(far).unwrap();
    assert_eq!(saved[h.manager.layout().dims.idx(1, 3, 1)], Cell::WATER);
}

#[test]
fn reload_after_failed_write_back_keeps_edits() {
    let mut cfg = small_config();
    cfg.cache.capacity = 10;
    let h = harness_with(cfg, Arc::new(FlatTerrain::new(0)));
    for k in ORIGIN.neighborhood(1, 0) {
        h.manager.get_or_load(k).unwrap();
    }
    let far = ChunkKey::new(10, 0, 0);
    let chunk = h.manager.get_or_load(far).unwrap();
    assert!(h.manager.set_cell(&chunk, 1, 3, 1, Cell::WATER));
    drop(chunk);

    h.storage.set_fail_saves(true);
    h.manager.get_or_load(ChunkKey::new(10, 0, 1)).unwrap();
    assert_eq!(h.manager.stats().unsaved, 1);

    let back = h.manager.get_or_load(far).unwrap();
    assert_eq!(back.cell(1, 3, 1), Cell::WATER);
    assert!(back.is_dirty());
    // The kept copy of `far` stays until a save lands; (10,0,1) was evicted.
    assert_eq!(h.manager.stats().unsaved, 2);

    // A newer edit on the reloaded chunk must win over the kept copy.
    assert!(h.manager.set_cell(&back, 2, 3, 2, Cell::SOLID));
    h.storage.set_fail_saves(false);
    assert_eq!(h.manager.flush(), 0);
    assert_eq!(h.manager.stats().unsaved, 0);
    let dims = h.manager.layout().dims;
    let saved = h.storage.get(far).unwrap();
    assert_eq!(saved[dims.idx(1, 3, 1)], Cell::WATER);
    assert_eq!(saved[dims.idx(2, 3, 2)], Cell::SOLID);

    drop(back);
    h.manager.shutdown();
    assert_eq!(h.manager.stats().unsaved, 0);
    let saved = h.storage.get(far).unwrap();
    assert_eq!(saved[dims.idx(2, 3, 2)], Cell::SOLID);
}

#[test]
fn unreadable_storage_falls_back_to_generation() {
    let h = harness();
    let layout = *h.manager.layout();
    h.storage.insert_raw(ORIGIN, vec![Cell::SOLID; layout.dims.volume()]);
    h.storage.set_fail_loads(true);

    let chunk = h.manager.get_or_load(ORIGIN).unwrap();
    assert_eq!(chunk.cell(0, 3, 0), Cell::AIR);
    assert_eq!(chunk.cell(0, 2, 0), Cell::SOLID);
    assert!(!chunk.is_dirty());
    let written = h.storage.get(ORIGIN).unwrap();
    assert_eq!(written[layout.dims.idx(0, 3, 0)], Cell::AIR);
}

#[test]
fn failed_first_save_leaves_chunk_dirty() {
    let h = harness();
    h.storage.set_fail_saves(true);
    let chunk = h.manager.get_or_load(ORIGIN).unwrap();
    assert!(chunk.is_dirty());
    assert!(!h.storage.contains(ORIGIN));

    h.storage.set_fail_saves(false);
    drop(chunk);
    h.manager.shutdown();
    assert!(h.storage.contains(ORIGIN));
}

struct Bounded;

impl TerrainGenerator for Bounded {
    fn generate(&self, key: ChunkKey, layout: &ChunkLayout) -> Result<Vec<Cell>, GenerateError> {
        if key.cx.abs() > 4 {
            return Err(GenerateError::OutOfWorld(key));
        }
        FlatTerrain::new(0).generate(key, layout)
    }
}

struct SlowGround;

impl TerrainGenerator for SlowGround {
    fn generate(&self, key: ChunkKey, layout: &ChunkLayout) -> Result<Vec<Cell>, GenerateError> {
        thread::sleep(Duration::from_millis(40));
        FlatTerrain::new(0).generate(key, layout)
    }
}

#[test]
fn concurrent_loads_share_one_instance() {
    const N: usize = 8;
    let h = harness_with(small_config(), Arc::new(SlowGround));
    let key = ChunkKey::new(0, 0, 1);
    let barrier = Barrier::new(N);
    let manager = &h.manager;
    let chunks: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..N)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    manager.get_or_load(key).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winner = &chunks[0];
    assert!(chunks.iter().all(|c| Arc::ptr_eq(c, winner)));
    assert!(Arc::ptr_eq(&h.manager.maybe_get(key).unwrap(), winner));
    assert!(!winner.is_disposed());

    let stats = h.manager.stats();
    assert!(stats.cache.discarded >= 1, "no concurrent miss happened");
    assert_eq!((stats.cache.discarded + stats.cache.hits) as usize, N - 1);
    assert_eq!(stats.cache.entries, 1);
    assert_eq!(stats.loads_completed, 1);
    // Discarded duplicates never held render state.
    assert_eq!(h.manager.run_render_tasks(), 0);
    assert_eq!(h.mesher.disposals.load(Ordering::SeqCst), 0);
}

#[test]
fn generation_failure_is_reported_and_not_cached() {
    let h = harness_with(small_config(), Arc::new(Bounded));
    let key = ChunkKey::new(5, 0, 0);
    match h.manager.get_or_load(key) {
        Err(LoadError::Generate { key: k, .. }) => assert_eq!(k, key),
        other => panic!("expected generation failure, got {:?}", other.map(|c| c.key())),
    }
    assert!(h.manager.maybe_get(key).is_none());
    assert_eq!(h.manager.stats().load_failures, 1);
    assert!(h.manager.get_or_load(ChunkKey::new(4, 0, 0)).is_ok());
}

#[test]
fn queries_see_published_ground() {
    let h = harness();
    let chunk = h.manager.get_or_load(ORIGIN).unwrap();
    assert!(wait_until(WAIT, || h.manager.published().iter().any(|c| Arc::ptr_eq(c, &chunk))));

    // Ground top sits at world y = 1 above chunk (0,0,0).
    let ray = Ray::new(Vec3::new(0.5, 10.0, 0.5), Vec3::new(0.0, -1.0, 0.0));
    let hit = h.manager.closest_intersection(&ray).expect("ray hits ground");
    assert!(Arc::ptr_eq(&hit.chunk, &chunk));
    assert_eq!((hit.x, hit.y, hit.z), (2, 2, 2));
    assert_eq!(hit.cell, Cell::SOLID);
    assert!((hit.distance - 9.0).abs() < 1e-4);

    let up = Ray::new(Vec3::new(0.5, 1.5, 0.5), Vec3::new(0.0, 1.0, 0.0));
    assert!(h.manager.closest_intersection(&up).is_none());

    let inside = h.manager.containing_cell(Vec3::new(0.5, 0.5, 0.5)).unwrap();
    assert_eq!((inside.x, inside.y, inside.z), (2, 2, 2));
    assert_eq!(inside.cell, Cell::SOLID);
    let above = h.manager.containing_cell(Vec3::new(0.5, 1.5, 0.5)).unwrap();
    assert_eq!(above.cell, Cell::AIR);
    assert!(h.manager.containing_cell(Vec3::new(40.0, 0.0, 0.0)).is_none());

    let touching = Aabb::new(Vec3::new(0.2, 1.0, 0.2), Vec3::new(0.8, 1.8, 0.8));
    assert!(!h.manager.intersects_non_empty(&touching));
    let sunk = Aabb::new(Vec3::new(0.2, 0.9, 0.2), Vec3::new(0.8, 1.8, 0.8));
    assert!(h.manager.intersects_non_empty(&sunk));

    assert!(h.manager.set_cell_at(&hit, Cell::AIR));
    assert_eq!(chunk.cell(2, 2, 2), Cell::AIR);
    assert!(chunk.is_dirty());
}

#[test]
fn shutdown_persists_and_releases_everything() {
    let h = harness();
    let chunk = h.manager.get_or_load(ORIGIN).unwrap();
    h.manager.get_or_load(ChunkKey::new(1, 0, 0)).unwrap();
    assert!(h.manager.set_cell(&chunk, 0, 3, 0, Cell::WATER));

    h.manager.shutdown();
    assert!(chunk.is_disposed());
    assert!(!chunk.is_visible());
    assert!(!h.manager.set_cell(&chunk, 1, 3, 1, Cell::WATER));
    assert!(h.manager.published().is_empty());
    assert_eq!(h.manager.stats().cache.entries, 0);

    let layout = *h.manager.layout();
    let saved = h.storage.get(ORIGIN).unwrap();
    assert_eq!(saved[layout.dims.idx(0, 3, 0)], Cell::WATER);

    assert!(h.manager.run_render_tasks() >= 2);
    assert_eq!(
        h.mesher.disposals.load(Ordering::SeqCst),
        h.mesher.rebuilds.load(Ordering::SeqCst)
    );

    // Second call is a no-op.
    h.manager.shutdown();
    assert_eq!(h.manager.run_render_tasks(), 0);
}

#[test]
fn flush_saves_without_evicting() {
    let h = harness();
    let chunk = h.manager.get_or_load(ORIGIN).unwrap();
    let saves = h.storage.save_count();
    assert_eq!(h.manager.flush(), 0);
    assert_eq!(h.storage.save_count(), saves);

    assert!(h.manager.set_cell(&chunk, 2, 3, 2, Cell::WATER));
    assert!(chunk.is_dirty());
    assert_eq!(h.manager.flush(), 0);
    assert!(!chunk.is_dirty());
    assert!(!chunk.is_disposed());
    assert_eq!(h.storage.save_count(), saves + 1);

    h.storage.set_fail_saves(true);
    assert!(h.manager.set_cell(&chunk, 2, 3, 1, Cell::WATER));
    assert_eq!(h.manager.flush(), 1);
    assert!(chunk.is_dirty());
}

#[test]
fn storage_shared_across_managers() {
    let storage = {
        let h = harness();
        let chunk = h.manager.get_or_load(ORIGIN).unwrap();
        h.manager.set_cell(&chunk, 1, 3, 1, Cell::SOLID);
        Arc::clone(&h.storage)
    };
    let cells = storage.load(ORIGIN, small_config().dims()).unwrap().unwrap();
    let layout = small_config().layout();
    assert_eq!(cells[layout.dims.idx(1, 3, 1)], Cell::SOLID);
}
