use std::convert::Infallible;

use chunkstream_chunk::{Chunk, ChunkData};
use chunkstream_runtime::{ChunkCache, KeepRegion};
use chunkstream_world::{ChunkDims, ChunkKey, ChunkLayout};
use proptest::prelude::*;

fn key() -> impl Strategy<Value = ChunkKey> {
    (-4i32..=4, -1i32..=1, -4i32..=4).prop_map(ChunkKey::from)
}

#[derive(Clone, Debug)]
enum Op {
    Load(ChunkKey),
    Touch(ChunkKey),
    Move(ChunkKey),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => key().prop_map(Op::Load),
        1 => key().prop_map(Op::Touch),
        1 => key().prop_map(Op::Move),
    ]
}

proptest! {
    // Eviction only ever takes chunks outside the current keep region, and
    // the cache stays within capacity whenever something was evictable
    #[test]
    fn eviction_spares_keep_region(cap in 1usize..12, r in 0i32..2, ops in prop::collection::vec(op(), 1..80)) {
        let layout = ChunkLayout::new(ChunkDims::cubic(2), 1.0);
        let cache = ChunkCache::<()>::new(cap, KeepRegion { center: ChunkKey::default(), radius_xz: r, radius_y: r });
        for op in ops {
            match op {
                Op::Load(k) => {
                    let keep = cache.keep_region();
                    let fetch = cache
                        .get_or_load(k, || Ok::<_, Infallible>(Chunk::new(k, layout.chunk_bounds(k), ChunkData::air(layout.dims))))
                        .unwrap();
                    for v in &fetch.evicted {
                        prop_assert!(!keep.keeps(v.key()), "evicted kept chunk {}", v.key());
                        cache.finish_retire(v.key());
                    }
                    if fetch.inserted && cache.len() > cap {
                        let loose = cache.keys().into_iter().filter(|c| !keep.keeps(*c)).count();
                        prop_assert!(loose <= 1, "over capacity with {loose} evictable chunks");
                    }
                    prop_assert!(cache.contains(k));
                }
                Op::Touch(k) => { cache.maybe_get(k); }
                Op::Move(c) => cache.set_keep_region(KeepRegion { center: c, radius_xz: r, radius_y: r }),
            }
        }
    }
}
