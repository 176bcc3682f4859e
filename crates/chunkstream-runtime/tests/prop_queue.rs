use chunkstream_runtime::DedupLifoQueue;
use chunkstream_world::ChunkKey;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(i32),
    Take,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![3 => (0i32..12).prop_map(Op::Insert), 1 => Just(Op::Take)]
}

proptest! {
    // Matches a plain vector model: pending entries unique, bounded, newest
    // taken first, oldest dropped on overflow
    #[test]
    fn behaves_like_bounded_dedup_stack(cap in 1usize..8, ops in prop::collection::vec(op(), 0..120)) {
        let q = DedupLifoQueue::new("prop", cap);
        let mut model: Vec<ChunkKey> = Vec::new();
        let mut dropped = 0u64;
        for op in ops {
            match op {
                Op::Insert(x) => {
                    let k = ChunkKey::new(x, 0, 0);
                    let queued = q.insert(k);
                    prop_assert_eq!(queued, !model.contains(&k));
                    if queued {
                        if model.len() >= cap {
                            model.remove(0);
                            dropped += 1;
                        }
                        model.push(k);
                    }
                }
                Op::Take => prop_assert_eq!(q.try_take(), model.pop()),
            }
            prop_assert_eq!(q.len(), model.len());
            prop_assert!(q.len() <= cap);
        }
        prop_assert_eq!(q.dropped(), dropped);
    }
}
