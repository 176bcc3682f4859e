use std::sync::Arc;

use chunkstream_chunk::MeshBuilder;
use crossbeam_channel::Sender;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::StartError;
use crate::stream::Stream;

/// Starts `n` long-lived load workers. Each holds a clone of `alive` until
/// its loop exits, so the receiving side disconnects once all are gone.
pub(crate) fn spawn_load_workers<B: MeshBuilder>(
    stream: &Arc<Stream<B>>,
    n: usize,
    alive: &Sender<()>,
) -> Result<ThreadPool, StartError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("chunk-load-{i}"))
        .build()?;
    for _ in 0..n {
        let stream = Arc::clone(stream);
        let alive = alive.clone();
        pool.spawn(move || {
            while let Ok(key) = stream.load_queue.take() {
                stream.process_load(key);
            }
            log::debug!("load worker exiting");
            drop(alive);
        });
    }
    Ok(pool)
}

pub(crate) fn spawn_update_workers<B: MeshBuilder>(
    stream: &Arc<Stream<B>>,
    n: usize,
    alive: &Sender<()>,
) -> Result<ThreadPool, StartError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("chunk-update-{i}"))
        .build()?;
    for _ in 0..n {
        let stream = Arc::clone(stream);
        let alive = alive.clone();
        pool.spawn(move || {
            while let Ok(chunk) = stream.update_queue.take() {
                stream.update(&chunk);
            }
            log::debug!("update worker exiting");
            drop(alive);
        });
    }
    Ok(pool)
}
