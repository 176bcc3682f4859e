use crossbeam_channel::{Receiver, Sender, unbounded};
use chunkstream_chunk::MeshBuilder;
use chunkstream_world::ChunkKey;

/// Work that must run on the thread owning the graphics context.
pub enum RenderTask<M> {
    Dispose { key: ChunkKey, mesh: M },
}

/// Deferred render-task channel. Any thread may submit; only the render
/// thread drains.
pub struct RenderTasks<M> {
    tx: Sender<RenderTask<M>>,
    rx: Receiver<RenderTask<M>>,
}

impl<M> RenderTasks<M> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn dispose_later(&self, key: ChunkKey, mesh: M) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.tx.send(RenderTask::Dispose { key, mesh });
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Runs every queued task against `builder`; returns how many ran.
    pub fn run<B>(&self, builder: &B) -> usize
    where
        B: MeshBuilder<Mesh = M>,
    {
        let mut n = 0;
        for task in self.rx.try_iter() {
            match task {
                RenderTask::Dispose { key, mesh } => {
                    log::trace!(target: "stream", "releasing render state of {key}");
                    builder.dispose(mesh);
                }
            }
            n += 1;
        }
        n
    }
}

impl<M> Default for RenderTasks<M> {
    fn default() -> Self {
        Self::new()
    }
}
