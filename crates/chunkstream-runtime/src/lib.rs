//! Chunk streaming runtime: dedup work queues, the bounded chunk cache, load
//! and update worker pools, the visibility publisher and the manager tying
//! them together.
#![forbid(unsafe_code)]

mod cache;
mod error;
mod loader;
mod manager;
mod publisher;
mod query;
mod queue;
mod render;
mod stats;
mod stream;
mod workers;

pub use cache::{CacheFetch, ChunkCache, ChunkCacheStats, KeepRegion};
pub use error::{LoadError, ShutdownError, StartError};
pub use loader::ChunkLoader;
pub use manager::ChunkManager;
pub use query::Hit;
pub use queue::{DedupKey, DedupLifoQueue};
pub use render::{RenderTask, RenderTasks};
pub use stats::StreamStats;
pub use stream::{ChunkRef, VisibleSet};
