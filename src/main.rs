use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chunkstream_geom::{Frustum, Vec3};
use chunkstream_io::{ChunkStorage, DirStorage, MemoryStorage};
use chunkstream_mesh_cpu::FaceCullMesher;
use chunkstream_runtime::{ChunkManager, StreamStats};
use chunkstream_world::{StreamConfig, TerrainGenerator, load_config_from_path, terrain_from_config};
use clap::Parser;

const FRAME: Duration = Duration::from_millis(16);
const STATS_EVERY: u64 = 60;
const EYE_HEIGHT: f32 = 24.0;

#[derive(Parser, Debug)]
#[command(name = "chunkstream", about = "Headless chunk streaming driver")]
struct Args {
    /// TOML file with streaming parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for chunk files; chunks stay in memory when omitted
    #[arg(long)]
    storage_dir: Option<PathBuf>,
    /// Overrides the terrain seed from the config
    #[arg(long)]
    seed: Option<i32>,
    /// Frames to simulate
    #[arg(long, default_value_t = 600)]
    frames: u64,
    /// Observer speed in world units per frame
    #[arg(long, default_value_t = 0.5)]
    speed: f32,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Observer walking a wide circle around the origin, looking ahead and
/// slightly down.
struct CameraPath {
    radius: f32,
    speed: f32,
    aspect: f32,
}

impl CameraPath {
    fn eye(&self, frame: u64) -> (Vec3, Vec3) {
        let angle = frame as f32 * self.speed / self.radius;
        let (s, c) = angle.sin_cos();
        let eye = Vec3::new(c * self.radius, EYE_HEIGHT, s * self.radius);
        let forward = Vec3::new(-s, -0.35, c);
        (eye, forward)
    }

    fn view(&self, eye: Vec3, forward: Vec3, far: f32) -> Frustum {
        Frustum::perspective(eye, forward, Vec3::UP, 70f32.to_radians(), self.aspect, 0.1, far)
    }
}

fn load_config(args: &Args) -> Result<StreamConfig, Box<dyn Error>> {
    let mut cfg = match &args.config {
        Some(path) => {
            log::info!("loading stream config from {}", path.display());
            load_config_from_path(path)?
        }
        None => StreamConfig::default().sanitized(),
    };
    if let Some(seed) = args.seed {
        cfg.terrain.seed = seed;
    }
    let r = cfg.stream.load_radius as usize;
    let ry = cfg.stream.load_radius_y as usize;
    let region = (2 * r + 1) * (2 * r + 1) * (2 * ry + 1);
    if region > cfg.cache.capacity {
        log::warn!(
            "cache capacity {} is below the {} chunks of the load region",
            cfg.cache.capacity,
            region
        );
    }
    Ok(cfg)
}

fn open_storage(args: &Args) -> Result<Arc<dyn ChunkStorage>, Box<dyn Error>> {
    Ok(match &args.storage_dir {
        Some(dir) => Arc::new(DirStorage::open(dir)?),
        None => {
            log::info!("chunk storage in memory");
            Arc::new(MemoryStorage::new())
        }
    })
}

fn log_stats(frame: u64, s: &StreamStats) {
    log::info!(
        "frame {frame}: {} resident, {} published, queues {}/{}, in flight {}/{}, hits {} misses {} evicted {}",
        s.cache.entries,
        s.published,
        s.load_queue,
        s.update_queue,
        s.loads_in_flight,
        s.updates_in_flight,
        s.cache.hits,
        s.cache.misses,
        s.cache.evictions
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str()))
        .init();

    let cfg = load_config(&args)?;
    let layout = cfg.layout();
    let storage = open_storage(&args)?;
    let terrain: Arc<dyn TerrainGenerator> = Arc::from(terrain_from_config(&cfg.terrain));
    let mesher = Arc::new(FaceCullMesher::new(layout.cell_size));
    let manager = ChunkManager::new(&cfg, storage, terrain, Arc::clone(&mesher))?;

    let extent = layout.chunk_extent();
    let far = extent.x.max(extent.z) * (cfg.stream.load_radius as f32 + 0.5);
    let path = CameraPath {
        radius: far * 1.5,
        speed: args.speed,
        aspect: 16.0 / 9.0,
    };

    let start = Instant::now();
    let mut drawn_quads = 0usize;
    for frame in 0..args.frames {
        let tick = Instant::now();
        let (eye, forward) = path.eye(frame);
        manager.observer_moved(eye, path.view(eye, forward, far));

        // Render thread duties: release stale meshes, then draw what is
        // published.
        manager.run_render_tasks();
        let visible = manager.published();
        drawn_quads = visible
            .iter()
            .map(|c| c.with_render(|m| m.map_or(0, |m| m.quad_count())))
            .sum();

        if frame % STATS_EVERY == 0 {
            log_stats(frame, &manager.stats());
            log::debug!("frame {frame}: {} chunks, {drawn_quads} quads drawn", visible.len());
        }
        if let Some(rest) = FRAME.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    log_stats(args.frames, &manager.stats());
    manager.shutdown();
    let released = manager.run_render_tasks();
    log::info!(
        "done after {:.1}s: {} meshes built, {} released at shutdown, last frame drew {} quads",
        start.elapsed().as_secs_f32(),
        mesher.built_count(),
        released,
        drawn_quads
    );
    Ok(())
}
