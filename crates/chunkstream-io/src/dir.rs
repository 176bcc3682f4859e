use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chunkstream_blocks::Cell;
use chunkstream_world::{ChunkDims, ChunkKey};

use crate::{ChunkStorage, StorageError};

/// One file per chunk, `chunk_{x}_{y}_{z}.chunk`, holding one byte per cell
/// in chunk index order.
#[derive(Clone, Debug)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Opens `root`, creating it if missing.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        log::info!("chunk storage at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: ChunkKey) -> PathBuf {
        self.root
            .join(format!("chunk_{}_{}_{}.chunk", key.cx, key.cy, key.cz))
    }
}

impl ChunkStorage for DirStorage {
    fn load(&self, key: ChunkKey, dims: ChunkDims) -> Result<Option<Vec<Cell>>, StorageError> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let expected = dims.volume();
        if bytes.len() != expected {
            return Err(StorageError::Corrupt {
                key,
                expected,
                found: bytes.len(),
            });
        }
        Ok(Some(bytes.into_iter().map(Cell).collect()))
    }

    fn save(&self, key: ChunkKey, dims: ChunkDims, cells: &[Cell]) -> Result<(), StorageError> {
        if cells.len() != dims.volume() {
            return Err(StorageError::Corrupt {
                key,
                expected: dims.volume(),
                found: cells.len(),
            });
        }
        let path = self.path_for(key);
        // Write next to the target and rename so readers never see a
        // half-written chunk.
        let tmp = path.with_extension("chunk.tmp");
        {
            let mut f = io::BufWriter::new(fs::File::create(&tmp)?);
            let bytes: Vec<u8> = cells.iter().map(|c| c.0).collect();
            f.write_all(&bytes)?;
            f.flush()?;
        }
        fs::rename(&tmp, &path)?;
        log::trace!(target: "stream", "saved {key} to {}", path.display());
        Ok(())
    }
}
