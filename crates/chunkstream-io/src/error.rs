use std::error::Error;
use std::fmt;
use std::io;

use chunkstream_world::ChunkKey;

#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    /// Stored data does not match the expected cell count.
    Corrupt {
        key: ChunkKey,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "chunk storage i/o: {e}"),
            StorageError::Corrupt {
                key,
                expected,
                found,
            } => write!(
                f,
                "chunk {key} is corrupt: expected {expected} cells, found {found}"
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Corrupt { .. } => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}
