use std::error::Error;
use std::fmt;
use std::io;

use chunkstream_world::{ChunkKey, GenerateError};

/// Returned by a blocking queue take once the queue has been disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownError;

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue shut down")
    }
}

impl Error for ShutdownError {}

/// A chunk could not be given any content.
#[derive(Debug)]
pub enum LoadError {
    Generate { key: ChunkKey, source: GenerateError },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Generate { key, .. } => write!(f, "no content for chunk {key}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Generate { source, .. } => Some(source),
        }
    }
}

/// The manager could not start its threads.
#[derive(Debug)]
pub enum StartError {
    Pool(rayon::ThreadPoolBuildError),
    Thread(io::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::Pool(e) => write!(f, "worker pool: {e}"),
            StartError::Thread(e) => write!(f, "publisher thread: {e}"),
        }
    }
}

impl Error for StartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StartError::Pool(e) => Some(e),
            StartError::Thread(e) => Some(e),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for StartError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        StartError::Pool(e)
    }
}

impl From<io::Error> for StartError {
    fn from(e: io::Error) -> Self {
        StartError::Thread(e)
    }
}
