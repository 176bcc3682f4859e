use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chunkstream_chunk::MeshBuilder;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::stream::Stream;

/// Runs publish cycles every `interval` until `stop` receives a message or
/// disconnects.
pub(crate) fn spawn_publisher<B: MeshBuilder>(
    stream: Arc<Stream<B>>,
    interval: Duration,
    stop: Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("visibility-publisher".into())
        .spawn(move || {
            loop {
                match stop.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        stream.publish_cycle();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            log::debug!("visibility publisher exiting");
        })
}
