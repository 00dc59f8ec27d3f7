use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvError};

use crate::core::RateLimit;
use crate::format::ZipStreamWriter;
use crate::types::{Method, Result};
use crate::ZipError;

use super::types::{BlockRx, BuildStats, EntryPromise, ResolvedEntry};

/// How long the writer waits for the matching error after a producer
/// channel closes without delivering.
const PRODUCER_ERROR_GRACE: Duration = Duration::from_secs(1);

/// States of the single-threaded archive writer.
///
/// Each state waits on exactly one channel, plus the shared error channel;
/// the first producer error wins regardless of state.
enum WriterState {
    /// Waiting for the next promise from the queue.
    Idle,
    /// Waiting for the promise to resolve with CRC and sizes.
    AwaitHeader(EntryPromise),
    /// Waiting for the next block's payload channel, in declaration order.
    AwaitBlockChannel(Receiver<BlockRx>),
    /// Waiting for one block's compressed bytes.
    AwaitBlockBytes(Receiver<BlockRx>, BlockRx),
}

/// Consumes entry promises in submission order and streams them through the
/// ZIP record emitter. All archive bytes flow through this one thread.
pub(crate) struct ArchiveWriter<W: Write> {
    zip: ZipStreamWriter<W>,
    queue: Receiver<EntryPromise>,
    errors: Receiver<ZipError>,
    limiter: Arc<RateLimit>,
    stats: BuildStats,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(
        zip: ZipStreamWriter<W>,
        queue: Receiver<EntryPromise>,
        errors: Receiver<ZipError>,
        limiter: Arc<RateLimit>,
    ) -> Self {
        Self {
            zip,
            queue,
            errors,
            limiter,
            stats: BuildStats::default(),
        }
    }

    pub fn run(mut self) -> Result<(W, BuildStats)> {
        let mut state = WriterState::Idle;
        loop {
            state = match state {
                WriterState::Idle => {
                    let promise = select! {
                        recv(self.errors) -> err => return Err(first_error(err)),
                        recv(self.queue) -> promise => promise.ok(),
                    };
                    match promise {
                        Some(promise) => WriterState::AwaitHeader(promise),
                        // Queue closed: every submitted entry is written.
                        None => break,
                    }
                }
                WriterState::AwaitHeader(promise) => {
                    let entry = select! {
                        recv(self.errors) -> err => return Err(first_error(err)),
                        recv(promise) -> entry => entry.ok(),
                    };
                    match entry {
                        Some(entry) => self.open_entry(entry)?,
                        None => return Err(self.producer_lost()),
                    }
                }
                WriterState::AwaitBlockChannel(blocks) => {
                    let payload_rx = select! {
                        recv(self.errors) -> err => return Err(first_error(err)),
                        recv(blocks) -> payload_rx => payload_rx.ok(),
                    };
                    match payload_rx {
                        Some(payload_rx) => WriterState::AwaitBlockBytes(blocks, payload_rx),
                        None => {
                            // Sequence closed: the entry is complete.
                            self.zip.finish_entry()?;
                            WriterState::Idle
                        }
                    }
                }
                WriterState::AwaitBlockBytes(blocks, payload) => {
                    let bytes = select! {
                        recv(self.errors) -> err => return Err(first_error(err)),
                        recv(payload) -> bytes => bytes.ok(),
                    };
                    match bytes {
                        Some(bytes) => {
                            self.zip.write_payload(&bytes)?;
                            self.limiter.release(bytes.len() as i64);
                            WriterState::AwaitBlockChannel(blocks)
                        }
                        None => return Err(self.producer_lost()),
                    }
                }
            };
        }

        // One last chance to catch an error posted by a late producer.
        if let Ok(err) = self.errors.try_recv() {
            return Err(err);
        }

        let stats = self.stats;
        let inner = self.zip.close()?;
        Ok((inner, stats))
    }

    fn open_entry(&mut self, entry: ResolvedEntry) -> Result<WriterState> {
        self.stats.entries += 1;
        self.stats.uncompressed_bytes += entry.header.uncompressed_size;

        match entry.header.method {
            Method::Deflate => self.zip.create_precompressed(&entry.header)?,
            Method::Store => self.zip.create_header(&entry.header)?,
        }

        match entry.blocks {
            Some(blocks) => Ok(WriterState::AwaitBlockChannel(blocks)),
            None => {
                self.zip.finish_entry()?;
                Ok(WriterState::Idle)
            }
        }
    }

    /// A producer dropped its channel without delivering. The error it
    /// posted just before is normally already in flight.
    fn producer_lost(&mut self) -> ZipError {
        match self.errors.recv_timeout(PRODUCER_ERROR_GRACE) {
            Ok(err) => err,
            Err(_) => ZipError::InvalidFormat("entry producer disconnected before completing"),
        }
    }
}

/// The build keeps a sender for this channel alive while the writer runs,
/// so a disconnect here cannot race a real error.
fn first_error(err: std::result::Result<ZipError, RecvError>) -> ZipError {
    err.unwrap_or(ZipError::InvalidFormat("error channel closed unexpectedly"))
}
