use crossbeam_channel::{bounded, Receiver, Sender};
use flate2::{Compress, Compression, FlushCompress, Status};

use crate::types::Result;
use crate::ZipError;

/// Size of the deflate back-reference window (32 KiB).
pub const WINDOW_SIZE: usize = 32 * 1024;

/// Growth step for the output buffer while the stream is flushing.
const OUTPUT_CHUNK: usize = 16 * 1024;

/// Maximum deflate states retained for reuse.
const MAX_POOLED_STATES: usize = 64;

/// Pool of raw-deflate compressor states at a fixed level.
///
/// Plain blocks reuse pooled states via reset. Dictionary-primed states
/// cannot be reset while retaining the dictionary, so they bypass the pool
/// and are allocated fresh per block.
#[derive(Debug)]
pub struct DeflatePool {
    level: Compression,
    recycler: Sender<Compress>,
    receiver: Receiver<Compress>,
}

impl DeflatePool {
    /// Creates a pool producing raw deflate at `level` (0-9).
    pub fn new(level: u32) -> Self {
        let (tx, rx) = bounded(MAX_POOLED_STATES);
        Self {
            level: Compression::new(level.min(9)),
            recycler: tx,
            receiver: rx,
        }
    }

    /// Configured compression level.
    pub fn level(&self) -> u32 {
        self.level.level()
    }

    /// Deflates one block of source bytes.
    ///
    /// With a non-empty `dict`, a fresh state is primed with the trailing
    /// window of the preceding uncompressed region. A `last` block ends with
    /// the end-of-stream marker; any other block ends with a sync flush, so
    /// concatenating the per-block outputs in order yields one valid deflate
    /// stream that inflates back to the original bytes.
    pub fn compress_block(
        &self,
        data: &[u8],
        dict: Option<&[u8]>,
        last: bool,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() / 2 + 64);
        match dict {
            Some(dict) if !dict.is_empty() => {
                let mut state = Compress::new(self.level, false);
                state.set_dictionary(dict)?;
                self.run(&mut state, data, last, &mut out)?;
            }
            _ => {
                let mut state = self.acquire();
                // Recycle the state on every exit path, error included.
                let result = self.run(&mut state, data, last, &mut out);
                let _ = self.recycler.try_send(state);
                result?;
            }
        }
        Ok(out)
    }

    fn acquire(&self) -> Compress {
        match self.receiver.try_recv() {
            Ok(mut state) => {
                state.reset();
                state
            }
            Err(_) => Compress::new(self.level, false),
        }
    }

    fn run(
        &self,
        state: &mut Compress,
        data: &[u8],
        last: bool,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let mut consumed = 0usize;
        while consumed < data.len() {
            if out.len() == out.capacity() {
                out.reserve(OUTPUT_CHUNK);
            }
            let before = state.total_in();
            let status = state.compress_vec(&data[consumed..], out, FlushCompress::None)?;
            consumed += (state.total_in() - before) as usize;
            if matches!(status, Status::StreamEnd) {
                return Err(ZipError::Compression(
                    "deflate stream ended before input was consumed".to_string(),
                ));
            }
        }

        let flush = if last {
            FlushCompress::Finish
        } else {
            FlushCompress::Sync
        };
        loop {
            if out.len() == out.capacity() {
                out.reserve(OUTPUT_CHUNK);
            }
            let before = state.total_out();
            let status = state.compress_vec(&[], out, flush)?;
            match status {
                Status::StreamEnd => break,
                _ if !last && state.total_out() == before => break,
                _ => {}
            }
        }
        Ok(())
    }
}
