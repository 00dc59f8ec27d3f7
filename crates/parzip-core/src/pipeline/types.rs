use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::compression::DeflatePool;
use crate::core::RateLimit;
use crate::types::EntryHeader;
use crate::ZipError;

/// Delivers one compressed block payload from its producer to the writer.
pub(crate) type BlockRx = Receiver<Bytes>;

/// An entry whose CRC and size are finalized, ready for header emission.
///
/// `blocks` yields the entry's payload channels in archive order and closes
/// when no further blocks follow; `None` means the entry has no payload at
/// all (directories).
pub(crate) struct ResolvedEntry {
    pub header: EntryHeader,
    pub blocks: Option<Receiver<BlockRx>>,
}

/// Single-slot channel resolving into a [`ResolvedEntry`] once the CRC task
/// finishes. The queue carries promises in submission order; ordering is
/// encoded in this structure, so no reorder table exists anywhere.
pub(crate) type EntryPromise = Receiver<ResolvedEntry>;

/// Builds an already-resolved promise for entries whose payload is known at
/// planning time (directories, symlinks).
pub(crate) fn resolved_promise(header: EntryHeader, payload: Option<Bytes>) -> EntryPromise {
    let blocks = payload.map(|bytes| {
        let (payload_tx, payload_rx) = bounded(1);
        let (blocks_tx, blocks_rx) = bounded(1);
        let _ = payload_tx.send(bytes);
        let _ = blocks_tx.send(payload_rx);
        blocks_rx
    });
    let (entry_tx, entry_rx) = bounded(1);
    let _ = entry_tx.send(ResolvedEntry { header, blocks });
    entry_rx
}

/// Shared per-build state handed to every task. Rate-limit counters and the
/// error channel are process-wide for one build but live here explicitly;
/// there are no ambient singletons.
pub(crate) struct PipelineContext {
    pub limiter: Arc<RateLimit>,
    pub deflate: DeflatePool,
    errors: Sender<ZipError>,
}

impl PipelineContext {
    pub fn new(limiter: Arc<RateLimit>, deflate: DeflatePool, errors: Sender<ZipError>) -> Self {
        Self {
            limiter,
            deflate,
            errors,
        }
    }

    /// Posts a producer error; the first one observed by the writer wins.
    pub fn send_error(&self, err: ZipError) {
        let _ = self.errors.send(err);
    }
}

/// Tunables for one archive build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Deflate level, 0-9.
    pub compression_level: u32,
    /// Worker cap for parallel compression; zero selects the CPU count.
    pub parallel_jobs: usize,
    /// Emit directory entries for every ancestor of each file.
    pub include_directories: bool,
    /// Soft bound on in-flight buffer bytes; zero or less selects the
    /// default budget.
    pub pending_bytes_budget: i64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            compression_level: 5,
            parallel_jobs: 0,
            include_directories: false,
            pending_bytes_budget: 0,
        }
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStats {
    /// Entries written, directories included.
    pub entries: u64,
    /// Total declared uncompressed bytes.
    pub uncompressed_bytes: u64,
    /// Final archive size in bytes.
    pub archive_bytes: u64,
    /// Wall-clock build time.
    pub elapsed: Duration,
}
