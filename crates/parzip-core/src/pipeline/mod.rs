mod archive;
mod directory;
mod planner;
mod types;
mod writer;

pub use archive::ZipPipeline;
pub use types::{BuildOptions, BuildStats};

/// Block size used during parallel compression of a single file.
pub const BLOCK_SIZE: u64 = 1024 * 1024;

/// Minimum file size for the block-split path. Smaller files compress as a
/// single block, which keeps deflate states reusable: a dictionary-primed
/// state cannot be reset, so every parallel block costs a fresh allocation.
pub const MIN_PARALLEL_SIZE: u64 = 6 * BLOCK_SIZE;

/// Capacity of the entry queue between planner and writer.
///
/// Effectively a FIFO decoupling I/O and CPU stalls; directories cost no
/// compression time but still cost I/O, and hard-to-compress files do not
/// take correspondingly longer to write out. The real bound on memory comes
/// from the rate limiter's byte budget, not queue depth.
pub const WRITE_QUEUE_CAPACITY: usize = 1000;

/// Archive name of the `-m` manifest entry.
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";
