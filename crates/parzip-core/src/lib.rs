pub mod compression;
pub mod core;
pub mod error;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod telemetry;
pub mod types;

pub use compression::{DeflatePool, WINDOW_SIZE};
pub use crate::core::{Execution, RateLimit, DEFAULT_PENDING_BYTES_BUDGET};
pub use error::ZipError;
pub use format::ZipStreamWriter;
pub use pipeline::{
    BuildOptions, BuildStats, ZipPipeline, BLOCK_SIZE, MANIFEST_NAME, MIN_PARALLEL_SIZE,
    WRITE_QUEUE_CAPACITY,
};
pub use telemetry::{NoopTelemetry, PipelineTelemetry};
pub use types::{EntryHeader, FileArg, Method, Result};
