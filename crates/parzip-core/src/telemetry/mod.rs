//! Lightweight observability hooks for the build pipeline.
//!
//! Implementations can record stable metrics without the pipeline depending
//! on a specific backend. The default implementation does nothing.

/// Telemetry contract for rate-limited pipeline work.
pub trait PipelineTelemetry: Send + Sync {
    /// A compression or CRC task passed admission; `active` counts it.
    fn on_worker_admitted(&self, active: usize);
    /// An admitted task finished; `active` no longer counts it.
    fn on_worker_released(&self, active: usize);
    /// Aggregate in-flight buffer bytes changed.
    fn on_bytes_pending(&self, pending: i64);
}

/// Telemetry implementation that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl PipelineTelemetry for NoopTelemetry {
    fn on_worker_admitted(&self, _active: usize) {}
    fn on_worker_released(&self, _active: usize) {}
    fn on_bytes_pending(&self, _pending: i64) {}
}
