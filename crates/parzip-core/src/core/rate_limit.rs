use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::telemetry::{NoopTelemetry, PipelineTelemetry};
use crate::types::Result;
use crate::ZipError;

/// Default soft bound on aggregate in-flight buffer bytes.
pub const DEFAULT_PENDING_BYTES_BUDGET: i64 = 512 * 1024 * 1024;

#[derive(Debug, Default)]
struct LimitState {
    active_workers: usize,
    pending_bytes: i64,
    stopped: bool,
}

/// Admission control for concurrent compressions and in-flight buffer bytes.
///
/// Two policies share one lock: `active_workers` is hard-capped at
/// `max_parallel`, while `pending_bytes` is a soft budget — a worker may be
/// admitted whenever pending bytes are non-positive or within the budget, so
/// short bursts get through and the writer-side release catches up. No FIFO
/// fairness between waiters; archive ordering is enforced by the write queue,
/// not here.
pub struct RateLimit {
    state: Mutex<LimitState>,
    admitted: Condvar,
    drained: Condvar,
    max_parallel: usize,
    pending_budget: i64,
    telemetry: Arc<dyn PipelineTelemetry>,
}

impl RateLimit {
    /// Creates a rate limiter with the default no-op telemetry.
    ///
    /// A `pending_budget` of zero or less selects the default budget.
    pub fn new(max_parallel: usize, pending_budget: i64) -> Self {
        Self::with_telemetry(max_parallel, pending_budget, Arc::new(NoopTelemetry))
    }

    /// Creates a rate limiter reporting through a custom telemetry backend.
    pub fn with_telemetry(
        max_parallel: usize,
        pending_budget: i64,
        telemetry: Arc<dyn PipelineTelemetry>,
    ) -> Self {
        let pending_budget = if pending_budget <= 0 {
            DEFAULT_PENDING_BYTES_BUDGET
        } else {
            pending_budget
        };
        Self {
            state: Mutex::new(LimitState::default()),
            admitted: Condvar::new(),
            drained: Condvar::new(),
            max_parallel: max_parallel.max(1),
            pending_budget,
            telemetry,
        }
    }

    /// Maximum number of simultaneously admitted workers.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Blocks until a worker slot and buffer budget are available, then
    /// claims the slot.
    ///
    /// Must be called before the worker allocates its output buffer; the
    /// byte accounting is settled by [`Execution::finish`]. Fails with
    /// [`ZipError::ShuttingDown`] once [`stop`](Self::stop) has been called.
    pub fn request_execution(self: &Arc<Self>) -> Result<Execution> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.stopped {
                return Err(ZipError::ShuttingDown);
            }
            if state.active_workers >= self.max_parallel {
                state = self
                    .admitted
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }
            if state.pending_bytes > 0 && state.pending_bytes > self.pending_budget {
                state = self
                    .drained
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }
            break;
        }
        state.active_workers += 1;
        let active = state.active_workers;
        drop(state);
        self.telemetry.on_worker_admitted(active);
        Ok(Execution {
            limiter: Arc::clone(self),
            finished: false,
        })
    }

    /// Credits back bytes the writer has drained to the archive.
    ///
    /// Negative values pre-credit small unbuffered payloads (symlink
    /// targets) so the later writer-side release balances to zero.
    pub fn release(&self, bytes: i64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending_bytes -= bytes;
        let pending = state.pending_bytes;
        drop(state);
        self.telemetry.on_bytes_pending(pending);
        self.drained.notify_all();
    }

    /// Fails all future admissions and wakes blocked waiters. In-flight
    /// executions are allowed to complete.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.stopped = true;
        drop(state);
        self.admitted.notify_all();
        self.drained.notify_all();
    }

    fn finish_execution(&self, produced_bytes: i64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.active_workers -= 1;
        state.pending_bytes += produced_bytes;
        let (active, pending) = (state.active_workers, state.pending_bytes);
        drop(state);
        self.telemetry.on_worker_released(active);
        self.telemetry.on_bytes_pending(pending);
        self.admitted.notify_all();
    }
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("max_parallel", &self.max_parallel)
            .field("pending_budget", &self.pending_budget)
            .finish_non_exhaustive()
    }
}

/// Token for one admitted task.
///
/// [`finish`](Self::finish) releases the worker slot and registers the bytes
/// the task buffered (zero for CRC workers). Dropping an unfinished handle
/// releases the slot with zero bytes so a failed task cannot wedge
/// admission.
#[derive(Debug)]
pub struct Execution {
    limiter: Arc<RateLimit>,
    finished: bool,
}

impl Execution {
    pub fn finish(mut self, produced_bytes: i64) {
        self.finished = true;
        self.limiter.finish_execution(produced_bytes);
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if !self.finished {
            self.limiter.finish_execution(0);
        }
    }
}
