pub mod rate_limit;

pub use rate_limit::{Execution, RateLimit, DEFAULT_PENDING_BYTES_BUDGET};
