pub mod section;

pub use section::{read_exact_at, FileSection};
