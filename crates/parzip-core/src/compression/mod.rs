pub mod deflate;

pub use deflate::{DeflatePool, WINDOW_SIZE};
