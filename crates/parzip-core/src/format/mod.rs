pub mod zip;

pub use zip::{ZipStreamWriter, CENTRAL_HEADER_SIZE, EOCD_SIZE, LOCAL_HEADER_SIZE};
