mod consts;
mod headers;
mod writer;

pub use consts::{
    CENTRAL_HEADER_SIZE, EOCD_SIZE, FLAG_DATA_DESCRIPTOR, FLAG_UTF8, LOCAL_HEADER_SIZE,
    VERSION_MADE_BY_UNIX, VERSION_NEEDED_DEFAULT, VERSION_NEEDED_ZIP64,
};
pub use headers::{CentralRecord, DataDescriptor, EndOfCentralDirectory, LocalFileHeader};
pub use writer::ZipStreamWriter;
