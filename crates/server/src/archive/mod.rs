//! Streaming zip archive assembly.

pub mod stream;
pub mod zip;

pub use stream::archive_body;
pub use zip::ZipStreamWriter;
