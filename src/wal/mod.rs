//! Write-ahead log. Each record carries one encoded `WriteBatch`, so a batch
//! is either fully replayed on recovery or not at all.

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::WALReader;
pub use record::WALRecord;
pub use writer::WALWriter;
