//! Backend storage implementations for the archive
//!
//! - `file`: directory of raw message files with JSON metadata sidecars
//! - `memory`: in-memory storage for tests and development

pub mod file;
pub mod memory;

pub use file::FileArchiveStore;
pub use memory::MemoryArchiveStore;
