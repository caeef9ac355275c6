//! Job storage provider implementations.

#[cfg(feature = "file")]
pub mod file;
pub mod memory;

#[cfg(feature = "file")]
pub use file::FileStorage;
pub use memory::MemoryStorage;
