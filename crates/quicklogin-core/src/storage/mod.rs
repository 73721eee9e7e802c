//! Storage areas for accounts and the session cache
//!
//! This module provides two backends:
//! 1. JSON file (one file per area, atomic rewrites)
//! 2. In-memory (tests and short-lived contexts)

mod json_file;
mod memory;
mod traits;

pub use json_file::JsonFileArea;
pub use memory::MemoryArea;
pub use traits::StorageArea;
