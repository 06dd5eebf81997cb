pub mod error;
pub mod hash;
pub mod index;
pub mod memory;
pub mod testing;

pub use error::IndexError;
pub use hash::{hash_bytes, hash_file};
pub use index::{FileIndex, InsertOutcome};
pub use memory::MemoryFileIndex;
