//! Disk Tier Module
//!
//! Persistent tier storing one compressed blob per key under a root
//! directory, with a JSON index of entry bookkeeping.
//!
//! # Layout
//! - `root_dir/index`: key -> [`IndexRecord`], rewritten on every mutation
//! - `root_dir/<sha256(key)>.cache`: serialized (optionally LZ4) value

mod codec;
mod index;
mod tier;

pub use codec::blob_file_name;
pub use index::{IndexRecord, INDEX_FILE};
pub use tier::{PersistentTier, WeakPersistentTier};
