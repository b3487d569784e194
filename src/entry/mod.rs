//! In-memory tree of filesystem objects discovered by a walk.
//!
//! Every [`FileEntry`] owns its children and keeps a weak link to its parent,
//! so the tree is kept alive by whoever holds the root. Metadata and
//! checksums are memoized on the entry the first time they are requested.

mod entry_stat;
mod file_entry;

pub use entry_stat::{EntryKind, EntryStat};
pub use file_entry::{EntryError, FileEntry, NewChild};
