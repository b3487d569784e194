//! Walks a directory tree into an in-memory tree of entries and derives
//! content checksums from it.
//!
//! Files are hashed over their full contents, directories over the digests of
//! their children in discovery order. Both are computed lazily and memoized on
//! the entry, which makes a walked tree usable as a change-detection or
//! cache-key snapshot of a filesystem subtree.
//!
//! ```rust,ignore
//! let entries = treesum::walk("assets").await?;
//! let root = entries.last().expect("the root is always yielded");
//! println!("{}", root.checksum().await?);
//! ```
#![allow(clippy::enum_variant_names)]

use std::{path::PathBuf, rc::Rc};

use snafu::{ResultExt, Snafu};
use tracing::debug;

pub mod checksum;
pub mod config;
pub mod entry;
mod ext;
pub mod walker;

pub use checksum::{ChecksumError, HashAlgorithm};
pub use config::{WalkConfig, WalkConfigError};
pub use entry::{EntryError, EntryKind, EntryStat, FileEntry};
pub use walker::{WalkError, Walker};

/// Walks `root` with the default config and returns every entry in post-order,
/// the root last.
pub async fn walk(root: impl Into<PathBuf>) -> Result<Vec<Rc<FileEntry>>, WalkError> {
    Walker::new(root).collect().await
}

pub async fn walk_with_config(
    root: impl Into<PathBuf>,
    config: WalkConfig,
) -> Result<Vec<Rc<FileEntry>>, WalkError> {
    Walker::with_config(root, config).collect().await
}

/// Checksum of whatever `path` points at. Directories are walked first.
pub async fn checksum_path(path: impl Into<PathBuf>) -> Result<String, Error> {
    checksum_path_with_config(path, WalkConfig::default()).await
}

pub async fn checksum_path_with_config(
    path: impl Into<PathBuf>,
    config: WalkConfig,
) -> Result<String, Error> {
    let root = FileEntry::root_with_config(path, config);
    let stat = root.stat().await.context(EntrySnafu)?;

    if stat.is_dir() {
        Walker::from_entry(root.clone())
            .collect()
            .await
            .context(WalkSnafu)?;
    }

    let checksum = root.checksum().await.context(ChecksumSnafu)?;
    debug!("Checksum of {}: {}", root.full_path().display(), checksum);
    Ok(checksum)
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to inspect the root entry"))]
    EntryError { source: EntryError },
    #[snafu(display("Failed to walk the directory tree"))]
    WalkError { source: WalkError },
    #[snafu(display("Failed to compute a checksum"))]
    ChecksumError { source: ChecksumError },
}
