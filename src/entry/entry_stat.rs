use std::{path::Path, time::SystemTime};

use compio::fs;
use derive_more::Display;

use crate::ext::AsyncTryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
    /// Sockets, fifos, devices and anything else that is neither.
    #[display("other")]
    Other,
}

/// Metadata of a filesystem object, as reported by a symlink-following stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl EntryStat {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl AsyncTryFrom<&Path> for EntryStat {
    type Error = std::io::Error;

    async fn async_try_from(path: &Path) -> Result<Self, Self::Error> {
        let metadata = fs::metadata(path).await?;

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        Ok(EntryStat {
            kind,
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}
