use std::path::PathBuf;

use snafu::{ResultExt, Snafu};
use tracing::trace;

use crate::checksum::DIGEST_SEPARATOR;
use crate::entry::{EntryError, EntryKind, FileEntry};
use crate::ext::BestEffortPathExt;

impl FileEntry {
    /// Hex digest of the entry, computed on first use.
    ///
    /// The first successful value is kept for the lifetime of the entry and
    /// returned even if the file changes on disk afterwards. A directory only
    /// covers the children recorded on it, so it should be walked first.
    pub async fn checksum(&self) -> Result<String, ChecksumError> {
        if let Some(checksum) = self.checksum.get() {
            return Ok(checksum.clone());
        }

        let stat = self.stat().await.context(EntrySnafu)?;
        let digest = match stat.kind {
            EntryKind::File => self.file_checksum().await?,
            EntryKind::Directory => self.directory_checksum().await?,
            EntryKind::Other => {
                return UnsupportedKindSnafu {
                    path: self.full_path(),
                }
                .fail();
            }
        };
        trace!("Checksum of {}: {}", self.full_path().display(), digest);

        Ok(self.checksum.get_or_init(|| digest).clone())
    }

    async fn file_checksum(&self) -> Result<String, ChecksumError> {
        let bytes = self.read_bytes().await.context(EntrySnafu)?;
        Ok(self.config().file_algorithm.hex_digest(&bytes))
    }

    async fn directory_checksum(&self) -> Result<String, ChecksumError> {
        let children = self.children();
        let mut digests = Vec::with_capacity(children.len());
        for child in children {
            digests.push(Box::pin(child.checksum()).await?);
        }

        let joined = digests.join(DIGEST_SEPARATOR);
        Ok(self.config().directory_algorithm.hex_digest(joined.as_bytes()))
    }
}

#[derive(Debug, Snafu)]
pub enum ChecksumError {
    #[snafu(display("Failed to access entry"))]
    EntryError { source: EntryError },
    #[snafu(display(
        "Cannot checksum {}: neither a file nor a directory",
        path.best_effort_path_display()
    ))]
    UnsupportedKindError { path: PathBuf },
}
