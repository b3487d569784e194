use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    rc::Rc,
};

use compio::runtime::spawn_blocking;
use futures::{Stream, stream};
use snafu::ensure;
use snafu::{ResultExt, Snafu};
use tracing::{debug, trace};

use crate::config::WalkConfig;
use crate::entry::{EntryError, FileEntry};
use crate::ext::BestEffortPathExt;

/// Single-pass, post-order walk over a directory tree.
///
/// Files are yielded as soon as they are discovered, directories only once
/// their whole subtree has been yielded, and the root comes last. Children are
/// appended to their parent the moment they are listed, so the tree under
/// [`Walker::root`] stays inspectable even when the walk fails halfway.
///
/// Listings are not sorted: siblings come in whatever order the filesystem
/// returns them.
pub struct Walker {
    root: Rc<FileEntry>,
    state: WalkState,
}

enum WalkState {
    NotStarted,
    Walking(Vec<Frame>),
    Finished,
}

/// A directory whose listing is still being consumed.
struct Frame {
    dir: Rc<FileEntry>,
    names: std::vec::IntoIter<OsString>,
}

impl Frame {
    async fn open(dir: Rc<FileEntry>) -> Result<Self, WalkError> {
        let path = dir.full_path();
        debug!("Listing directory {}", path.best_effort_path_display());

        let listed_path = path.clone();
        let names = match spawn_blocking(move || read_dir_names(&listed_path)).await {
            Ok(names) => names,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        let names = names.context(ReadDirSnafu { path })?;
        Ok(Frame {
            dir,
            names: names.into_iter(),
        })
    }
}

/// Collects the names of a directory's entries, releasing the handle before
/// returning. Runs on the blocking pool so a slow listing does not stall the
/// runtime thread.
fn read_dir_names(path: &Path) -> std::io::Result<Vec<OsString>> {
    std::fs::read_dir(path)?
        .map(|entry| entry.map(|entry| entry.file_name()))
        .collect()
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, WalkConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: WalkConfig) -> Self {
        Self::from_entry(FileEntry::root_with_config(root, config))
    }

    /// Walks below an existing entry. Discovered children are appended to it,
    /// so the entry must not have any children yet.
    pub fn from_entry(root: Rc<FileEntry>) -> Self {
        Self {
            root,
            state: WalkState::NotStarted,
        }
    }

    pub fn root(&self) -> &Rc<FileEntry> {
        &self.root
    }

    /// Advances the walk by one entry.
    ///
    /// Returns `Ok(None)` once the root has been yielded. After an error or
    /// the end of the walk, every further call returns `Ok(None)`.
    pub async fn next_entry(&mut self) -> Result<Option<Rc<FileEntry>>, WalkError> {
        let next = self.advance().await;
        if !matches!(next, Ok(Some(_))) {
            self.state = WalkState::Finished;
        }
        next
    }

    async fn advance(&mut self) -> Result<Option<Rc<FileEntry>>, WalkError> {
        if let WalkState::NotStarted = self.state {
            debug!("Starting walk at {}", self.root.full_path().best_effort_path_display());
            ensure!(
                self.root.children.borrow().is_empty(),
                AlreadyWalkedSnafu {
                    path: self.root.full_path()
                }
            );
            let frame = Frame::open(self.root.clone()).await?;
            self.state = WalkState::Walking(vec![frame]);
        }

        let WalkState::Walking(stack) = &mut self.state else {
            return Ok(None);
        };

        loop {
            let Some(frame) = stack.last_mut() else {
                return Ok(None);
            };

            let Some(name) = frame.names.next() else {
                return Ok(stack.pop().map(|frame| frame.dir));
            };

            let child = frame.dir.append_name(name);
            let stat = child.stat().await.context(EntrySnafu)?;
            trace!("Discovered {} ({})", child.full_path().display(), stat.kind);

            if stat.is_dir() {
                stack.push(Frame::open(child).await?);
            } else {
                return Ok(Some(child));
            }
        }
    }

    /// Drives the walk to completion and returns every entry in post-order.
    pub async fn collect(mut self) -> Result<Vec<Rc<FileEntry>>, WalkError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }

        debug!(
            "Walk of {} produced {} entries",
            self.root.full_path().best_effort_path_display(),
            entries.len()
        );
        Ok(entries)
    }

    /// Turns the walk into a stream of entries. The stream ends after the
    /// first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Rc<FileEntry>, WalkError>> {
        stream::try_unfold(self, |mut walker| async move {
            let entry = walker.next_entry().await?;
            Ok::<_, WalkError>(entry.map(|entry| (entry, walker)))
        })
    }
}

#[derive(Debug, Snafu)]
pub enum WalkError {
    #[snafu(display("Failed to list directory {}", path.best_effort_path_display()))]
    ReadDirError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to inspect a discovered entry"))]
    EntryError { source: EntryError },
    #[snafu(display(
        "{} already has children; walk a fresh entry instead",
        path.best_effort_path_display()
    ))]
    AlreadyWalkedError { path: PathBuf },
}
