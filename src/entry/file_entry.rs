use std::{
    cell::{OnceCell, RefCell},
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
    rc::{Rc, Weak},
};

use compio::fs;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu, ensure};
use tracing::trace;

use crate::config::WalkConfig;
use crate::entry::{EntryKind, EntryStat};
use crate::ext::{AsyncTryFrom, BestEffortPathExt};

/// One file or directory of a walked tree.
///
/// Entries are shared as `Rc<FileEntry>`. A parent owns its children, a child
/// only holds a weak link back, so paths can be rebuilt for as long as the
/// root of the tree is alive.
pub struct FileEntry {
    segment: PathBuf,
    parent: RefCell<Weak<FileEntry>>,
    pub(crate) children: RefCell<Vec<Rc<FileEntry>>>,
    stat: OnceCell<EntryStat>,
    pub(crate) checksum: OnceCell<String>,
    config: Rc<WalkConfig>,
}

/// Something that can be appended under an entry: either a name to create a
/// fresh child for, or an existing entry to move under the new parent.
pub enum NewChild {
    Name(PathBuf),
    Entry(Rc<FileEntry>),
}

impl FileEntry {
    /// Creates a parentless entry for `path` using the default config.
    pub fn root(path: impl Into<PathBuf>) -> Rc<Self> {
        Self::root_with_config(path, WalkConfig::default())
    }

    pub fn root_with_config(path: impl Into<PathBuf>, config: WalkConfig) -> Rc<Self> {
        Rc::new(Self::detached(path.into(), Weak::new(), Rc::new(config)))
    }

    fn detached(segment: PathBuf, parent: Weak<FileEntry>, config: Rc<WalkConfig>) -> Self {
        Self {
            segment,
            parent: RefCell::new(parent),
            children: RefCell::new(Vec::new()),
            stat: OnceCell::new(),
            checksum: OnceCell::new(),
            config,
        }
    }

    /// Path component relative to the parent. For a root this is the path the
    /// walk was started from.
    pub fn segment(&self) -> &Path {
        &self.segment
    }

    pub fn parent(&self) -> Option<Rc<FileEntry>> {
        self.parent.borrow().upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Children in discovery order.
    pub fn children(&self) -> Vec<Rc<FileEntry>> {
        self.children.borrow().clone()
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    pub fn full_path(&self) -> PathBuf {
        match self.parent() {
            Some(parent) => parent.full_path().join(&self.segment),
            None => self.segment.clone(),
        }
    }

    /// Appends a child and returns it.
    ///
    /// A name creates a new child sharing this entry's config. An existing
    /// entry is moved here from its previous parent, if any. It is rejected
    /// when it would land under itself or one of its descendants, or when its
    /// config differs from this entry's, since a tree hashes with one config.
    pub fn append(self: &Rc<Self>, child: impl Into<NewChild>) -> Result<Rc<FileEntry>, EntryError> {
        match child.into() {
            NewChild::Name(name) => Ok(self.append_name(name)),
            NewChild::Entry(entry) => self.adopt(entry),
        }
    }

    pub(crate) fn append_name(self: &Rc<Self>, name: impl Into<PathBuf>) -> Rc<FileEntry> {
        let child = Rc::new(Self::detached(
            name.into(),
            Rc::downgrade(self),
            self.config.clone(),
        ));
        self.children.borrow_mut().push(child.clone());
        child
    }

    fn adopt(self: &Rc<Self>, entry: Rc<FileEntry>) -> Result<Rc<FileEntry>, EntryError> {
        if let Some(current) = entry.parent() {
            if Rc::ptr_eq(&current, self) {
                return Ok(entry);
            }
        }

        let mut ancestor = Some(self.clone());
        while let Some(node) = ancestor {
            if Rc::ptr_eq(&node, &entry) {
                return CyclicAppendSnafu {
                    path: entry.full_path(),
                }
                .fail();
            }
            ancestor = node.parent();
        }

        ensure!(
            *entry.config == *self.config,
            ConfigMismatchSnafu {
                path: entry.full_path(),
            }
        );

        if let Some(previous) = entry.parent() {
            previous
                .children
                .borrow_mut()
                .retain(|child| !Rc::ptr_eq(child, &entry));
        }

        *entry.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(entry.clone());
        Ok(entry)
    }

    /// Metadata of the entry, fetched on first use and memoized afterwards.
    pub async fn stat(&self) -> Result<EntryStat, EntryError> {
        if let Some(stat) = self.stat.get() {
            return Ok(*stat);
        }

        let path = self.full_path();
        let stat = EntryStat::async_try_from(path.as_path())
            .await
            .context(StatSnafu { path: path.clone() })?;
        trace!("Stat of {}: {}", path.display(), stat.kind);

        Ok(*self.stat.get_or_init(|| stat))
    }

    pub fn cached_stat(&self) -> Option<EntryStat> {
        self.stat.get().copied()
    }

    pub fn cached_checksum(&self) -> Option<&str> {
        self.checksum.get().map(String::as_str)
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>, EntryError> {
        let stat = self.stat().await?;
        let path = self.full_path();
        ensure!(
            stat.is_file(),
            NotAFileSnafu {
                path,
                kind: stat.kind
            }
        );

        let bytes = fs::read(&path).await;
        bytes.context(ReadSnafu { path })
    }

    /// Reads the file as UTF-8 text.
    pub async fn read_string(&self) -> Result<String, EntryError> {
        let bytes = self.read_bytes().await?;
        String::from_utf8(bytes).context(Utf8Snafu {
            path: self.full_path(),
        })
    }

    /// Reads the file as text, replacing invalid UTF-8 sequences.
    pub async fn read_string_lossy(&self) -> Result<String, EntryError> {
        let bytes = self.read_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn read_json(&self) -> Result<serde_json::Value, EntryError> {
        self.read_json_as().await
    }

    /// Reads the file as a JSON document and deserializes it into `T`.
    pub async fn read_json_as<T: DeserializeOwned>(&self) -> Result<T, EntryError> {
        let bytes = self.read_bytes().await?;
        serde_json::from_slice(&bytes).context(ParseSnafu {
            path: self.full_path(),
        })
    }
}

impl fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEntry")
            .field("path", &self.full_path())
            .field("children", &self.children.borrow().len())
            .field("stat", &self.stat.get())
            .field("checksum", &self.checksum.get())
            .finish()
    }
}

impl From<PathBuf> for NewChild {
    fn from(name: PathBuf) -> Self {
        NewChild::Name(name)
    }
}

impl From<&Path> for NewChild {
    fn from(name: &Path) -> Self {
        NewChild::Name(name.to_path_buf())
    }
}

impl From<OsString> for NewChild {
    fn from(name: OsString) -> Self {
        NewChild::Name(name.into())
    }
}

impl From<&OsStr> for NewChild {
    fn from(name: &OsStr) -> Self {
        NewChild::Name(name.into())
    }
}

impl From<String> for NewChild {
    fn from(name: String) -> Self {
        NewChild::Name(name.into())
    }
}

impl From<&str> for NewChild {
    fn from(name: &str) -> Self {
        NewChild::Name(name.into())
    }
}

impl From<Rc<FileEntry>> for NewChild {
    fn from(entry: Rc<FileEntry>) -> Self {
        NewChild::Entry(entry)
    }
}

impl From<&Rc<FileEntry>> for NewChild {
    fn from(entry: &Rc<FileEntry>) -> Self {
        NewChild::Entry(entry.clone())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EntryError {
    #[snafu(display("Failed to stat {}", path.best_effort_path_display()))]
    StatError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read {}", path.best_effort_path_display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("{} is not a file but a {}", path.best_effort_path_display(), kind))]
    NotAFileError { path: PathBuf, kind: EntryKind },
    #[snafu(display("{} does not contain valid UTF-8", path.best_effort_path_display()))]
    Utf8Error {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse {} as JSON", path.best_effort_path_display()))]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display(
        "Cannot append {} under itself or one of its descendants",
        path.best_effort_path_display()
    ))]
    CyclicAppendError { path: PathBuf },
    #[snafu(display(
        "Cannot append {}: it hashes with a different config than its new parent",
        path.best_effort_path_display()
    ))]
    ConfigMismatchError { path: PathBuf },
}

impl EntryError {
    /// The path the failing operation was working on.
    pub fn path(&self) -> &Path {
        match self {
            EntryError::StatError { path, .. }
            | EntryError::ReadError { path, .. }
            | EntryError::NotAFileError { path, .. }
            | EntryError::Utf8Error { path, .. }
            | EntryError::ParseError { path, .. }
            | EntryError::CyclicAppendError { path }
            | EntryError::ConfigMismatchError { path } => path.as_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::HashAlgorithm;
    use rstest::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("Failed to write file");
        path
    }

    #[test]
    fn root_full_path_is_its_segment() {
        let root = FileEntry::root("some/root");

        assert!(root.is_root());
        assert_eq!(root.full_path(), PathBuf::from("some/root"));
        assert!(root.children().is_empty());
    }

    #[test]
    fn full_path_joins_the_parent_chain() {
        let root = FileEntry::root("root");
        let dir = root.append("dir").unwrap();
        let file = dir.append(String::from("file.txt")).unwrap();

        assert_eq!(file.full_path(), Path::new("root").join("dir").join("file.txt"));
        assert!(Rc::ptr_eq(&file.parent().unwrap(), &dir));
        assert!(Rc::ptr_eq(&dir.parent().unwrap(), &root));
    }

    #[test]
    fn append_keeps_insertion_order() {
        let root = FileEntry::root("root");
        for name in ["c", "a", "b"] {
            root.append(name).unwrap();
        }

        let segments: Vec<_> = root
            .children()
            .iter()
            .map(|child| child.segment().to_path_buf())
            .collect();
        assert_eq!(segments, vec![PathBuf::from("c"), "a".into(), "b".into()]);
    }

    #[test]
    fn children_inherit_the_config() {
        let config = WalkConfig::with_algorithm(HashAlgorithm::Sha256);
        let root = FileEntry::root_with_config("root", config);
        let child = root.append("child").unwrap();

        assert_eq!(child.config(), &config);
    }

    #[test]
    fn append_existing_entry_reparents_it() {
        let root = FileEntry::root("root");
        let old_parent = root.append("old").unwrap();
        let new_parent = root.append("new").unwrap();
        let moved = old_parent.append("moved").unwrap();

        let appended = new_parent.append(&moved).unwrap();

        assert!(Rc::ptr_eq(&appended, &moved));
        assert!(old_parent.children().is_empty());
        assert_eq!(new_parent.children().len(), 1);
        assert!(Rc::ptr_eq(&moved.parent().unwrap(), &new_parent));
        assert_eq!(moved.full_path(), Path::new("root").join("new").join("moved"));
    }

    #[test]
    fn append_detached_root_makes_it_a_child() {
        let root = FileEntry::root("root");
        let orphan = FileEntry::root("orphan");

        root.append(orphan.clone()).unwrap();

        assert!(!orphan.is_root());
        assert_eq!(orphan.full_path(), Path::new("root").join("orphan"));
    }

    #[test]
    fn append_existing_child_again_is_a_no_op() {
        let root = FileEntry::root("root");
        let first = root.append("first").unwrap();
        root.append("second").unwrap();

        root.append(&first).unwrap();

        let children = root.children();
        assert_eq!(children.len(), 2);
        assert!(Rc::ptr_eq(&children[0], &first));
    }

    #[test]
    fn append_rejects_cycles() {
        let root = FileEntry::root("root");
        let child = root.append("child").unwrap();
        let grandchild = child.append("grandchild").unwrap();

        let result = grandchild.append(&root);
        assert!(matches!(result, Err(EntryError::CyclicAppendError { .. })));

        let result = child.append(&child);
        assert!(matches!(result, Err(EntryError::CyclicAppendError { .. })));
        assert_eq!(child.children().len(), 1);
    }

    #[test]
    fn append_rejects_entries_with_another_config() {
        let root = FileEntry::root("root");
        let foreign = FileEntry::root_with_config(
            "foreign",
            WalkConfig::with_algorithm(HashAlgorithm::Sha256),
        );

        let result = root.append(&foreign);

        assert!(matches!(
            result,
            Err(EntryError::ConfigMismatchError { ref path }) if path == Path::new("foreign")
        ));
        assert!(root.children().is_empty());
        assert!(foreign.is_root());
    }

    #[test]
    fn append_accepts_entries_with_an_equal_config() {
        let config = WalkConfig::new(HashAlgorithm::Md5, HashAlgorithm::Sha256);
        let root = FileEntry::root_with_config("root", config);
        let other = FileEntry::root_with_config("other", config);

        let child = root.append(&other).unwrap();

        assert_eq!(*child.config(), config);
        assert_eq!(root.children().len(), 1);
    }

    #[compio::test]
    async fn stat_is_memoized() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = write_file(temp_dir.path(), "file.txt", "content");
        let entry = FileEntry::root(&path);

        assert!(entry.cached_stat().is_none());
        let first = entry.stat().await.expect("Failed to stat");
        std::fs::remove_file(&path).expect("Failed to remove file");
        let second = entry.stat().await.expect("Memoized stat should not hit the disk");

        assert_eq!(first, second);
        assert_eq!(entry.cached_stat(), Some(first));
    }

    #[compio::test]
    async fn stat_of_vanished_entry_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = FileEntry::root(temp_dir.path());
        let missing = root.append("missing").unwrap();

        let err = missing.stat().await.unwrap_err();

        assert!(matches!(err, EntryError::StatError { .. }));
        assert_eq!(err.path(), temp_dir.path().join("missing"));
    }

    #[compio::test]
    async fn read_accessors_return_file_contents() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        write_file(temp_dir.path(), "file.json", r#"{"mock":true}"#);
        let root = FileEntry::root(temp_dir.path());
        let entry = root.append("file.json").unwrap();

        let bytes = entry.read_bytes().await.unwrap();
        let text = entry.read_string().await.unwrap();
        let value = entry.read_json().await.unwrap();

        assert_eq!(bytes, br#"{"mock":true}"#);
        assert_eq!(text, r#"{"mock":true}"#);
        assert_eq!(value, json!({ "mock": true }));
    }

    #[compio::test]
    async fn read_json_as_deserializes_into_a_type() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Mock {
            mock: bool,
        }

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = write_file(temp_dir.path(), "file.json", r#"{"mock":true}"#);
        let entry = FileEntry::root(path);

        let mock: Mock = entry.read_json_as().await.unwrap();
        assert_eq!(mock, Mock { mock: true });
    }

    #[rstest]
    #[case(r#"{"mock":"#)]
    #[case("not json at all")]
    #[case("")]
    #[compio::test]
    async fn read_json_rejects_malformed_input(#[case] contents: &str) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = write_file(temp_dir.path(), "broken.json", contents);
        let entry = FileEntry::root(path);

        let result = entry.read_json().await;
        assert!(matches!(result, Err(EntryError::ParseError { .. })));
    }

    #[compio::test]
    async fn read_string_rejects_invalid_utf8() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = write_file(temp_dir.path(), "binary", [0x66, 0x6f, 0xff, 0x6f]);
        let entry = FileEntry::root(path);

        let result = entry.read_string().await;
        assert!(matches!(result, Err(EntryError::Utf8Error { .. })));

        let lossy = entry.read_string_lossy().await.unwrap();
        assert_eq!(lossy, "fo\u{FFFD}o");
    }

    #[compio::test]
    async fn read_on_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let entry = FileEntry::root(temp_dir.path());

        let err = entry.read_bytes().await.unwrap_err();
        match err {
            EntryError::NotAFileError { kind, .. } => assert_eq!(kind, EntryKind::Directory),
            other => panic!("Expected NotAFileError, got {:?}", other),
        }
        assert!(matches!(
            entry.read_json().await,
            Err(EntryError::NotAFileError { .. })
        ));
    }

    #[test]
    fn error_display_names_the_path() {
        let err = EntryError::NotAFileError {
            path: PathBuf::from("/this/path/does/not/exist"),
            kind: EntryKind::Directory,
        };

        let message = err.to_string();
        assert!(message.contains("/this/path/does/not/exist"));
        assert!(message.contains("is not a file but a directory"));
    }
}
