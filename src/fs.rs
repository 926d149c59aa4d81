//! Filesystem helpers used by the on-disk event queue.
//!
//! Every wrapper performs a single filesystem operation and hands back the
//! operating system's error untouched inside an [`FsError`], which adds the
//! operation, the path, and a [`FsErrorKind`] for matching. Nothing here logs,
//! retries, or times out; callers decide how to recover.
//!
//! The only error that is ever absorbed is the idempotent case of
//! [`mkdirp`]: asking for a directory that already exists succeeds.

use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use futures_util::future::{BoxFuture, FutureExt};
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Requested permission bits for new directories, before the umask.
const DIR_MODE: u32 = 0o777;

/// Broad category of a filesystem failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    NotFound,
    PermissionDenied,
    NotADirectory,
    AlreadyExists,
    Unknown,
}

impl From<io::ErrorKind> for FsErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => FsErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => FsErrorKind::PermissionDenied,
            io::ErrorKind::NotADirectory => FsErrorKind::NotADirectory,
            io::ErrorKind::AlreadyExists => FsErrorKind::AlreadyExists,
            _ => FsErrorKind::Unknown,
        }
    }
}

/// A failed filesystem operation.
///
/// The underlying [`io::Error`] is kept as the error source and is available
/// through [`FsError::io_error`] or [`FsError::into_io_error`].
#[derive(Debug, Error)]
#[error("{op} {}: {source}", .path.display())]
pub struct FsError {
    kind: FsErrorKind,
    op: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl FsError {
    pub(crate) fn new(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            kind: source.kind().into(),
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Portable category of the underlying I/O error.
    pub fn kind(&self) -> FsErrorKind {
        self.kind
    }

    /// Name of the failed operation (`mkdir`, `stat`, ...).
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Path the operation was attempted on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// OS error code, when the error came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }

    pub fn io_error(&self) -> &io::Error {
        &self.source
    }

    pub fn into_io_error(self) -> io::Error {
        self.source
    }
}

/// Open mode used by [`read_file_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFlag {
    /// `r`: read only, the file must exist.
    #[default]
    Read,
    /// `r+` / `rs+`: read and write, the file must exist.
    ReadWrite,
    /// `a+`: read and append, the file is created if missing.
    ReadAppend,
}

impl FromStr for FileFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(FileFlag::Read),
            "r+" | "rs+" => Ok(FileFlag::ReadWrite),
            "a+" => Ok(FileFlag::ReadAppend),
            other => Err(format!("unsupported file flag '{}'", other)),
        }
    }
}

/// Options for [`read_file_with`]. Contents are always returned as raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadFileOptions {
    pub flag: FileFlag,
}

/// Reads the whole file at `path`.
pub async fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>, FsError> {
    let path = path.as_ref();
    tokio::fs::read(path)
        .await
        .map_err(|e| FsError::new("read", path, e))
}

/// Reads the whole file at `path`, opening it with the given flag.
pub async fn read_file_with(
    path: impl AsRef<Path>,
    options: ReadFileOptions,
) -> Result<Vec<u8>, FsError> {
    let path = path.as_ref();
    let mut open = tokio::fs::OpenOptions::new();
    open.read(true);
    match options.flag {
        FileFlag::Read => {}
        FileFlag::ReadWrite => {
            open.write(true);
        }
        FileFlag::ReadAppend => {
            open.append(true).create(true);
        }
    }

    let mut file = open
        .open(path)
        .await
        .map_err(|e| FsError::new("open", path, e))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .await
        .map_err(|e| FsError::new("read", path, e))?;
    Ok(data)
}

/// Writes `contents` to `path`, replacing any existing file.
pub async fn write_file(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<(), FsError> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| FsError::new("write", path, e))
}

/// Returns the metadata of `path`, following symlinks.
pub async fn stat(path: impl AsRef<Path>) -> Result<Metadata, FsError> {
    let path = path.as_ref();
    tokio::fs::metadata(path)
        .await
        .map_err(|e| FsError::new("stat", path, e))
}

/// Removes the file at `path`. Directories are rejected.
pub async fn unlink(path: impl AsRef<Path>) -> Result<(), FsError> {
    let path = path.as_ref();
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| FsError::new("unlink", path, e))
}

/// Lists the entry names of a directory, sorted.
pub async fn read_dir(path: impl AsRef<Path>) -> Result<Vec<String>, FsError> {
    let path = path.as_ref();
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| FsError::new("scandir", path, e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FsError::new("scandir", path, e))?
    {
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    names.sort();
    Ok(names)
}

/// Moves `old_path` to `new_path`, replacing any file already there.
///
/// Errors report `old_path`.
pub async fn rename(old_path: impl AsRef<Path>, new_path: impl AsRef<Path>) -> Result<(), FsError> {
    let old_path = old_path.as_ref();
    tokio::fs::rename(old_path, new_path.as_ref())
        .await
        .map_err(|e| FsError::new("rename", old_path, e))
}

/// Creates `path` and every missing ancestor.
///
/// Succeeds without doing anything when `path` is already a directory. Fails
/// with the original `mkdir` error when `path` exists as something else.
///
/// ```no_run
/// # async fn run() -> Result<(), bugstr_desktop::FsError> {
/// bugstr_desktop::fs::mkdirp("/tmp/bugstr/queue").await?;
/// # Ok(())
/// # }
/// ```
pub async fn mkdirp(path: impl AsRef<Path>) -> Result<(), FsError> {
    let real_path = resolve(path.as_ref())?;
    mkdirp_resolved(real_path).await
}

fn mkdirp_resolved(path: PathBuf) -> BoxFuture<'static, Result<(), FsError>> {
    async move {
        let err = match create_dir(&path).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if err.kind() == io::ErrorKind::NotFound {
            let Some(parent) = path.parent() else {
                return Err(FsError::new("mkdir", &path, err));
            };
            mkdirp_resolved(parent.to_path_buf()).await?;
            return create_dir(&path)
                .await
                .map_err(|e| FsError::new("mkdir", &path, e));
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(FsError::new("mkdir", &path, err)),
        }
    }
    .boxed()
}

async fn create_dir(path: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder.create(path).await
}

/// Blocking version of [`mkdirp`] with the same semantics.
///
/// Used where no runtime is available, such as inside a panic hook.
pub fn mkdirp_sync(path: impl AsRef<Path>) -> Result<(), FsError> {
    let real_path = resolve(path.as_ref())?;
    mkdirp_sync_resolved(&real_path)
}

fn mkdirp_sync_resolved(path: &Path) -> Result<(), FsError> {
    let err = match create_dir_sync(path) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };

    if err.kind() == io::ErrorKind::NotFound {
        let Some(parent) = path.parent() else {
            return Err(FsError::new("mkdir", path, err));
        };
        mkdirp_sync_resolved(parent)?;
        return create_dir_sync(path).map_err(|e| FsError::new("mkdir", path, e));
    }

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(FsError::new("mkdir", path, err)),
    }
}

fn create_dir_sync(path: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path)
}

/// Makes `path` absolute against the working directory and folds `.` and
/// `..` components lexically, without touching the filesystem.
pub fn resolve(path: &Path) -> Result<PathBuf, FsError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| FsError::new("resolve", path, e))?
            .join(path)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn mkdirp_creates_missing_ancestors() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a/b/c/d");

        mkdirp(&target).await.unwrap();

        assert!(target.is_dir());
        assert!(dir.path().join("a/b").is_dir());
    }

    #[tokio::test]
    async fn mkdirp_is_idempotent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("queue");

        mkdirp(&target).await.unwrap();
        mkdirp(&target).await.unwrap();

        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn mkdirp_fails_when_path_is_a_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let err = mkdirp(&file).await.unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::AlreadyExists);
        assert_eq!(err.op(), "mkdir");
        assert!(file.is_file());
    }

    #[tokio::test]
    async fn mkdirp_fails_when_ancestor_is_a_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();

        let err = mkdirp(dir.path().join("file/child/grandchild"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::NotADirectory);
    }

    #[tokio::test]
    async fn mkdirp_resolves_relative_components() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("x/../y/./z");

        mkdirp(&target).await.unwrap();

        assert!(dir.path().join("y/z").is_dir());
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn mkdirp_sync_matches_async_behaviour() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("one/two/three");

        mkdirp_sync(&target).unwrap();
        mkdirp_sync(&target).unwrap();
        assert!(target.is_dir());

        let file = dir.path().join("one/plain");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(
            mkdirp_sync(&file).unwrap_err().kind(),
            FsErrorKind::AlreadyExists
        );
    }

    #[tokio::test]
    async fn read_file_returns_exact_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, [0u8, 159, 146, 150, b'\n']).unwrap();

        assert_eq!(read_file(&path).await.unwrap(), vec![0u8, 159, 146, 150, b'\n']);
    }

    #[tokio::test]
    async fn read_file_missing_is_not_found() {
        let dir = tempdir().unwrap();

        let err = read_file(dir.path().join("missing")).await.unwrap_err();

        assert_eq!(err.kind(), FsErrorKind::NotFound);
        assert_eq!(err.io_error().kind(), io::ErrorKind::NotFound);
        assert!(err.raw_os_error().is_some());
    }

    #[tokio::test]
    async fn read_file_with_append_flag_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("created");

        let options = ReadFileOptions {
            flag: "a+".parse().unwrap(),
        };
        assert!(read_file_with(&path, options).await.unwrap().is_empty());
        assert!(path.is_file());

        let err = read_file_with(dir.path().join("absent"), ReadFileOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
    }

    #[test]
    fn file_flag_rejects_unknown_modes() {
        assert_eq!("r".parse::<FileFlag>(), Ok(FileFlag::Read));
        assert_eq!("rs+".parse::<FileFlag>(), Ok(FileFlag::ReadWrite));
        assert!("w".parse::<FileFlag>().is_err());
    }

    #[tokio::test]
    async fn unlink_then_stat_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entry");
        write_file(&path, b"data").await.unwrap();
        assert!(stat(&path).await.unwrap().is_file());

        unlink(&path).await.unwrap();

        assert_eq!(stat(&path).await.unwrap_err().kind(), FsErrorKind::NotFound);
    }

    #[tokio::test]
    async fn read_dir_lists_sorted_names() {
        let dir = tempdir().unwrap();
        for name in ["c.json", "a.json", "b.json"] {
            std::fs::write(dir.path().join(name), b"{}").unwrap();
        }

        let names = read_dir(dir.path()).await.unwrap();

        assert_eq!(names, vec!["a.json", "b.json", "c.json"]);
    }

    #[tokio::test]
    async fn rename_moves_file() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("entry.tmp");
        let to = dir.path().join("entry.json");
        std::fs::write(&from, b"payload").unwrap();

        rename(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"payload");
        let err = rename(&from, &to).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
        assert_eq!(err.path(), from.as_path());
        assert_eq!(err.op(), "rename");
    }

    #[test]
    fn resolve_folds_dot_components() {
        let resolved = resolve(Path::new("/var/lib/../tmp/./bugstr")).unwrap();
        assert_eq!(resolved, PathBuf::from("/var/tmp/bugstr"));
        assert!(resolve(Path::new("relative")).unwrap().is_absolute());
    }
}
