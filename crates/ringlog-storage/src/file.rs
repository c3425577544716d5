use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::traits::{OpenMode, Storage, StorageHandle};

/// Filesystem-backed storage rooted at a directory.
///
/// Object names are relative paths below the root; a leading `/` is
/// accepted so device-style names such as `/sysLog.dat` map to
/// `<root>/sysLog.dat`. Names that would escape the root are rejected.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a storage rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory objects are stored under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of the named object.
    pub fn path_of(&self, name: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let valid = !relative.as_os_str().is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl Storage for FileStorage {
    type Handle = FileHandle;

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.path_of(name)?.is_file())
    }

    fn open(&self, name: &str, mode: OpenMode) -> StorageResult<FileHandle> {
        let path = self.path_of(name)?;
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if mode == OpenMode::Create {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            options.create(true).truncate(true);
        }
        let file = options.open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::Io(e),
        })?;
        debug!(path = %path.display(), ?mode, "storage object opened");
        Ok(FileHandle {
            file,
            path,
            pos: 0,
        })
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn size(&self, name: &str) -> StorageResult<u64> {
        let path = self.path_of(name)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Handle onto one file of a [`FileStorage`].
///
/// Reads go straight to the file (no read-ahead buffer) so the file cursor
/// and `position` always agree, even when reads and writes interleave.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
    pos: u64,
}

impl FileHandle {
    fn len(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl StorageHandle for FileHandle {
    fn seek(&mut self, offset: u64) -> StorageResult<()> {
        if offset > self.len()? {
            return Err(StorageError::SeekOutOfRange {
                name: self.path.display().to_string(),
                offset,
            });
        }
        self.pos = self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn read_until(
        &mut self,
        delimiter: u8,
        max_bytes: usize,
        buf: &mut Vec<u8>,
    ) -> StorageResult<usize> {
        buf.clear();
        buf.resize(max_bytes, 0);
        let mut filled = 0;
        while filled < max_bytes {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);

        let consumed = match buf.iter().position(|&b| b == delimiter) {
            Some(at) => {
                buf.truncate(at);
                at + 1
            }
            None => filled,
        };
        // Rewind whatever was read past the delimiter.
        self.pos = self.file.seek(SeekFrom::Start(self.pos + consumed as u64))?;
        Ok(buf.len())
    }

    fn write_line(&mut self, bytes: &[u8]) -> StorageResult<usize> {
        self.file.write_all(bytes)?;
        self.file.write_all(b"\n")?;
        self.pos += bytes.len() as u64 + 1;
        Ok(bytes.len())
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.flush()
    }

    fn bytes_available(&mut self) -> StorageResult<u64> {
        Ok(self.len()?.saturating_sub(self.pos))
    }
}
