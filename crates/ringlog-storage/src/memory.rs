use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{StorageError, StorageResult};
use crate::traits::{OpenMode, Storage, StorageHandle};

/// Pending faults consumed by the next matching operations.
#[derive(Debug, Default)]
struct Faults {
    seeks: usize,
    short_writes: usize,
    opens: usize,
}

#[derive(Debug, Default)]
struct Inner {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    faults: Mutex<Faults>,
    yields: AtomicUsize,
}

/// In-memory, HashMap-based storage.
///
/// Intended for tests and embedding. Clones share the same objects, so a test
/// can keep a clone to inspect or corrupt bytes while an engine owns
/// another. Writes land directly in the shared map; `flush` is a no-op.
///
/// Faults can be armed to make the next N seeks, opens, or writes fail in the
/// way a flaky flash driver would.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    inner: Arc<Inner>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.inner.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.objects.read().expect("lock poisoned").is_empty()
    }

    /// Copy of the bytes of the named object.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.inner
            .objects
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
    }

    /// Replace the named object wholesale.
    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.inner
            .objects
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), bytes);
    }

    /// Overwrite bytes of an existing object in place, growing it if needed.
    pub fn patch(&self, name: &str, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        let mut map = self.inner.objects.write().expect("lock poisoned");
        let object = map
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        write_at(object, offset as usize, bytes);
        Ok(())
    }

    /// Make the next `count` seeks fail.
    pub fn fail_next_seeks(&self, count: usize) {
        self.inner.faults.lock().expect("lock poisoned").seeks = count;
    }

    /// Make the next `count` line writes persist one byte less than asked.
    pub fn short_next_writes(&self, count: usize) {
        self.inner.faults.lock().expect("lock poisoned").short_writes = count;
    }

    /// Make the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.inner.faults.lock().expect("lock poisoned").opens = count;
    }

    /// How many times `yield_now` has been called.
    pub fn yield_count(&self) -> usize {
        self.inner.yields.load(Ordering::Relaxed)
    }

    fn take_fault(&self, select: impl FnOnce(&mut Faults) -> &mut usize) -> bool {
        let mut faults = self.inner.faults.lock().expect("lock poisoned");
        let counter = select(&mut faults);
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

impl Storage for InMemoryStorage {
    type Handle = InMemoryHandle;

    fn exists(&self, name: &str) -> StorageResult<bool> {
        let map = self.inner.objects.read().expect("lock poisoned");
        Ok(map.contains_key(name))
    }

    fn open(&self, name: &str, mode: OpenMode) -> StorageResult<InMemoryHandle> {
        if self.take_fault(|f| &mut f.opens) {
            return Err(StorageError::InjectedFault("open"));
        }
        let mut map = self.inner.objects.write().expect("lock poisoned");
        match mode {
            OpenMode::Create => {
                map.insert(name.to_string(), Vec::new());
            }
            OpenMode::ReadWrite => {
                if !map.contains_key(name) {
                    return Err(StorageError::NotFound(name.to_string()));
                }
            }
        }
        Ok(InMemoryHandle {
            storage: self.clone(),
            name: name.to_string(),
            pos: 0,
        })
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        let mut map = self.inner.objects.write().expect("lock poisoned");
        Ok(map.remove(name).is_some())
    }

    fn size(&self, name: &str) -> StorageResult<u64> {
        let map = self.inner.objects.read().expect("lock poisoned");
        map.get(name)
            .map(|object| object.len() as u64)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn yield_now(&self) {
        self.inner.yields.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle onto one object of an [`InMemoryStorage`].
#[derive(Debug)]
pub struct InMemoryHandle {
    storage: InMemoryStorage,
    name: String,
    pos: u64,
}

impl InMemoryHandle {
    fn with_object<T>(&self, f: impl FnOnce(&Vec<u8>) -> T) -> StorageResult<T> {
        let map = self.storage.inner.objects.read().expect("lock poisoned");
        map.get(&self.name)
            .map(f)
            .ok_or_else(|| StorageError::NotFound(self.name.clone()))
    }
}

impl StorageHandle for InMemoryHandle {
    fn seek(&mut self, offset: u64) -> StorageResult<()> {
        if self.storage.take_fault(|f| &mut f.seeks) {
            return Err(StorageError::InjectedFault("seek"));
        }
        let len = self.with_object(|object| object.len() as u64)?;
        if offset > len {
            return Err(StorageError::SeekOutOfRange {
                name: self.name.clone(),
                offset,
            });
        }
        self.pos = offset;
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
        let start = self.pos as usize;
        let consumed = self.with_object(|object| {
            let available = object.get(start..).unwrap_or(&[]);
            let window = &available[..available.len().min(max_bytes)];
            match window.iter().position(|&b| b == delimiter) {
                Some(at) => {
                    buf.extend_from_slice(&window[..at]);
                    at + 1
                }
                None => {
                    buf.extend_from_slice(window);
                    window.len()
                }
            }
        })?;
        self.pos += consumed as u64;
        Ok(buf.len())
    }

    fn write_line(&mut self, bytes: &[u8]) -> StorageResult<usize> {
        let persisted = if self.storage.take_fault(|f| &mut f.short_writes) {
            &bytes[..bytes.len().saturating_sub(1)]
        } else {
            bytes
        };
        let mut map = self.storage.inner.objects.write().expect("lock poisoned");
        let object = map
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        let start = self.pos as usize;
        write_at(object, start, persisted);
        write_at(object, start + persisted.len(), b"\n");
        self.pos += persisted.len() as u64 + 1;
        Ok(persisted.len())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn bytes_available(&mut self) -> StorageResult<u64> {
        let len = self.with_object(|object| object.len() as u64)?;
        Ok(len.saturating_sub(self.pos))
    }
}

fn write_at(object: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    let end = offset + bytes.len();
    if object.len() < end {
        object.resize(end, 0);
    }
    object[offset..end].copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(storage: &InMemoryStorage, name: &str) -> InMemoryHandle {
        storage.open(name, OpenMode::Create).unwrap()
    }

    #[test]
    fn open_read_write_requires_existing_object() {
        let storage = InMemoryStorage::new();
        let err = storage.open("log.dat", OpenMode::ReadWrite).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn create_truncates() {
        let storage = InMemoryStorage::new();
        storage.insert("log.dat", b"old content".to_vec());
        let _handle = created(&storage, "log.dat");
        assert_eq!(storage.size("log.dat").unwrap(), 0);
    }

    #[test]
    fn write_line_appends_terminator() {
        let storage = InMemoryStorage::new();
        let mut handle = created(&storage, "log.dat");
        assert_eq!(handle.write_line(b"abc").unwrap(), 3);
        assert_eq!(handle.write_line(b"de").unwrap(), 2);
        assert_eq!(storage.contents("log.dat").unwrap(), b"abc\nde\n");
        assert_eq!(handle.position(), 7);
    }

    #[test]
    fn read_until_stops_at_delimiter_and_consumes_it() {
        let storage = InMemoryStorage::new();
        storage.insert("log.dat", b"first\nsecond\n".to_vec());
        let mut handle = storage.open("log.dat", OpenMode::ReadWrite).unwrap();
        let mut buf = Vec::new();

        assert_eq!(handle.read_until(b'\n', 64, &mut buf).unwrap(), 5);
        assert_eq!(buf, b"first");
        assert_eq!(handle.position(), 6);

        assert_eq!(handle.read_until(b'\n', 3, &mut buf).unwrap(), 3);
        assert_eq!(buf, b"sec");
        assert_eq!(handle.bytes_available().unwrap(), 4);
    }

    #[test]
    fn overwrite_in_place() {
        let storage = InMemoryStorage::new();
        let mut handle = created(&storage, "log.dat");
        handle.write_line(b"aaaa").unwrap();
        handle.write_line(b"bbbb").unwrap();
        handle.seek(5).unwrap();
        handle.write_line(b"cccc").unwrap();
        assert_eq!(storage.contents("log.dat").unwrap(), b"aaaa\ncccc\n");
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let storage = InMemoryStorage::new();
        let mut handle = created(&storage, "log.dat");
        handle.write_line(b"abc").unwrap();
        assert!(handle.seek(4).is_ok());
        let err = handle.seek(5).unwrap_err();
        assert!(matches!(err, StorageError::SeekOutOfRange { offset: 5, .. }));
    }

    #[test]
    fn injected_seek_fault_is_consumed_once() {
        let storage = InMemoryStorage::new();
        let mut handle = created(&storage, "log.dat");
        storage.fail_next_seeks(1);
        assert!(matches!(
            handle.seek(0).unwrap_err(),
            StorageError::InjectedFault("seek")
        ));
        assert!(handle.seek(0).is_ok());
    }

    #[test]
    fn injected_short_write_drops_last_byte() {
        let storage = InMemoryStorage::new();
        let mut handle = created(&storage, "log.dat");
        storage.short_next_writes(1);
        assert_eq!(handle.write_line(b"abcd").unwrap(), 3);
        assert_eq!(storage.contents("log.dat").unwrap(), b"abc\n");
    }

    #[test]
    fn injected_open_fault() {
        let storage = InMemoryStorage::new();
        storage.fail_next_opens(1);
        assert!(storage.open("log.dat", OpenMode::Create).is_err());
        assert!(storage.open("log.dat", OpenMode::Create).is_ok());
    }

    #[test]
    fn patch_corrupts_bytes() {
        let storage = InMemoryStorage::new();
        storage.insert("log.dat", b"hello\n".to_vec());
        storage.patch("log.dat", 1, b"EL").unwrap();
        assert_eq!(storage.contents("log.dat").unwrap(), b"hELlo\n");
        assert!(storage.patch("missing", 0, b"x").is_err());
    }

    #[test]
    fn remove_reports_existence() {
        let storage = InMemoryStorage::new();
        storage.insert("log.dat", Vec::new());
        assert!(storage.remove("log.dat").unwrap());
        assert!(!storage.remove("log.dat").unwrap());
        assert!(storage.is_empty());
    }

    #[test]
    fn clones_share_objects() {
        let storage = InMemoryStorage::new();
        let observer = storage.clone();
        storage.insert("log.dat", b"x".to_vec());
        assert_eq!(observer.len(), 1);
        observer.yield_now();
        assert_eq!(storage.yield_count(), 1);
    }
}
