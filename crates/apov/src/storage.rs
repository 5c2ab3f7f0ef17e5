//! Seek + read access to the backing dataset.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// The only storage operations the core relies on.
pub trait Storage {
    /// Position the next read at an absolute byte offset.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Read up to `buf.len()` bytes; `Ok(0)` means end of data.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Drop the current handle and open the backing object again.
    fn reopen(&mut self) -> io::Result<()>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        (**self).seek(offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn reopen(&mut self) -> io::Result<()> {
        (**self).reopen()
    }
}

/// Fill `buf` as far as the storage allows and return the byte count.
pub fn read_full<S: Storage + ?Sized>(storage: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match storage.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cold]
fn not_open(path: &Path) -> io::Error {
    io::Error::new(
        ErrorKind::NotConnected,
        format!("dataset {} is not open", path.display()),
    )
}

/// Dataset file on disk. Closed when dropped.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    file: Option<File>,
}

impl FileStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// A storage that starts closed and only tries to open on [`Storage::reopen`].
    pub fn detached<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Size of the open file, if any.
    pub fn len(&self) -> Option<u64> {
        self.file
            .as_ref()
            .and_then(|f| f.metadata().ok())
            .map(|m| m.len())
    }

    pub fn close(&mut self) {
        self.file = None;
    }
}

impl Storage for FileStorage {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(|| not_open(&self.path))?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file.as_mut().ok_or_else(|| not_open(&self.path))?;
        file.read(buf)
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.file = None;
        self.file = Some(File::open(&self.path)?);
        Ok(())
    }
}

/// Memory-mapped dataset file.
#[cfg(feature = "mmap")]
#[derive(Debug)]
pub struct MmapStorage {
    path: PathBuf,
    map: Option<memmap2::Mmap>,
    pos: u64,
}

#[cfg(feature = "mmap")]
impl MmapStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let map = Self::map(&path)?;
        Ok(Self {
            path,
            map: Some(map),
            pos: 0,
        })
    }

    fn map(path: &Path) -> io::Result<memmap2::Mmap> {
        let file = File::open(path)?;
        // Safety: the dataset is opened read-only and treated as immutable for
        // the lifetime of the mapping.
        unsafe { memmap2::MmapOptions::new().map(&file) }
    }

    pub fn len(&self) -> Option<u64> {
        self.map.as_ref().map(|m| m.len() as u64)
    }
}

#[cfg(feature = "mmap")]
impl Storage for MmapStorage {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if self.map.is_none() {
            return Err(not_open(&self.path));
        }
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let map = self.map.as_ref().ok_or_else(|| not_open(&self.path))?;
        let start = self.pos.min(map.len() as u64) as usize;
        let n = buf.len().min(map.len() - start);
        buf[..n].copy_from_slice(&map[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.map = None;
        self.map = Some(Self::map(&self.path)?);
        Ok(())
    }
}

/// Dataset held in memory; reopening just keeps the same bytes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Vec<u8>,
    pos: u64,
}

impl MemoryStorage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Storage for MemoryStorage {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.pos.min(self.data.len() as u64) as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `chunk` bytes per read.
    struct Trickle {
        inner: MemoryStorage,
        chunk: usize,
    }

    impl Storage for Trickle {
        fn seek(&mut self, offset: u64) -> io::Result<()> {
            self.inner.seek(offset)
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..n])
        }

        fn reopen(&mut self) -> io::Result<()> {
            self.inner.reopen()
        }
    }

    #[test]
    fn read_full_gathers_partial_reads() {
        let mut storage = Trickle {
            inner: MemoryStorage::new((0..100u8).collect()),
            chunk: 7,
        };
        storage.seek(10).unwrap();

        let mut buf = [0u8; 50];
        assert_eq!(read_full(&mut storage, &mut buf).unwrap(), 50);
        assert_eq!(buf[0], 10);
        assert_eq!(buf[49], 59);
    }

    #[test]
    fn read_full_reports_short_data() {
        let mut storage = MemoryStorage::new(vec![1; 16]);
        storage.seek(10).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(read_full(&mut storage, &mut buf).unwrap(), 6);

        storage.seek(1000).unwrap();
        assert_eq!(read_full(&mut storage, &mut buf).unwrap(), 0);
    }

    #[test]
    fn file_storage_reads_and_reopens() {
        let path = std::env::temp_dir().join(format!("apov-storage-{}.bin", std::process::id()));
        std::fs::write(&path, (0..64u8).collect::<Vec<_>>()).unwrap();

        let mut storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.len(), Some(64));
        storage.seek(60).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut storage, &mut buf).unwrap(), 4);

        storage.close();
        assert!(storage.seek(0).is_err());
        storage.reopen().unwrap();
        storage.seek(3).unwrap();
        assert_eq!(read_full(&mut storage, &mut buf).unwrap(), 8);
        assert_eq!(buf[0], 3);

        std::fs::remove_file(&path).unwrap();
        drop(storage);
    }

    #[test]
    fn detached_storage_fails_until_the_file_exists() {
        let path = std::env::temp_dir().join(format!("apov-detached-{}.bin", std::process::id()));
        let mut storage = FileStorage::detached(&path);

        assert!(!storage.is_open());
        assert!(storage.read(&mut [0u8; 4]).is_err());
        assert!(storage.reopen().is_err());

        std::fs::write(&path, [9u8; 4]).unwrap();
        storage.reopen().unwrap();
        assert!(storage.is_open());
        std::fs::remove_file(&path).unwrap();
    }
}
