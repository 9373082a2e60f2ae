//! the byte-addressable disk image every component reads and writes through
use std::{
    fs::OpenOptions,
    io::{Error, ErrorKind},
    ops::Range,
    path::{Path, PathBuf},
};

use memmap2::MmapMut;

use crate::{
    error::{FsError, Result},
    utils::traits::DiskRecord,
};

/// a fixed-size image file mapped into memory
///
/// all offsets are absolute positions inside the file
#[derive(Debug)]
pub struct DiskImage {
    path: PathBuf,
    mmap: MmapMut,
}

impl DiskImage {
    /// create a new zero-filled image of `size` bytes, failing if the file exists
    pub fn create<P>(path: P, size: u64) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        if size == 0 {
            return Err(FsError::InvalidInput("disk size must be positive".into()));
        }
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        // all bytes are zero after `set_len`
        file.set_len(size)?;
        Self::map(path, &file)
    }

    /// open an existing image for read and write
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::map(path, &file)
    }

    fn map(path: &Path, file: &std::fs::File) -> Result<Self> {
        // Safety
        // This method returns an error when the underlying system call fails,
        // which can happen for a variety of reasons,
        // such as when the file is not open with read and write permissions.
        // from https://docs.rs/memmap2/0.5.10/memmap2/struct.MmapMut.html
        let mmap = unsafe { MmapMut::map_mut(file)? };
        Ok(DiskImage {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn range(&self, offset: i32, len: usize) -> Result<Range<usize>> {
        let start = usize::try_from(offset)
            .map_err(|_| FsError::Format(format!("negative offset {offset}")))?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.mmap.len())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::UnexpectedEof,
                    format!(
                        "access to [{start}, {}) is outside a {} byte image",
                        start.saturating_add(len),
                        self.mmap.len()
                    ),
                )
            })?;
        Ok(start..end)
    }

    /// read the record stored at `offset`
    pub fn read_record<T: DiskRecord>(&self, offset: i32) -> Result<T> {
        let range = self.range(offset, T::SIZE)?;
        let mut slot = &self.mmap[range];
        T::deserialize_from(&mut slot)
    }

    /// write `record` at `offset`
    pub fn write_record<T: DiskRecord>(&mut self, offset: i32, record: &T) -> Result<()> {
        let range = self.range(offset, T::SIZE)?;
        let mut slot = &mut self.mmap[range];
        record.serialize_into(&mut slot).map(|_size| ())
    }

    pub fn read_bytes(&self, offset: i32, len: usize) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.mmap[range])
    }

    pub fn write_bytes(&mut self, offset: i32, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.mmap[range].copy_from_slice(bytes);
        Ok(())
    }

    /// set `len` bytes starting at `offset` to `byte`
    pub fn fill(&mut self, offset: i32, len: usize, byte: u8) -> Result<()> {
        let range = self.range(offset, len)?;
        self.mmap[range].fill(byte);
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        Ok(self.mmap.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_zero_filled_and_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("A.dsk");
        let mut image = DiskImage::create(&path, 4096)?;
        assert_eq!(image.len(), 4096);
        assert!(image.read_bytes(0, 4096)?.iter().all(|b| *b == 0));
        image.write_bytes(100, b"hello")?;
        image.flush()?;
        drop(image);

        let image = DiskImage::open(&path)?;
        assert_eq!(image.read_bytes(100, 5)?, b"hello");
        Ok(())
    }

    #[test]
    fn test_create_refuses_existing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("A.dsk");
        DiskImage::create(&path, 16)?;
        assert!(matches!(DiskImage::create(&path, 16), Err(FsError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_access_is_io_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut image = DiskImage::create(dir.path().join("A.dsk"), 16)?;
        assert!(matches!(image.write_bytes(10, &[1; 10]), Err(FsError::Io(_))));
        assert!(matches!(image.read_bytes(-1, 1), Err(FsError::Format(_))));
        image.fill(0, 16, b'O')?;
        assert_eq!(image.read_bytes(15, 1)?, b"O");
        Ok(())
    }
}
