//! a directory of disk images addressed by drive letter
use std::path::{Path, PathBuf};

use log::info;

use crate::{
    error::{FsError, Result},
    image::DiskImage,
    mbr::{DeleteMode, Fit, Mbr, Partition, PartitionKind},
    utils::{digest, size_unit::SizeUnit, time_util, traits::DiskRecord},
};

pub const DISK_EXTENSION: &str = "dsk";

/// an opened disk image together with its partition table
#[derive(Debug)]
pub struct Disk {
    letter: char,
    pub image: DiskImage,
    pub mbr: Mbr,
}

impl Disk {
    pub fn open(letter: char, path: &Path) -> Result<Self> {
        let image = DiskImage::open(path)?;
        let mbr = image.read_record::<Mbr>(0)?;
        Ok(Disk { letter, image, mbr })
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    /// write the partition table back and flush the image
    pub fn save(&mut self) -> Result<()> {
        self.image.write_record(0, &self.mbr)?;
        self.image.flush()
    }

    pub fn create_partition(
        &mut self,
        size: i32,
        fit: Fit,
        kind: PartitionKind,
        name: &str,
    ) -> Result<Partition> {
        let index = self.mbr.create_partition(size, fit, kind, name)?;
        self.save()?;
        let partition = self.mbr.partitions[index];
        info!(
            "disk {}: created {:?} partition {} at {} ({} bytes)",
            self.letter, kind, name, partition.start, partition.size
        );
        Ok(partition)
    }

    pub fn delete_partition(&mut self, name: &str, mode: DeleteMode) -> Result<()> {
        let removed = self.mbr.delete_partition(name)?;
        if mode == DeleteMode::Full && removed.size > 0 {
            self.image.fill(removed.start, removed.size as usize, 0)?;
        }
        self.save()?;
        info!("disk {}: deleted partition {} ({:?})", self.letter, name, mode);
        Ok(())
    }

    pub fn resize_partition(&mut self, name: &str, delta: i32) -> Result<Partition> {
        let partition = *self.mbr.resize_partition(name, delta)?;
        self.save()?;
        info!(
            "disk {}: partition {} resized to {} bytes",
            self.letter, name, partition.size
        );
        Ok(partition)
    }
}

/// the directory holding every `<letter>.dsk` image
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new<P>(root: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(DiskStore {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn disk_path(&self, letter: char) -> PathBuf {
        self.root
            .join(format!("{}.{DISK_EXTENSION}", letter.to_ascii_uppercase()))
    }

    /// letters of every image currently present, sorted
    pub fn disks(&self) -> Result<Vec<char>> {
        let mut letters: Vec<char> = ('A'..='Z')
            .filter(|l| self.disk_path(*l).exists())
            .collect();
        letters.sort_unstable();
        Ok(letters)
    }

    /// create a zero-filled image under the first free letter
    /// # Params
    /// - `size`: disk size expressed in `unit`
    /// - `unit`: `K` or `M` (bytes are accepted too)
    /// - `fit`: the disk's placement label
    /// # Return
    /// the drive letter of the new disk
    pub fn mkdisk(&self, size: i32, unit: SizeUnit, fit: Fit) -> Result<char> {
        let bytes = unit.to_bytes(size)?;
        if bytes < Mbr::SIZE as i32 {
            return Err(FsError::InvalidInput(format!(
                "a disk needs at least {} bytes for its partition table",
                Mbr::SIZE
            )));
        }
        let letter = ('A'..='Z')
            .find(|l| !self.disk_path(*l).exists())
            .ok_or_else(|| FsError::NoSpace("no drive letters left".into()))?;
        let path = self.disk_path(letter);
        let mut image = DiskImage::create(&path, bytes as u64)?;
        let signature = digest::disk_signature(&path, time_util::now_nanos());
        let mbr = Mbr::new(bytes, signature, fit);
        image.write_record(0, &mbr)?;
        image.flush()?;
        info!("created disk {letter} at {} with {bytes} bytes", path.display());
        Ok(letter)
    }

    pub fn rmdisk(&self, letter: char) -> Result<()> {
        let path = self.disk_path(validate_letter(letter)?);
        if !path.exists() {
            return Err(FsError::NotFound(format!("disk {letter}")));
        }
        std::fs::remove_file(&path)?;
        info!("removed disk {letter}");
        Ok(())
    }

    pub fn open(&self, letter: char) -> Result<Disk> {
        let letter = validate_letter(letter)?;
        let path = self.disk_path(letter);
        if !path.exists() {
            return Err(FsError::NotFound(format!("disk {letter}")));
        }
        Disk::open(letter, &path)
    }
}

fn validate_letter(letter: char) -> Result<char> {
    if letter.is_ascii_alphabetic() {
        Ok(letter.to_ascii_uppercase())
    } else {
        Err(FsError::InvalidInput(format!(
            "drive letter must be A-Z, got {letter}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mkdisk_assigns_letters_in_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = DiskStore::new(dir.path())?;
        assert_eq!(store.mkdisk(1, SizeUnit::Mega, Fit::First)?, 'A');
        assert_eq!(store.mkdisk(64, SizeUnit::Kilo, Fit::Best)?, 'B');
        assert_eq!(store.disks()?, vec!['A', 'B']);

        let disk = store.open('b')?;
        assert_eq!(disk.mbr.size, 64 * 1024);
        assert_eq!(disk.mbr.fit(), Some(Fit::Best));
        assert!(disk.mbr.partitions.iter().all(Partition::is_empty));
        assert_eq!(disk.image.len(), 64 * 1024);

        store.rmdisk('A')?;
        assert_eq!(store.mkdisk(1, SizeUnit::Kilo, Fit::Worst)?, 'A');
        Ok(())
    }

    #[test]
    fn test_missing_disk_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = DiskStore::new(dir.path())?;
        assert!(matches!(store.open('Q'), Err(FsError::NotFound(_))));
        assert!(matches!(store.rmdisk('Q'), Err(FsError::NotFound(_))));
        assert!(matches!(store.open('1'), Err(FsError::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn test_full_delete_wipes_bytes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = DiskStore::new(dir.path())?;
        let letter = store.mkdisk(4, SizeUnit::Kilo, Fit::First)?;
        let mut disk = store.open(letter)?;
        let partition = disk.create_partition(1024, Fit::Worst, PartitionKind::Primary, "data")?;
        disk.image.fill(partition.start, 1024, 0xAA)?;
        disk.delete_partition("data", DeleteMode::Full)?;

        let disk = store.open(letter)?;
        assert!(disk.mbr.partitions[0].is_empty());
        assert!(disk
            .image
            .read_bytes(partition.start, 1024)?
            .iter()
            .all(|b| *b == 0));
        Ok(())
    }
}
