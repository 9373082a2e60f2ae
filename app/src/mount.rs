//! mount partitions of a disk store and resolve mount ids back to them
use log::info;

use crate::{
    disk::{Disk, DiskStore},
    error::{FsError, Result},
    fs::SuperBlock,
    mbr::Partition,
};

/// a mounted partition located through its id
#[derive(Debug, Clone, PartialEq)]
pub struct MountedPartition {
    pub id: String,
    pub letter: char,
    /// table slot of the partition
    pub slot: usize,
    pub partition: Partition,
}

/// the drive letter encoded as the first character of a mount id
pub fn letter_of(id: &str) -> Result<char> {
    id.trim()
        .chars()
        .next()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| FsError::InvalidInput(format!("malformed mount id {id:?}")))
}

impl DiskStore {
    /// mount the partition `name` of disk `letter`
    /// # Return
    /// the mount id, e.g. `A105`
    pub fn mount(&self, letter: char, name: &str) -> Result<String> {
        let mut disk = self.open(letter)?;
        let (slot, id) = disk.mbr.mount_partition(name, disk.letter())?;
        let partition = disk.mbr.partitions[slot];
        // already formatted partitions keep their mount statistics
        SuperBlock::stamp_mount(&mut disk.image, &partition)?;
        disk.save()?;
        info!("mounted partition {name} of disk {} as {id}", disk.letter());
        Ok(id)
    }

    pub fn unmount(&self, id: &str) -> Result<()> {
        let mut disk = self.open(letter_of(id)?)?;
        let slot = disk.mbr.unmount_partition(id)?;
        let partition = disk.mbr.partitions[slot];
        SuperBlock::stamp_unmount(&mut disk.image, &partition)?;
        disk.save()?;
        info!("unmounted {id}");
        Ok(())
    }

    /// every mounted partition of every disk in the store
    pub fn mounted(&self) -> Result<Vec<MountedPartition>> {
        let mut mounted = Vec::new();
        for letter in self.disks()? {
            let disk = self.open(letter)?;
            mounted.extend(
                disk.mbr
                    .partitions
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.is_mounted())
                    .map(|(slot, p)| MountedPartition {
                        id: p.id(),
                        letter,
                        slot,
                        partition: *p,
                    }),
            );
        }
        Ok(mounted)
    }

    /// open the disk holding mount id `id`
    /// # Errors
    /// [FsError::NotFound] when no mounted partition carries that id
    pub fn open_mounted(&self, id: &str) -> Result<(Disk, MountedPartition)> {
        let letter = letter_of(id)?;
        let disk = self.open(letter)?;
        let slot = disk
            .mbr
            .position_by_id(id)
            .filter(|slot| disk.mbr.partitions[*slot].is_mounted())
            .ok_or_else(|| FsError::NotFound(format!("mounted partition {id}")))?;
        let partition = disk.mbr.partitions[slot];
        Ok((
            disk,
            MountedPartition {
                id: partition.id(),
                letter,
                slot,
                partition,
            },
        ))
    }
}
