//! the partition table stored at offset 0 of every disk image
use bincode::{Decode, Encode};
use log::debug;

use crate::{
    error::{FsError, Result},
    utils::{
        fixed_str::{from_fixed, names_match, to_fixed},
        time_util,
        traits::DiskRecord,
    },
};

pub const MBR_SIZE: i32 = 153;
pub const PARTITION_SIZE: usize = 35;
pub const PARTITION_SLOTS: usize = 4;
pub const PARTITION_NAME_LEN: usize = 16;
pub const MOUNT_ID_LEN: usize = 4;
/// appended to every mount id after the drive letter and the correlative
pub const MOUNT_ID_SUFFIX: &str = "05";
/// filler byte of every field of an empty slot
const EMPTY: u8 = b'N';

/// placement strategy label, only reported, allocation is always first empty slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Fit {
    #[value(name = "bf")]
    Best,
    #[default]
    #[value(name = "ff")]
    First,
    #[value(name = "wf")]
    Worst,
}

impl Fit {
    pub fn as_byte(self) -> u8 {
        match self {
            Fit::Best => b'B',
            Fit::First => b'F',
            Fit::Worst => b'W',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'B' => Some(Fit::Best),
            b'F' => Some(Fit::First),
            b'W' => Some(Fit::Worst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PartitionKind {
    #[default]
    #[value(name = "p")]
    Primary,
    #[value(name = "e")]
    Extended,
}

impl PartitionKind {
    pub fn as_byte(self) -> u8 {
        match self {
            PartitionKind::Primary => b'P',
            PartitionKind::Extended => b'E',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    Free,
    Created,
    Mounted,
}

/// how `delete` treats the bytes the partition occupied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DeleteMode {
    /// only reset the table entry
    #[default]
    Fast,
    /// also zero-fill the partition's byte range
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Partition {
    pub status: u8,
    pub kind: u8,
    pub fit: u8,
    pub start: i32,
    pub size: i32,
    pub name: [u8; PARTITION_NAME_LEN],
    pub correlative: i32,
    pub id: [u8; MOUNT_ID_LEN],
}

impl DiskRecord for Partition {
    const SIZE: usize = PARTITION_SIZE;
}

impl Default for Partition {
    fn default() -> Self {
        Self::empty()
    }
}

impl Partition {
    /// the sentinel stored in unused table slots
    pub fn empty() -> Self {
        Partition {
            status: EMPTY,
            kind: EMPTY,
            fit: EMPTY,
            start: -1,
            size: -1,
            name: to_fixed("N"),
            correlative: -1,
            id: to_fixed("N"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == -1
    }

    pub fn status(&self) -> PartitionStatus {
        match self.status {
            b'1' => PartitionStatus::Mounted,
            b'0' => PartitionStatus::Created,
            _ => PartitionStatus::Free,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.status() == PartitionStatus::Mounted
    }

    pub fn kind(&self) -> Option<PartitionKind> {
        match self.kind {
            b'P' => Some(PartitionKind::Primary),
            b'E' => Some(PartitionKind::Extended),
            _ => None,
        }
    }

    pub fn fit(&self) -> Option<Fit> {
        Fit::from_byte(self.fit)
    }

    pub fn name(&self) -> String {
        from_fixed(&self.name)
    }

    pub fn id(&self) -> String {
        from_fixed(&self.id)
    }

    /// first byte after this partition
    pub fn end(&self) -> i32 {
        self.start + self.size
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Mbr {
    pub size: i32,
    pub creation_date: f32,
    pub disk_signature: i32,
    pub disk_fit: u8,
    pub partitions: [Partition; PARTITION_SLOTS],
}

impl DiskRecord for Mbr {
    const SIZE: usize = MBR_SIZE as usize;
}

impl Mbr {
    pub fn new(size: i32, disk_signature: i32, fit: Fit) -> Self {
        Mbr {
            size,
            creation_date: time_util::now(),
            disk_signature,
            disk_fit: fit.as_byte(),
            partitions: [Partition::empty(); PARTITION_SLOTS],
        }
    }

    pub fn fit(&self) -> Option<Fit> {
        Fit::from_byte(self.disk_fit)
    }

    /// header bytes plus the size of every occupied slot
    pub fn occupied_bytes(&self) -> i64 {
        MBR_SIZE as i64
            + self
                .partitions
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.size as i64)
                .sum::<i64>()
    }

    /// whether a partition of `size` bytes still fits on this disk
    pub fn can_fit_another_partition(&self, size: i32) -> bool {
        self.occupied_bytes() + size as i64 <= self.size as i64
    }

    /// position of the occupied slot named `name`, compared case-insensitively
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.partitions
            .iter()
            .position(|p| !p.is_empty() && names_match(&p.name, name))
    }

    /// position of the slot carrying mount id `id`, preferring a mounted one
    pub fn position_by_id(&self, id: &str) -> Option<usize> {
        let matches = |p: &Partition| !p.is_empty() && names_match(&p.id, id);
        self.partitions
            .iter()
            .position(|p| matches(p) && p.is_mounted())
            .or_else(|| self.partitions.iter().position(matches))
    }

    pub fn partition_by_name(&self, name: &str) -> Option<&Partition> {
        self.position_by_name(name).map(|i| &self.partitions[i])
    }

    pub fn extended(&self) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|p| !p.is_empty() && p.kind() == Some(PartitionKind::Extended))
    }

    pub fn mounted(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter().filter(|p| p.is_mounted())
    }

    /// create a partition in the first empty slot
    /// # Params
    /// - `size`: partition size in bytes
    /// - `fit`: stored strategy label
    /// - `kind`: primary or extended, only one extended is allowed per disk
    /// - `name`: unique name of at most 16 bytes
    /// # Return
    /// the slot index of the new partition
    pub fn create_partition(
        &mut self,
        size: i32,
        fit: Fit,
        kind: PartitionKind,
        name: &str,
    ) -> Result<usize> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FsError::InvalidInput("partition name is empty".into()));
        }
        if name.len() > PARTITION_NAME_LEN {
            return Err(FsError::NameTooLong(name.to_string()));
        }
        if size <= 0 {
            return Err(FsError::InvalidInput(format!(
                "partition size must be positive, got {size}"
            )));
        }
        if self.position_by_name(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        if kind == PartitionKind::Extended && self.extended().is_some() {
            return Err(FsError::Conflict(
                "extended partition already exists".into(),
            ));
        }
        let index = self
            .partitions
            .iter()
            .position(Partition::is_empty)
            .ok_or_else(|| FsError::NoSpace("all partition slots are in use".into()))?;
        if !self.can_fit_another_partition(size) {
            return Err(FsError::NoSpace(format!(
                "no space for partition {name} of {size} bytes"
            )));
        }
        let start = MBR_SIZE
            + self.partitions[..index]
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.size)
                .sum::<i32>();
        let end = start as i64 + size as i64;
        let overlaps = self
            .partitions
            .iter()
            .filter(|p| !p.is_empty())
            .any(|p| (start as i64) < p.end() as i64 && (p.start as i64) < end);
        if overlaps || end > self.size as i64 {
            return Err(FsError::NoSpace(format!(
                "no contiguous space for partition {name} at offset {start}"
            )));
        }
        self.partitions[index] = Partition {
            status: b'0',
            kind: kind.as_byte(),
            fit: fit.as_byte(),
            start,
            size,
            name: to_fixed(name),
            correlative: -1,
            id: to_fixed("N"),
        };
        debug!("partition {name} created in slot {index} at [{start}, {end})");
        Ok(index)
    }

    /// reset the slot named `name` to the empty sentinel
    /// # Return
    /// the removed entry, so the caller can wipe its bytes
    pub fn delete_partition(&mut self, name: &str) -> Result<Partition> {
        let index = self.position_by_name(name).ok_or_else(|| {
            if self.extended().is_some() {
                FsError::NotFound(format!(
                    "partition {name} (logical partitions are not supported)"
                ))
            } else {
                FsError::NotFound(format!("partition {name}"))
            }
        })?;
        let removed = self.partitions[index];
        self.partitions[index] = Partition::empty();
        Ok(removed)
    }

    /// grow (`delta > 0`) or shrink (`delta < 0`) a primary partition in place
    pub fn resize_partition(&mut self, name: &str, delta: i32) -> Result<&Partition> {
        let index = self
            .position_by_name(name)
            .ok_or_else(|| FsError::NotFound(format!("partition {name}")))?;
        let partition = self.partitions[index];
        if partition.kind() == Some(PartitionKind::Extended) {
            return Err(FsError::InvalidInput(
                "extended partitions cannot be resized".into(),
            ));
        }
        let new_size = partition.size as i64 + delta as i64;
        if delta > 0 {
            let boundary = self
                .partitions
                .iter()
                .enumerate()
                .filter(|(i, p)| *i != index && !p.is_empty() && p.start >= partition.end())
                .map(|(_, p)| p.start)
                .fold(self.size, i32::min);
            if (boundary as i64) < partition.start as i64 + new_size {
                return Err(FsError::NoSpace(format!(
                    "not enough free space after partition {name} to grow by {delta} bytes"
                )));
            }
        } else if new_size < 0 {
            return Err(FsError::NoSpace(format!(
                "partition {name} is smaller than {} bytes",
                -(delta as i64)
            )));
        }
        self.partitions[index].size = new_size as i32;
        Ok(&self.partitions[index])
    }

    /// mount the partition named `name` of the disk identified by `letter`
    /// # Return
    /// the slot index and the new mount id
    pub fn mount_partition(&mut self, name: &str, letter: char) -> Result<(usize, String)> {
        let index = self
            .position_by_name(name)
            .ok_or_else(|| FsError::NotFound(format!("partition {name}")))?;
        let partition = &self.partitions[index];
        if partition.is_mounted() {
            return Err(FsError::Conflict(format!(
                "partition {name} is already mounted as {}",
                partition.id()
            )));
        }
        if partition.kind() == Some(PartitionKind::Extended) {
            return Err(FsError::InvalidInput(
                "cannot mount extended partition".into(),
            ));
        }
        // lowest correlative no mounted partition of this disk holds
        let correlative = (1..)
            .find(|c| self.mounted().all(|p| p.correlative != *c))
            .unwrap_or(1);
        let id = format!(
            "{}{correlative}{MOUNT_ID_SUFFIX}",
            letter.to_ascii_uppercase()
        );
        if id.len() > MOUNT_ID_LEN {
            return Err(FsError::NoSpace(format!("mount id {id} does not fit")));
        }
        let partition = &mut self.partitions[index];
        partition.status = b'1';
        partition.correlative = correlative;
        partition.id = to_fixed(&id);
        Ok((index, id))
    }

    /// flip the partition with mount id `id` back to created
    pub fn unmount_partition(&mut self, id: &str) -> Result<usize> {
        let index = self
            .position_by_id(id)
            .ok_or_else(|| FsError::NotFound(format!("mount id {id}")))?;
        let partition = &mut self.partitions[index];
        if !partition.is_mounted() {
            return Err(FsError::Conflict(format!(
                "cannot unmount non-mounted partition {id}"
            )));
        }
        partition.status = b'0';
        Ok(index)
    }
}
