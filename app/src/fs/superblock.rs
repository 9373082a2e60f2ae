use bincode::{Decode, Encode};
use log::debug;

use crate::{
    error::{FsError, Result},
    image::DiskImage,
    mbr::Partition,
    utils::{fs_size_calculator, time_util, traits::DiskRecord},
};

use super::{BLOCKS_PER_INODE, BLOCK_SIZE, FS_MAGIC, INODE_SIZE, JOURNAL_SIZE, SUPERBLOCK_SIZE};

/// inode bitmap byte of a free slot
pub const INODE_FREE: u8 = b'0';
pub const INODE_USED: u8 = b'1';
/// block bitmap byte of a free slot
pub const BLOCK_FREE: u8 = b'O';
pub const BLOCK_USED: u8 = b'X';

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FsType {
    #[value(name = "2fs")]
    Ext2,
    /// ext2 plus a journal region
    #[value(name = "3fs")]
    Ext3,
}

impl FsType {
    pub fn code(self) -> i32 {
        match self {
            FsType::Ext2 => 2,
            FsType::Ext3 => 3,
        }
    }

    pub fn is_journaling(self) -> bool {
        self == FsType::Ext3
    }
}

/// The superblock of a formatted partition, stored at the partition start
///
/// every offset is absolute inside the disk image
#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct SuperBlock {
    pub filesystem_type: i32,
    /// used inode slots
    pub inodes_count: i32,
    /// used block slots
    pub blocks_count: i32,
    pub free_inodes_count: i32,
    pub free_blocks_count: i32,
    pub mtime: f32,
    pub umtime: f32,
    pub mnt_count: i32,
    pub magic: i32,
    pub inode_size: i32,
    pub block_size: i32,
    /// offset of the first free inode
    pub first_ino: i32,
    /// offset of the first free block
    pub first_blo: i32,
    pub bm_inode_start: i32,
    pub bm_block_start: i32,
    pub inode_start: i32,
    pub block_start: i32,
}

impl DiskRecord for SuperBlock {
    const SIZE: usize = SUPERBLOCK_SIZE as usize;
}

impl SuperBlock {
    /// lay out a fresh filesystem over `partition_start..partition_start + partition_size`
    pub fn new(partition_start: i32, partition_size: i32, fs_type: FsType) -> Self {
        let journaling = fs_type.is_journaling();
        let n = fs_size_calculator::structures_count(partition_size, journaling);
        let regions = fs_size_calculator::region_offsets(partition_start, n, journaling);
        SuperBlock {
            filesystem_type: fs_type.code(),
            inodes_count: 0,
            blocks_count: 0,
            free_inodes_count: n,
            free_blocks_count: BLOCKS_PER_INODE * n,
            mtime: time_util::now(),
            umtime: 0.0,
            mnt_count: 1,
            magic: FS_MAGIC,
            inode_size: INODE_SIZE,
            block_size: BLOCK_SIZE,
            first_ino: regions.inode_start,
            first_blo: regions.block_start,
            bm_inode_start: regions.bm_inode_start,
            bm_block_start: regions.bm_block_start,
            inode_start: regions.inode_start,
            block_start: regions.block_start,
        }
    }

    pub fn fs_type(&self) -> Result<FsType> {
        match self.filesystem_type {
            2 => Ok(FsType::Ext2),
            3 => Ok(FsType::Ext3),
            other => Err(FsError::Format(format!("unknown filesystem type {other}"))),
        }
    }

    pub fn is_formatted(&self) -> bool {
        self.magic == FS_MAGIC
    }

    /// `N`, the number of inode slots fixed at format time
    pub fn structures_count(&self) -> i32 {
        self.inodes_count + self.free_inodes_count
    }

    /// absolute offset of the journal head, ext3 only
    pub fn journal_start(&self) -> Option<i32> {
        (self.filesystem_type == FsType::Ext3.code())
            .then(|| self.bm_inode_start - self.structures_count() * JOURNAL_SIZE)
    }

    pub fn inode_offset(&self, index: i32) -> i32 {
        self.inode_start + index * self.inode_size
    }

    pub fn block_offset(&self, index: i32) -> i32 {
        self.block_start + index * self.block_size
    }

    fn read_formatted(image: &DiskImage, partition: &Partition) -> Result<Option<SuperBlock>> {
        if partition.size < SUPERBLOCK_SIZE {
            return Ok(None);
        }
        let superblock = image.read_record::<SuperBlock>(partition.start)?;
        Ok(superblock.is_formatted().then_some(superblock))
    }

    /// bump the mount statistics of a formatted partition, unformatted ones are left alone
    pub fn stamp_mount(image: &mut DiskImage, partition: &Partition) -> Result<()> {
        if let Some(mut superblock) = Self::read_formatted(image, partition)? {
            superblock.mtime = time_util::now();
            superblock.mnt_count += 1;
            image.write_record(partition.start, &superblock)?;
        }
        Ok(())
    }

    pub fn stamp_unmount(image: &mut DiskImage, partition: &Partition) -> Result<()> {
        if let Some(mut superblock) = Self::read_formatted(image, partition)? {
            superblock.umtime = time_util::now();
            image.write_record(partition.start, &superblock)?;
        }
        Ok(())
    }
}

/// hands out inode and block slots
///
/// the directory engine only asks for slots through this trait
pub trait SlotAllocator {
    /// mark the next free inode slot used
    /// # Return
    /// the index of the allocated inode
    fn allocate_inode(&mut self, image: &mut DiskImage) -> Result<i32>;

    /// mark the next free block slot used
    /// # Return
    /// the index of the allocated block
    fn allocate_block(&mut self, image: &mut DiskImage) -> Result<i32>;
}

/// bump allocation, slots are never reused
impl SlotAllocator for SuperBlock {
    fn allocate_inode(&mut self, image: &mut DiskImage) -> Result<i32> {
        if self.free_inodes_count <= 0 {
            return Err(FsError::NoSpace("no free inodes left".into()));
        }
        let index = self.inodes_count;
        image.write_bytes(self.bm_inode_start + index, &[INODE_USED])?;
        self.inodes_count += 1;
        self.free_inodes_count -= 1;
        self.first_ino += self.inode_size;
        debug!("allocated inode {index}");
        Ok(index)
    }

    fn allocate_block(&mut self, image: &mut DiskImage) -> Result<i32> {
        if self.free_blocks_count <= 0 {
            return Err(FsError::NoSpace("no free blocks left".into()));
        }
        let index = self.blocks_count;
        image.write_bytes(self.bm_block_start + index, &[BLOCK_USED])?;
        self.blocks_count += 1;
        self.free_blocks_count -= 1;
        self.first_blo += self.block_size;
        debug!("allocated block {index}");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superblock_size_in_disk() -> anyhow::Result<()> {
        let superblock = SuperBlock::new(153, 512 * 1024, FsType::Ext2);
        assert_eq!(superblock.serialize()?.len(), SuperBlock::SIZE);
        Ok(())
    }

    #[test]
    fn test_regions_are_consistent() {
        for fs_type in [FsType::Ext2, FsType::Ext3] {
            for size in [2048, 10_000, 512 * 1024] {
                let sb = SuperBlock::new(153, size, fs_type);
                let n = sb.structures_count();
                assert_eq!(sb.inodes_count + sb.free_inodes_count, n);
                assert_eq!(sb.blocks_count + sb.free_blocks_count, 3 * n);
                assert_eq!(sb.bm_block_start - sb.bm_inode_start, n);
                assert_eq!(sb.inode_start - sb.bm_block_start, 3 * n);
                assert_eq!(sb.block_start - sb.inode_start, n * INODE_SIZE);
                assert!(sb.block_start + 3 * n * BLOCK_SIZE <= 153 + size);
                assert!(sb.bm_inode_start >= 153 + SUPERBLOCK_SIZE);
                assert_eq!(sb.first_ino, sb.inode_start);
                assert_eq!(sb.first_blo, sb.block_start);
            }
        }
    }

    #[test]
    fn test_journal_start() {
        let ext2 = SuperBlock::new(153, 10_000, FsType::Ext2);
        assert_eq!(ext2.journal_start(), None);
        let ext3 = SuperBlock::new(153, 10_000, FsType::Ext3);
        assert_eq!(ext3.journal_start(), Some(153 + SUPERBLOCK_SIZE));
    }

    #[test]
    fn test_bump_allocation_is_monotonic() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut image = DiskImage::create(dir.path().join("A.dsk"), 4096)?;
        let mut sb = SuperBlock::new(0, 4096 - 68, FsType::Ext2);
        let n = sb.structures_count();
        assert!(n >= 2);

        assert_eq!(sb.allocate_inode(&mut image)?, 0);
        assert_eq!(sb.allocate_inode(&mut image)?, 1);
        assert_eq!(sb.allocate_block(&mut image)?, 0);
        assert_eq!(sb.first_ino, sb.inode_offset(2));
        assert_eq!(sb.first_blo, sb.block_offset(1));
        assert_eq!(sb.free_inodes_count, n - 2);
        assert_eq!(image.read_bytes(sb.bm_inode_start, 2)?, b"11");
        assert_eq!(image.read_bytes(sb.bm_block_start, 1)?, b"X");
        Ok(())
    }

    #[test]
    fn test_allocation_stops_when_exhausted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut image = DiskImage::create(dir.path().join("A.dsk"), 4096)?;
        let mut sb = SuperBlock::new(0, 4096 - 68, FsType::Ext2);
        for _ in 0..sb.structures_count() {
            sb.allocate_inode(&mut image)?;
        }
        assert!(matches!(
            sb.allocate_inode(&mut image),
            Err(FsError::NoSpace(_))
        ));
        Ok(())
    }
}
