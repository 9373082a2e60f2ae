//! what a formatted partition looks like to the directory engine
//!
//! it has the following layout:
//! - superblock
//! - journal (ext3 only)
//! - inode bitmap
//! - block bitmap
//! - inode table
//! - block table
use crate::{
    error::{FsError, Result},
    image::DiskImage,
    utils::traits::DiskRecord,
};

use super::{
    superblock::{SlotAllocator, SuperBlock},
    FileBlock, FolderBlock, Inode, PointerBlock, BLOCKS_PER_INODE, DIRECT_POINTERS,
    INDIRECT_POINTER, UNALLOCATED,
};

/// a formatted partition opened on top of a disk image
///
/// the superblock doubles as the slot allocator and is written back after every allocation
#[derive(Debug)]
pub struct FileSystem<'a> {
    image: &'a mut DiskImage,
    /// absolute offset of the superblock, the partition start
    start: i32,
    superblock: SuperBlock,
}

impl<'a> FileSystem<'a> {
    /// open the filesystem whose superblock sits at `partition_start`
    /// # Errors
    /// [FsError::Format] when the partition was never formatted
    pub fn open(image: &'a mut DiskImage, partition_start: i32) -> Result<Self> {
        let superblock = image.read_record::<SuperBlock>(partition_start)?;
        if !superblock.is_formatted() {
            return Err(FsError::Format(format!(
                "no filesystem found at offset {partition_start}, run mkfs first"
            )));
        }
        superblock.fs_type()?;
        Ok(FileSystem {
            image,
            start: partition_start,
            superblock,
        })
    }
}

/// get [SuperBlock] and the underlying image of this filesystem
impl FileSystem<'_> {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn partition_start(&self) -> i32 {
        self.start
    }

    #[inline]
    pub fn image(&self) -> &DiskImage {
        &*self.image
    }

    #[inline]
    pub(crate) fn image_mut(&mut self) -> &mut DiskImage {
        &mut *self.image
    }

    pub(crate) fn save_superblock(&mut self) -> Result<()> {
        self.image.write_record(self.start, &self.superblock)
    }

    /// raw inode bitmap bytes, `'1'` marks a used slot
    pub fn inode_bitmap(&self) -> Result<&[u8]> {
        let n = self.superblock.structures_count();
        self.image
            .read_bytes(self.superblock.bm_inode_start, n as usize)
    }

    /// raw block bitmap bytes, `'X'` marks a used slot
    pub fn block_bitmap(&self) -> Result<&[u8]> {
        let n = self.superblock.structures_count() * BLOCKS_PER_INODE;
        self.image
            .read_bytes(self.superblock.bm_block_start, n as usize)
    }
}

/// [Inode] operations
impl FileSystem<'_> {
    pub fn read_inode(&self, index: i32) -> Result<Inode> {
        if !(0..self.superblock.inodes_count).contains(&index) {
            return Err(FsError::Format(format!(
                "inode {index} was never allocated"
            )));
        }
        self.image.read_record(self.superblock.inode_offset(index))
    }

    pub(crate) fn write_inode(&mut self, index: i32, inode: &Inode) -> Result<()> {
        let offset = self.superblock.inode_offset(index);
        self.image.write_record(offset, inode)
    }

    /// take the next inode slot and store `inode` in it
    /// # Return
    /// the index of the new inode
    pub(crate) fn allocate_inode(&mut self, inode: &Inode) -> Result<i32> {
        let index = self.superblock.allocate_inode(self.image)?;
        self.save_superblock()?;
        self.write_inode(index, inode)?;
        Ok(index)
    }
}

/// data block operations
impl FileSystem<'_> {
    fn read_block<T: DiskRecord>(&self, index: i32) -> Result<T> {
        if !(0..self.superblock.blocks_count).contains(&index) {
            return Err(FsError::Format(format!(
                "block {index} was never allocated"
            )));
        }
        self.image.read_record(self.superblock.block_offset(index))
    }

    pub fn read_folder_block(&self, index: i32) -> Result<FolderBlock> {
        self.read_block(index)
    }

    pub fn read_file_block(&self, index: i32) -> Result<FileBlock> {
        self.read_block(index)
    }

    pub fn read_pointer_block(&self, index: i32) -> Result<PointerBlock> {
        self.read_block(index)
    }

    pub(crate) fn write_block<T: DiskRecord>(&mut self, index: i32, block: &T) -> Result<()> {
        let offset = self.superblock.block_offset(index);
        self.image.write_record(offset, block)
    }

    /// take the next block slot and store `block` in it
    pub(crate) fn allocate_block<T: DiskRecord>(&mut self, block: &T) -> Result<i32> {
        let index = self.superblock.allocate_block(self.image)?;
        self.save_superblock()?;
        self.write_block(index, block)?;
        Ok(index)
    }

    /// the blocks of `inode` in content order: direct ones first, then those
    /// reached through the indirect pointer block
    pub(crate) fn data_blocks(&self, inode: &Inode) -> Result<Vec<i32>> {
        let mut blocks: Vec<i32> = inode.block[..DIRECT_POINTERS]
            .iter()
            .copied()
            .filter(|b| *b != UNALLOCATED)
            .collect();
        let indirect = inode.block[INDIRECT_POINTER];
        if indirect != UNALLOCATED {
            blocks.extend(self.read_pointer_block(indirect)?.allocated());
        }
        Ok(blocks)
    }
}
