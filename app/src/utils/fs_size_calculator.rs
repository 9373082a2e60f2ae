//! This module contains functions to calculate the size and position of different fs components

use crate::fs::{BLOCKS_PER_INODE, BLOCK_SIZE, INODE_SIZE, JOURNAL_SIZE, SUPERBLOCK_SIZE};

/// bytes consumed by one inode slot together with its share of blocks
///
/// one inode bitmap byte, three block bitmap bytes, the inode itself,
/// three data blocks and, with journaling, one journal record
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::unit_cost;
/// assert_eq!(unit_cost(false), 4 + 88 + 3 * 64);
/// assert_eq!(unit_cost(true), 4 + 88 + 3 * 64 + 156);
/// ```
pub const fn unit_cost(journaling: bool) -> i32 {
    let base = 1 + BLOCKS_PER_INODE + INODE_SIZE + BLOCKS_PER_INODE * BLOCK_SIZE;
    if journaling {
        base + JOURNAL_SIZE
    } else {
        base
    }
}

/// calculate how many inodes a partition can hold, the block count is three times this
/// # Arguments
/// - `partition_size`: the size of the partition in bytes
/// - `journaling`: whether a journal region is reserved
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::structures_count;
/// assert_eq!(structures_count(512 * 1024, false), 1845);
/// assert_eq!(structures_count(512 * 1024, true), 1191);
/// assert_eq!(structures_count(10, false), 0);
/// ```
pub const fn structures_count(partition_size: i32, journaling: bool) -> i32 {
    if partition_size <= SUPERBLOCK_SIZE {
        return 0;
    }
    (partition_size - SUPERBLOCK_SIZE) / unit_cost(journaling)
}

/// absolute start offsets of every region of a formatted partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOffsets {
    pub journal_start: Option<i32>,
    pub bm_inode_start: i32,
    pub bm_block_start: i32,
    pub inode_start: i32,
    pub block_start: i32,
    /// first byte after the block table
    pub end: i32,
}

/// lay out the regions of a partition in order:
/// superblock, journal (optional), inode bitmap, block bitmap, inode table, block table
/// # Example
/// ```
/// use vdiskfs::utils::fs_size_calculator::region_offsets;
/// let regions = region_offsets(153, 10, false);
/// assert_eq!(regions.journal_start, None);
/// assert_eq!(regions.bm_inode_start, 153 + 68);
/// assert_eq!(regions.bm_block_start, 153 + 68 + 10);
/// assert_eq!(regions.inode_start, 153 + 68 + 10 + 30);
/// assert_eq!(regions.block_start, 153 + 68 + 10 + 30 + 880);
/// ```
pub const fn region_offsets(partition_start: i32, count: i32, journaling: bool) -> RegionOffsets {
    let after_superblock = partition_start + SUPERBLOCK_SIZE;
    let (journal_start, bm_inode_start) = if journaling {
        (
            Some(after_superblock),
            after_superblock + count * JOURNAL_SIZE,
        )
    } else {
        (None, after_superblock)
    };
    let bm_block_start = bm_inode_start + count;
    let inode_start = bm_block_start + BLOCKS_PER_INODE * count;
    let block_start = inode_start + count * INODE_SIZE;
    RegionOffsets {
        journal_start,
        bm_inode_start,
        bm_block_start,
        inode_start,
        block_start,
        end: block_start + BLOCKS_PER_INODE * count * BLOCK_SIZE,
    }
}
