//! create our filesystem
use byte_unit::Byte;
use log::info;

use crate::{
    disk::DiskStore,
    error::{FsError, Result},
    fs::{
        Credentials, FileSystem, FolderBlock, FsType, Inode, InodeKind, JournalRecord, Operation,
        Permissions, SuperBlock, BLOCKS_PER_INODE, ROOT_INODE, USERS_FILE,
    },
    fs::{BLOCK_FREE, INODE_FREE},
    image::DiskImage,
    mbr::Partition,
    users::DEFAULT_USERS,
    utils::fs_size_calculator,
};

/// the smallest `N` a partition can be formatted with: root and `users.txt`
const MIN_STRUCTURES: i32 = 2;

/// format `partition` of `image`, wiping everything it held
/// # Params
/// - `image`: the disk image holding the partition
/// - `partition`: the partition table entry to format
/// - `fs_type`: ext2, or ext3 with a journal region
///
/// # Return
/// the superblock written at the partition start
pub fn mkfs(image: &mut DiskImage, partition: &Partition, fs_type: FsType) -> Result<SuperBlock> {
    let n = fs_size_calculator::structures_count(partition.size, fs_type.is_journaling());
    if n < MIN_STRUCTURES {
        return Err(FsError::NoSpace(format!(
            "partition {} is too small to format, {} holds only {n} inodes",
            partition.name(),
            Byte::from_bytes(partition.size.max(0) as u128).get_appropriate_unit(true)
        )));
    }
    let superblock = SuperBlock::new(partition.start, partition.size, fs_type);
    // wipe the partition, then lay the bitmaps down
    image.fill(partition.start, partition.size as usize, 0)?;
    image.fill(superblock.bm_inode_start, n as usize, INODE_FREE)?;
    image.fill(
        superblock.bm_block_start,
        (n * BLOCKS_PER_INODE) as usize,
        BLOCK_FREE,
    )?;
    image.write_record(partition.start, &superblock)?;

    let mut fs = FileSystem::open(image, partition.start)?;
    let root = Inode::new(InodeKind::Directory, Credentials::ROOT, Permissions::ALL);
    let root_index = fs.allocate_inode(&root)?;
    let mut root = fs.read_inode(root_index)?;
    root.block[0] = fs.allocate_block(&FolderBlock::new(root_index, root_index))?;
    fs.write_inode(root_index, &root)?;

    if let Some(journal) = fs.journal() {
        journal.init(
            fs.image_mut(),
            JournalRecord::new(Operation::Mkdir, "/", b""),
        )?;
    }
    fs.create_node(
        ROOT_INODE,
        USERS_FILE,
        InodeKind::File,
        DEFAULT_USERS.as_bytes(),
        Credentials::ROOT,
        Permissions::ALL,
    )?;
    fs.log(
        Operation::Mkfile,
        &format!("/{USERS_FILE}"),
        DEFAULT_USERS.as_bytes(),
    )?;
    let superblock = fs.superblock().clone();
    image.flush()?;
    info!(
        "formatted partition {} as {fs_type:?} with {n} inodes and {} blocks",
        partition.name(),
        n * BLOCKS_PER_INODE
    );
    Ok(superblock)
}

impl DiskStore {
    /// format the mounted partition `id`
    pub fn mkfs(&self, id: &str, fs_type: FsType) -> Result<SuperBlock> {
        let (mut disk, mounted) = self.open_mounted(id)?;
        mkfs(&mut disk.image, &mounted.partition, fs_type)
    }
}
