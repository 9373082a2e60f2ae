//! our ext2/ext3 emulation living inside one partition of a disk image
pub mod blocks;
mod directory;
mod file;
pub mod fs_layout;
pub mod inode;
pub mod journal;
pub mod superblock;
mod tree;
pub use blocks::*;
pub use directory::DirEntry;
pub use fs_layout::*;
pub use inode::*;
pub use journal::*;
pub use superblock::*;
pub use tree::glob_to_regex;

pub const FS_MAGIC: i32 = 0xEF53;
pub const SUPERBLOCK_SIZE: i32 = 68;
pub const INODE_SIZE: i32 = 88;
pub const BLOCK_SIZE: i32 = 64;
pub const JOURNAL_SIZE: i32 = 156;
/// every inode slot is paired with this many block slots
pub const BLOCKS_PER_INODE: i32 = 3;

pub const ROOT_INODE: i32 = 0;
pub const USERS_INODE: i32 = 1;
pub const USERS_FILE: &str = "users.txt";
/// pointer value of an unallocated inode or block slot
pub const UNALLOCATED: i32 = -1;

pub const BLOCK_POINTERS: usize = 15;
pub const DIRECT_POINTERS: usize = 14;
/// index of the single indirect pointer inside `Inode::block`
pub const INDIRECT_POINTER: usize = 14;
pub const POINTERS_PER_BLOCK: usize = 16;
pub const MAX_FILE_BLOCKS: usize = DIRECT_POINTERS + POINTERS_PER_BLOCK;

pub const ENTRIES_PER_FOLDER: usize = 4;
/// entries 0 and 1 are `.` and `..`
pub const FIRST_USABLE_ENTRY: usize = 2;
pub const NAME_LEN: usize = 12;
