//! the three 64-byte shapes a data block can take
use bincode::{Decode, Encode};

use crate::utils::{
    fixed_str::{from_fixed, names_match, to_fixed},
    traits::DiskRecord,
};

use super::{
    BLOCK_SIZE, ENTRIES_PER_FOLDER, FIRST_USABLE_ENTRY, NAME_LEN, POINTERS_PER_BLOCK, UNALLOCATED,
};

/// name written into cleared and never used entries
pub const EMPTY_ENTRY_NAME: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct FolderEntry {
    pub name: [u8; NAME_LEN],
    pub inode: i32,
}

impl FolderEntry {
    pub fn new(name: &str, inode: i32) -> Self {
        FolderEntry {
            name: to_fixed(name),
            inode,
        }
    }

    pub fn empty() -> Self {
        Self::new(EMPTY_ENTRY_NAME, UNALLOCATED)
    }

    pub fn is_free(&self) -> bool {
        self.inode == UNALLOCATED
    }

    pub fn name(&self) -> String {
        from_fixed(&self.name)
    }

    pub fn is_named(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

/// 4 entries, the first two are always `.` and `..`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct FolderBlock {
    pub entries: [FolderEntry; ENTRIES_PER_FOLDER],
}

impl DiskRecord for FolderBlock {
    const SIZE: usize = BLOCK_SIZE as usize;
}

impl FolderBlock {
    /// a block of directory `current` whose parent is `parent`, with no usable entry taken
    pub fn new(current: i32, parent: i32) -> Self {
        FolderBlock {
            entries: [
                FolderEntry::new(".", current),
                FolderEntry::new("..", parent),
                FolderEntry::empty(),
                FolderEntry::empty(),
            ],
        }
    }

    pub fn parent(&self) -> i32 {
        self.entries[1].inode
    }

    /// the entries after `.` and `..`, with their slot numbers
    pub fn usable(&self) -> impl Iterator<Item = (usize, &FolderEntry)> {
        self.entries
            .iter()
            .enumerate()
            .skip(FIRST_USABLE_ENTRY)
    }

    pub fn first_free(&self) -> Option<usize> {
        self.usable().find(|(_, e)| e.is_free()).map(|(i, _)| i)
    }

    /// slot of the populated usable entry named `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.usable()
            .find(|(_, e)| !e.is_free() && e.is_named(name))
            .map(|(i, _)| i)
    }

    pub fn clear(&mut self, slot: usize) {
        self.entries[slot] = FolderEntry::empty();
    }

    /// whether no usable entry is populated
    pub fn is_vacant(&self) -> bool {
        self.usable().all(|(_, e)| e.is_free())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct FileBlock {
    pub content: [u8; BLOCK_SIZE as usize],
}

impl DiskRecord for FileBlock {
    const SIZE: usize = BLOCK_SIZE as usize;
}

impl FileBlock {
    /// a block holding `chunk`, zero padded; longer chunks are cut at the block size
    pub fn from_chunk(chunk: &[u8]) -> Self {
        let mut content = [0u8; BLOCK_SIZE as usize];
        let len = chunk.len().min(content.len());
        content[..len].copy_from_slice(&chunk[..len]);
        FileBlock { content }
    }

    /// the stored bytes without trailing zero padding
    pub fn data(&self) -> &[u8] {
        let end = self
            .content
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |p| p + 1);
        &self.content[..end]
    }
}

/// 16 pointers to folder or file blocks, never to another pointer block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct PointerBlock {
    pub pointers: [i32; POINTERS_PER_BLOCK],
}

impl DiskRecord for PointerBlock {
    const SIZE: usize = BLOCK_SIZE as usize;
}

impl Default for PointerBlock {
    fn default() -> Self {
        PointerBlock {
            pointers: [UNALLOCATED; POINTERS_PER_BLOCK],
        }
    }
}

impl PointerBlock {
    pub fn first_free(&self) -> Option<usize> {
        self.pointers.iter().position(|p| *p == UNALLOCATED)
    }

    pub fn allocated(&self) -> impl Iterator<Item = i32> + '_ {
        self.pointers.iter().copied().filter(|p| *p != UNALLOCATED)
    }
}
