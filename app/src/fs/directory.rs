//! path resolution and node creation
use log::{debug, info};

use crate::{
    error::{FsError, Result},
    utils::path_util::{split_path, SplitPath},
};

use super::{
    Credentials, FileSystem, FolderBlock, FolderEntry, Inode, InodeKind, Permissions,
    PointerBlock, DIRECT_POINTERS, FIRST_USABLE_ENTRY, INDIRECT_POINTER, MAX_FILE_BLOCKS,
    NAME_LEN, ROOT_INODE, UNALLOCATED, BLOCK_SIZE,
};

/// a populated entry of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode: i32,
    /// folder block holding the entry
    pub block: i32,
    pub slot: usize,
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.trim() != name {
        return Err(FsError::InvalidInput(format!("invalid name {name:?}")));
    }
    if name.len() > NAME_LEN {
        return Err(FsError::NameTooLong(format!(
            "{name} is longer than {NAME_LEN} bytes"
        )));
    }
    Ok(())
}

/// data blocks a file of `len` bytes takes, its indirect pointer block included
fn file_blocks_for(len: usize) -> i32 {
    let chunks = len.div_ceil(BLOCK_SIZE as usize);
    let pointer_block = usize::from(chunks > DIRECT_POINTERS);
    (chunks + pointer_block) as i32
}

/// lookups
impl FileSystem<'_> {
    /// populated entries of directory `dir`, in block then slot order
    pub fn dir_entries(&self, dir: &Inode) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for block_index in self.data_blocks(dir)? {
            let block = self.read_folder_block(block_index)?;
            entries.extend(
                block
                    .usable()
                    .filter(|(_, e)| !e.is_free())
                    .map(|(slot, e)| DirEntry {
                        name: e.name(),
                        inode: e.inode,
                        block: block_index,
                        slot,
                    }),
            );
        }
        Ok(entries)
    }

    /// the entry called `name` inside `dir`, compared case-insensitively
    pub fn find_entry(&self, dir: &Inode, name: &str) -> Result<Option<DirEntry>> {
        for block_index in self.data_blocks(dir)? {
            let block = self.read_folder_block(block_index)?;
            if let Some(slot) = block.find(name) {
                let entry = block.entries[slot];
                return Ok(Some(DirEntry {
                    name: entry.name(),
                    inode: entry.inode,
                    block: block_index,
                    slot,
                }));
            }
        }
        Ok(None)
    }

    /// look `name` up inside the directory at inode `dir_index`
    pub fn lookup(&self, dir_index: i32, name: &str) -> Result<Option<i32>> {
        let dir = self.read_inode(dir_index)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory(format!("inode {dir_index}")));
        }
        Ok(self.find_entry(&dir, name)?.map(|e| e.inode))
    }

    fn walk<'p>(&self, path: &str, components: impl Iterator<Item = &'p str>) -> Result<(Inode, i32)> {
        let mut index = ROOT_INODE;
        let mut inode = self.read_inode(index)?;
        for name in components {
            if !inode.is_dir() {
                return Err(FsError::NotFound(path.to_string()));
            }
            index = self
                .find_entry(&inode, name)?
                .ok_or_else(|| FsError::NotFound(path.to_string()))?
                .inode;
            inode = self.read_inode(index)?;
        }
        Ok((inode, index))
    }

    /// resolve an absolute path from the root
    /// # Return
    /// the inode the path names and its index
    pub fn resolve(&self, path: &str) -> Result<(Inode, i32)> {
        let split = split_path(path)?;
        self.walk(path, split.components())
    }

    /// resolve the directory holding the leaf of `split`
    pub(crate) fn resolve_parent(&self, path: &str, split: &SplitPath) -> Result<(Inode, i32)> {
        let (parent, index) = self.walk(path, split.parents.iter().map(String::as_str))?;
        if !parent.is_dir() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        Ok((parent, index))
    }

    /// the `..` of directory `dir`, read from any of its folder blocks
    fn parent_of(&self, dir: &Inode, dir_index: i32) -> Result<i32> {
        match self.data_blocks(dir)?.first() {
            Some(block) => Ok(self.read_folder_block(*block)?.parent()),
            None => Ok(dir_index),
        }
    }
}

/// creation
impl FileSystem<'_> {
    /// create the directory at `path`
    ///
    /// with `recursive` every missing parent is created too, otherwise a
    /// missing parent fails with [FsError::InvalidPath]
    pub fn create_dir(&mut self, path: &str, recursive: bool, credentials: Credentials) -> Result<i32> {
        info!("create_dir() called with path: {path}, recursive: {recursive}");
        let split = split_path(path)?;
        if split.is_root() {
            return Err(FsError::AlreadyExists("/".into()));
        }
        let parent = self.parent_for_create(path, &split, recursive, credentials)?;
        self.create_node(
            parent,
            &split.leaf,
            InodeKind::Directory,
            &[],
            credentials,
            Permissions::DEFAULT,
        )
    }

    /// create the file at `path` holding `content`
    pub fn create_file(
        &mut self,
        path: &str,
        recursive: bool,
        content: &[u8],
        credentials: Credentials,
    ) -> Result<i32> {
        info!(
            "create_file() called with path: {path}, recursive: {recursive}, {} bytes",
            content.len()
        );
        let split = split_path(path)?;
        if split.is_root() {
            return Err(FsError::IsDirectory("/".into()));
        }
        let parent = self.parent_for_create(path, &split, recursive, credentials)?;
        self.create_node(
            parent,
            &split.leaf,
            InodeKind::File,
            content,
            credentials,
            Permissions::DEFAULT,
        )
    }

    fn parent_for_create(
        &mut self,
        path: &str,
        split: &SplitPath,
        recursive: bool,
        credentials: Credentials,
    ) -> Result<i32> {
        let mut current = ROOT_INODE;
        for name in &split.parents {
            match self.lookup(current, name)? {
                Some(child) => {
                    if !self.read_inode(child)?.is_dir() {
                        return Err(FsError::NotDirectory(path.to_string()));
                    }
                    current = child;
                }
                None if recursive => {
                    current = self.create_node(
                        current,
                        name,
                        InodeKind::Directory,
                        &[],
                        credentials,
                        Permissions::DEFAULT,
                    )?;
                }
                None => return Err(FsError::InvalidPath(path.to_string())),
            }
        }
        Ok(current)
    }

    /// create `name` inside directory `parent`
    ///
    /// nothing is allocated unless the name, the parent's permissions and the
    /// content size all check out
    pub(crate) fn create_node(
        &mut self,
        parent: i32,
        name: &str,
        kind: InodeKind,
        content: &[u8],
        credentials: Credentials,
        perm: Permissions,
    ) -> Result<i32> {
        check_name(name)?;
        let parent_inode = self.read_inode(parent)?;
        if !parent_inode.is_dir() {
            return Err(FsError::NotDirectory(format!("inode {parent}")));
        }
        if self.find_entry(&parent_inode, name)?.is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        if !parent_inode.can_write(credentials)? {
            return Err(FsError::PermissionDenied(format!(
                "cannot write into the parent of {name}"
            )));
        }
        if content.len() > MAX_FILE_BLOCKS * BLOCK_SIZE as usize {
            return Err(FsError::NoSpace(format!(
                "{name} needs more than {MAX_FILE_BLOCKS} blocks"
            )));
        }

        let needed = self.entry_growth(parent)?
            + match kind {
                InodeKind::Directory => 1,
                InodeKind::File => file_blocks_for(content.len()),
            };
        let superblock = self.superblock();
        if superblock.free_inodes_count < 1 {
            return Err(FsError::NoSpace("no free inodes left".into()));
        }
        if superblock.free_blocks_count < needed {
            return Err(FsError::NoSpace(format!(
                "{name} needs {needed} blocks, {} are free",
                superblock.free_blocks_count
            )));
        }

        let (block, slot) = self.reserve_entry(parent)?;
        let mut inode = Inode::new(kind, credentials, perm);
        let index = self.allocate_inode(&inode)?;
        match kind {
            InodeKind::Directory => {
                inode.block[0] = self.allocate_block(&FolderBlock::new(index, parent))?;
            }
            InodeKind::File => self.store_content(&mut inode, content)?,
        }
        self.write_inode(index, &inode)?;
        self.write_entry(block, slot, FolderEntry::new(name, index))?;

        let mut parent_inode = self.read_inode(parent)?;
        parent_inode.update_modified_at();
        self.write_inode(parent, &parent_inode)?;
        debug!("created {kind:?} {name} as inode {index} in directory {parent}");
        Ok(index)
    }

    /// link an existing inode under `name` in directory `dir_index`
    pub(crate) fn link_entry(&mut self, dir_index: i32, name: &str, child: i32) -> Result<()> {
        check_name(name)?;
        let (block, slot) = self.reserve_entry(dir_index)?;
        self.write_entry(block, slot, FolderEntry::new(name, child))?;
        let mut dir = self.read_inode(dir_index)?;
        dir.update_modified_at();
        self.write_inode(dir_index, &dir)
    }

    fn write_entry(&mut self, block_index: i32, slot: usize, entry: FolderEntry) -> Result<()> {
        let mut block = self.read_folder_block(block_index)?;
        block.entries[slot] = entry;
        self.write_block(block_index, &block)
    }

    /// blocks [Self::reserve_entry] would allocate to make room in `dir_index`
    /// # Errors
    /// [FsError::NoSpace] when the directory cannot grow any further
    fn entry_growth(&self, dir_index: i32) -> Result<i32> {
        let dir = self.read_inode(dir_index)?;
        let direct = &dir.block[..DIRECT_POINTERS];
        for block_index in direct.iter().copied().filter(|b| *b != UNALLOCATED) {
            if self.read_folder_block(block_index)?.first_free().is_some() {
                return Ok(0);
            }
        }
        if direct.contains(&UNALLOCATED) {
            return Ok(1);
        }
        let pointer_index = dir.block[INDIRECT_POINTER];
        if pointer_index == UNALLOCATED {
            return Ok(2);
        }
        let pointers = self.read_pointer_block(pointer_index)?;
        for block_index in pointers.allocated() {
            if self.read_folder_block(block_index)?.first_free().is_some() {
                return Ok(0);
            }
        }
        match pointers.first_free() {
            Some(_) => Ok(1),
            None => Err(FsError::NoSpace(format!("directory inode {dir_index} is full"))),
        }
    }

    /// find a free entry slot in `dir_index`, growing the directory if needed
    ///
    /// growth order: a free slot in the direct folder blocks, a new direct
    /// folder block, a free slot behind the indirect pointer block, a new
    /// folder block behind it
    /// # Return
    /// the folder block and the slot inside it
    fn reserve_entry(&mut self, dir_index: i32) -> Result<(i32, usize)> {
        let mut dir = self.read_inode(dir_index)?;
        let parent = self.parent_of(&dir, dir_index)?;

        for block_index in dir.block[..DIRECT_POINTERS]
            .iter()
            .copied()
            .filter(|b| *b != UNALLOCATED)
        {
            if let Some(slot) = self.read_folder_block(block_index)?.first_free() {
                return Ok((block_index, slot));
            }
        }
        if let Some(position) = dir.block[..DIRECT_POINTERS]
            .iter()
            .position(|b| *b == UNALLOCATED)
        {
            let block_index = self.allocate_block(&FolderBlock::new(dir_index, parent))?;
            dir.block[position] = block_index;
            self.write_inode(dir_index, &dir)?;
            return Ok((block_index, FIRST_USABLE_ENTRY));
        }

        let mut pointer_index = dir.block[INDIRECT_POINTER];
        if pointer_index == UNALLOCATED {
            pointer_index = self.allocate_block(&PointerBlock::default())?;
            dir.block[INDIRECT_POINTER] = pointer_index;
            self.write_inode(dir_index, &dir)?;
        }
        let mut pointers = self.read_pointer_block(pointer_index)?;
        for block_index in pointers.allocated() {
            if let Some(slot) = self.read_folder_block(block_index)?.first_free() {
                return Ok((block_index, slot));
            }
        }
        let position = pointers
            .first_free()
            .ok_or_else(|| FsError::NoSpace(format!("directory inode {dir_index} is full")))?;
        let block_index = self.allocate_block(&FolderBlock::new(dir_index, parent))?;
        pointers.pointers[position] = block_index;
        self.write_block(pointer_index, &pointers)?;
        Ok((block_index, FIRST_USABLE_ENTRY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{FsType, ENTRIES_PER_FOLDER, USERS_INODE},
        utils::init_test_environment::init_test_environment,
    };

    const USER: Credentials = Credentials { uid: 2, gid: 2 };

    #[test]
    fn test_resolve_root_and_users_file() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            assert_eq!(fs.resolve("/").map(|(_, i)| i).ok(), Some(ROOT_INODE));
            assert_eq!(
                fs.resolve("/USERS.TXT").map(|(_, i)| i).ok(),
                Some(USERS_INODE)
            );
            assert!(matches!(fs.resolve("/nope"), Err(FsError::NotFound(_))));
            assert!(matches!(
                fs.resolve("/users.txt/x"),
                Err(FsError::NotFound(_))
            ));
        });
    }

    #[test]
    fn test_create_nested_recursive() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            let file = fs
                .create_file("/a/b/c.txt", true, b"hello", Credentials::ROOT)
                .expect("create file");
            let (inode, index) = fs.resolve("/a/b/c.txt").expect("resolve");
            assert_eq!(index, file);
            assert_eq!(inode.size, 5);
            let (a, a_index) = fs.resolve("/a").expect("resolve /a");
            assert!(a.is_dir());
            let a_block = fs.read_folder_block(a.block[0]).expect("folder block");
            assert_eq!(a_block.entries[0].inode, a_index);
            assert_eq!(a_block.parent(), ROOT_INODE);
        });
    }

    #[test]
    fn test_missing_parent_without_recursive() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            let before = fs.superblock().inodes_count;
            assert!(matches!(
                fs.create_dir("/x/y", false, Credentials::ROOT),
                Err(FsError::InvalidPath(_))
            ));
            assert_eq!(fs.superblock().inodes_count, before);
        });
    }

    #[test]
    fn test_duplicate_name_allocates_nothing() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            fs.create_dir("/docs", false, Credentials::ROOT).expect("mkdir");
            let inodes = fs.superblock().inodes_count;
            let blocks = fs.superblock().blocks_count;
            assert!(matches!(
                fs.create_file("/DOCS", false, b"x", Credentials::ROOT),
                Err(FsError::AlreadyExists(_))
            ));
            assert_eq!(fs.superblock().inodes_count, inodes);
            assert_eq!(fs.superblock().blocks_count, blocks);
        });
    }

    #[test]
    fn test_name_too_long() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            assert!(matches!(
                fs.create_dir("/abcdefghijklm", false, Credentials::ROOT),
                Err(FsError::NameTooLong(_))
            ));
            assert!(fs
                .create_dir("/abcdefghijkl", false, Credentials::ROOT)
                .is_ok());
        });
    }

    #[test]
    fn test_names_with_surrounding_spaces_rejected() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            fs.create_file("/a", false, b"", Credentials::ROOT).expect("create");
            assert!(matches!(
                fs.create_file("/ a", false, b"", Credentials::ROOT),
                Err(FsError::InvalidInput(_))
            ));
            assert!(matches!(
                fs.create_file("/x /y", true, b"", Credentials::ROOT),
                Err(FsError::InvalidInput(_))
            ));
            assert!(matches!(fs.resolve("/x"), Err(FsError::NotFound(_))));
            // the path itself is trimmed, so this is the existing /a
            assert!(matches!(
                fs.create_file("/a ", false, b"", Credentials::ROOT),
                Err(FsError::AlreadyExists(_))
            ));
            assert!(fs.create_file("/a b", false, b"", Credentials::ROOT).is_ok());
        });
    }

    #[test]
    fn test_out_of_blocks_allocates_nothing() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            while fs.superblock().free_blocks_count > 5 {
                fs.allocate_block(&PointerBlock::default()).expect("burn block");
            }
            let inodes = fs.superblock().inodes_count;
            let blocks = fs.superblock().blocks_count;
            assert!(matches!(
                fs.create_file("/big", false, &[b'x'; 1920], Credentials::ROOT),
                Err(FsError::NoSpace(_))
            ));
            assert_eq!(fs.superblock().inodes_count, inodes);
            assert_eq!(fs.superblock().blocks_count, blocks);
            assert!(matches!(fs.resolve("/big"), Err(FsError::NotFound(_))));

            // five chunks fit in the last five blocks, the root still has a free slot
            fs.create_file("/fits", false, &[b'y'; 320], Credentials::ROOT)
                .expect("create");
            assert_eq!(fs.superblock().free_blocks_count, 0);
            let inodes = fs.superblock().inodes_count;
            assert!(matches!(
                fs.create_dir("/more", false, Credentials::ROOT),
                Err(FsError::NoSpace(_))
            ));
            assert_eq!(fs.superblock().inodes_count, inodes);
        });
    }

    #[test]
    fn test_parent_write_permission_required() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            // 664 owned by root: others may not write
            fs.create_dir("/private", false, Credentials::ROOT).expect("mkdir");
            assert!(matches!(
                fs.create_file("/private/f", false, b"", USER),
                Err(FsError::PermissionDenied(_))
            ));
            // the root directory is 777
            assert!(fs.create_dir("/mine", false, USER).is_ok());
            assert!(fs.create_file("/mine/f", false, b"", USER).is_ok());
        });
    }

    #[test]
    fn test_directory_grows_past_first_block() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            fs.create_dir("/d", false, Credentials::ROOT).expect("mkdir");
            let per_block = ENTRIES_PER_FOLDER - FIRST_USABLE_ENTRY;
            let count = per_block * DIRECT_POINTERS + 3;
            for i in 0..count {
                fs.create_file(&format!("/d/f{i}"), false, b"", Credentials::ROOT)
                    .expect("create entry");
            }
            let (dir, _) = fs.resolve("/d").expect("resolve");
            assert!(dir.block[..DIRECT_POINTERS].iter().all(|b| *b != UNALLOCATED));
            assert_ne!(dir.block[INDIRECT_POINTER], UNALLOCATED);
            assert_eq!(fs.dir_entries(&dir).expect("entries").len(), count);
            assert!(fs.resolve(&format!("/d/f{}", count - 1)).is_ok());
        });
    }

    #[test]
    fn test_directory_full() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            fs.create_dir("/d", false, Credentials::ROOT).expect("mkdir");
            let per_block = ENTRIES_PER_FOLDER - FIRST_USABLE_ENTRY;
            let capacity = per_block * (DIRECT_POINTERS + crate::fs::POINTERS_PER_BLOCK);
            for i in 0..capacity {
                fs.create_dir(&format!("/d/{i}"), false, Credentials::ROOT)
                    .expect("create entry");
            }
            assert!(matches!(
                fs.create_dir("/d/last", false, Credentials::ROOT),
                Err(FsError::NoSpace(_))
            ));
        });
    }
}
