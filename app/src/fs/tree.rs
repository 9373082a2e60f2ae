//! whole-subtree operations: copy, remove, find, chmod and chown
use log::{info, warn};
use regex::Regex;

use crate::{
    error::{FsError, Result},
    utils::path_util::split_path,
};

use super::{
    Credentials, FileSystem, FolderBlock, FolderEntry, Inode, Permissions, PointerBlock,
    DIRECT_POINTERS, ENTRIES_PER_FOLDER, FIRST_USABLE_ENTRY, INDIRECT_POINTER, ROOT_INODE,
    UNALLOCATED, USERS_FILE,
};

const FIND_INDENT: &str = "   ";

/// translate a `find` pattern: `*` is one or more characters, `?` exactly one
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".+"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| FsError::InvalidInput(format!("bad pattern {pattern:?}: {e}")))
}

/// copy
impl FileSystem<'_> {
    /// copy the node at `src` into the directory `dest_dir`, keeping its name
    ///
    /// unreadable nodes inside a copied directory are skipped
    /// # Return
    /// the inode index of the copy
    pub fn copy(&mut self, src: &str, dest_dir: &str, credentials: Credentials) -> Result<i32> {
        info!("copy() called with src: {src}, dest: {dest_dir}");
        let split = split_path(src)?;
        if split.is_root() {
            return Err(FsError::InvalidInput("cannot copy /".into()));
        }
        let (source, source_index) = self.resolve(src)?;
        let (dest, dest_index) = self.resolve(dest_dir)?;
        if !dest.is_dir() {
            return Err(FsError::NotDirectory(dest_dir.to_string()));
        }
        if self.find_entry(&dest, &split.leaf)?.is_some() {
            return Err(FsError::AlreadyExists(format!("{dest_dir}/{}", split.leaf)));
        }
        if !dest.can_write(credentials)? {
            return Err(FsError::PermissionDenied(format!("cannot write into {dest_dir}")));
        }
        let copied = if source.is_dir() {
            self.copy_dir(source_index, dest_index, credentials)?
        } else {
            self.copy_file(source_index, credentials)?
        };
        let copied =
            copied.ok_or_else(|| FsError::PermissionDenied(format!("cannot read {src}")))?;
        self.link_entry(dest_index, &split.leaf, copied)?;
        Ok(copied)
    }

    /// deep copy directory `index` as a child of `new_parent`
    /// # Return
    /// `None` when `credentials` may not read it
    pub fn copy_dir(
        &mut self,
        index: i32,
        new_parent: i32,
        credentials: Credentials,
    ) -> Result<Option<i32>> {
        let source = self.read_inode(index)?;
        if !source.can_read(credentials)? {
            warn!("copy skips unreadable directory inode {index}");
            return Ok(None);
        }
        let mut copy = Inode {
            block: [UNALLOCATED; super::BLOCK_POINTERS],
            ..source.clone()
        };
        let copy_index = self.allocate_inode(&copy)?;
        for position in 0..DIRECT_POINTERS {
            if source.block[position] != UNALLOCATED {
                copy.block[position] = self.copy_folder_block(
                    source.block[position],
                    copy_index,
                    new_parent,
                    credentials,
                )?;
            }
        }
        if source.block[INDIRECT_POINTER] != UNALLOCATED {
            let pointers = self.read_pointer_block(source.block[INDIRECT_POINTER])?;
            let mut copied = PointerBlock::default();
            let pointer_index = self.allocate_block(&copied)?;
            for (position, block) in pointers.pointers.iter().enumerate() {
                if *block != UNALLOCATED {
                    copied.pointers[position] =
                        self.copy_folder_block(*block, copy_index, new_parent, credentials)?;
                }
            }
            self.write_block(pointer_index, &copied)?;
            copy.block[INDIRECT_POINTER] = pointer_index;
        }
        self.write_inode(copy_index, &copy)?;
        Ok(Some(copy_index))
    }

    fn copy_folder_block(
        &mut self,
        block_index: i32,
        dir: i32,
        parent: i32,
        credentials: Credentials,
    ) -> Result<i32> {
        let source = self.read_folder_block(block_index)?;
        let mut block = FolderBlock::new(dir, parent);
        let block_copy = self.allocate_block(&block)?;
        for (slot, entry) in source.usable().filter(|(_, e)| !e.is_free()) {
            let child = self.read_inode(entry.inode)?;
            let copied = if child.is_dir() {
                self.copy_dir(entry.inode, dir, credentials)?
            } else {
                self.copy_file(entry.inode, credentials)?
            };
            if let Some(copied) = copied {
                block.entries[slot] = FolderEntry {
                    name: entry.name,
                    inode: copied,
                };
            }
        }
        self.write_block(block_copy, &block)?;
        Ok(block_copy)
    }

    /// copy file `index` block by block
    /// # Return
    /// `None` when `credentials` may not read it
    pub fn copy_file(&mut self, index: i32, credentials: Credentials) -> Result<Option<i32>> {
        let source = self.read_inode(index)?;
        if !source.can_read(credentials)? {
            warn!("copy skips unreadable file inode {index}");
            return Ok(None);
        }
        let mut copy = Inode {
            block: [UNALLOCATED; super::BLOCK_POINTERS],
            ..source.clone()
        };
        let copy_index = self.allocate_inode(&copy)?;
        for position in 0..DIRECT_POINTERS {
            if source.block[position] != UNALLOCATED {
                let block = self.read_file_block(source.block[position])?;
                copy.block[position] = self.allocate_block(&block)?;
            }
        }
        if source.block[INDIRECT_POINTER] != UNALLOCATED {
            let pointers = self.read_pointer_block(source.block[INDIRECT_POINTER])?;
            let mut copied = PointerBlock::default();
            let pointer_index = self.allocate_block(&copied)?;
            for (position, block) in pointers.pointers.iter().enumerate() {
                if *block != UNALLOCATED {
                    let block = self.read_file_block(*block)?;
                    copied.pointers[position] = self.allocate_block(&block)?;
                }
            }
            self.write_block(pointer_index, &copied)?;
            copy.block[INDIRECT_POINTER] = pointer_index;
        }
        self.write_inode(copy_index, &copy)?;
        Ok(Some(copy_index))
    }
}

/// remove
impl FileSystem<'_> {
    /// remove the node at `path` and everything below it
    ///
    /// nodes `credentials` may not write survive together with their ancestors
    /// # Return
    /// whether the node was unlinked from its parent
    pub fn remove(&mut self, path: &str, credentials: Credentials) -> Result<bool> {
        info!("remove() called with path: {path}");
        let split = split_path(path)?;
        if split.is_root() {
            return Err(FsError::InvalidInput("cannot remove /".into()));
        }
        let (parent, parent_index) = self.resolve_parent(path, &split)?;
        if parent_index == ROOT_INODE && split.leaf.eq_ignore_ascii_case(USERS_FILE) {
            return Err(FsError::InvalidInput(format!("cannot remove /{USERS_FILE}")));
        }
        let entry = self
            .find_entry(&parent, &split.leaf)?
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        let node = self.read_inode(entry.inode)?;
        let removable = if node.is_dir() {
            self.remove_dir(entry.inode, credentials)?
        } else {
            self.remove_file(entry.inode, credentials)?
        };
        if !removable {
            warn!("remove kept {path}, some nodes below it are not writable");
            return Ok(false);
        }
        let mut block = self.read_folder_block(entry.block)?;
        block.clear(entry.slot);
        self.write_block(entry.block, &block)?;
        let mut parent = self.read_inode(parent_index)?;
        parent.update_modified_at();
        self.write_inode(parent_index, &parent)?;
        Ok(true)
    }

    /// whether file `index` may be unlinked
    pub fn remove_file(&mut self, index: i32, credentials: Credentials) -> Result<bool> {
        self.read_inode(index)?.can_write(credentials)
    }

    /// clear every removable entry below directory `index`
    ///
    /// folder blocks left without entries are unlinked from the directory
    /// # Return
    /// whether everything below it was removed
    pub fn remove_dir(&mut self, index: i32, credentials: Credentials) -> Result<bool> {
        let mut dir = self.read_inode(index)?;
        if !dir.can_write(credentials)? {
            return Ok(false);
        }
        let mut removed_all = true;
        for position in 0..DIRECT_POINTERS {
            let block_index = dir.block[position];
            if block_index == UNALLOCATED {
                continue;
            }
            if self.remove_folder_block(block_index, credentials)? {
                dir.block[position] = UNALLOCATED;
            } else {
                removed_all = false;
            }
        }
        let pointer_index = dir.block[INDIRECT_POINTER];
        if pointer_index != UNALLOCATED {
            let mut pointers = self.read_pointer_block(pointer_index)?;
            for position in 0..pointers.pointers.len() {
                let block_index = pointers.pointers[position];
                if block_index == UNALLOCATED {
                    continue;
                }
                if self.remove_folder_block(block_index, credentials)? {
                    pointers.pointers[position] = UNALLOCATED;
                } else {
                    removed_all = false;
                }
            }
            if pointers.allocated().next().is_none() {
                dir.block[INDIRECT_POINTER] = UNALLOCATED;
            } else {
                self.write_block(pointer_index, &pointers)?;
            }
        }
        dir.update_modified_at();
        self.write_inode(index, &dir)?;
        Ok(removed_all)
    }

    fn remove_folder_block(&mut self, block_index: i32, credentials: Credentials) -> Result<bool> {
        let mut block = self.read_folder_block(block_index)?;
        let mut cleared = true;
        for slot in FIRST_USABLE_ENTRY..ENTRIES_PER_FOLDER {
            let entry = block.entries[slot];
            if entry.is_free() {
                continue;
            }
            let child = self.read_inode(entry.inode)?;
            let removable = if child.is_dir() {
                self.remove_dir(entry.inode, credentials)?
            } else {
                self.remove_file(entry.inode, credentials)?
            };
            if removable {
                block.clear(slot);
            } else {
                cleared = false;
            }
        }
        self.write_block(block_index, &block)?;
        Ok(cleared)
    }
}

/// find
impl FileSystem<'_> {
    /// list the readable names below directory `path` matching `pattern`
    ///
    /// every line is indented three spaces per level, directories holding a
    /// match are listed above it even when their own name does not match
    pub fn find(&self, path: &str, pattern: &str, credentials: Credentials) -> Result<String> {
        info!("find() called with path: {path}, pattern: {pattern}");
        let regex = glob_to_regex(pattern)?;
        let (dir, _) = self.resolve(path)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        if !dir.can_read(credentials)? {
            return Err(FsError::PermissionDenied(format!("cannot read {path}")));
        }
        self.find_below(&dir, &regex, 1, credentials)
    }

    fn find_below(
        &self,
        dir: &Inode,
        regex: &Regex,
        level: usize,
        credentials: Credentials,
    ) -> Result<String> {
        let mut listing = String::new();
        for entry in self.dir_entries(dir)? {
            let child = self.read_inode(entry.inode)?;
            if !child.can_read(credentials)? {
                continue;
            }
            let nested = if child.is_dir() {
                self.find_below(&child, regex, level + 1, credentials)?
            } else {
                String::new()
            };
            if !nested.is_empty() || regex.is_match(&entry.name) {
                listing.push_str(&FIND_INDENT.repeat(level));
                listing.push_str(&entry.name);
                listing.push('\n');
                listing.push_str(&nested);
            }
        }
        Ok(listing)
    }
}

/// chmod and chown
impl FileSystem<'_> {
    /// set the permissions of `path`, and of everything below it with `recursive`
    ///
    /// nodes below `path` that `credentials` does not own are left alone
    /// # Return
    /// how many inodes changed
    pub fn chmod(
        &mut self,
        path: &str,
        perm: Permissions,
        recursive: bool,
        credentials: Credentials,
    ) -> Result<usize> {
        info!("chmod() called with path: {path}, perm: {perm}, recursive: {recursive}");
        self.update_tree(path, recursive, credentials, &|inode: &mut Inode| {
            inode.set_permissions(perm)
        })
    }

    /// hand `path` over to user `uid`, the group is kept
    pub fn chown(
        &mut self,
        path: &str,
        uid: i32,
        recursive: bool,
        credentials: Credentials,
    ) -> Result<usize> {
        info!("chown() called with path: {path}, uid: {uid}, recursive: {recursive}");
        self.update_tree(path, recursive, credentials, &|inode: &mut Inode| {
            inode.uid = uid;
            inode.update_modified_at();
        })
    }

    fn update_tree(
        &mut self,
        path: &str,
        recursive: bool,
        credentials: Credentials,
        update: &dyn Fn(&mut Inode),
    ) -> Result<usize> {
        let (inode, index) = self.resolve(path)?;
        if !inode.can_chmod(credentials) {
            return Err(FsError::PermissionDenied(format!(
                "only the owner of {path} or root may change it"
            )));
        }
        self.update_node(index, recursive, credentials, update)
    }

    fn update_node(
        &mut self,
        index: i32,
        recursive: bool,
        credentials: Credentials,
        update: &dyn Fn(&mut Inode),
    ) -> Result<usize> {
        let mut inode = self.read_inode(index)?;
        let mut changed = 0;
        if inode.can_chmod(credentials) {
            update(&mut inode);
            self.write_inode(index, &inode)?;
            changed += 1;
        }
        if recursive && inode.is_dir() {
            for entry in self.dir_entries(&inode)? {
                changed += self.update_node(entry.inode, recursive, credentials, update)?;
            }
        }
        Ok(changed)
    }
}
