use log::info;

use crate::error::{FsError, Result};

use super::{
    Credentials, FileBlock, FileSystem, Inode, PointerBlock, BLOCK_SIZE, DIRECT_POINTERS,
    INDIRECT_POINTER, MAX_FILE_BLOCKS, UNALLOCATED,
};

impl FileSystem<'_> {
    /// concatenated content of file inode `inode`
    pub(crate) fn read_content(&self, inode: &Inode) -> Result<Vec<u8>> {
        if inode.is_dir() {
            return Err(FsError::IsDirectory("cannot read a directory".into()));
        }
        let mut content = Vec::with_capacity(inode.size.max(0) as usize);
        for block_index in self.data_blocks(inode)? {
            content.extend_from_slice(self.read_file_block(block_index)?.data());
        }
        Ok(content)
    }

    /// read the file at `path` without any permission check
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let (inode, _) = self.resolve(path)?;
        if inode.is_dir() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        self.read_content(&inode)
    }

    /// read the file at `path` as `credentials`
    pub fn read_file_checked(&self, path: &str, credentials: Credentials) -> Result<Vec<u8>> {
        info!("read_file_checked() called with path: {path}");
        let (inode, _) = self.resolve(path)?;
        if inode.is_dir() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        if !inode.can_read(credentials)? {
            return Err(FsError::PermissionDenied(format!("cannot read {path}")));
        }
        self.read_content(&inode)
    }

    /// replace the content of file inode `index`
    ///
    /// existing blocks are rewritten in place, missing ones allocated and
    /// surplus ones unlinked
    pub fn write_file(&mut self, index: i32, content: &[u8]) -> Result<()> {
        let mut inode = self.read_inode(index)?;
        if inode.is_dir() {
            return Err(FsError::IsDirectory(format!("inode {index}")));
        }
        self.store_content(&mut inode, content)?;
        inode.update_modified_at();
        self.write_inode(index, &inode)
    }

    /// lay `content` out over the blocks of `inode`, 64 bytes per block
    ///
    /// the caller writes the inode back
    pub(crate) fn store_content(&mut self, inode: &mut Inode, content: &[u8]) -> Result<()> {
        let chunks: Vec<&[u8]> = content.chunks(BLOCK_SIZE as usize).collect();
        if chunks.len() > MAX_FILE_BLOCKS {
            return Err(FsError::NoSpace(format!(
                "content needs more than {MAX_FILE_BLOCKS} blocks"
            )));
        }

        let mut indirect = match inode.block[INDIRECT_POINTER] {
            UNALLOCATED => None,
            pointer_index => Some((pointer_index, self.read_pointer_block(pointer_index)?)),
        };
        for position in 0..MAX_FILE_BLOCKS {
            let existing = if position < DIRECT_POINTERS {
                inode.block[position]
            } else {
                indirect
                    .as_ref()
                    .map_or(UNALLOCATED, |(_, p)| p.pointers[position - DIRECT_POINTERS])
            };
            let stored = match chunks.get(position) {
                Some(chunk) => {
                    let block = FileBlock::from_chunk(chunk);
                    if existing == UNALLOCATED {
                        if position >= DIRECT_POINTERS && indirect.is_none() {
                            let pointers = PointerBlock::default();
                            indirect = Some((self.allocate_block(&pointers)?, pointers));
                        }
                        self.allocate_block(&block)?
                    } else {
                        self.write_block(existing, &block)?;
                        existing
                    }
                }
                None => UNALLOCATED,
            };
            if position < DIRECT_POINTERS {
                inode.block[position] = stored;
            } else if let Some((_, pointers)) = indirect.as_mut() {
                pointers.pointers[position - DIRECT_POINTERS] = stored;
            }
        }

        inode.block[INDIRECT_POINTER] = match indirect {
            Some((pointer_index, pointers)) if pointers.allocated().next().is_some() => {
                self.write_block(pointer_index, &pointers)?;
                pointer_index
            }
            _ => UNALLOCATED,
        };
        inode.size = content.len() as i32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{FsType, USERS_INODE},
        utils::init_test_environment::init_test_environment,
    };

    const STRANGER: Credentials = Credentials { uid: 5, gid: 5 };

    #[test]
    fn test_read_users_file() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            let content = fs.read_file("/users.txt").expect("read users");
            assert_eq!(content, b"1,G,root\n1,U,root,root,123\n");
            let superblock = fs.superblock().clone();
            assert_eq!(fs.read_file("/users.txt").expect("read again"), content);
            assert_eq!(fs.superblock(), &superblock);
        });
    }

    #[test]
    fn test_content_round_trip_through_indirect_block() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            let content: Vec<u8> = (0..1920).map(|i| b'a' + (i % 26) as u8).collect();
            let index = fs
                .create_file("/big", false, &content, Credentials::ROOT)
                .expect("create");
            let (inode, _) = fs.resolve("/big").expect("resolve");
            assert_ne!(inode.block[INDIRECT_POINTER], UNALLOCATED);
            assert_eq!(inode.size, 1920);
            assert_eq!(fs.read_file("/big").expect("read"), content);

            fs.write_file(index, b"short").expect("shrink");
            let (inode, _) = fs.resolve("/big").expect("resolve");
            assert_eq!(inode.block[1], UNALLOCATED);
            assert_eq!(inode.block[INDIRECT_POINTER], UNALLOCATED);
            assert_eq!(fs.read_file("/big").expect("read"), b"short");
        });
    }

    #[test]
    fn test_content_over_thirty_blocks_rejected() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            let inodes = fs.superblock().inodes_count;
            let blocks = fs.superblock().blocks_count;
            let content = vec![b'z'; 1921];
            assert!(matches!(
                fs.create_file("/huge", false, &content, Credentials::ROOT),
                Err(FsError::NoSpace(_))
            ));
            assert_eq!(fs.superblock().inodes_count, inodes);
            assert_eq!(fs.superblock().blocks_count, blocks);
            assert!(matches!(
                fs.write_file(USERS_INODE, &content),
                Err(FsError::NoSpace(_))
            ));
        });
    }

    #[test]
    fn test_rewrite_reuses_blocks() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            let before = fs.superblock().blocks_count;
            fs.write_file(USERS_INODE, b"1,G,root\n").expect("rewrite");
            assert_eq!(fs.superblock().blocks_count, before);
            assert_eq!(fs.read_file("/users.txt").expect("read"), b"1,G,root\n");
        });
    }

    #[test]
    fn test_checked_read() {
        let env = init_test_environment(FsType::Ext2);
        env.with_fs(|fs| {
            fs.create_dir("/d", false, Credentials::ROOT).expect("mkdir");
            let index = fs
                .create_file("/d/secret", false, b"s3cret", Credentials::ROOT)
                .expect("create");
            let mut inode = fs.read_inode(index).expect("inode");
            inode.set_permissions("600".parse().expect("perm"));
            fs.write_inode(index, &inode).expect("write inode");

            assert!(matches!(
                fs.read_file_checked("/d/secret", STRANGER),
                Err(FsError::PermissionDenied(_))
            ));
            assert_eq!(
                fs.read_file_checked("/d/secret", Credentials::ROOT).expect("root read"),
                b"s3cret"
            );
            assert!(matches!(
                fs.read_file_checked("/d", Credentials::ROOT),
                Err(FsError::IsDirectory(_))
            ));
        });
    }
}
