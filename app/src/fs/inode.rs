use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};

use crate::{
    error::{FsError, Result},
    utils::{time_util, traits::DiskRecord},
};

use super::{BLOCK_POINTERS, INODE_SIZE, UNALLOCATED};

/// uid of the `root` user created at format time
pub const ROOT_UID: i32 = 1;
pub const ROOT_GID: i32 = 1;

/// identity an operation is performed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub uid: i32,
    pub gid: i32,
}

impl Credentials {
    pub const ROOT: Credentials = Credentials {
        uid: ROOT_UID,
        gid: ROOT_GID,
    };

    pub fn is_root(&self) -> bool {
        self.uid == ROOT_UID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    /// blocks are folder blocks
    Directory,
    /// blocks are file blocks
    File,
}

impl InodeKind {
    pub fn as_byte(self) -> u8 {
        match self {
            InodeKind::Directory => b'0',
            InodeKind::File => b'1',
        }
    }

    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            b'0' => Ok(InodeKind::Directory),
            b'1' => Ok(InodeKind::File),
            other => Err(FsError::Format(format!("unknown inode type byte {other:#x}"))),
        }
    }
}

const READ: u8 = 4;
const WRITE: u8 = 2;

/// owner, group and other digits of a `perm` field like `664`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub owner: u8,
    pub group: u8,
    pub other: u8,
}

impl Permissions {
    pub const DEFAULT: Permissions = Permissions::new(6, 6, 4);
    pub const ALL: Permissions = Permissions::new(7, 7, 7);

    pub const fn new(owner: u8, group: u8, other: u8) -> Self {
        Permissions {
            owner,
            group,
            other,
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [b'0' + self.owner, b'0' + self.group, b'0' + self.other]
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Result<Self> {
        let digit = |b: u8| match b {
            b'0'..=b'7' => Ok(b - b'0'),
            _ => Err(FsError::Format(format!(
                "invalid permission field {:?}",
                String::from_utf8_lossy(&bytes)
            ))),
        };
        Ok(Permissions::new(
            digit(bytes[0])?,
            digit(bytes[1])?,
            digit(bytes[2])?,
        ))
    }

    fn allows(&self, bit: u8, credentials: Credentials, owner: Credentials) -> bool {
        if credentials.is_root() {
            return true;
        }
        (credentials.uid == owner.uid && self.owner & bit != 0)
            || (credentials.gid == owner.gid && self.group & bit != 0)
            || self.other & bit != 0
    }
}

impl FromStr for Permissions {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 3] = s
            .trim()
            .as_bytes()
            .try_into()
            .map_err(|_| FsError::InvalidInput(format!("permissions must be 3 octal digits: {s}")))?;
        Permissions::from_bytes(bytes).map_err(|_| {
            FsError::InvalidInput(format!("permissions must be 3 octal digits: {s}"))
        })
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, self.group, self.other)
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Inode {
    pub uid: i32,
    pub gid: i32,
    pub size: i32,
    pub atime: f32,
    pub ctime: f32,
    pub mtime: f32,
    /// 14 direct pointers and one single indirect pointer
    pub block: [i32; BLOCK_POINTERS],
    pub kind: u8,
    pub perm: [u8; 3],
}

impl DiskRecord for Inode {
    const SIZE: usize = INODE_SIZE as usize;
}

impl Inode {
    pub fn new(kind: InodeKind, owner: Credentials, perm: Permissions) -> Self {
        let now = time_util::now();
        Inode {
            uid: owner.uid,
            gid: owner.gid,
            size: 0,
            atime: now,
            ctime: now,
            mtime: now,
            block: [UNALLOCATED; BLOCK_POINTERS],
            kind: kind.as_byte(),
            perm: perm.to_bytes(),
        }
    }

    pub fn kind(&self) -> Result<InodeKind> {
        InodeKind::from_byte(self.kind)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory.as_byte()
    }

    pub fn owner(&self) -> Credentials {
        Credentials {
            uid: self.uid,
            gid: self.gid,
        }
    }

    pub fn permissions(&self) -> Result<Permissions> {
        Permissions::from_bytes(self.perm)
    }

    pub fn set_permissions(&mut self, perm: Permissions) {
        self.perm = perm.to_bytes();
        self.ctime = time_util::now();
    }

    pub fn can_read(&self, credentials: Credentials) -> Result<bool> {
        Ok(self
            .permissions()?
            .allows(READ, credentials, self.owner()))
    }

    pub fn can_write(&self, credentials: Credentials) -> Result<bool> {
        Ok(self
            .permissions()?
            .allows(WRITE, credentials, self.owner()))
    }

    /// only the owner and root may change permissions or ownership
    pub fn can_chmod(&self, credentials: Credentials) -> bool {
        credentials.is_root() || credentials.uid == self.uid
    }

    pub fn update_modified_at(&mut self) {
        let now = time_util::now();
        self.mtime = now;
        self.ctime = now;
    }

    pub fn update_accessed_at(&mut self) {
        self.atime = time_util::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Credentials = Credentials { uid: 2, gid: 2 };
    const GROUP_MATE: Credentials = Credentials { uid: 3, gid: 2 };
    const STRANGER: Credentials = Credentials { uid: 4, gid: 3 };

    fn file_with(perm: &str) -> Inode {
        Inode::new(InodeKind::File, OWNER, perm.parse().unwrap())
    }

    #[test]
    fn test_inode_size_in_disk() -> anyhow::Result<()> {
        let inode = file_with("664");
        let bytes = inode.serialize()?;
        assert_eq!(bytes.len(), Inode::SIZE);
        assert_eq!(&bytes[84..88], b"1664");
        Ok(())
    }

    #[test]
    fn test_kind_byte_maps_to_enum() {
        let dir = Inode::new(InodeKind::Directory, OWNER, Permissions::DEFAULT);
        assert_eq!(dir.kind().ok(), Some(InodeKind::Directory));
        assert!(dir.is_dir());
        let mut broken = dir.clone();
        broken.kind = b'7';
        assert!(matches!(broken.kind(), Err(FsError::Format(_))));
    }

    #[test]
    fn test_644_lets_others_read_only() -> anyhow::Result<()> {
        let inode = file_with("644");
        assert!(inode.can_read(STRANGER)?);
        assert!(!inode.can_write(STRANGER)?);
        assert!(inode.can_write(OWNER)?);
        assert!(!inode.can_write(GROUP_MATE)?);
        Ok(())
    }

    #[test]
    fn test_600_hides_from_others() -> anyhow::Result<()> {
        let inode = file_with("600");
        assert!(!inode.can_read(STRANGER)?);
        assert!(!inode.can_write(STRANGER)?);
        assert!(!inode.can_read(GROUP_MATE)?);
        assert!(inode.can_read(OWNER)?);
        assert!(inode.can_write(OWNER)?);
        Ok(())
    }

    #[test]
    fn test_root_always_allowed() -> anyhow::Result<()> {
        let inode = file_with("000");
        assert!(inode.can_read(Credentials::ROOT)?);
        assert!(inode.can_write(Credentials::ROOT)?);
        assert!(inode.can_chmod(Credentials::ROOT));
        assert!(inode.can_chmod(OWNER));
        assert!(!inode.can_chmod(GROUP_MATE));
        Ok(())
    }

    #[test]
    fn test_group_digit_applies_to_group() -> anyhow::Result<()> {
        let inode = file_with("060");
        assert!(inode.can_write(GROUP_MATE)?);
        assert!(!inode.can_write(STRANGER)?);
        Ok(())
    }

    #[test]
    fn test_parse_permissions() {
        assert_eq!(
            "750".parse::<Permissions>().ok(),
            Some(Permissions::new(7, 5, 0))
        );
        assert_eq!(Permissions::new(6, 6, 4).to_string(), "664");
        assert!("78".parse::<Permissions>().is_err());
        assert!("778".parse::<Permissions>().is_err());
    }
}
