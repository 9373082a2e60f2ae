//! the command layer: a disk store plus the session gating every command
use std::path::PathBuf;

use log::info;

use crate::{
    disk::DiskStore,
    error::{FsError, Result},
    fs::{
        records_for, Credentials, FileSystem, JournalRecord, Operation, Permissions, USERS_FILE,
        USERS_INODE,
    },
    session::Session,
    users::UsersRegistry,
};

const GENERATED_DIGITS: &[u8] = b"0123456789";

/// where the content of a new file comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Empty,
    Bytes(Vec<u8>),
    /// `0123456789` repeated up to this many bytes
    Generated(usize),
    /// a file of the host filesystem
    HostFile(PathBuf),
}

impl FileContent {
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            FileContent::Empty => Ok(Vec::new()),
            FileContent::Bytes(bytes) => Ok(bytes),
            FileContent::Generated(size) => Ok(GENERATED_DIGITS
                .iter()
                .copied()
                .cycle()
                .take(size)
                .collect()),
            FileContent::HostFile(path) => Ok(std::fs::read(path)?),
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    store: DiskStore,
    session: Option<Session>,
}

fn users_path() -> String {
    format!("/{USERS_FILE}")
}

fn read_registry(fs: &FileSystem<'_>) -> Result<UsersRegistry> {
    let text = fs.read_file(&users_path())?;
    UsersRegistry::parse(&String::from_utf8_lossy(&text))
}

fn write_registry(fs: &mut FileSystem<'_>, registry: &UsersRegistry) -> Result<()> {
    fs.write_file(USERS_INODE, registry.render().as_bytes())
}

impl Workspace {
    pub fn new(store: DiskStore) -> Self {
        Workspace {
            store,
            session: None,
        }
    }

    pub fn store(&self) -> &DiskStore {
        &self.store
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn active(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(FsError::NoSession)
    }

    fn active_root(&self, what: &str) -> Result<&Session> {
        let session = self.active()?;
        if !session.is_root() {
            return Err(FsError::PermissionDenied(format!("only root can {what}")));
        }
        Ok(session)
    }

    /// open the mounted partition `id`, run `f` on it and flush the image
    fn with_fs<T>(&self, id: &str, f: impl FnOnce(&mut FileSystem<'_>) -> Result<T>) -> Result<T> {
        let (mut disk, mounted) = self.store.open_mounted(id)?;
        let result = {
            let mut fs = FileSystem::open(&mut disk.image, mounted.partition.start)?;
            f(&mut fs)
        };
        disk.image.flush()?;
        result
    }

    /// run `f` on the partition of the active session
    fn with_session_fs<T>(
        &self,
        f: impl FnOnce(&mut FileSystem<'_>, Credentials) -> Result<T>,
    ) -> Result<T> {
        let session = self.active()?;
        let credentials = session.credentials();
        self.with_fs(&session.partition_id, |fs| f(fs, credentials))
    }
}

/// sessions
impl Workspace {
    pub fn login(&mut self, id: &str, user: &str, password: &str) -> Result<&Session> {
        if let Some(session) = &self.session {
            return Err(FsError::Conflict(format!(
                "{} is logged in, logout first",
                session.user
            )));
        }
        let credentials = self.with_fs(id, |fs| {
            let credentials = read_registry(fs)?.authenticate(user, password)?;
            fs.log_session(Operation::Login, format!("{id}/{user}").as_bytes())?;
            Ok(credentials)
        })?;
        info!("{user} logged into {id}");
        Ok(&*self.session.insert(Session::new(id, user, credentials)))
    }

    /// the session survives a failed logout
    pub fn logout(&mut self) -> Result<()> {
        let session = self.active()?;
        self.with_fs(&session.partition_id, |fs| {
            fs.log_session(Operation::Logout, session.user.as_bytes())
        })?;
        info!("{} logged out of {}", session.user, session.partition_id);
        self.session = None;
        Ok(())
    }
}

/// groups and users, root only
impl Workspace {
    pub fn mkgrp(&self, name: &str) -> Result<i32> {
        self.active_root("create groups")?;
        self.with_session_fs(|fs, _| {
            fs.reserve_journal(records_for(name.as_bytes()))?;
            let mut registry = read_registry(fs)?;
            let id = registry.add_group(name)?;
            write_registry(fs, &registry)?;
            fs.log(Operation::Mkgrp, &users_path(), name.as_bytes())?;
            info!("created group {name} with id {id}");
            Ok(id)
        })
    }

    pub fn rmgrp(&self, name: &str) -> Result<()> {
        self.active_root("remove groups")?;
        self.with_session_fs(|fs, _| {
            fs.reserve_journal(records_for(name.as_bytes()))?;
            let mut registry = read_registry(fs)?;
            registry.remove_group(name)?;
            write_registry(fs, &registry)?;
            fs.log(Operation::Rmgrp, &users_path(), name.as_bytes())?;
            info!("removed group {name}");
            Ok(())
        })
    }

    pub fn mkusr(&self, user: &str, password: &str, group: &str) -> Result<i32> {
        self.active_root("create users")?;
        self.with_session_fs(|fs, _| {
            let content = format!("{user}/{group}");
            fs.reserve_journal(records_for(content.as_bytes()))?;
            let mut registry = read_registry(fs)?;
            let id = registry.add_user(user, password, group)?;
            write_registry(fs, &registry)?;
            fs.log(Operation::Mkusr, &users_path(), content.as_bytes())?;
            info!("created user {user} in group {group} with id {id}");
            Ok(id)
        })
    }

    pub fn rmusr(&self, user: &str) -> Result<()> {
        self.active_root("remove users")?;
        self.with_session_fs(|fs, _| {
            fs.reserve_journal(records_for(user.as_bytes()))?;
            let mut registry = read_registry(fs)?;
            registry.remove_user(user)?;
            write_registry(fs, &registry)?;
            fs.log(Operation::Rmusr, &users_path(), user.as_bytes())?;
            info!("removed user {user}");
            Ok(())
        })
    }
}

/// filesystem commands, run as the session user
impl Workspace {
    pub fn mkdir(&self, path: &str, recursive: bool) -> Result<i32> {
        self.with_session_fs(|fs, credentials| {
            fs.reserve_journal(records_for(b""))?;
            let index = fs.create_dir(path, recursive, credentials)?;
            fs.log(Operation::Mkdir, path, b"")?;
            Ok(index)
        })
    }

    pub fn mkfile(&self, path: &str, recursive: bool, content: FileContent) -> Result<i32> {
        self.active()?;
        let content = content.into_bytes()?;
        self.with_session_fs(|fs, credentials| {
            fs.reserve_journal(records_for(&content))?;
            let index = fs.create_file(path, recursive, &content, credentials)?;
            fs.log(Operation::Mkfile, path, &content)?;
            Ok(index)
        })
    }

    /// every file of `paths`, one per line
    pub fn cat(&self, paths: &[&str]) -> Result<String> {
        self.with_session_fs(|fs, credentials| {
            let contents = paths
                .iter()
                .map(|path| {
                    fs.read_file_checked(path, credentials)
                        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(contents.join("\n"))
        })
    }

    pub fn find(&self, path: &str, pattern: &str) -> Result<String> {
        self.with_session_fs(|fs, credentials| fs.find(path, pattern, credentials))
    }

    pub fn copy(&self, src: &str, dest: &str) -> Result<i32> {
        self.with_session_fs(|fs, credentials| {
            fs.reserve_journal(records_for(dest.as_bytes()))?;
            let index = fs.copy(src, dest, credentials)?;
            fs.log(Operation::Copy, src, dest.as_bytes())?;
            Ok(index)
        })
    }

    pub fn remove(&self, path: &str) -> Result<bool> {
        self.with_session_fs(|fs, credentials| {
            fs.reserve_journal(records_for(b""))?;
            let removed = fs.remove(path, credentials)?;
            if removed {
                fs.log(Operation::Remove, path, b"")?;
            }
            Ok(removed)
        })
    }

    pub fn chmod(&self, path: &str, perm: Permissions, recursive: bool) -> Result<usize> {
        self.with_session_fs(|fs, credentials| {
            let content = perm.to_string();
            fs.reserve_journal(records_for(content.as_bytes()))?;
            let changed = fs.chmod(path, perm, recursive, credentials)?;
            fs.log(Operation::Chmod, path, content.as_bytes())?;
            Ok(changed)
        })
    }

    /// hand `path` over to the active user `user`
    pub fn chown(&self, path: &str, user: &str, recursive: bool) -> Result<usize> {
        self.with_session_fs(|fs, credentials| {
            fs.reserve_journal(records_for(user.as_bytes()))?;
            let owner = read_registry(fs)?.credentials_of(user)?;
            let changed = fs.chown(path, owner.uid, recursive, credentials)?;
            fs.log(Operation::Chown, path, user.as_bytes())?;
            Ok(changed)
        })
    }

    /// the journal of the mounted ext3 partition `id`, no session needed
    pub fn journal(&self, id: &str) -> Result<Vec<JournalRecord>> {
        self.with_fs(id, |fs| fs.journal_records())
    }
}
