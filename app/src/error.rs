//! error types shared by every engine component
use thiserror::Error;

/// everything an engine operation can fail with
///
/// no variant is fatal to the process, the CLI decides how to present them
#[derive(Debug, Error)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode record: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("name already exists: {0}")]
    AlreadyExists(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("no space left: {0}")]
    NoSpace(String),
    #[error("forbidden, insufficient permissions: {0}")]
    PermissionDenied(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no active session, login first")]
    NoSession,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("path invalid, ensure parent exists: {0}")]
    InvalidPath(String),
    #[error("name too long: {0}")]
    NameTooLong(String),
    #[error("not a directory: {0}")]
    NotDirectory(String),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("invalid on-disk format: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// map this error to the closest POSIX errno
    pub fn errno(&self) -> libc::c_int {
        match self {
            Self::Io(_) | Self::Encode(_) | Self::Decode(_) => libc::EIO,
            Self::NotFound(_) => libc::ENOENT,
            Self::AlreadyExists(_) => libc::EEXIST,
            Self::Conflict(_) => libc::EBUSY,
            Self::NoSpace(_) => libc::ENOSPC,
            Self::PermissionDenied(_) => libc::EACCES,
            Self::InvalidCredentials | Self::NoSession => libc::EPERM,
            Self::InvalidInput(_) | Self::InvalidPath(_) | Self::Format(_) => libc::EINVAL,
            Self::NameTooLong(_) => libc::ENAMETOOLONG,
            Self::NotDirectory(_) => libc::ENOTDIR,
            Self::IsDirectory(_) => libc::EISDIR,
        }
    }
}
