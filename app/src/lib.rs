pub mod cli_interface;
pub mod disk;
pub mod error;
pub mod fs;
pub mod image;
pub mod mbr;
pub mod mkfs;
pub mod mount;
pub mod session;
pub mod users;
pub mod utils;
pub mod workspace;
pub use error::{FsError, Result};
pub use workspace::{FileContent, Workspace};
