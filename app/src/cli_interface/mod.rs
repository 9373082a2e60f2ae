//! the `vdiskfs` command line
mod cli_struct;
pub use cli_struct::*;
