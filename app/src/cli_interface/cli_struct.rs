use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    fs::{FsType, Permissions},
    mbr::{DeleteMode, Fit, PartitionKind},
    utils::size_unit::SizeUnit,
};

pub const DEFAULT_STORE: &str = "disks";

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about = "ext2/ext3 emulator over flat disk images", long_about = None)]
pub struct VdiskCli {
    /// directory holding the `<letter>.dsk` images
    #[arg(long, global = true, default_value = DEFAULT_STORE)]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// create a new disk image under the first free letter
    Mkdisk(MkdiskArgs),
    /// remove a disk image
    Rmdisk(RmdiskArgs),
    /// create, delete or resize a partition
    Fdisk(FdiskArgs),
    /// mount a partition and print its id
    Mount(MountArgs),
    /// unmount a mounted partition
    Unmount(UnmountArgs),
    /// list the mounted partitions
    Mounted,
    /// format a mounted partition
    Mkfs(MkfsArgs),
    /// create a group, root only
    Mkgrp(GroupArgs),
    /// remove a group, root only
    Rmgrp(GroupArgs),
    /// create a user, root only
    Mkusr(MkusrArgs),
    /// remove a user, root only
    Rmusr(RmusrArgs),
    Mkdir(MkdirArgs),
    Mkfile(MkfileArgs),
    /// print files, one per line
    Cat(CatArgs),
    /// list names below a directory matching a pattern
    Find(FindArgs),
    Copy(CopyArgs),
    Remove(RemoveArgs),
    Chmod(ChmodArgs),
    Chown(ChownArgs),
    /// print the journal of an ext3 partition
    Journal(JournalArgs),
}

/// who runs a filesystem command
///
/// the password is prompted for when `--pass` is missing
#[derive(clap::Args, Debug, PartialEq)]
pub struct SessionArgs {
    /// mount id of the partition, e.g. `A105`
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub pass: Option<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MkdiskArgs {
    #[arg(short, long)]
    pub size: i32,
    #[arg(short, long, value_enum, default_value_t = SizeUnit::Kilo)]
    pub unit: SizeUnit,
    #[arg(short, long, value_enum, default_value_t = Fit::First)]
    pub fit: Fit,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct RmdiskArgs {
    /// drive letter of the disk
    #[arg(short, long)]
    pub disk: char,
}

/// without `--delete` or `--add` a partition of `--size` is created
#[derive(clap::Args, Debug, PartialEq)]
pub struct FdiskArgs {
    #[arg(short, long)]
    pub disk: char,
    #[arg(short, long)]
    pub name: String,
    #[arg(short, long)]
    pub size: Option<i32>,
    #[arg(short, long, value_enum, default_value_t = SizeUnit::Kilo)]
    pub unit: SizeUnit,
    #[arg(short = 't', long = "type", value_enum, default_value_t = PartitionKind::Primary)]
    pub kind: PartitionKind,
    #[arg(short, long, value_enum, default_value_t = Fit::Worst)]
    pub fit: Fit,
    #[arg(long, value_enum, conflicts_with_all = ["add", "size"])]
    pub delete: Option<DeleteMode>,
    /// grow, or shrink with a negative value, expressed in `--unit`
    #[arg(long, allow_hyphen_values = true, conflicts_with = "size")]
    pub add: Option<i32>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MountArgs {
    #[arg(short, long)]
    pub disk: char,
    #[arg(short, long)]
    pub name: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct UnmountArgs {
    #[arg(long)]
    pub id: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MkfsArgs {
    #[arg(long)]
    pub id: String,
    #[arg(short = 't', long = "fs", value_enum, default_value_t = FsType::Ext2)]
    pub fs_type: FsType,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct GroupArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub name: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MkusrArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(long)]
    pub usr: String,
    #[arg(long)]
    pub pwd: String,
    #[arg(long)]
    pub grp: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct RmusrArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(long)]
    pub usr: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MkdirArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub path: String,
    /// create missing parents too
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MkfileArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub path: String,
    #[arg(short, long)]
    pub recursive: bool,
    /// fill the file with `0123456789` repeated to this many bytes
    #[arg(short, long, conflicts_with_all = ["cont", "content"])]
    pub size: Option<usize>,
    /// copy the content of this host file
    #[arg(long, conflicts_with = "content")]
    pub cont: Option<PathBuf>,
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct CatArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(long = "file", required = true, num_args = 1..)]
    pub files: Vec<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct FindArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub path: String,
    /// `*` matches one or more characters, `?` exactly one
    #[arg(short, long)]
    pub name: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct CopyArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub path: String,
    /// directory receiving the copy
    #[arg(short, long)]
    pub dest: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ChmodArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub path: String,
    /// three octal digits, e.g. `664`
    #[arg(long)]
    pub ugo: Permissions,
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ChownArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(short, long)]
    pub path: String,
    #[arg(long)]
    pub usr: String,
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct JournalArgs {
    #[arg(long)]
    pub id: String,
}

/// test `mkdisk` and `fdisk` subcommands
#[cfg(test)]
mod disk_parse_args_tests {
    use super::*;

    #[test]
    fn test_mkdisk_defaults() {
        let args = VdiskCli::parse_from(["vdiskfs", "mkdisk", "-s", "30"]);
        assert_eq!(
            args,
            VdiskCli {
                store: PathBuf::from(DEFAULT_STORE),
                command: Command::Mkdisk(MkdiskArgs {
                    size: 30,
                    unit: SizeUnit::Kilo,
                    fit: Fit::First,
                }),
            }
        );
    }

    #[test]
    fn test_mkdisk_long_form() {
        let args = VdiskCli::parse_from([
            "vdiskfs", "--store", "/tmp/d", "mkdisk", "--size", "2", "--unit", "m", "--fit", "bf",
        ]);
        assert_eq!(args.store, PathBuf::from("/tmp/d"));
        assert_eq!(
            args.command,
            Command::Mkdisk(MkdiskArgs {
                size: 2,
                unit: SizeUnit::Mega,
                fit: Fit::Best,
            })
        );
    }

    #[test]
    fn test_fdisk_defaults_and_shrink() {
        let args = VdiskCli::parse_from(["vdiskfs", "fdisk", "-d", "A", "-n", "p1", "-s", "300"]);
        assert_eq!(
            args.command,
            Command::Fdisk(FdiskArgs {
                disk: 'A',
                name: "p1".to_string(),
                size: Some(300),
                unit: SizeUnit::Kilo,
                kind: PartitionKind::Primary,
                fit: Fit::Worst,
                delete: None,
                add: None,
            })
        );
        let args = VdiskCli::parse_from(["vdiskfs", "fdisk", "-d", "A", "-n", "p1", "--add", "-20"]);
        assert!(matches!(args.command, Command::Fdisk(FdiskArgs { add: Some(-20), .. })));
    }

    #[test]
    fn test_fdisk_delete_conflicts_with_size() {
        let result = VdiskCli::try_parse_from([
            "vdiskfs", "fdisk", "-d", "A", "-n", "p1", "-s", "3", "--delete", "full",
        ]);
        assert!(result.is_err());
    }
}

/// test filesystem subcommands
#[cfg(test)]
mod fs_parse_args_tests {
    use super::*;

    fn session() -> SessionArgs {
        SessionArgs {
            id: "A105".to_string(),
            user: "root".to_string(),
            pass: Some("123".to_string()),
        }
    }

    #[test]
    fn test_mkfs_type() {
        let args = VdiskCli::parse_from(["vdiskfs", "mkfs", "--id", "A105", "--fs", "3fs"]);
        assert_eq!(
            args.command,
            Command::Mkfs(MkfsArgs {
                id: "A105".to_string(),
                fs_type: FsType::Ext3,
            })
        );
    }

    #[test]
    fn test_mkdir_recursive() {
        let args = VdiskCli::parse_from([
            "vdiskfs", "mkdir", "--id", "A105", "--user", "root", "--pass", "123", "-p", "/a/b",
            "-r",
        ]);
        assert_eq!(
            args.command,
            Command::Mkdir(MkdirArgs {
                session: session(),
                path: "/a/b".to_string(),
                recursive: true,
            })
        );
    }

    #[test]
    fn test_cat_many_files() {
        let args = VdiskCli::parse_from([
            "vdiskfs", "cat", "--id", "A105", "--user", "root", "--pass", "123", "--file", "/a",
            "/b",
        ]);
        assert_eq!(
            args.command,
            Command::Cat(CatArgs {
                session: session(),
                files: vec!["/a".to_string(), "/b".to_string()],
            })
        );
    }

    #[test]
    fn test_chmod_parses_permissions() {
        let args = VdiskCli::parse_from([
            "vdiskfs", "chmod", "--id", "A105", "--user", "root", "--pass", "123", "-p", "/a",
            "--ugo", "750",
        ]);
        assert!(matches!(
            args.command,
            Command::Chmod(ChmodArgs { ugo, recursive: false, .. }) if ugo == Permissions::new(7, 5, 0)
        ));
        assert!(VdiskCli::try_parse_from([
            "vdiskfs", "chmod", "--id", "A105", "--user", "root", "-p", "/a", "--ugo", "800",
        ])
        .is_err());
    }

    #[test]
    fn test_mkfile_content_sources_conflict() {
        assert!(VdiskCli::try_parse_from([
            "vdiskfs", "mkfile", "--id", "A105", "--user", "root", "-p", "/f", "-s", "10",
            "--content", "x",
        ])
        .is_err());
    }
}
