use anyhow::anyhow;
use clap::Parser;
use vdiskfs::{
    cli_interface::{Command, FdiskArgs, SessionArgs, VdiskCli},
    disk::DiskStore,
    utils::size_unit::human_size,
    FileContent, FsError, Workspace,
};

/// a CLI interface to manage disk images, their partitions and the
/// ext2/ext3 filesystems living inside them.
///
/// filesystem commands log the given user in, run, and log out again,
/// so every invocation is journaled on ext3 partitions.
///
/// engine failures exit with the errno closest to them.
fn main() {
    env_logger::builder().format_timestamp_nanos().init();
    if let Err(e) = run(VdiskCli::parse()) {
        eprintln!("error: {e:#}");
        let code = e.downcast_ref::<FsError>().map_or(1, FsError::errno);
        std::process::exit(code);
    }
}

fn run(args: VdiskCli) -> anyhow::Result<()> {
    let store = DiskStore::new(&args.store)?;
    match args.command {
        Command::Mkdisk(args) => {
            let letter = store.mkdisk(args.size, args.unit, args.fit)?;
            println!("created disk {letter}");
        }
        Command::Rmdisk(args) => {
            store.rmdisk(args.disk)?;
            println!("removed disk {}", args.disk.to_ascii_uppercase());
        }
        Command::Fdisk(args) => fdisk(&store, args)?,
        Command::Mount(args) => println!("{}", store.mount(args.disk, &args.name)?),
        Command::Unmount(args) => {
            store.unmount(&args.id)?;
            println!("unmounted {}", args.id);
        }
        Command::Mounted => {
            for mounted in store.mounted()? {
                println!(
                    "{}\t{}\t{}",
                    mounted.id,
                    mounted.partition.name(),
                    human_size(mounted.partition.size)
                );
            }
        }
        Command::Mkfs(args) => {
            let superblock = store.mkfs(&args.id, args.fs_type)?;
            println!(
                "formatted {} as {:?}: {} inodes, {} blocks",
                args.id,
                args.fs_type,
                superblock.free_inodes_count + superblock.inodes_count,
                superblock.free_blocks_count + superblock.blocks_count
            );
        }
        Command::Journal(args) => {
            for record in Workspace::new(store).journal(&args.id)? {
                println!(
                    "{:.0}\t{}\t{}\t{}",
                    record.date,
                    record.operation(),
                    record.path(),
                    record.content().escape_default()
                );
            }
        }
        Command::Mkgrp(args) => {
            let id = with_session(store, &args.session, |ws| ws.mkgrp(&args.name))?;
            println!("created group {} with id {id}", args.name);
        }
        Command::Rmgrp(args) => {
            with_session(store, &args.session, |ws| ws.rmgrp(&args.name))?;
            println!("removed group {}", args.name);
        }
        Command::Mkusr(args) => {
            let id = with_session(store, &args.session, |ws| {
                ws.mkusr(&args.usr, &args.pwd, &args.grp)
            })?;
            println!("created user {} with id {id}", args.usr);
        }
        Command::Rmusr(args) => {
            with_session(store, &args.session, |ws| ws.rmusr(&args.usr))?;
            println!("removed user {}", args.usr);
        }
        Command::Mkdir(args) => {
            with_session(store, &args.session, |ws| ws.mkdir(&args.path, args.recursive))?;
        }
        Command::Mkfile(args) => {
            let content = match (args.size, args.cont, args.content) {
                (Some(size), _, _) => FileContent::Generated(size),
                (None, Some(host_file), _) => FileContent::HostFile(host_file),
                (None, None, Some(content)) => FileContent::Bytes(content.into_bytes()),
                (None, None, None) => FileContent::Empty,
            };
            with_session(store, &args.session, |ws| {
                ws.mkfile(&args.path, args.recursive, content)
            })?;
        }
        Command::Cat(args) => {
            let files: Vec<&str> = args.files.iter().map(String::as_str).collect();
            println!("{}", with_session(store, &args.session, |ws| ws.cat(&files))?);
        }
        Command::Find(args) => {
            let listing = with_session(store, &args.session, |ws| ws.find(&args.path, &args.name))?;
            println!("{}", args.path);
            print!("{listing}");
        }
        Command::Copy(args) => {
            with_session(store, &args.session, |ws| ws.copy(&args.path, &args.dest))?;
        }
        Command::Remove(args) => {
            if !with_session(store, &args.session, |ws| ws.remove(&args.path))? {
                println!("{} kept, it holds nodes you may not remove", args.path);
            }
        }
        Command::Chmod(args) => {
            let changed = with_session(store, &args.session, |ws| {
                ws.chmod(&args.path, args.ugo, args.recursive)
            })?;
            println!("changed {changed} inodes");
        }
        Command::Chown(args) => {
            let changed = with_session(store, &args.session, |ws| {
                ws.chown(&args.path, &args.usr, args.recursive)
            })?;
            println!("changed {changed} inodes");
        }
    }
    Ok(())
}

fn fdisk(store: &DiskStore, args: FdiskArgs) -> anyhow::Result<()> {
    let mut disk = store.open(args.disk)?;
    if let Some(mode) = args.delete {
        disk.delete_partition(&args.name, mode)?;
        println!("deleted partition {}", args.name);
    } else if let Some(delta) = args.add {
        let bytes = args.unit.to_bytes(delta.saturating_abs())?;
        let delta = if delta < 0 { -bytes } else { bytes };
        let partition = disk.resize_partition(&args.name, delta)?;
        println!(
            "partition {} is now {}",
            args.name,
            human_size(partition.size)
        );
    } else {
        let size = args
            .size
            .ok_or_else(|| anyhow!("--size is required to create a partition"))?;
        let bytes = args.unit.to_bytes(size)?;
        let partition = disk.create_partition(bytes, args.fit, args.kind, &args.name)?;
        println!(
            "created partition {} at {} ({})",
            args.name,
            partition.start,
            human_size(partition.size)
        );
    }
    Ok(())
}

/// log in, run `f`, and log out even when `f` failed
fn with_session<T>(
    store: DiskStore,
    session: &SessionArgs,
    f: impl FnOnce(&Workspace) -> vdiskfs::Result<T>,
) -> anyhow::Result<T> {
    let password = match &session.pass {
        Some(password) => password.clone(),
        None => rpassword::prompt_password(format!("Please input the password of {}: ", session.user))?,
    };
    let mut workspace = Workspace::new(store);
    workspace.login(&session.id, &session.user, &password)?;
    let result = f(&workspace);
    workspace.logout()?;
    Ok(result?)
}
