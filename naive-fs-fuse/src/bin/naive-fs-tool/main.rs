mod cli;

use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use naive_fs::{BLOCK_SIZE, FileSystem, FormatOptions, Payload, Permission, Volume};
use naive_fs_fuse::{BlockFile, SystemClock, fs_error, open_volume, split_parent};

fn main() -> io::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Format {
            image,
            blocks,
            welcome,
            uid,
            gid,
        } => {
            let fd = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&image)?;
            if let Some(blocks) = blocks {
                fd.set_len(blocks as u64 * BLOCK_SIZE as u64)?;
            }

            let block_file = BlockFile::new(fd);
            let block_total = block_file.block_count()?;
            let options = FormatOptions {
                uid,
                gid,
                welcome,
                clock: Arc::new(SystemClock),
                ..Default::default()
            };
            let volume =
                Volume::format(Arc::new(block_file), block_total, &options).map_err(fs_error)?;
            let sb = volume.super_block();
            println!(
                "{image:?}: {} blocks, {} inodes, data from block {}",
                sb.block_total, sb.inode_total, sb.data_region_start
            );
        }

        Command::Ls { image, path } => {
            let volume = open_volume(&image)?;
            let dir = volume.find_path(&path).map_err(fs_error)?;
            for entry in volume.list(dir).map_err(fs_error)? {
                let stat = volume.stat(entry.ino).map_err(fs_error)?;
                println!(
                    "{:>4} {:06o} {:>3} {:>5} {}",
                    entry.ino,
                    stat.mode.bits(),
                    stat.links,
                    payload_size(stat.payload),
                    entry.name
                );
            }
        }

        Command::Mkdir { image, path, mode } => {
            let mut volume = open_volume(&image)?;
            let (parent, name) = parent_of(&volume, &path)?;
            let ino = volume.mkdir(parent, name, mode).map_err(fs_error)?;
            log::info!("mkdir {path:?} -> inode {ino}");
        }

        Command::Touch { image, path, mode } => {
            let mut volume = open_volume(&image)?;
            let (parent, name) = parent_of(&volume, &path)?;
            let ino = volume.create(parent, name, mode).map_err(fs_error)?;
            log::info!("touch {path:?} -> inode {ino}");
        }

        Command::Stat { image, path } => {
            let volume = open_volume(&image)?;
            let ino = volume.find_path(&path).map_err(fs_error)?;
            let stat = volume.stat(ino).map_err(fs_error)?;
            let setid = stat.mode.perm.contains(Permission::SetUid);
            println!("inode:  {}", stat.ino);
            println!("kind:   {:?}", stat.mode.kind);
            println!("mode:   {:06o}{}", stat.mode.bits(), if setid { " (setuid)" } else { "" });
            println!("links:  {}", stat.links);
            println!("owner:  {}:{}", stat.uid, stat.gid);
            println!("size:   {}", payload_size(stat.payload));
            println!("blocks: {}", stat.blocks);
            println!("atime:  {}", stat.atime);
            println!("ctime:  {}", stat.ctime);
            println!("mtime:  {}", stat.mtime);
        }

        Command::Df { image } => {
            let volume = open_volume(&image)?;
            let fs = volume.statfs().map_err(fs_error)?;
            println!("block size: {}", fs.block_size);
            println!("blocks:     {} free of {}", fs.blocks_free, fs.blocks);
            println!("inodes:     {} free of {}", fs.inodes_free, fs.inodes);
            println!("name max:   {}", fs.name_max);
            println!("file max:   {}", fs.max_file_size);
        }
    }

    Ok(())
}

fn parent_of<'a>(volume: &Volume, path: &'a str) -> io::Result<(u32, &'a str)> {
    let (parent, name) = split_parent(path)
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path has no final component"))?;
    let parent = volume.find_path(parent).map_err(fs_error)?;
    Ok((parent, name))
}

fn payload_size(payload: Payload) -> u32 {
    match payload {
        Payload::File { size } => size,
        Payload::Directory { children } => children,
    }
}
