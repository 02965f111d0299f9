
mod block_file;
mod clock;

use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use naive_fs::{Error, Volume};

pub use self::{block_file::BlockFile, clock::SystemClock};

/// 以读写方式挂载镜像文件，新建的 inode 使用系统时间
pub fn open_volume(image: &Path) -> io::Result<Volume> {
    let file = OpenOptions::new().read(true).write(true).open(image)?;
    Volume::mount(Arc::new(BlockFile::new(file)), Arc::new(SystemClock)).map_err(fs_error)
}

/// 把路径拆成父目录与最后一级名字
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let path = path.trim_end_matches('/');
    let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
    (!name.is_empty()).then_some((parent, name))
}

pub fn fs_error(err: Error) -> io::Error {
    let kind = match err {
        Error::NotFound => ErrorKind::NotFound,
        Error::AlreadyExists => ErrorKind::AlreadyExists,
        Error::NotADirectory(_) => ErrorKind::NotADirectory,
        Error::NameTooLong(_) | Error::InvalidName | Error::UnsupportedType(_) => {
            ErrorKind::InvalidInput
        }
        Error::NoSpace(_) | Error::DirectoryFull => ErrorKind::StorageFull,
        Error::BadMagic(_) | Error::Corrupted(_) => ErrorKind::InvalidData,
        _ => ErrorKind::Other,
    };
    io::Error::new(kind, err.to_string())
}
