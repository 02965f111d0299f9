use derive_more::Display;

use crate::BitmapKind;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "bad magic {:#x}, not a naive-fs volume", _0)]
    BadMagic(u32),
    #[display(fmt = "no free bit left in the {} bitmap", _0)]
    NoSpace(BitmapKind),
    #[display(fmt = "inode {} is out of range or unallocated", _0)]
    InvalidInode(u32),
    #[display(fmt = "block {} is out of range", _0)]
    InvalidBlock(u32),
    #[display(fmt = "bit {} belongs to the reserved region", _0)]
    Reserved(u32),
    #[display(fmt = "no such file or directory")]
    NotFound,
    #[display(fmt = "directory block is full")]
    DirectoryFull,
    #[display(fmt = "name of {} bytes is too long", _0)]
    NameTooLong(usize),
    #[display(fmt = "name is empty or contains '/' or NUL")]
    InvalidName,
    #[display(fmt = "mode {:#o} is neither a regular file nor a directory", _0)]
    UnsupportedType(u32),
    #[display(fmt = "inode {} is not a directory", _0)]
    NotADirectory(u32),
    #[display(fmt = "entry already exists")]
    AlreadyExists,
    #[display(fmt = "device of {} blocks cannot hold a volume", _0)]
    DeviceTooSmall(u32),
    #[display(fmt = "corrupted on-disk structure: {}", _0)]
    Corrupted(&'static str),
    #[display(fmt = "device error: {}", _0)]
    Device(block_dev::Error),
}

impl From<block_dev::Error> for Error {
    #[inline]
    fn from(err: block_dev::Error) -> Self {
        Self::Device(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
