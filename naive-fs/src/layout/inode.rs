//! inode 记录
//!
//! 盘上字段依次为：
//! mode | ino | block_count | block[8] | size/children | uid | gid | nlink | atime | ctime | mtime
//! 其后填0补齐到 [`INODE_SIZE`] 字节，每块恰好放下 [`INODES_PER_BLOCK`] 个。
//!
//! 大小字段在盘上是同一个整数：文件记字节数，目录记子项个数。
//! 内存中用 [`Payload`] 区分，解码时依 mode 的类型位决定含义。

use enumflags2::{BitFlags, bitflags};

use super::{get_i64, get_u32, put_i64, put_u32};
use crate::{Error, Result};
use crate::{BLOCK_SIZE, MAX_BLOCKS_PER_FILE};

pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

const _: () = assert!(BLOCK_SIZE % INODE_SIZE == 0);
const _: () = assert!(OFFSET_MTIME + 8 <= INODE_SIZE);

const OFFSET_MODE: usize = 0;
const OFFSET_INO: usize = 4;
const OFFSET_BLOCK_COUNT: usize = 8;
const OFFSET_BLOCK: usize = 12;
const OFFSET_SIZE: usize = OFFSET_BLOCK + 4 * MAX_BLOCKS_PER_FILE;
const OFFSET_UID: usize = OFFSET_SIZE + 4;
const OFFSET_GID: usize = OFFSET_UID + 4;
const OFFSET_NLINK: usize = OFFSET_GID + 4;
const OFFSET_ATIME: usize = OFFSET_NLINK + 4;
const OFFSET_CTIME: usize = OFFSET_ATIME + 8;
const OFFSET_MTIME: usize = OFFSET_CTIME + 8;

/// 类型位的掩码
const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    #[inline]
    pub const fn type_bits(self) -> u32 {
        match self {
            Self::File => S_IFREG,
            Self::Directory => S_IFDIR,
        }
    }

    #[inline]
    pub fn from_type_bits(bits: u32) -> Option<Self> {
        match bits & S_IFMT {
            S_IFREG => Some(Self::File),
            S_IFDIR => Some(Self::Directory),
            _ => None,
        }
    }

    /// 新建时的硬链接数：目录还被自己的 `.` 引用
    #[inline]
    pub const fn default_links(self) -> u32 {
        match self {
            Self::File => 1,
            Self::Directory => 2,
        }
    }
}

/// 权限位，只存不查
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OtherExec = 0o0001,
    OtherWrite = 0o0002,
    OtherRead = 0o0004,
    GroupExec = 0o0010,
    GroupWrite = 0o0020,
    GroupRead = 0o0040,
    OwnerExec = 0o0100,
    OwnerWrite = 0o0200,
    OwnerRead = 0o0400,
    Sticky = 0o1000,
    SetGid = 0o2000,
    SetUid = 0o4000,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub kind: FileKind,
    pub perm: BitFlags<Permission>,
}

impl Mode {
    #[inline]
    pub fn new(kind: FileKind, perm: BitFlags<Permission>) -> Self {
        Self { kind, perm }
    }

    /// 解析 `st_mode` 风格的位；类型既非普通文件也非目录时报错
    pub fn from_bits(bits: u32) -> Result<Self> {
        let kind = FileKind::from_type_bits(bits).ok_or(Error::UnsupportedType(bits))?;
        Ok(Self {
            kind,
            perm: BitFlags::from_bits_truncate(bits & !S_IFMT),
        })
    }

    /// 同 [`Mode::from_bits`]，但类型位全为0时按 `default` 处理
    pub fn from_bits_or(bits: u32, default: FileKind) -> Result<Self> {
        if bits & S_IFMT == 0 {
            Self::from_bits(bits | default.type_bits())
        } else {
            Self::from_bits(bits)
        }
    }

    #[inline]
    pub fn bits(&self) -> u32 {
        self.kind.type_bits() | self.perm.bits()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// 文件字节数
    File { size: u32 },
    /// 目录下的目录项个数，含 `.` 与 `..`
    Directory { children: u32 },
}

impl Payload {
    #[inline]
    pub fn empty(kind: FileKind) -> Self {
        match kind {
            FileKind::File => Self::File { size: 0 },
            FileKind::Directory => Self::Directory { children: 0 },
        }
    }

    #[inline]
    pub fn kind(&self) -> FileKind {
        match self {
            Self::File { .. } => FileKind::File,
            Self::Directory { .. } => FileKind::Directory,
        }
    }

    #[inline]
    fn raw(&self) -> u32 {
        match *self {
            Self::File { size } => size,
            Self::Directory { children } => children,
        }
    }

    #[inline]
    fn from_raw(kind: FileKind, raw: u32) -> Self {
        match kind {
            FileKind::File => Self::File { size: raw },
            FileKind::Directory => Self::Directory { children: raw },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub ino: u32,
    pub perm: BitFlags<Permission>,
    pub payload: Payload,
    pub uid: u32,
    pub gid: u32,
    /// 硬链接个数
    pub nlink: u32,
    pub atime: i64,
    pub ctime: i64,
    pub mtime: i64,
    /// 持有的块，只有前 `block_count` 个有效
    block: [u32; MAX_BLOCKS_PER_FILE],
    block_count: u32,
}

impl Inode {
    /// 全新的 inode：不持有块，大小为0，三个时间戳都取 `now`
    pub fn new(ino: u32, mode: Mode, now: i64) -> Self {
        Self {
            ino,
            perm: mode.perm,
            payload: Payload::empty(mode.kind),
            uid: 0,
            gid: 0,
            nlink: mode.kind.default_links(),
            atime: now,
            ctime: now,
            mtime: now,
            block: [0; MAX_BLOCKS_PER_FILE],
            block_count: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> FileKind {
        self.payload.kind()
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        Mode::new(self.kind(), self.perm)
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    /// 目录的子项个数，文件返回空
    #[inline]
    pub fn children(&self) -> Option<u32> {
        match self.payload {
            Payload::Directory { children } => Some(children),
            Payload::File { .. } => None,
        }
    }

    /// 文件字节数，目录返回空
    #[inline]
    pub fn size(&self) -> Option<u32> {
        match self.payload {
            Payload::File { size } => Some(size),
            Payload::Directory { .. } => None,
        }
    }

    #[inline]
    pub fn blocks(&self) -> &[u32] {
        &self.block[..self.block_count as usize]
    }

    /// 追加一个持有的块；块数组已满时报 `NoSpace`
    pub fn push_block(&mut self, block_id: u32) -> Result<()> {
        let slot = self
            .block
            .get_mut(self.block_count as usize)
            .ok_or(Error::NoSpace(super::BitmapKind::Block))?;
        *slot = block_id;
        self.block_count += 1;
        Ok(())
    }

    pub fn decode(raw: &[u8; INODE_SIZE]) -> Result<Self> {
        let mode = Mode::from_bits(get_u32(raw, OFFSET_MODE))?;

        let block_count = get_u32(raw, OFFSET_BLOCK_COUNT);
        if block_count as usize > MAX_BLOCKS_PER_FILE {
            return Err(Error::Corrupted("inode block count"));
        }
        let mut block = [0; MAX_BLOCKS_PER_FILE];
        for (index, block_id) in block.iter_mut().take(block_count as usize).enumerate() {
            *block_id = get_u32(raw, OFFSET_BLOCK + 4 * index);
        }

        Ok(Self {
            ino: get_u32(raw, OFFSET_INO),
            perm: mode.perm,
            payload: Payload::from_raw(mode.kind, get_u32(raw, OFFSET_SIZE)),
            uid: get_u32(raw, OFFSET_UID),
            gid: get_u32(raw, OFFSET_GID),
            nlink: get_u32(raw, OFFSET_NLINK),
            atime: get_i64(raw, OFFSET_ATIME),
            ctime: get_i64(raw, OFFSET_CTIME),
            mtime: get_i64(raw, OFFSET_MTIME),
            block,
            block_count,
        })
    }

    /// 整条记录重写，未用的块槽与填充区都写0
    pub fn encode(&self, raw: &mut [u8; INODE_SIZE]) {
        raw.fill(0);
        put_u32(raw, OFFSET_MODE, self.mode().bits());
        put_u32(raw, OFFSET_INO, self.ino);
        put_u32(raw, OFFSET_BLOCK_COUNT, self.block_count);
        for (index, &block_id) in self.blocks().iter().enumerate() {
            put_u32(raw, OFFSET_BLOCK + 4 * index, block_id);
        }
        put_u32(raw, OFFSET_SIZE, self.payload.raw());
        put_u32(raw, OFFSET_UID, self.uid);
        put_u32(raw, OFFSET_GID, self.gid);
        put_u32(raw, OFFSET_NLINK, self.nlink);
        put_i64(raw, OFFSET_ATIME, self.atime);
        put_i64(raw, OFFSET_CTIME, self.ctime);
        put_i64(raw, OFFSET_MTIME, self.mtime);
    }
}
