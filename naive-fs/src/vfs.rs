//! # 文件系统接口
//!
//! 宿主通过 [`FileSystem`] 使用文件系统，不关心盘上布局。

use alloc::vec::Vec;

use crate::dir::DirEntry;
use crate::layout::{BitmapKind, Inode, Mode, Payload};
use crate::volume::Volume;
use crate::Result;
use crate::{BLOCK_SIZE, MAX_FILE_SIZE, NAME_MAX_LEN, ROOT_INO};

/// 单个 inode 的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub ino: u32,
    pub mode: Mode,
    pub links: u32,
    pub uid: u32,
    pub gid: u32,
    /// 文件为字节数，目录为子项个数
    pub payload: Payload,
    /// 占用的数据块数
    pub blocks: u32,
    pub atime: i64,
    pub ctime: i64,
    pub mtime: i64,
}

impl From<&Inode> for Stat {
    fn from(inode: &Inode) -> Self {
        Self {
            ino: inode.ino,
            mode: inode.mode(),
            links: inode.nlink,
            uid: inode.uid,
            gid: inode.gid,
            payload: inode.payload,
            blocks: inode.blocks().len() as u32,
            atime: inode.atime,
            ctime: inode.ctime,
            mtime: inode.mtime,
        }
    }
}

/// 整个卷的容量统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: u32,
    pub blocks: u32,
    pub blocks_free: u32,
    pub inodes: u32,
    pub inodes_free: u32,
    pub name_max: u32,
    pub max_file_size: u32,
}

pub trait FileSystem {
    #[inline]
    fn root(&self) -> u32 {
        ROOT_INO
    }

    fn lookup(&self, dir: u32, name: &str) -> Result<Option<u32>>;

    fn list(&self, dir: u32) -> Result<Vec<DirEntry>>;

    /// 新建文件或目录，返回新 inode 编号
    fn create(&mut self, parent: u32, name: &str, mode: u32) -> Result<u32>;

    fn mkdir(&mut self, parent: u32, name: &str, mode: u32) -> Result<u32>;

    fn read_inode(&self, ino: u32) -> Result<Inode>;

    fn write_inode(&mut self, ino: u32, inode: &Inode) -> Result<()>;

    fn stat(&self, ino: u32) -> Result<Stat> {
        self.read_inode(ino).map(|inode| Stat::from(&inode))
    }

    fn statfs(&self) -> Result<FsStat>;
}

impl FileSystem for Volume {
    fn lookup(&self, dir: u32, name: &str) -> Result<Option<u32>> {
        Volume::lookup(self, dir, name)
    }

    fn list(&self, dir: u32) -> Result<Vec<DirEntry>> {
        Volume::list(self, dir)
    }

    fn create(&mut self, parent: u32, name: &str, mode: u32) -> Result<u32> {
        Volume::create(self, parent, name, mode)
    }

    fn mkdir(&mut self, parent: u32, name: &str, mode: u32) -> Result<u32> {
        Volume::mkdir(self, parent, name, mode)
    }

    fn read_inode(&self, ino: u32) -> Result<Inode> {
        Volume::read_inode(self, ino)
    }

    fn write_inode(&mut self, ino: u32, inode: &Inode) -> Result<()> {
        Volume::write_inode(self, ino, inode)
    }

    fn statfs(&self) -> Result<FsStat> {
        let super_block = self.super_block();
        let allocator = self.allocator();
        let block_device = self.block_device();

        Ok(FsStat {
            block_size: BLOCK_SIZE as u32,
            blocks: super_block.block_total,
            blocks_free: allocator.count_free(block_device, BitmapKind::Block)?,
            inodes: super_block.inode_total,
            inodes_free: allocator.count_free(block_device, BitmapKind::Inode)?,
            name_max: NAME_MAX_LEN as u32,
            max_file_size: MAX_FILE_SIZE as u32,
        })
    }
}
