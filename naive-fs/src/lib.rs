#![no_std]

extern crate alloc;

/* naive-fs 的整体架构，自上而下 */

// 对外能力接口：宿主（FUSE 适配层、测试夹具等）通过它驱动文件系统
mod vfs;

// 卷：持有块设备与各个管理器，实现格式化、挂载、创建、查找
mod volume;

// 目录项索引：目录内的名字解析、枚举与追加
mod dir;

// inode 表：按编号读写 inode 记录
mod inode_store;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
mod layout;

// 块读写：对块设备的整块读取与“读-改-写”
mod block_io;

mod error;

pub use block_dev::BlockDevice;

pub use self::{
    error::{Error, Result},
    inode_store::InodeStore,
    dir::{DirEntry, DirectoryIndex},
    layout::{
        Bitmap, BitmapAllocator, BitmapKind, FileKind, Inode, Mode, Payload, Permission,
        SuperBlock,
    },
    vfs::{FileSystem, FsStat, Stat},
    volume::{Clock, Epoch, FormatOptions, Volume},
};

pub const MAGIC: u32 = 990717;
pub const BLOCK_SIZE: usize = 512;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;

/// 引导块，恒为全零
pub const BOOT_BLOCK: u32 = 0;
/// 超级块所在块
pub const SUPER_BLOCK: u32 = 1;
/// 数据块位图的起始块，inode 位图紧随其后
pub const BLOCK_BITMAP_START: u32 = 2;

/// 根目录的 inode 编号
pub const ROOT_INO: u32 = 0;
/// 每个 inode 最多直接持有的块数
pub const MAX_BLOCKS_PER_FILE: usize = 8;
/// 文件名缓冲区长度；恰好占满时不带结尾的 \0
pub const NAME_MAX_LEN: usize = 128;
pub const MAX_FILE_SIZE: usize = BLOCK_SIZE * MAX_BLOCKS_PER_FILE;

type DataBlock = [u8; BLOCK_SIZE];
