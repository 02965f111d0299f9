use alloc::sync::Arc;

use block_dev::BlockDevice;

use super::{INODE_SIZE, INODES_PER_BLOCK, get_u32, put_u32};
use crate::block_io;
use crate::{Error, Result};
use crate::{BLOCK_BITMAP_START, BLOCK_BITS, BLOCK_SIZE, MAGIC, SUPER_BLOCK};

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 定位其它连续区域
///
/// 位图所占块数不落盘，由资源总数推出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    pub inode_total: u32,
    /// 文件系统占据块数
    pub block_total: u32,
    pub inode_table_start: u32,
    pub data_region_start: u32,
}

impl SuperBlock {
    /// 记录本身的字节数，块内其余部分填0
    pub const SIZE: usize = 5 * 4;

    /// 由设备块数推出整个布局。
    ///
    /// inode 总数取块数向下对齐到 [`INODES_PER_BLOCK`] 的倍数，
    /// 这样 inode 表的块数用截断除法算出来也恰好装下全部 inode。
    pub fn compute_geometry(block_total: u32) -> Result<Self> {
        let inode_total = block_total - block_total % INODES_PER_BLOCK as u32;
        if inode_total == 0 {
            return Err(Error::DeviceTooSmall(block_total));
        }

        let inode_table_start =
            BLOCK_BITMAP_START + bitmap_blocks(block_total) + bitmap_blocks(inode_total);
        let inode_table_blocks = (inode_total as u64 * INODE_SIZE as u64 / BLOCK_SIZE as u64) as u32;
        let data_region_start = inode_table_start + inode_table_blocks;

        // 至少留出根目录的一个数据块
        if data_region_start >= block_total {
            return Err(Error::DeviceTooSmall(block_total));
        }

        Ok(Self {
            magic: MAGIC,
            inode_total,
            block_total,
            inode_table_start,
            data_region_start,
        })
    }

    pub fn load(block_device: &Arc<dyn BlockDevice>) -> Result<Self> {
        let super_block = block_io::map(SUPER_BLOCK, block_device, |block| Self::decode(block))?;
        if !super_block.is_valid() {
            return Err(Error::BadMagic(super_block.magic));
        }
        if !super_block.is_consistent() {
            return Err(Error::Corrupted("superblock geometry"));
        }
        Ok(super_block)
    }

    pub fn persist(&self, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        let mut block = [0; BLOCK_SIZE];
        self.encode(&mut block);
        block_io::write(SUPER_BLOCK, &block, block_device)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    #[inline]
    pub fn magic(&self) -> u32 {
        self.magic
    }

    #[inline]
    pub fn block_bitmap_blocks(&self) -> u32 {
        bitmap_blocks(self.block_total)
    }

    #[inline]
    pub fn inode_bitmap_start(&self) -> u32 {
        BLOCK_BITMAP_START + self.block_bitmap_blocks()
    }

    #[inline]
    pub fn inode_bitmap_blocks(&self) -> u32 {
        bitmap_blocks(self.inode_total)
    }

    #[inline]
    pub fn inode_table_blocks(&self) -> u32 {
        self.data_region_start - self.inode_table_start
    }

    /// 各区域互不重叠、按序排列，且 inode 表装得下全部 inode
    fn is_consistent(&self) -> bool {
        self.inode_total > 0
            && self.inode_total <= self.block_total
            && self.inode_table_start >= self.inode_bitmap_start() + self.inode_bitmap_blocks()
            && self.data_region_start > self.inode_table_start
            && self.data_region_start < self.block_total
            && self.inode_table_blocks() as u64 * INODES_PER_BLOCK as u64
                >= self.inode_total as u64
    }

    fn decode(raw: &[u8]) -> Self {
        Self {
            magic: get_u32(raw, 0),
            inode_total: get_u32(raw, 4),
            block_total: get_u32(raw, 8),
            inode_table_start: get_u32(raw, 12),
            data_region_start: get_u32(raw, 16),
        }
    }

    fn encode(&self, raw: &mut [u8]) {
        put_u32(raw, 0, self.magic);
        put_u32(raw, 4, self.inode_total);
        put_u32(raw, 8, self.block_total);
        put_u32(raw, 12, self.inode_table_start);
        put_u32(raw, 16, self.data_region_start);
    }
}

/// 给 `total` 个资源各记一位所需的块数
#[inline]
fn bitmap_blocks(total: u32) -> u32 {
    total.div_ceil(BLOCK_BITS as u32)
}
