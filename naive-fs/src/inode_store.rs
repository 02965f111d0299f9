//! # inode 表
//!
//! inode 在表中紧密排列，每块放 [`INODES_PER_BLOCK`] 个，编号即下标。

use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::block_io;
use crate::layout::{INODE_SIZE, INODES_PER_BLOCK, Inode, SuperBlock, read_record, write_record};
use crate::{BLOCK_SIZE, Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct InodeStore {
    inode_table_start: u32,
    inode_total: u32,
}

impl InodeStore {
    pub fn new(super_block: &SuperBlock) -> Self {
        Self {
            inode_table_start: super_block.inode_table_start,
            inode_total: super_block.inode_total,
        }
    }

    /// 通过编号获取 inode 在磁盘上的位置：**块ID**以及**块内偏移**
    pub fn locate(&self, ino: u32) -> Result<(u32, usize)> {
        if ino >= self.inode_total {
            return Err(Error::InvalidInode(ino));
        }
        let block_id =
            self.inode_table_start + (ino as u64 * INODE_SIZE as u64 / BLOCK_SIZE as u64) as u32;
        let block_offset = ino as usize % INODES_PER_BLOCK * INODE_SIZE;

        Ok((block_id, block_offset))
    }

    pub fn read(&self, ino: u32, block_device: &Arc<dyn BlockDevice>) -> Result<Inode> {
        let (block_id, block_offset) = self.locate(ino)?;
        let inode = block_io::read(block_id, block_device)
            .and_then(|block| read_record(&block, block_offset, Inode::decode))?;
        if inode.ino != ino {
            log::warn!("inode slot {ino} records number {}", inode.ino);
        }
        Ok(inode)
    }

    /// 覆盖 `ino` 号记录；记录内的编号以 `ino` 为准
    pub fn write(&self, ino: u32, inode: &Inode, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        let (block_id, block_offset) = self.locate(ino)?;
        let mut stamped = inode.clone();
        stamped.ino = ino;
        block_io::map_mut(block_id, block_device, |block| {
            write_record(block, block_offset, |raw| stamped.encode(raw))
        })?;
        log::debug!("wrote inode {ino} at block {block_id}+{block_offset}");
        Ok(())
    }
}
