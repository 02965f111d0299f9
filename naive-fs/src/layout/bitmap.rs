use alloc::sync::Arc;
use core::ops::Range;

use block_dev::BlockDevice;
use derive_more::Display;

use super::SuperBlock;
use crate::block_io;
use crate::{Error, Result};
use crate::{BLOCK_BITMAP_START, BLOCK_BITS, ROOT_INO};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BitmapKind {
    #[display(fmt = "block")]
    Block,
    #[display(fmt = "inode")]
    Inode,
}

/// 位图区域，记录其指示区域的资源分配情况：1 为已用，0 为空闲。
///
/// 第 `i` 位位于区域内第 `i / 8` 字节的第 `i % 8` 位，
/// 编号即资源的绝对编号（块号或 inode 号）。
#[derive(Debug, Clone, Copy)]
pub struct Bitmap {
    kind: BitmapKind,
    /// 位图的起始块
    start_block_id: u32,
    /// 位图占用块数
    blocks: u32,
    /// 所指示资源的总数，超出的位永不分配
    capacity: u32,
    /// 编号低于此值的位恒为 1
    reserved: u32,
}

impl Bitmap {
    #[inline]
    pub fn new(
        kind: BitmapKind,
        start_block_id: u32,
        blocks: u32,
        capacity: u32,
        reserved: u32,
    ) -> Self {
        Self {
            kind,
            start_block_id,
            blocks,
            capacity,
            reserved,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 按编号升序寻找第一个空闲位，不做标记。
    /// 逐字节跳过 0xFF，再在首个未满的字节内逐位查找。
    pub fn find_free(&self, block_device: &Arc<dyn BlockDevice>) -> Result<Option<u32>> {
        for block_index in 0..self.blocks {
            let base = block_index as u64 * BLOCK_BITS as u64;
            if base >= self.capacity as u64 {
                break;
            }

            let found = block_io::map(self.start_block_id + block_index, block_device, |bitmap_block| {
                bitmap_block
                    .iter()
                    .enumerate()
                    .find(|&(_, &byte)| byte != u8::MAX)
                    .map(|(byte_index, &byte)| {
                        base + byte_index as u64 * 8 + byte.trailing_ones() as u64
                    })
            })?;

            match found {
                Some(bit) if bit < self.capacity as u64 => return Ok(Some(bit as u32)),
                // 更低的位都已占用，余下的位都超出了容量
                Some(_) => return Ok(None),
                None => continue,
            }
        }

        Ok(None)
    }

    /// 幂等地置位或清位，只读写该位所在的那一块
    pub fn set(&self, block_device: &Arc<dyn BlockDevice>, bit: u32, used: bool) -> Result<()> {
        self.check(bit)?;
        if !used && bit < self.reserved {
            return Err(Error::Reserved(bit));
        }

        let (block_index, byte, shift) = locate(bit);
        block_io::map_mut(self.start_block_id + block_index, block_device, |bitmap_block| {
            if used {
                bitmap_block[byte] |= 1 << shift;
            } else {
                bitmap_block[byte] &= !(1 << shift);
            }
            Ok(())
        })
    }

    pub fn is_set(&self, block_device: &Arc<dyn BlockDevice>, bit: u32) -> Result<bool> {
        self.check(bit)?;
        let (block_index, byte, shift) = locate(bit);
        block_io::map(self.start_block_id + block_index, block_device, |bitmap_block| {
            bitmap_block[byte] & (1 << shift) != 0
        })
    }

    /// 容量范围内已置位的数量
    pub fn count_used(&self, block_device: &Arc<dyn BlockDevice>) -> Result<u32> {
        let mut used = 0;
        for block_index in 0..self.blocks {
            let base = block_index as u64 * BLOCK_BITS as u64;
            let capacity = self.capacity as u64;
            used += block_io::map(self.start_block_id + block_index, block_device, |bitmap_block| {
                bitmap_block
                    .iter()
                    .enumerate()
                    .map(|(byte_index, &byte)| {
                        let first = base + byte_index as u64 * 8;
                        if first >= capacity {
                            return 0;
                        }
                        let valid = (capacity - first).min(8) as u32;
                        let mask = if valid == 8 { u8::MAX } else { (1u8 << valid) - 1 };
                        (byte & mask).count_ones()
                    })
                    .sum::<u32>()
            })?;
        }
        Ok(used)
    }

    /// 把一段编号整体置位，格式化时标记保留区域用
    pub fn reserve(&self, block_device: &Arc<dyn BlockDevice>, range: Range<u32>) -> Result<()> {
        if range.end > self.capacity {
            self.check(range.end - 1)?;
        }

        for block_index in 0..self.blocks {
            let base = block_index * BLOCK_BITS as u32;
            let lo = range.start.max(base);
            let hi = range.end.min(base.saturating_add(BLOCK_BITS as u32));
            if lo >= hi {
                continue;
            }

            block_io::map_mut(self.start_block_id + block_index, block_device, |bitmap_block| {
                for bit in lo - base..hi - base {
                    bitmap_block[bit as usize / 8] |= 1 << (bit % 8);
                }
                Ok(())
            })?;
        }

        Ok(())
    }

    fn check(&self, bit: u32) -> Result<()> {
        if bit < self.capacity {
            return Ok(());
        }
        Err(match self.kind {
            BitmapKind::Block => Error::InvalidBlock(bit),
            BitmapKind::Inode => Error::InvalidInode(bit),
        })
    }
}

/// 编号 -> (区域内块索引, 块内字节, 字节内位)
#[inline]
fn locate(bit: u32) -> (u32, usize, u32) {
    let block_index = bit / BLOCK_BITS as u32;
    let inblock = bit % BLOCK_BITS as u32;
    (block_index, inblock as usize / 8, inblock % 8)
}

/// 数据块与 inode 两张位图的分配器。
///
/// `allocate` 只负责找出最低的空闲位，提交分配要再调用 `set_bit`；
/// 两步之间没有原子性，调用者须保证同一张位图上的分配串行进行。
#[derive(Debug, Clone, Copy)]
pub struct BitmapAllocator {
    block_bitmap: Bitmap,
    inode_bitmap: Bitmap,
}

impl BitmapAllocator {
    pub fn new(super_block: &SuperBlock) -> Self {
        Self {
            block_bitmap: Bitmap::new(
                BitmapKind::Block,
                BLOCK_BITMAP_START,
                super_block.block_bitmap_blocks(),
                super_block.block_total,
                super_block.data_region_start,
            ),
            inode_bitmap: Bitmap::new(
                BitmapKind::Inode,
                super_block.inode_bitmap_start(),
                super_block.inode_bitmap_blocks(),
                super_block.inode_total,
                ROOT_INO + 1,
            ),
        }
    }

    #[inline]
    pub fn bitmap(&self, kind: BitmapKind) -> &Bitmap {
        match kind {
            BitmapKind::Block => &self.block_bitmap,
            BitmapKind::Inode => &self.inode_bitmap,
        }
    }

    /// 找到编号最低的空闲资源并返回其绝对编号
    pub fn allocate(&self, block_device: &Arc<dyn BlockDevice>, kind: BitmapKind) -> Result<u32> {
        let no = self
            .bitmap(kind)
            .find_free(block_device)?
            .ok_or(Error::NoSpace(kind))?;
        log::debug!("found free {kind} {no}");
        Ok(no)
    }

    pub fn set_bit(
        &self,
        block_device: &Arc<dyn BlockDevice>,
        kind: BitmapKind,
        resource_no: u32,
        used: bool,
    ) -> Result<()> {
        self.bitmap(kind).set(block_device, resource_no, used)
    }

    /// 分配并立即提交
    pub fn claim(&self, block_device: &Arc<dyn BlockDevice>, kind: BitmapKind) -> Result<u32> {
        let no = self.allocate(block_device, kind)?;
        self.set_bit(block_device, kind, no, true)?;
        Ok(no)
    }

    #[inline]
    pub fn is_set(
        &self,
        block_device: &Arc<dyn BlockDevice>,
        kind: BitmapKind,
        resource_no: u32,
    ) -> Result<bool> {
        self.bitmap(kind).is_set(block_device, resource_no)
    }

    pub fn count_free(&self, block_device: &Arc<dyn BlockDevice>, kind: BitmapKind) -> Result<u32> {
        let bitmap = self.bitmap(kind);
        Ok(bitmap.capacity() - bitmap.count_used(block_device)?)
    }
}

#[cfg(test)]
mod tests {
    use block_dev::MemDisk;

    use super::*;
    use crate::BLOCK_SIZE;

    fn disk(blocks: usize) -> Arc<dyn BlockDevice> {
        Arc::new(MemDisk::new(blocks, BLOCK_SIZE))
    }

    #[test]
    fn finds_lowest_free_bit() {
        let dev = disk(4);
        let bitmap = Bitmap::new(BitmapKind::Block, 1, 1, 100, 0);
        assert_eq!(bitmap.find_free(&dev).unwrap(), Some(0));

        bitmap.reserve(&dev, 0..19).unwrap();
        assert_eq!(bitmap.find_free(&dev).unwrap(), Some(19));

        bitmap.set(&dev, 5, false).unwrap();
        assert_eq!(bitmap.find_free(&dev).unwrap(), Some(5));
    }

    #[test]
    fn capacity_bounds_allocation() {
        let dev = disk(4);
        let bitmap = Bitmap::new(BitmapKind::Inode, 1, 1, 10, 1);
        bitmap.reserve(&dev, 0..10).unwrap();
        assert_eq!(bitmap.find_free(&dev).unwrap(), None);
        assert_eq!(bitmap.count_used(&dev).unwrap(), 10);
        assert_eq!(bitmap.set(&dev, 10, true), Err(Error::InvalidInode(10)));
    }

    #[test]
    fn crosses_into_next_bitmap_block() {
        let dev = disk(4);
        let bitmap = Bitmap::new(BitmapKind::Block, 1, 2, 5000, 0);
        bitmap.reserve(&dev, 0..4100).unwrap();
        assert_eq!(bitmap.find_free(&dev).unwrap(), Some(4100));
        assert!(bitmap.is_set(&dev, 4099).unwrap());
        assert!(!bitmap.is_set(&dev, 4100).unwrap());
        assert_eq!(bitmap.count_used(&dev).unwrap(), 4100);
    }

    #[test]
    fn set_is_idempotent_and_reserved_bits_stay() {
        let dev = disk(4);
        let bitmap = Bitmap::new(BitmapKind::Block, 1, 1, 64, 8);
        bitmap.reserve(&dev, 0..8).unwrap();

        bitmap.set(&dev, 9, true).unwrap();
        bitmap.set(&dev, 9, true).unwrap();
        assert_eq!(bitmap.count_used(&dev).unwrap(), 9);

        bitmap.set(&dev, 9, false).unwrap();
        bitmap.set(&dev, 9, false).unwrap();
        assert!(!bitmap.is_set(&dev, 9).unwrap());

        assert_eq!(bitmap.set(&dev, 3, false), Err(Error::Reserved(3)));
        assert!(bitmap.is_set(&dev, 3).unwrap());
    }

    #[test]
    fn allocate_does_not_commit() {
        let dev = disk(8);
        let sb = SuperBlock::compute_geometry(8).unwrap();
        let allocator = BitmapAllocator::new(&sb);
        allocator
            .bitmap(BitmapKind::Block)
            .reserve(&dev, 0..sb.data_region_start)
            .unwrap();

        let first = allocator.allocate(&dev, BitmapKind::Block).unwrap();
        assert_eq!(first, sb.data_region_start);
        assert_eq!(allocator.allocate(&dev, BitmapKind::Block).unwrap(), first);

        allocator.set_bit(&dev, BitmapKind::Block, first, true).unwrap();
        assert_eq!(allocator.allocate(&dev, BitmapKind::Block).unwrap(), first + 1);
        assert_eq!(allocator.count_free(&dev, BitmapKind::Block).unwrap(), 8 - first - 1);
    }
}
