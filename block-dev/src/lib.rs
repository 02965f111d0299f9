//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过块设备驱动读写块设备，不关心其背后是硬件、镜像文件还是内存。

#![no_std]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;

use derive_more::Display;
use spin::Mutex;

/// 块设备驱动特质
///
/// 读写都是同步的，返回即视为已落盘。
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error>;
}

/// 块设备驱动报告的错误，文件系统原样向上传递
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "block {} is beyond the end of the device", _0)]
    OutOfRange(usize),
    #[display(fmt = "buffer of {} bytes does not match the block size", _0)]
    BadBuffer(usize),
    #[display(fmt = "short transfer on block {}", _0)]
    ShortTransfer(usize),
    #[display(fmt = "device I/O failure")]
    Io,
}

/// 内存盘：整块设备放在一段连续内存里
#[derive(Debug)]
pub struct MemDisk {
    block_size: usize,
    data: Mutex<Vec<u8>>,
}

impl MemDisk {
    pub fn new(num_blocks: usize, block_size: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(vec![0; num_blocks * block_size]),
        }
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.data.lock().len() / self.block_size
    }

    /// 整盘快照，便于比对镜像内容
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn range(&self, block_id: usize, len: usize) -> Result<core::ops::Range<usize>, Error> {
        if len != self.block_size {
            return Err(Error::BadBuffer(len));
        }
        if block_id >= self.num_blocks() {
            return Err(Error::OutOfRange(block_id));
        }
        let start = block_id * self.block_size;
        Ok(start..start + self.block_size)
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        let range = self.range(block_id, buf.len())?;
        self.data.lock()[range].copy_from_slice(buf);
        Ok(())
    }
}
