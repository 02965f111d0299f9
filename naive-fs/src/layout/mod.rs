//! # 磁盘数据结构层
//!
//! naive-fs 的磁盘布局：
//! 引导块 | 超级块 | 数据块位图 | inode 位图 | inode 表 | 数据块区域
//!
//! 所有记录都按小端序逐字段编解码，不直接把块缓冲区转成结构体。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::{Bitmap, BitmapAllocator, BitmapKind};

mod inode;
pub use inode::{FileKind, INODE_SIZE, INODES_PER_BLOCK, Inode, Mode, Payload, Permission};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirRecord, RECORDS_PER_BLOCK, validate_name};

use crate::{DataBlock, Error, Result};

/// 取块内 `offset` 处长度为 `N` 的记录，越界即视为磁盘结构损坏
fn record<const N: usize>(block: &DataBlock, offset: usize) -> Result<&[u8; N]> {
    block
        .get(offset..offset + N)
        .and_then(|raw| raw.try_into().ok())
        .ok_or(Error::Corrupted("record crosses block boundary"))
}

fn record_mut<const N: usize>(block: &mut DataBlock, offset: usize) -> Result<&mut [u8; N]> {
    block
        .get_mut(offset..offset + N)
        .and_then(|raw| raw.try_into().ok())
        .ok_or(Error::Corrupted("record crosses block boundary"))
}

#[inline]
fn get_u32(raw: &[u8], offset: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&raw[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
fn put_u32(raw: &mut [u8], offset: usize, value: u32) {
    raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn get_i64(raw: &[u8], offset: usize) -> i64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&raw[offset..offset + 8]);
    i64::from_le_bytes(bytes)
}

#[inline]
fn put_i64(raw: &mut [u8], offset: usize, value: i64) {
    raw[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// 读取块内第 `offset` 字节起的一条记录并解码
pub fn read_record<const N: usize, T>(
    block: &DataBlock,
    offset: usize,
    decode: impl FnOnce(&[u8; N]) -> Result<T>,
) -> Result<T> {
    decode(record(block, offset)?)
}

/// 把一条记录编码进块内第 `offset` 字节处
pub fn write_record<const N: usize>(
    block: &mut DataBlock,
    offset: usize,
    encode: impl FnOnce(&mut [u8; N]),
) -> Result<()> {
    encode(record_mut(block, offset)?);
    Ok(())
}
