//! # 块读写
//!
//! 所有磁盘访问都以整块为单位：读出整块、在内存里修改、再整块写回。
//! 这里不做缓存，缓存属于宿主环境。

use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::{BLOCK_SIZE, DataBlock, Result};

pub fn read(block_id: u32, block_device: &Arc<dyn BlockDevice>) -> Result<DataBlock> {
    let mut data = [0; BLOCK_SIZE];
    block_device.read_block(block_id as usize, &mut data)?;
    Ok(data)
}

#[inline]
pub fn write(block_id: u32, data: &DataBlock, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
    block_device.write_block(block_id as usize, data)?;
    Ok(())
}

/// 读取块并处理
#[inline]
pub fn map<V>(
    block_id: u32,
    block_device: &Arc<dyn BlockDevice>,
    f: impl FnOnce(&DataBlock) -> V,
) -> Result<V> {
    read(block_id, block_device).map(|data| f(&data))
}

/// 读-改-写：闭包返回 `Err` 时不写回
pub fn map_mut<V>(
    block_id: u32,
    block_device: &Arc<dyn BlockDevice>,
    f: impl FnOnce(&mut DataBlock) -> Result<V>,
) -> Result<V> {
    let mut data = read(block_id, block_device)?;
    let value = f(&mut data)?;
    write(block_id, &data, block_device)?;
    Ok(value)
}

pub fn zeroize(blocks: core::ops::Range<u32>, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
    let zero = [0; BLOCK_SIZE];
    for block_id in blocks {
        write(block_id, &zero, block_device)?;
    }
    Ok(())
}
