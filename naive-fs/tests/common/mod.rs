#![allow(dead_code)]

use std::sync::Arc;

use block_dev::MemDisk;
use naive_fs::{BLOCK_SIZE, BlockDevice, FormatOptions, Volume};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 同一块内存盘的具体句柄与特质对象句柄
pub fn mem_disk(blocks: u32) -> (Arc<MemDisk>, Arc<dyn BlockDevice>) {
    let disk = Arc::new(MemDisk::new(blocks as usize, BLOCK_SIZE));
    let dev: Arc<dyn BlockDevice> = disk.clone();
    (disk, dev)
}

pub fn formatted(blocks: u32) -> (Arc<dyn BlockDevice>, Volume) {
    init_logger();
    let (_, dev) = mem_disk(blocks);
    let volume = Volume::format(dev.clone(), blocks, &FormatOptions::default()).unwrap();
    (dev, volume)
}

pub fn names(volume: &Volume, dir: u32) -> Vec<(String, u32)> {
    volume
        .list(dir)
        .unwrap()
        .into_iter()
        .map(|entry| (entry.name, entry.ino))
        .collect()
}
