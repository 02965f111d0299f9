//! # 目录项索引
//!
//! 目录的数据块里从头连续存放 [`DirRecord`]，个数记在目录 inode 的大小字段里。
//! 追加只发生在目录的第一块内，写满即报 [`Error::DirectoryFull`]；
//! 枚举则按持有的块依次读取，读够声明的个数即止。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::block_io;
use crate::inode_store::InodeStore;
use crate::layout::{DirRecord, Inode, Payload, RECORDS_PER_BLOCK, read_record, write_record};
use crate::{BLOCK_SIZE, Error, Result};

/// 枚举目录得到的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub ino: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectoryIndex {
    inodes: InodeStore,
}

impl DirectoryIndex {
    #[inline]
    pub fn new(inodes: InodeStore) -> Self {
        Self { inodes }
    }

    /// 在目录的第一块中按名字查找，返回 inode 编号
    pub fn lookup(
        &self,
        dir: &Inode,
        name: &str,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<Option<u32>> {
        let children = children(dir)?;
        if children > RECORDS_PER_BLOCK {
            return Err(Error::Corrupted("directory entries exceed the first block"));
        }
        let Some(&first) = dir.blocks().first() else {
            return empty_dir(children).map(|_| None);
        };

        let block = block_io::read(first, block_device)?;
        for slot in 0..children {
            let record = read_record(&block, DirRecord::offset(slot), DirRecord::decode)?;
            if record.matches(name) {
                return Ok(Some(record.inode_id()));
            }
        }

        Ok(None)
    }

    /// 读出目录下全部目录项；末块只读到声明的个数为止
    pub fn list(&self, dir: &Inode, block_device: &Arc<dyn BlockDevice>) -> Result<Vec<DirEntry>> {
        let children = children(dir)?;
        if children > dir.blocks().len() * RECORDS_PER_BLOCK {
            return Err(Error::Corrupted("directory entries exceed owned blocks"));
        }

        let mut entries = Vec::with_capacity(children);
        for &block_id in dir.blocks() {
            let remaining = children - entries.len();
            if remaining == 0 {
                break;
            }

            let block = block_io::read(block_id, block_device)?;
            for slot in 0..remaining.min(RECORDS_PER_BLOCK) {
                let record = read_record(&block, DirRecord::offset(slot), DirRecord::decode)?;
                entries.push(DirEntry {
                    name: String::from(record.name()?),
                    ino: record.inode_id(),
                });
            }
        }

        Ok(entries)
    }

    /// 在现有目录项之后追加一条，并把新的子项个数写回目录 inode。
    /// 第一块已满时什么也不写。
    pub fn append(
        &self,
        dir: &mut Inode,
        name: &str,
        ino: u32,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<()> {
        let children = children(dir)?;
        let &first = dir
            .blocks()
            .first()
            .ok_or(Error::Corrupted("directory owns no block"))?;
        if children >= RECORDS_PER_BLOCK {
            log::warn!("directory {} is full, refusing {name:?}", dir.ino);
            return Err(Error::DirectoryFull);
        }

        let record = DirRecord::new(name, ino)?;
        block_io::map_mut(first, block_device, |block| {
            write_record(block, DirRecord::offset(children), |raw| record.encode(raw))
        })?;

        dir.payload = Payload::Directory {
            children: children as u32 + 1,
        };
        self.inodes.write(dir.ino, dir, block_device)?;
        log::debug!("directory {}: {name:?} -> {ino}", dir.ino);
        Ok(())
    }

    /// 新目录的第一块：`.` 指向自己，`..` 指向父目录，其余清零
    pub fn init_block(
        &self,
        block_id: u32,
        ino: u32,
        parent: u32,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<()> {
        let mut block = [0; BLOCK_SIZE];
        for (slot, (name, target)) in [(".", ino), ("..", parent)].into_iter().enumerate() {
            let record = DirRecord::new(name, target)?;
            write_record(&mut block, DirRecord::offset(slot), |raw| record.encode(raw))?;
        }
        block_io::write(block_id, &block, block_device)
    }
}

fn children(dir: &Inode) -> Result<usize> {
    dir.children()
        .map(|children| children as usize)
        .ok_or(Error::NotADirectory(dir.ino))
}

#[inline]
fn empty_dir(children: usize) -> Result<()> {
    if children == 0 {
        Ok(())
    } else {
        Err(Error::Corrupted("directory owns no block"))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use block_dev::MemDisk;

    use super::*;
    use crate::layout::{Mode, SuperBlock};

    struct Fixture {
        dev: Arc<dyn BlockDevice>,
        index: DirectoryIndex,
        dir: Inode,
    }

    /// 16 块的盘，目录 inode 3 持有数据块 9
    fn fixture() -> Fixture {
        let sb = SuperBlock::compute_geometry(16).unwrap();
        let dev: Arc<dyn BlockDevice> = Arc::new(MemDisk::new(16, BLOCK_SIZE));
        let store = InodeStore::new(&sb);
        let index = DirectoryIndex::new(store);

        let mut dir = Inode::new(3, Mode::from_bits(0o040755).unwrap(), 0);
        dir.push_block(9).unwrap();
        dir.payload = Payload::Directory { children: 2 };
        index.init_block(9, 3, 0, &dev).unwrap();
        store.write(3, &dir, &dev).unwrap();

        Fixture { dev, index, dir }
    }

    fn entry(name: &str, ino: u32) -> DirEntry {
        DirEntry {
            name: name.into(),
            ino,
        }
    }

    #[test]
    fn dot_entries() {
        let Fixture { dev, index, dir } = fixture();
        assert_eq!(
            index.list(&dir, &dev).unwrap(),
            vec![entry(".", 3), entry("..", 0)]
        );
        assert_eq!(index.lookup(&dir, "..", &dev).unwrap(), Some(0));
        assert_eq!(index.lookup(&dir, "missing", &dev).unwrap(), None);
    }

    #[test]
    fn append_persists_count() {
        let Fixture { dev, index, mut dir } = fixture();
        index.append(&mut dir, "a", 5, &dev).unwrap();
        assert_eq!(dir.children(), Some(3));

        let reloaded = index.inodes.read(3, &dev).unwrap();
        assert_eq!(reloaded.children(), Some(3));
        assert_eq!(index.lookup(&reloaded, "a", &dev).unwrap(), Some(5));
    }

    #[test]
    fn append_refuses_past_first_block() {
        let Fixture { dev, index, mut dir } = fixture();
        index.append(&mut dir, "a", 5, &dev).unwrap();
        let before = block_io::read(9, &dev).unwrap();

        assert_eq!(index.append(&mut dir, "b", 6, &dev), Err(Error::DirectoryFull));
        assert_eq!(block_io::read(9, &dev).unwrap(), before);
        assert_eq!(block_io::read(10, &dev).unwrap(), [0; BLOCK_SIZE]);
        assert_eq!(dir.children(), Some(3));
    }

    #[test]
    fn list_stops_at_declared_count() {
        let Fixture { dev, index, mut dir } = fixture();
        // 第二块写满三条，但只声明其中一条有效
        let mut block = [0; BLOCK_SIZE];
        for (slot, name) in ["x", "y", "z"].into_iter().enumerate() {
            let record = DirRecord::new(name, 10 + slot as u32).unwrap();
            write_record(&mut block, DirRecord::offset(slot), |raw| record.encode(raw)).unwrap();
        }
        block_io::write(10, &block, &dev).unwrap();
        index.append(&mut dir, "a", 5, &dev).unwrap();
        dir.push_block(10).unwrap();
        dir.payload = Payload::Directory { children: 4 };

        assert_eq!(
            index.list(&dir, &dev).unwrap(),
            vec![entry(".", 3), entry("..", 0), entry("a", 5), entry("x", 10)]
        );

        dir.payload = Payload::Directory { children: 7 };
        assert!(matches!(index.list(&dir, &dev), Err(Error::Corrupted(_))));
    }

    #[test]
    fn files_are_not_directories() {
        let Fixture { dev, index, .. } = fixture();
        let file = Inode::new(4, Mode::from_bits(0o100644).unwrap(), 0);
        assert_eq!(index.list(&file, &dev), Err(Error::NotADirectory(4)));
        assert_eq!(index.lookup(&file, "a", &dev), Err(Error::NotADirectory(4)));
    }
}
