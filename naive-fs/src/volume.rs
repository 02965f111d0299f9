//! # 卷
//!
//! 构建出磁盘的布局并使用：格式化、挂载，以及在目录下创建文件或子目录。
//!
//! 一个 [`Volume`] 独占地持有一块设备上的文件系统；
//! 修改操作都要求 `&mut self`，同一时刻只有一个操作在进行。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use block_dev::BlockDevice;
use enumflags2::BitFlags;

use crate::block_io;
use crate::dir::{DirEntry, DirectoryIndex};
use crate::inode_store::InodeStore;
use crate::layout::*;
use crate::{Error, Result};
use crate::{BOOT_BLOCK, ROOT_INO};

/// 时间来源，返回自 Unix 纪元起的秒数
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// 恒为0的时钟，供没有时间来源的环境使用
#[derive(Debug, Default, Clone, Copy)]
pub struct Epoch;

impl Clock for Epoch {
    #[inline]
    fn now(&self) -> i64 {
        0
    }
}

#[derive(Clone)]
pub struct FormatOptions {
    /// 根目录的属主
    pub uid: u32,
    pub gid: u32,
    /// 根目录的权限位
    pub root_perm: BitFlags<Permission>,
    /// 是否在根目录下预置一个空文件 [`FormatOptions::WELCOME`]
    pub welcome: bool,
    pub clock: Arc<dyn Clock>,
}

impl FormatOptions {
    pub const WELCOME: &'static str = "welcome";
    const WELCOME_MODE: u32 = 0o644;
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            uid: 0,
            gid: 0,
            root_perm: BitFlags::from_bits_truncate(0o755),
            welcome: false,
            clock: Arc::new(Epoch),
        }
    }
}

pub struct Volume {
    block_device: Arc<dyn BlockDevice>,
    super_block: SuperBlock,
    allocator: BitmapAllocator,
    inodes: InodeStore,
    dirs: DirectoryIndex,
    clock: Arc<dyn Clock>,
}

impl Volume {
    /// 在 `block_total` 块的设备上写出一个全新的文件系统并返回挂载好的卷
    pub fn format(
        block_device: Arc<dyn BlockDevice>,
        block_total: u32,
        options: &FormatOptions,
    ) -> Result<Self> {
        let super_block = SuperBlock::compute_geometry(block_total)?;
        // 先确认设备真有这么多块，再动盘上的任何内容
        block_io::read(block_total - 1, &block_device).map_err(|err| match err {
            Error::Device(block_dev::Error::OutOfRange(_)) => Error::DeviceTooSmall(block_total),
            err => err,
        })?;
        log::info!(
            "formatting {block_total} blocks: {} inodes, inode table at {}, data at {}",
            super_block.inode_total,
            super_block.inode_table_start,
            super_block.data_region_start
        );

        // 引导块、超级块、两张位图与 inode 表
        block_io::zeroize(BOOT_BLOCK..super_block.data_region_start, &block_device)?;
        super_block.persist(&block_device)?;

        let mut volume = Self::assemble(block_device, super_block, options.clock.clone());
        let block_device = &volume.block_device;
        let allocator = volume.allocator;

        allocator
            .bitmap(BitmapKind::Block)
            .reserve(block_device, 0..super_block.data_region_start)?;
        allocator
            .bitmap(BitmapKind::Inode)
            .reserve(block_device, ROOT_INO..ROOT_INO + 1)?;

        let root_block = allocator.claim(block_device, BitmapKind::Block)?;
        volume
            .dirs
            .init_block(root_block, ROOT_INO, ROOT_INO, block_device)?;

        let mut root = Inode::new(
            ROOT_INO,
            Mode::new(FileKind::Directory, options.root_perm),
            volume.clock.now(),
        );
        root.uid = options.uid;
        root.gid = options.gid;
        root.push_block(root_block)?;
        root.payload = Payload::Directory { children: 2 };
        volume.inodes.write(ROOT_INO, &root, block_device)?;

        if options.welcome {
            volume.create(ROOT_INO, FormatOptions::WELCOME, FormatOptions::WELCOME_MODE)?;
        }

        Ok(volume)
    }

    /// 挂载已格式化的设备，此后新建的 inode 由 `clock` 打时间戳
    pub fn mount(block_device: Arc<dyn BlockDevice>, clock: Arc<dyn Clock>) -> Result<Self> {
        let super_block = SuperBlock::load(&block_device)?;
        let volume = Self::assemble(block_device, super_block, clock);
        if !volume.read_inode(ROOT_INO)?.is_dir() {
            return Err(Error::Corrupted("root inode is not a directory"));
        }
        log::info!(
            "mounted {} blocks, {} inodes",
            super_block.block_total,
            super_block.inode_total
        );
        Ok(volume)
    }

    /// 替换新建 inode 时使用的时间来源
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn assemble(
        block_device: Arc<dyn BlockDevice>,
        super_block: SuperBlock,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inodes = InodeStore::new(&super_block);
        Self {
            block_device,
            super_block,
            allocator: BitmapAllocator::new(&super_block),
            inodes,
            dirs: DirectoryIndex::new(inodes),
            clock,
        }
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    #[inline]
    pub fn block_device(&self) -> &Arc<dyn BlockDevice> {
        &self.block_device
    }

    #[inline]
    pub fn allocator(&self) -> &BitmapAllocator {
        &self.allocator
    }

    /// 读取已分配的 inode
    pub fn read_inode(&self, ino: u32) -> Result<Inode> {
        self.check_allocated(ino)?;
        self.inodes.read(ino, &self.block_device)
    }

    pub fn write_inode(&mut self, ino: u32, inode: &Inode) -> Result<()> {
        self.check_allocated(ino)?;
        self.inodes.write(ino, inode, &self.block_device)
    }

    /// 在目录下按名字查找
    pub fn lookup(&self, dir_ino: u32, name: &str) -> Result<Option<u32>> {
        let dir = self.read_inode(dir_ino)?;
        self.dirs.lookup(&dir, name, &self.block_device)
    }

    /// 同 [`Volume::lookup`]，找不到时报 [`Error::NotFound`]
    pub fn resolve(&self, dir_ino: u32, name: &str) -> Result<u32> {
        self.lookup(dir_ino, name)?.ok_or(Error::NotFound)
    }

    /// 从根目录起逐级解析 `/` 分隔的路径
    pub fn find_path(&self, path: &str) -> Result<u32> {
        path.split('/')
            .filter(|name| !name.is_empty())
            .try_fold(ROOT_INO, |ino, name| self.resolve(ino, name))
    }

    pub fn list(&self, dir_ino: u32) -> Result<Vec<DirEntry>> {
        let dir = self.read_inode(dir_ino)?;
        self.dirs.list(&dir, &self.block_device)
    }

    /// 在 `parent` 下新建一项。`mode` 不带类型位时视为普通文件。
    pub fn create(&mut self, parent: u32, name: &str, mode: u32) -> Result<u32> {
        let mode = Mode::from_bits_or(mode, FileKind::File)?;
        self.create_node(parent, name, mode)
    }

    /// 在 `parent` 下新建子目录；无论 `mode` 是否带目录位都按目录处理，
    /// 带了别的类型位则报 [`Error::UnsupportedType`]
    pub fn mkdir(&mut self, parent: u32, name: &str, mode: u32) -> Result<u32> {
        let mode = Mode::from_bits(mode | FileKind::Directory.type_bits())?;
        self.create_node(parent, name, mode)
    }

    /// 分配 inode（目录还要分配一个数据块）、写入 inode，再登记到父目录。
    ///
    /// 各步之间不回滚：登记失败时新分配的 inode 与数据块保持已用。
    fn create_node(&mut self, parent: u32, name: &str, mode: Mode) -> Result<u32> {
        validate_name(name)?;

        let block_device = &self.block_device;
        let mut parent_inode = self.read_inode(parent)?;
        if !parent_inode.is_dir() {
            return Err(Error::NotADirectory(parent));
        }
        // 确认没有已创建的同名项
        if self.dirs.lookup(&parent_inode, name, block_device)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        let ino = self.allocator.allocate(block_device, BitmapKind::Inode)?;
        self.allocator
            .set_bit(block_device, BitmapKind::Inode, ino, true)?;

        let now = self.clock.now();
        let mut inode = Inode::new(ino, mode, now);
        inode.uid = parent_inode.uid;
        inode.gid = parent_inode.gid;

        match mode.kind {
            FileKind::Directory => {
                let block_id = self.allocator.allocate(block_device, BitmapKind::Block)?;
                self.allocator
                    .set_bit(block_device, BitmapKind::Block, block_id, true)?;
                self.dirs.init_block(block_id, ino, parent, block_device)?;

                inode.push_block(block_id)?;
                inode.payload = Payload::Directory { children: 2 };
                // 子目录的 `..`
                parent_inode.nlink += 1;
            }
            FileKind::File => inode.payload = Payload::File { size: 0 },
        }
        self.inodes.write(ino, &inode, block_device)?;

        parent_inode.mtime = now;
        parent_inode.ctime = now;
        self.dirs
            .append(&mut parent_inode, name, ino, block_device)?;

        log::debug!("created {:?} {name:?} as inode {ino} under {parent}", mode.kind);
        Ok(ino)
    }

    fn check_allocated(&self, ino: u32) -> Result<()> {
        if self
            .allocator
            .is_set(&self.block_device, BitmapKind::Inode, ino)?
        {
            Ok(())
        } else {
            Err(Error::InvalidInode(ino))
        }
    }
}

impl fmt::Debug for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Volume")
            .field("super_block", &self.super_block)
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use block_dev::MemDisk;

    use super::*;
    use crate::BLOCK_SIZE;

    struct Fixed(i64);

    impl Clock for Fixed {
        fn now(&self) -> i64 {
            self.0
        }
    }

    fn fresh(blocks: u32) -> Volume {
        let dev: Arc<dyn BlockDevice> = Arc::new(MemDisk::new(blocks as usize, BLOCK_SIZE));
        let options = FormatOptions {
            uid: 1000,
            gid: 100,
            clock: Arc::new(Fixed(1_600_000_000)),
            ..Default::default()
        };
        Volume::format(dev, blocks, &options).unwrap()
    }

    #[test]
    fn root_after_format() {
        let volume = fresh(16);
        let root = volume.read_inode(ROOT_INO).unwrap();
        assert!(root.is_dir());
        assert_eq!(root.children(), Some(2));
        assert_eq!(root.blocks(), &[8]);
        assert_eq!(root.nlink, 2);
        assert_eq!((root.uid, root.gid), (1000, 100));
        assert_eq!(root.mtime, 1_600_000_000);
        assert_eq!(root.mode().bits(), 0o040755);

        let names: Vec<_> = volume
            .list(ROOT_INO)
            .unwrap()
            .into_iter()
            .map(|entry| (entry.name, entry.ino))
            .collect();
        assert_eq!(names, vec![(".".to_string(), 0), ("..".to_string(), 0)]);
    }

    #[test]
    fn new_nodes_inherit_owner_and_clock() {
        let mut volume = fresh(16).with_clock(Arc::new(Fixed(42)));
        let ino = volume.create(ROOT_INO, "a", 0o600).unwrap();
        let inode = volume.read_inode(ino).unwrap();
        assert_eq!(inode.mode().bits(), 0o100600);
        assert_eq!((inode.uid, inode.gid), (1000, 100));
        assert_eq!((inode.atime, inode.ctime, inode.mtime), (42, 42, 42));
        assert_eq!(inode.nlink, 1);
        assert_eq!(inode.size(), Some(0));
        assert!(inode.blocks().is_empty());

        let root = volume.read_inode(ROOT_INO).unwrap();
        assert_eq!(root.mtime, 42);
    }

    #[test]
    fn mkdir_links_parent() {
        let mut volume = fresh(16);
        let sub = volume.mkdir(ROOT_INO, "sub", 0o700).unwrap();
        assert_eq!(sub, 1);

        let inode = volume.read_inode(sub).unwrap();
        assert_eq!(inode.mode().bits(), 0o040700);
        assert_eq!(inode.nlink, 2);
        assert_eq!(inode.blocks(), &[9]);
        assert_eq!(volume.read_inode(ROOT_INO).unwrap().nlink, 3);
    }

    #[test]
    fn mkdir_rejects_conflicting_type() {
        let mut volume = fresh(16);
        assert_eq!(
            volume.mkdir(ROOT_INO, "x", 0o100644),
            Err(Error::UnsupportedType(0o140644))
        );
        assert_eq!(
            volume.create(ROOT_INO, "y", 0o120777),
            Err(Error::UnsupportedType(0o120777))
        );
        assert_eq!(volume.list(ROOT_INO).unwrap().len(), 2);
    }

    #[test]
    fn create_checks_arguments() {
        let mut volume = fresh(16);
        let file = volume.create(ROOT_INO, "f", 0o644).unwrap();

        assert_eq!(volume.create(ROOT_INO, "f", 0o644), Err(Error::AlreadyExists));
        assert_eq!(volume.create(ROOT_INO, "..", 0o644), Err(Error::AlreadyExists));
        assert_eq!(volume.create(file, "g", 0o644), Err(Error::NotADirectory(file)));
        assert_eq!(volume.create(ROOT_INO, "a/b", 0o644), Err(Error::InvalidName));
        assert_eq!(volume.create(9, "g", 0o644), Err(Error::InvalidInode(9)));
        assert_eq!(volume.create(99, "g", 0o644), Err(Error::InvalidInode(99)));
    }

    #[test]
    fn full_directory_leaks_without_rollback() {
        let mut volume = fresh(16);
        assert_eq!(RECORDS_PER_BLOCK, 3);
        volume.create(ROOT_INO, "one", 0o644).unwrap();

        let free_before = volume
            .allocator()
            .count_free(volume.block_device(), BitmapKind::Inode)
            .unwrap();
        assert_eq!(volume.mkdir(ROOT_INO, "two", 0o755), Err(Error::DirectoryFull));
        let dev = volume.block_device();
        assert_eq!(
            volume.allocator().count_free(dev, BitmapKind::Inode).unwrap(),
            free_before - 1
        );
        assert!(volume.allocator().is_set(dev, BitmapKind::Block, 9).unwrap());
        assert_eq!(volume.read_inode(ROOT_INO).unwrap().nlink, 2);
    }

    #[test]
    fn welcome_seed() {
        let dev: Arc<dyn BlockDevice> = Arc::new(MemDisk::new(16, BLOCK_SIZE));
        let options = FormatOptions {
            welcome: true,
            ..Default::default()
        };
        let volume = Volume::format(dev, 16, &options).unwrap();
        assert_eq!(volume.read_inode(ROOT_INO).unwrap().children(), Some(3));
        assert_eq!(volume.resolve(ROOT_INO, FormatOptions::WELCOME).unwrap(), 1);
        assert_eq!(volume.find_path("/welcome").unwrap(), 1);
        assert_eq!(volume.find_path("/").unwrap(), ROOT_INO);
        assert_eq!(volume.find_path("/nope"), Err(Error::NotFound));
    }
}
