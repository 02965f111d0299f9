mod common;

use common::{formatted, init_logger, mem_disk};
use naive_fs::{BitmapAllocator, BitmapKind, Error, ROOT_INO, SuperBlock};

#[test]
fn first_data_block_of_sixteen() {
    init_logger();
    let (disk, dev) = mem_disk(16);
    let sb = SuperBlock::compute_geometry(16).unwrap();
    sb.persist(&dev).unwrap();

    let allocator = BitmapAllocator::new(&sb);
    allocator
        .bitmap(BitmapKind::Block)
        .reserve(&dev, 0..sb.data_region_start)
        .unwrap();

    let block = allocator.allocate(&dev, BitmapKind::Block).unwrap();
    assert_eq!(block, 8);
    allocator.set_bit(&dev, BitmapKind::Block, block, true).unwrap();

    // 重新从盘上读出布局与位图
    let reloaded = BitmapAllocator::new(&SuperBlock::load(&dev).unwrap());
    assert!(reloaded.is_set(&dev, BitmapKind::Block, 8).unwrap());
    assert_eq!(disk.snapshot()[2 * 512 + 1] & 1, 1);
    assert_eq!(reloaded.allocate(&dev, BitmapKind::Block).unwrap(), 9);
}

#[test]
fn allocate_does_not_commit() {
    let (dev, volume) = formatted(16);
    let allocator = volume.allocator();

    let first = allocator.allocate(&dev, BitmapKind::Inode).unwrap();
    assert_eq!(first, 1);
    assert_eq!(allocator.allocate(&dev, BitmapKind::Inode).unwrap(), first);

    allocator.set_bit(&dev, BitmapKind::Inode, first, true).unwrap();
    let second = allocator.allocate(&dev, BitmapKind::Inode).unwrap();
    assert!(second > first);

    allocator.set_bit(&dev, BitmapKind::Inode, second, true).unwrap();
    allocator.set_bit(&dev, BitmapKind::Inode, first, false).unwrap();
    assert_eq!(allocator.allocate(&dev, BitmapKind::Inode).unwrap(), first);
}

#[test]
fn formatted_volume_hands_out_block_nine() {
    let (dev, volume) = formatted(16);
    assert_eq!(volume.allocator().allocate(&dev, BitmapKind::Block).unwrap(), 9);
}

#[test]
fn reserved_bits_stay_set() {
    let (dev, volume) = formatted(16);
    let allocator = volume.allocator();

    assert_eq!(
        allocator.set_bit(&dev, BitmapKind::Block, 4, false),
        Err(Error::Reserved(4))
    );
    assert_eq!(
        allocator.set_bit(&dev, BitmapKind::Inode, ROOT_INO, false),
        Err(Error::Reserved(ROOT_INO))
    );
    assert_eq!(
        allocator.set_bit(&dev, BitmapKind::Block, 16, true),
        Err(Error::InvalidBlock(16))
    );
}

#[test]
fn exhaustion_reports_no_space() {
    let (dev, volume) = formatted(16);
    let allocator = volume.allocator();

    let blocks: Vec<_> = (0..7)
        .map(|_| allocator.claim(&dev, BitmapKind::Block).unwrap())
        .collect();
    assert_eq!(blocks, (9..16).collect::<Vec<_>>());
    assert_eq!(
        allocator.allocate(&dev, BitmapKind::Block),
        Err(Error::NoSpace(BitmapKind::Block))
    );

    for _ in 1..16 {
        allocator.claim(&dev, BitmapKind::Inode).unwrap();
    }
    assert_eq!(
        allocator.claim(&dev, BitmapKind::Inode),
        Err(Error::NoSpace(BitmapKind::Inode))
    );
    assert_eq!(allocator.count_free(&dev, BitmapKind::Inode).unwrap(), 0);
}

#[test]
fn mkdir_chain_runs_out_of_blocks() {
    let (_, mut volume) = formatted(16);

    // 每个目录除 `.`、`..` 外只剩一个槽位，正好挂下一级子目录
    let mut parent = ROOT_INO;
    for depth in 0..7 {
        parent = volume.mkdir(parent, &format!("d{depth}"), 0o755).unwrap();
    }
    assert_eq!(
        volume.mkdir(parent, "last", 0o755),
        Err(Error::NoSpace(BitmapKind::Block))
    );
    assert_eq!(
        volume.find_path("/d0/d1/d2/d3/d4/d5/d6").unwrap(),
        parent
    );
}
