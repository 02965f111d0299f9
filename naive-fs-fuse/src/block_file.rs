use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::{BlockDevice, Error};
use naive_fs::BLOCK_SIZE;

/// 把宿主机上的镜像文件当作块设备
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
}

impl BlockFile {
    pub fn new(file: File) -> Self {
        Self {
            file: Mutex::new(file),
        }
    }

    /// 镜像中完整块的个数，末尾不足一块的部分不计
    pub fn block_count(&self) -> io::Result<u32> {
        let file = self.file.lock().map_err(|_| io::Error::other("image lock poisoned"))?;
        let blocks = file.metadata()?.len() / BLOCK_SIZE as u64;
        u32::try_from(blocks).map_err(|_| io::Error::new(ErrorKind::InvalidInput, "image too large"))
    }

    fn transfer(
        &self,
        block_id: usize,
        len: usize,
        op: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<(), Error> {
        if len != BLOCK_SIZE {
            return Err(Error::BadBuffer(len));
        }
        let mut file = self.file.lock().map_err(|_| Error::Io)?;

        let offset = (block_id * BLOCK_SIZE) as u64;
        let image_len = file.metadata().map_err(|err| io_error(block_id, err))?.len();
        if offset + BLOCK_SIZE as u64 > image_len {
            return Err(Error::OutOfRange(block_id));
        }

        file.seek(SeekFrom::Start(offset))
            .and_then(|_| op(&mut file))
            .map_err(|err| io_error(block_id, err))
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        let len = buf.len();
        self.transfer(block_id, len, |file| file.read_exact(buf))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        self.transfer(block_id, buf.len(), |file| file.write_all(buf))
    }
}

fn io_error(block_id: usize, err: io::Error) -> Error {
    log::error!("block {block_id}: {err}");
    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::WriteZero => Error::ShortTransfer(block_id),
        _ => Error::Io,
    }
}
