use super::{get_u32, put_u32};
use crate::{Error, Result};
use crate::{BLOCK_SIZE, NAME_MAX_LEN};

/// 一条目录项的字节数
pub const DIR_RECORD_SIZE: usize = 4 + NAME_MAX_LEN;
/// 目录项不跨块存放，块尾不足一条的部分闲置
pub const RECORDS_PER_BLOCK: usize = BLOCK_SIZE / DIR_RECORD_SIZE;

/// 盘上的目录项：inode 编号 + 定长文件名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirRecord {
    inode_id: u32,
    // 名字不足缓冲区长度时以 \0 结尾，恰好占满时没有结尾
    name: [u8; NAME_MAX_LEN],
}

impl DirRecord {
    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_MAX_LEN {
            return Err(Error::NameTooLong(bytes.len()));
        }
        let mut buf = [0; NAME_MAX_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            inode_id,
            name: buf,
        })
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_MAX_LEN);
        &self.name[..len]
    }

    pub fn name(&self) -> Result<&str> {
        core::str::from_utf8(self.name_bytes()).map_err(|_| Error::Corrupted("directory entry name"))
    }

    /// 逐字节比较，不做大小写折叠
    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    /// 第 `slot` 条目录项的块内偏移
    #[inline]
    pub fn offset(slot: usize) -> usize {
        slot * DIR_RECORD_SIZE
    }

    pub fn decode(raw: &[u8; DIR_RECORD_SIZE]) -> Result<Self> {
        let mut name = [0; NAME_MAX_LEN];
        name.copy_from_slice(&raw[4..]);
        Ok(Self {
            inode_id: get_u32(raw, 0),
            name,
        })
    }

    pub fn encode(&self, raw: &mut [u8; DIR_RECORD_SIZE]) {
        put_u32(raw, 0, self.inode_id);
        raw[4..].copy_from_slice(&self.name);
    }
}

/// 在调用边界检查新名字
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.bytes().any(|c| c == b'/' || c == 0) {
        return Err(Error::InvalidName);
    }
    if name.len() > NAME_MAX_LEN {
        return Err(Error::NameTooLong(name.len()));
    }
    Ok(())
}
