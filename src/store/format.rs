//! 存储文件的定长记录格式（全部小端）。
//!
//! - `.idx`：每条序列一个 [`SeqRecord`]（40 字节）
//! - `.amb`：每段歧义碱基一个 [`AmbRun`]（12 字节）
//! - `.vol`：魔数 + 版本 + 数量，随后是 [`VolumeDescriptor`]（72 字节），下标 0 为整库哨兵

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const VOLUME_MAGIC: &[u8; 4] = b"LSVL";
pub const VOLUME_VERSION: u32 = 1;
/// 魔数 + 版本 + 描述符数量
pub const VOLUME_HEADER_SIZE: u64 = 4 + 4 + 4;

/// 单条序列的磁盘记录，偏移均相对整个后备文件（全局偏移）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRecord {
    /// `.pac` 中的字节偏移
    pub pac_offset: u64,
    /// `.hdr` 中的字节偏移
    pub header_offset: u64,
    /// `.amb` 中第一段歧义记录的下标
    pub amb_index: u64,
    pub size: u32,
    /// 不含结尾 NUL
    pub header_len: u32,
    pub amb_count: u32,
}

impl SeqRecord {
    pub const SIZE: u64 = 40;

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.pac_offset)?;
        w.write_u64::<LittleEndian>(self.header_offset)?;
        w.write_u64::<LittleEndian>(self.amb_index)?;
        w.write_u32::<LittleEndian>(self.size)?;
        w.write_u32::<LittleEndian>(self.header_len)?;
        w.write_u32::<LittleEndian>(self.amb_count)?;
        w.write_u32::<LittleEndian>(0)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let pac_offset = r.read_u64::<LittleEndian>()?;
        let header_offset = r.read_u64::<LittleEndian>()?;
        let amb_index = r.read_u64::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        let header_len = r.read_u32::<LittleEndian>()?;
        let amb_count = r.read_u32::<LittleEndian>()?;
        let _reserved = r.read_u32::<LittleEndian>()?;
        Ok(Self { pac_offset, header_offset, amb_index, size, header_len, amb_count })
    }
}

/// 一段连续且相同的歧义碱基，offset 相对所在序列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbRun {
    pub offset: u32,
    pub len: u32,
    pub symbol: u8,
}

impl AmbRun {
    pub const SIZE: u64 = 12;

    /// 区间终点；用 u64 计算，损坏记录不会溢出
    #[inline]
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.len)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.offset)?;
        w.write_u32::<LittleEndian>(self.len)?;
        w.write_all(&[self.symbol, 0, 0, 0])?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let offset = r.read_u32::<LittleEndian>()?;
        let len = r.read_u32::<LittleEndian>()?;
        let mut tail = [0u8; 4];
        r.read_exact(&mut tail)?;
        Ok(Self { offset, len, symbol: tail[0] })
    }
}

/// 一个 volume（分片）的描述符：首条序列全局 id、序列数、碱基数及三个文件中的字节区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeDescriptor {
    pub first_id: u64,
    pub seq_count: u64,
    pub residue_count: u64,
    pub pac_start: u64,
    pub pac_end: u64,
    pub hdr_start: u64,
    pub hdr_end: u64,
    pub amb_start: u64,
    pub amb_end: u64,
}

impl VolumeDescriptor {
    pub const SIZE: u64 = 72;

    /// `.idx` 中本分片记录所占的字节区间；溢出返回 None
    pub fn record_range(&self) -> Option<(u64, u64)> {
        let start = self.first_id.checked_mul(SeqRecord::SIZE)?;
        let end = self.end_id()?.checked_mul(SeqRecord::SIZE)?;
        Some((start, end))
    }

    /// 下一分片的首 id；溢出返回 None
    #[inline]
    pub fn end_id(&self) -> Option<u64> {
        self.first_id.checked_add(self.seq_count)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for v in [
            self.first_id,
            self.seq_count,
            self.residue_count,
            self.pac_start,
            self.pac_end,
            self.hdr_start,
            self.hdr_end,
            self.amb_start,
            self.amb_end,
        ] {
            w.write_u64::<LittleEndian>(v)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut v = [0u64; 9];
        r.read_u64_into::<LittleEndian>(&mut v)?;
        Ok(Self {
            first_id: v[0],
            seq_count: v[1],
            residue_count: v[2],
            pac_start: v[3],
            pac_end: v[4],
            hdr_start: v[5],
            hdr_end: v[6],
            amb_start: v[7],
            amb_end: v[8],
        })
    }
}
