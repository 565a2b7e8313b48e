use std::borrow::Cow;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use super::builder::encode_residues;
use super::format::{AmbRun, SeqRecord, VolumeDescriptor};
use super::StorePaths;
use crate::error::{Error, Result};
use crate::util::dna::{self, Strand};
use crate::util::packed::{packed_len, PackedSeq, PackedView};

/// 分片内的序列元数据：所有偏移都已相对本分片重新定基
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSeq {
    /// 本分片 packed 缓冲区中的字节偏移
    pub pac_offset: usize,
    pub header_offset: usize,
    pub header_len: usize,
    /// 本分片歧义记录表中的下标
    pub amb_index: usize,
    pub amb_count: usize,
    pub size: u32,
    /// 在分片坐标轴上的起点（前面所有序列长度之和）
    pub start: u64,
}

impl VolumeSeq {
    #[inline]
    pub fn end(&self) -> u64 {
        self.start + u64::from(self.size)
    }

    /// 由磁盘记录（全局偏移）得到分片内记录；越界说明描述符与记录不一致
    fn rebase(rec: &SeqRecord, desc: &VolumeDescriptor, start: u64) -> Option<Self> {
        let pac_offset = rec.pac_offset.checked_sub(desc.pac_start)?;
        let pac_end = rec.pac_offset.checked_add(packed_len(rec.size as usize) as u64)?;
        let header_offset = rec.header_offset.checked_sub(desc.hdr_start)?;
        let hdr_end = rec.header_offset.checked_add(u64::from(rec.header_len) + 1)?;
        let amb_first = desc.amb_start / AmbRun::SIZE;
        let amb_index = rec.amb_index.checked_sub(amb_first)?;
        let amb_end = rec
            .amb_index
            .checked_add(u64::from(rec.amb_count))?
            .checked_mul(AmbRun::SIZE)?;
        if pac_end > desc.pac_end || hdr_end > desc.hdr_end || amb_end > desc.amb_end {
            return None;
        }
        Some(Self {
            pac_offset: pac_offset as usize,
            header_offset: header_offset as usize,
            header_len: rec.header_len as usize,
            amb_index: amb_index as usize,
            amb_count: rec.amb_count as usize,
            size: rec.size,
            start,
        })
    }
}

/// One loaded shard. Immutable once loaded; share it by reference across
/// search workers.
#[derive(Debug, Clone)]
pub struct Volume {
    index: usize,
    first_id: u64,
    residue_count: u64,
    pac: Vec<u8>,
    headers: Vec<u8>,
    seqs: Vec<VolumeSeq>,
    ambs: Vec<AmbRun>,
}

fn read_range(path: &Path, what: &'static str, start: u64, end: u64) -> Result<Vec<u8>> {
    let actual = std::fs::metadata(path)?.len();
    if start > end || end > actual {
        return Err(Error::CorruptStore { path: path.to_path_buf(), what, start, end, actual });
    }
    let mut buf = vec![0u8; (end - start) as usize];
    if !buf.is_empty() {
        let mut f = File::open(path)?;
        f.seek(SeekFrom::Start(start))?;
        f.read_exact(&mut buf)?;
    }
    Ok(buf)
}

/// 歧义区间按 offset 递增、互不重叠且落在序列内
fn runs_fit(runs: &[AmbRun], size: u32) -> bool {
    let mut prev_end = 0u64;
    for run in runs {
        if u64::from(run.offset) < prev_end || run.end() > u64::from(size) {
            return false;
        }
        prev_end = run.end();
    }
    true
}

impl Volume {
    pub(crate) fn load(paths: &StorePaths, index: usize, desc: &VolumeDescriptor) -> Result<Self> {
        let corrupt = |reason: String| Error::BadDescriptor { path: paths.volumes(), reason };
        let (rec_start, rec_end) = desc
            .record_range()
            .ok_or_else(|| corrupt(format!("volume {} id range overflows", index)))?;
        let pac = read_range(&paths.packed(), "packed residues", desc.pac_start, desc.pac_end)?;
        let headers = read_range(&paths.headers(), "headers", desc.hdr_start, desc.hdr_end)?;
        let rec_bytes = read_range(&paths.records(), "sequence records", rec_start, rec_end)?;
        let amb_bytes = read_range(&paths.ambiguity(), "ambiguity runs", desc.amb_start, desc.amb_end)?;

        if desc.amb_start % AmbRun::SIZE != 0 || amb_bytes.len() as u64 % AmbRun::SIZE != 0 {
            return Err(corrupt(format!("volume {} ambiguity range is not whole records", index)));
        }
        let mut cur = Cursor::new(&amb_bytes);
        let mut ambs = Vec::with_capacity(amb_bytes.len() / AmbRun::SIZE as usize);
        for _ in 0..amb_bytes.len() as u64 / AmbRun::SIZE {
            ambs.push(AmbRun::read(&mut cur)?);
        }

        // 单趟重定基：全局偏移 -> 分片内偏移
        let mut cur = Cursor::new(&rec_bytes);
        let mut seqs = Vec::with_capacity(desc.seq_count as usize);
        let mut start = 0u64;
        for i in 0..desc.seq_count {
            let rec = SeqRecord::read(&mut cur)?;
            let seq = VolumeSeq::rebase(&rec, desc, start).ok_or_else(|| {
                corrupt(format!("sequence {} lies outside volume {}", desc.first_id + i, index))
            })?;
            start = seq.end();
            seqs.push(seq);
        }
        for (i, seq) in seqs.iter().enumerate() {
            let runs = seq
                .amb_index
                .checked_add(seq.amb_count)
                .and_then(|end| ambs.get(seq.amb_index..end));
            if !runs.is_some_and(|runs| runs_fit(runs, seq.size)) {
                return Err(corrupt(format!(
                    "ambiguity runs of sequence {} do not fit its {} residues",
                    desc.first_id + i as u64,
                    seq.size
                )));
            }
        }
        if start != desc.residue_count {
            return Err(corrupt(format!(
                "volume {} declares {} residues but its records hold {}",
                index, desc.residue_count, start
            )));
        }

        debug!(
            "loaded volume {}: {} sequences, {} residues, {} ambiguity runs",
            index,
            seqs.len(),
            start,
            ambs.len()
        );
        Ok(Self { index, first_id: desc.first_id, residue_count: start, pac, headers, seqs, ambs })
    }

    /// Packs `(header, residues)` pairs straight into a volume without
    /// touching disk. Ids start at `first_id`.
    pub fn in_memory<I>(first_id: u64, seqs: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut pac = Vec::new();
        let mut headers = Vec::new();
        let mut out = Vec::new();
        let mut ambs = Vec::new();
        let mut packed = PackedSeq::new();
        let mut runs = Vec::new();
        let mut start = 0u64;
        for (header, seq) in seqs {
            packed.clear();
            runs.clear();
            encode_residues(&seq, &mut packed, &mut runs);
            let vs = VolumeSeq {
                pac_offset: pac.len(),
                header_offset: headers.len(),
                header_len: header.len(),
                amb_index: ambs.len(),
                amb_count: runs.len(),
                size: seq.len() as u32,
                start,
            };
            pac.extend_from_slice(packed.as_bytes());
            headers.extend_from_slice(header.as_bytes());
            headers.push(0);
            ambs.extend_from_slice(&runs);
            start = vs.end();
            out.push(vs);
        }
        Self { index: 0, first_id, residue_count: start, pac, headers, seqs: out, ambs }
    }

    /// Position of this volume in the descriptor file (0 = whole store).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn first_id(&self) -> u64 {
        self.first_id
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Extent of the volume's coordinate axis.
    pub fn residue_count(&self) -> u64 {
        self.residue_count
    }

    pub fn seq(&self, id: usize) -> &VolumeSeq {
        &self.seqs[id]
    }

    pub fn seq_size(&self, id: usize) -> usize {
        self.seqs[id].size as usize
    }

    pub fn global_id(&self, id: usize) -> u64 {
        self.first_id + id as u64
    }

    /// Local id of a global sequence id, if this volume holds it.
    pub fn local_id(&self, global: u64) -> Option<usize> {
        global
            .checked_sub(self.first_id)
            .map(|l| l as usize)
            .filter(|&l| l < self.seqs.len())
    }

    pub fn header(&self, id: usize) -> Cow<'_, str> {
        let s = &self.seqs[id];
        String::from_utf8_lossy(&self.headers[s.header_offset..s.header_offset + s.header_len])
    }

    pub fn ambiguity_runs(&self, id: usize) -> &[AmbRun] {
        let s = &self.seqs[id];
        &self.ambs[s.amb_index..s.amb_index + s.amb_count]
    }

    pub fn packed(&self, id: usize) -> PackedView<'_> {
        let s = &self.seqs[id];
        PackedView::new(&self.pac[s.pac_offset..s.pac_offset + packed_len(s.size as usize)], s.size as usize)
    }

    /// 提取序列 `id` 的 `[from, to)` 区间的 2-bit 编码到 `out`（先清空）。
    /// 反向链为该区间的反向互补。歧义碱基保持占位编码。
    ///
    /// # Panics
    /// 区间不在 `[0, size]` 内时 panic（调用方错误）。
    pub fn extract(&self, id: usize, from: usize, to: usize, strand: Strand, out: &mut Vec<u8>) {
        let size = self.seq_size(id);
        assert!(
            from <= to && to <= size,
            "extract range {}..{} outside sequence {} of size {}",
            from,
            to,
            id,
            size
        );
        let view = self.packed(id);
        out.clear();
        out.reserve(to - from);
        match strand {
            Strand::Forward => out.extend((from..to).map(|i| view.get(i))),
            Strand::Reverse => out.extend((from..to).rev().map(|i| dna::complement_code(view.get(i)))),
        }
    }

    /// 整条序列的 ASCII 形式，歧义碱基按原符号还原
    pub fn extract_exact(&self, id: usize) -> Vec<u8> {
        let view = self.packed(id);
        let mut out: Vec<u8> = (0..view.len()).map(|i| dna::from_code(view.get(i))).collect();
        for run in self.ambiguity_runs(id) {
            out[run.offset as usize..run.end() as usize].fill(run.symbol);
        }
        out
    }

    /// Start/end of sequence `id` on the volume coordinate axis.
    pub fn seq_bounds(&self, id: usize) -> (u64, u64) {
        let s = &self.seqs[id];
        (s.start, s.end())
    }

    /// Maps a volume coordinate to `(local id, offset within sequence)`.
    pub fn locate(&self, pos: u64) -> Option<(usize, u32)> {
        if pos >= self.residue_count {
            return None;
        }
        // 第一个 end > pos 的序列；空序列自然被跳过
        let id = self.seqs.partition_point(|s| s.end() <= pos);
        let s = self.seqs.get(id)?;
        Some((id, (pos - s.start) as u32))
    }
}
