use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::IndexOpt;
use crate::error::{Error, Result};
use crate::store::Volume;
use crate::util::dna::{self, Strand};

/// 构建统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// 采样得到的 k-mer 位置总数
    pub sampled: u64,
    /// 保留的不同 k-mer 数
    pub kept_kmers: u64,
    /// 因出现次数超过上限而丢弃的 k-mer 数
    pub dropped_kmers: u64,
    /// 实际存储的位置数
    pub stored_offsets: u64,
}

/// 采样 k-mer 查找表：k-mer 的 2-bit 打包值 -> 分片坐标上的有序位置列表。
///
/// - 参考序列每隔 `window` 个位置取一个 k-mer
/// - 出现次数超过 `max_occurrences` 的 k-mer 整体丢弃，查询时视为不存在
/// - 所有位置存放在一个扁平数组中，哈希表只记录区间
#[derive(Debug)]
pub struct KmerTable {
    kmer_size: usize,
    window: usize,
    max_occurrences: usize,
    buckets: FxHashMap<u64, (u32, u32)>,
    offsets: Vec<u32>,
    stats: TableStats,
}

/// 一条序列上的采样位置（分片坐标）
fn sample_sequence(volume: &Volume, id: usize, k: usize, window: usize, buf: &mut Vec<u8>, out: &mut Vec<(u64, u32)>) {
    let size = volume.seq_size(id);
    if size < k {
        return;
    }
    volume.extract(id, 0, size, Strand::Forward, buf);
    let start = volume.seq(id).start as u32;
    let mut pos = 0usize;
    while pos + k <= size {
        out.push((dna::pack_kmer(buf, pos, k), start + pos as u32));
        pos += window;
    }
}

impl KmerTable {
    /// 在独立的 rayon 线程池（`opt.workers` 个线程）上为一个分片建表。
    pub fn build(volume: &Volume, opt: &IndexOpt) -> Result<Self> {
        opt.validate()?;
        if volume.residue_count() > u64::from(u32::MAX) {
            return Err(Error::VolumeTooLarge { residues: volume.residue_count() });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opt.workers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot start {} index workers: {}", opt.workers, e)))?;
        let table = pool.install(|| Self::build_in_pool(volume, opt));
        info!(
            "k-mer table for volume {}: k={} window={} max-occ={} kept={} dropped={} offsets={}",
            volume.index(),
            table.kmer_size,
            table.window,
            table.max_occurrences,
            table.stats.kept_kmers,
            table.stats.dropped_kmers,
            table.stats.stored_offsets
        );
        Ok(table)
    }

    fn build_in_pool(volume: &Volume, opt: &IndexOpt) -> Self {
        let k = opt.kmer_size;
        let window = opt.window;

        // 按序列区间切分，各线程独立采样
        let chunk = (volume.len() / (rayon::current_num_threads() * 4)).max(1);
        let ids: Vec<usize> = (0..volume.len()).collect();
        let mut pairs: Vec<(u64, u32)> = ids
            .par_chunks(chunk)
            .flat_map_iter(|part| {
                let mut buf = Vec::new();
                let mut local = Vec::new();
                for &id in part {
                    sample_sequence(volume, id, k, window, &mut buf, &mut local);
                }
                local
            })
            .collect();
        // 合并：按 (k-mer, 位置) 排序后同一 k-mer 连续且位置有序
        pairs.par_sort_unstable();

        let mut stats = TableStats { sampled: pairs.len() as u64, ..TableStats::default() };
        let mut buckets: FxHashMap<u64, (u32, u32)> = FxHashMap::default();
        let mut offsets: Vec<u32> = Vec::new();
        for run in pairs.chunk_by(|a, b| a.0 == b.0) {
            if run.len() > opt.max_occurrences {
                stats.dropped_kmers += 1;
                continue;
            }
            let begin = offsets.len() as u32;
            offsets.extend(run.iter().map(|&(_, pos)| pos));
            buckets.insert(run[0].0, (begin, run.len() as u32));
            stats.kept_kmers += 1;
        }
        stats.stored_offsets = offsets.len() as u64;
        offsets.shrink_to_fit();
        debug!("sampled {} k-mer positions from {} sequences", stats.sampled, volume.len());

        Self { kmer_size: k, window, max_occurrences: opt.max_occurrences, buckets, offsets, stats }
    }

    /// 返回 k-mer 的全部位置；未知或被丢弃的 k-mer 返回空切片
    #[inline]
    pub fn lookup(&self, hash: u64) -> &[u32] {
        match self.buckets.get(&hash) {
            Some(&(begin, len)) => &self.offsets[begin as usize..(begin + len) as usize],
            None => &[],
        }
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    pub fn stats(&self) -> TableStats {
        self.stats
    }

    /// 不同 k-mer 的数量
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(k: usize, window: usize, max_occurrences: usize) -> IndexOpt {
        IndexOpt { kmer_size: k, window, max_occurrences, workers: 2 }
    }

    fn volume(seqs: &[&[u8]]) -> Volume {
        Volume::in_memory(0, seqs.iter().enumerate().map(|(i, s)| (format!("s{}", i), s.to_vec())))
    }

    #[test]
    fn finds_sampled_positions_across_sequences() {
        let v = volume(&[b"ACGTTGCA", b"GGACGTTT"]);
        let t = KmerTable::build(&v, &opt(4, 1, 100)).unwrap();
        let acgt = dna::pack_kmer(&dna::encode_seq(b"ACGT"), 0, 4);
        // 第二条序列从坐标 8 开始
        assert_eq!(t.lookup(acgt), &[0, 10]);
        let tttt = dna::pack_kmer(&dna::encode_seq(b"TTTT"), 0, 4);
        assert!(t.lookup(tttt).is_empty());
    }

    #[test]
    fn window_controls_sampling() {
        let v = volume(&[b"ACGTACGTACGT"]);
        let t = KmerTable::build(&v, &opt(4, 4, 100)).unwrap();
        let acgt = dna::pack_kmer(&dna::encode_seq(b"ACGT"), 0, 4);
        assert_eq!(t.lookup(acgt), &[0, 4, 8]);
        let cgta = dna::pack_kmer(&dna::encode_seq(b"CGTA"), 0, 4);
        assert!(t.lookup(cgta).is_empty());
        assert_eq!(t.stats().sampled, 3);
    }

    #[test]
    fn occurrence_ceiling_drops_repeats() {
        let repeat = b"AAAAAAAAAAAAAAAAAAAA";
        let v = volume(&[repeat, b"ACGTTGCAAC"]);
        let t = KmerTable::build(&v, &opt(5, 1, 3)).unwrap();
        let poly_a = dna::pack_kmer(&dna::encode_seq(b"AAAAA"), 0, 5);
        assert!(t.lookup(poly_a).is_empty());
        assert!(t.stats().dropped_kmers >= 1);
        for (&h, _) in &t.buckets {
            assert!(t.lookup(h).len() <= 3);
        }
        let kmer = dna::pack_kmer(&dna::encode_seq(b"ACGTT"), 0, 5);
        assert_eq!(t.lookup(kmer), &[20]);
    }

    #[test]
    fn short_sequences_contribute_nothing() {
        let v = volume(&[b"ACG", b""]);
        let t = KmerTable::build(&v, &opt(4, 1, 10)).unwrap();
        assert!(t.is_empty());
    }
}
