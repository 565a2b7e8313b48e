use std::fmt;

pub use crate::util::dna::Strand;

/// 原始 k-mer 命中：查询偏移与分片坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KmerMatch {
    pub qoff: u32,
    pub soff: u32,
}

/// 交给链构建器的种子，`soff` 相对所在参考序列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    pub qoff: u32,
    pub soff: u32,
    pub len: u32,
}

/// 一条待搜索的查询序列（2-bit 编码）
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    /// 全局序列 id；自比对时用它排除查询自身所在区域
    pub id: u64,
    pub strand: Strand,
    pub codes: &'a [u8],
}

/// 候选比对区域，按值交给下游延伸阶段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateHit {
    pub query_id: u64,
    pub query_strand: Strand,
    pub query_offset: u32,
    pub query_length: u32,
    pub subject_id: u64,
    pub subject_strand: Strand,
    pub subject_offset: u32,
    pub subject_length: u32,
    /// 代表种子附近共线 k-mer 命中数
    pub score: u32,
}

impl fmt::Display for CandidateHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.query_id,
            self.query_strand.symbol(),
            self.query_offset,
            self.query_length,
            self.subject_id,
            self.subject_strand.symbol(),
            self.subject_offset,
            self.subject_length,
            self.score
        )
    }
}
