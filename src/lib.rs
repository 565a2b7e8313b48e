//! # longseed
//!
//! 长读段比对的候选种子核心：在千兆碱基级别的参考集合中，为每条查询快速
//! 圈定少量可能的比对区域，交给下游的碱基级延伸。
//!
//! - **序列存储**：2-bit 打包、分片（volume）存放，歧义碱基单独记录
//! - **k-mer 查找表**：按窗口采样参考位置，丢弃高频 k-mer
//! - **候选搜索**：对角块骨架打分，链构建挑选代表种子，带内共线命中计分
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use longseed::align::{CandidateSearcher, DpChainOracle, Query, Strand};
//! use longseed::config::{IndexOpt, SearchOpt};
//! use longseed::index::KmerTable;
//! use longseed::store::SeqStore;
//! use longseed::util::dna;
//!
//! # fn main() -> longseed::Result<()> {
//! let store = SeqStore::open("ref")?;
//! let volume = store.load_volume(1)?;
//! let table = KmerTable::build(&volume, &IndexOpt::default())?;
//! let oracle = DpChainOracle::default();
//! let searcher = CandidateSearcher::new(&volume, &table, &oracle, &SearchOpt::default())?;
//!
//! let codes = dna::encode_seq(b"ACGTTGCAACGTAGCTAGCTAGGCTAGCATCGA");
//! let mut worker = searcher.new_worker();
//! let mut hits = Vec::new();
//! searcher.search(&Query { id: 0, strand: Strand::Forward, codes: &codes }, &mut worker, &mut hits);
//! for hit in &hits {
//!     println!("{}", hit);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## 模块说明
//!
//! - [`store`]：分片序列存储的构建、打开与提取
//! - [`index`]：采样 k-mer 查找表
//! - [`align`]：对角块骨架、共线性判定、链构建与候选搜索
//! - [`io`]：FASTA / FASTQ 文件解析
//! - [`config`]：构建 / 建表 / 搜索参数
//! - [`util`]：2-bit 编码、反向互补与位打包工具

pub mod align;
pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod store;
pub mod util;

pub use error::{Error, Result};
