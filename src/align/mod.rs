//! 候选区域搜索：对角块骨架、共线性判定、链构建接口与搜索驱动

pub mod backbone;
pub mod candidate;
pub mod chain;
pub mod collinear;
pub mod search;

pub use backbone::DiagonalBackbone;
pub use candidate::{CandidateHit, KmerMatch, Query, Seed, Strand};
pub use chain::{best_chain, Chain, ChainOracle, DpChainOracle};
pub use collinear::{is_related, Collinearity};
pub use search::{CandidateSearcher, SearchWorker};
