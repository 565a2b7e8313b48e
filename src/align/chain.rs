use super::candidate::Seed;

/// 链构建器接口：给定一组种子，返回最佳代表种子的下标及链得分；
/// 没有可接受的种子时返回 None。搜索驱动只使用这个结果。
pub trait ChainOracle: Sync {
    fn best_seed(&self, seeds: &[Seed]) -> Option<(usize, u32)>;
}

/// 种子链：`seeds` 为输入切片中的下标，按查询坐标升序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub seeds: Vec<usize>,
    pub score: u32,
}

/// 默认链构建器：有界回看的共线链 DP，代表种子取最佳链的中点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpChainOracle {
    /// 相邻种子在查询/参考上的最大间距
    pub max_gap: u32,
    /// 相邻种子的最大对角线偏移 |gap_q - gap_s|
    pub max_drift: u32,
    /// 每个种子最多回看的前驱个数
    pub max_lookback: usize,
    /// 链得分低于此值视为无可接受种子
    pub min_score: u32,
}

impl Default for DpChainOracle {
    fn default() -> Self {
        Self { max_gap: 1000, max_drift: 200, max_lookback: 64, min_score: 0 }
    }
}

impl ChainOracle for DpChainOracle {
    fn best_seed(&self, seeds: &[Seed]) -> Option<(usize, u32)> {
        let chain = best_chain(seeds, self.max_gap, self.max_drift, self.max_lookback)?;
        if chain.score < self.min_score {
            return None;
        }
        Some((chain.seeds[chain.seeds.len() / 2], chain.score))
    }
}

/// 从种子集合中构建最佳链（DP 方法）。
///
/// 种子可以相互重叠（k-mer 逐位采样时相邻种子几乎完全重叠），
/// 每接上一个种子只计新增覆盖 `min(gap_q, gap_s, len)`。
pub fn best_chain(seeds: &[Seed], max_gap: u32, max_drift: u32, max_lookback: usize) -> Option<Chain> {
    if seeds.is_empty() {
        return None;
    }

    let mut idxs: Vec<usize> = (0..seeds.len()).collect();
    idxs.sort_by_key(|&i| (seeds[i].qoff, seeds[i].soff));

    let n = idxs.len();
    let mut dp: Vec<u32> = vec![0; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut best_t = 0usize;

    for (t, &i) in idxs.iter().enumerate() {
        let si = &seeds[i];
        dp[t] = si.len;

        let from = t.saturating_sub(max_lookback);
        for u in from..t {
            let sj = &seeds[idxs[u]];
            if sj.qoff >= si.qoff || sj.soff >= si.soff {
                continue;
            }
            let gap_q = si.qoff - sj.qoff;
            let gap_s = si.soff - sj.soff;
            if gap_q > max_gap || gap_s > max_gap {
                continue;
            }
            if gap_q.abs_diff(gap_s) > max_drift {
                continue;
            }
            let cand = dp[u] + gap_q.min(gap_s).min(si.len);
            if cand > dp[t] {
                dp[t] = cand;
                prev[t] = Some(u);
            }
        }

        if dp[t] > dp[best_t] {
            best_t = t;
        }
    }

    let mut chain_idxs: Vec<usize> = Vec::new();
    let mut cur = Some(best_t);
    while let Some(t) = cur {
        chain_idxs.push(idxs[t]);
        cur = prev[t];
    }
    chain_idxs.reverse();

    Some(Chain { seeds: chain_idxs, score: dp[best_t] })
}
