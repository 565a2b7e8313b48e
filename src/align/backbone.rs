use super::candidate::KmerMatch;
use crate::config::BlockGeometry;

/// 一个对角块：本次查询落入该参考坐标区间的原始命中
#[derive(Debug, Clone, Default)]
struct Block {
    matches: Vec<KmerMatch>,
    /// 最近一次插入的查询偏移，用于抑制重叠窗口造成的重复插入
    last_qoff: Option<u32>,
}

/// 每个工作线程独占一份的对角块暂存结构。
///
/// 参考坐标轴按 `geometry.size()` 切块，每块最多保存 `capacity` 个命中。
/// 有命中的块记在 `active` 里，重置和打分只访问这些块，从不扫描整条坐标轴。
/// 块内的匹配数组在查询之间复用，只清长度不释放。
#[derive(Debug)]
pub struct DiagonalBackbone {
    geometry: BlockGeometry,
    capacity: usize,
    blocks: Vec<Block>,
    active: Vec<u32>,
}

impl DiagonalBackbone {
    /// 为覆盖 `extent` 个参考坐标的分片分配块数组
    pub fn new(geometry: BlockGeometry, capacity: usize, extent: u64) -> Self {
        let n = geometry.blocks_for(extent).max(1);
        Self { geometry, capacity, blocks: vec![Block::default(); n], active: Vec::new() }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// 清空上一次查询留下的块（只遍历活跃块）
    pub fn reset(&mut self) {
        for &b in &self.active {
            let blk = &mut self.blocks[b as usize];
            blk.matches.clear();
            blk.last_qoff = None;
        }
        self.active.clear();
    }

    /// 插入命中；块已满或与上一次插入的查询偏移相同则忽略。返回是否插入。
    #[inline]
    pub fn insert(&mut self, qoff: u32, soff: u32) -> bool {
        let b = self.geometry.block_of(soff);
        let blk = &mut self.blocks[b];
        if blk.matches.len() >= self.capacity || blk.last_qoff == Some(qoff) {
            return false;
        }
        if blk.matches.is_empty() {
            self.active.push(b as u32);
        }
        blk.last_qoff = Some(qoff);
        blk.matches.push(KmerMatch { qoff, soff });
        true
    }

    /// 块内命中数；越界块视为空
    #[inline]
    pub fn count(&self, block: usize) -> usize {
        self.blocks.get(block).map_or(0, |b| b.matches.len())
    }

    pub fn matches(&self, block: usize) -> &[KmerMatch] {
        self.blocks.get(block).map_or(&[], |b| b.matches.as_slice())
    }

    /// 本次查询中曾经非空的块，按首次插入顺序
    pub fn active_blocks(&self) -> &[u32] {
        &self.active
    }

    /// `count(b) + count(b - 1)`：相邻块耦合，吸收刚好跨越块边界的命中
    #[inline]
    pub fn block_score(&self, block: usize) -> usize {
        let prev = if block == 0 { 0 } else { self.count(block - 1) };
        self.count(block) + prev
    }

    /// 删除块内满足 `pred` 的命中并返回删除个数
    pub fn remove_where<F>(&mut self, block: usize, mut pred: F) -> usize
    where
        F: FnMut(&KmerMatch) -> bool,
    {
        let Some(blk) = self.blocks.get_mut(block) else {
            return 0;
        };
        let before = blk.matches.len();
        blk.matches.retain(|m| !pred(m));
        before - blk.matches.len()
    }
}
