//! Per-query candidate search over one indexed volume.
//!
//! For each query: reset the worker's backbone, stream sampled query k-mers
//! through the lookup table into diagonal blocks, score blocks with their
//! left neighbour, and for every strong block hand each per-sequence group
//! of matches to the chaining oracle. The representative seed it returns is
//! turned into one [`CandidateHit`] whose score counts the collinear matches
//! inside a band around it. Matches counted for one hit are removed so later
//! blocks cannot count them again.

use super::backbone::DiagonalBackbone;
use super::candidate::{CandidateHit, KmerMatch, Query, Seed, Strand};
use super::chain::ChainOracle;
use super::collinear::Collinearity;
use crate::config::{BlockGeometry, SearchOpt};
use crate::error::Result;
use crate::index::KmerTable;
use crate::store::Volume;
use crate::util::dna;

/// Subject offsets shared by more matches than this are collapsed to one.
const MAX_SHARED_SUBJECT_OFFSET: usize = 3;

/// Scratch owned by one worker for its whole lifetime.
#[derive(Debug)]
pub struct SearchWorker {
    backbone: DiagonalBackbone,
    scored: Vec<(usize, usize)>,
    gathered: Vec<KmerMatch>,
    seeds: Vec<Seed>,
    revcomp: Vec<u8>,
}

impl SearchWorker {
    pub fn backbone(&self) -> &DiagonalBackbone {
        &self.backbone
    }
}

/// Read-only search context for one volume; share it across workers.
pub struct CandidateSearcher<'a, O: ChainOracle> {
    volume: &'a Volume,
    table: &'a KmerTable,
    oracle: &'a O,
    opt: SearchOpt,
    geometry: BlockGeometry,
    collinear: Collinearity,
}

impl<'a, O: ChainOracle> CandidateSearcher<'a, O> {
    pub fn new(volume: &'a Volume, table: &'a KmerTable, oracle: &'a O, opt: &SearchOpt) -> Result<Self> {
        opt.validate()?;
        Ok(Self {
            volume,
            table,
            oracle,
            opt: opt.clone(),
            geometry: opt.geometry(),
            collinear: Collinearity::from_opt(opt),
        })
    }

    pub fn geometry(&self) -> BlockGeometry {
        self.geometry
    }

    pub fn volume(&self) -> &'a Volume {
        self.volume
    }

    /// Fresh worker scratch sized for this volume's coordinate extent.
    pub fn new_worker(&self) -> SearchWorker {
        SearchWorker {
            backbone: DiagonalBackbone::new(self.geometry, self.opt.block_capacity, self.volume.residue_count()),
            scored: Vec::new(),
            gathered: Vec::new(),
            seeds: Vec::new(),
            revcomp: Vec::new(),
        }
    }

    /// Minimum block score for a query of `qlen` residues.
    pub fn block_threshold(&self, qlen: usize) -> usize {
        if qlen < 2 * self.geometry.size() as usize {
            (self.opt.min_block_score / 2).max(1)
        } else {
            self.opt.min_block_score
        }
    }

    /// Searches the query as given and its reverse complement.
    pub fn search_both_strands(&self, id: u64, codes: &[u8], worker: &mut SearchWorker, hits: &mut Vec<CandidateHit>) {
        self.search(&Query { id, strand: Strand::Forward, codes }, worker, hits);
        let mut rc = std::mem::take(&mut worker.revcomp);
        dna::revcomp_codes_into(codes, &mut rc);
        self.search(&Query { id, strand: Strand::Reverse, codes: &rc }, worker, hits);
        worker.revcomp = rc;
    }

    /// Appends the candidates for one query to `hits`.
    pub fn search(&self, query: &Query<'_>, worker: &mut SearchWorker, hits: &mut Vec<CandidateHit>) {
        worker.backbone.reset();
        let k = self.table.kmer_size();
        let qlen = query.codes.len();
        if qlen < k {
            return;
        }

        self.fill_backbone(query, &mut worker.backbone);

        let mut scored = std::mem::take(&mut worker.scored);
        scored.clear();
        scored.extend(
            worker
                .backbone
                .active_blocks()
                .iter()
                .map(|&b| (b as usize, worker.backbone.block_score(b as usize))),
        );
        scored.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let threshold = self.block_threshold(qlen);
        for &(block, score) in &scored {
            if score < threshold {
                break;
            }
            self.process_block(query, block, threshold, worker, hits);
        }
        worker.scored = scored;
    }

    fn fill_backbone(&self, query: &Query<'_>, backbone: &mut DiagonalBackbone) {
        let k = self.table.kmer_size();
        let codes = query.codes;
        let last = codes.len() - k;

        let own_region = if self.opt.self_compare {
            self.volume.local_id(query.id).map(|id| self.volume.seq_bounds(id))
        } else {
            None
        };

        let mut window = 0usize;
        while window <= last {
            let end = (window + self.opt.scan_lead).min(last + 1);
            for q in (window..end).step_by(self.opt.query_stride) {
                let hash = dna::pack_kmer(codes, q, k);
                for &s in self.table.lookup(hash) {
                    if let Some((lo, hi)) = own_region {
                        if (lo..hi).contains(&u64::from(s)) {
                            continue;
                        }
                    }
                    backbone.insert(q as u32, s);
                }
            }
            window = end + self.opt.scan_gap;
        }
    }

    fn process_block(
        &self,
        query: &Query<'_>,
        block: usize,
        threshold: usize,
        worker: &mut SearchWorker,
        hits: &mut Vec<CandidateHit>,
    ) {
        let SearchWorker { backbone, gathered, seeds, .. } = worker;

        gathered.clear();
        gathered.extend_from_slice(backbone.matches(block));
        if gathered.is_empty() {
            return;
        }
        if self.opt.pull_neighbors {
            let neighbours = [block.checked_sub(1), Some(block + 1)];
            for nb in neighbours.into_iter().flatten() {
                let c = backbone.count(nb);
                if c > 0 && c < threshold {
                    gathered.extend_from_slice(backbone.matches(nb));
                }
            }
        }

        gathered.sort_unstable_by_key(|m| (m.soff, m.qoff));
        collapse_repeated_subjects(gathered);

        let mut i = 0;
        while i < gathered.len() {
            let Some((sid, _)) = self.volume.locate(u64::from(gathered[i].soff)) else {
                i += 1;
                continue;
            };
            let (seq_lo, seq_hi) = self.volume.seq_bounds(sid);
            let mut j = i + 1;
            while j < gathered.len() && u64::from(gathered[j].soff) < seq_hi {
                j += 1;
            }
            let group = &gathered[i..j];
            i = j;
            if group.len() <= threshold {
                continue;
            }

            seeds.clear();
            seeds.extend(group.iter().map(|m| Seed {
                qoff: m.qoff,
                soff: (u64::from(m.soff) - seq_lo) as u32,
                len: self.table.kmer_size() as u32,
            }));
            let Some((best, _chain_score)) = self.oracle.best_seed(&seeds[..]) else {
                continue;
            };
            let rep = group[best];
            let score = self.count_band(rep, query.codes.len(), seq_lo, seq_hi, backbone);

            hits.push(CandidateHit {
                query_id: query.id,
                query_strand: query.strand,
                query_offset: rep.qoff,
                query_length: query.codes.len() as u32,
                subject_id: self.volume.global_id(sid),
                subject_strand: Strand::Forward,
                subject_offset: (u64::from(rep.soff) - seq_lo) as u32,
                subject_length: (seq_hi - seq_lo) as u32,
                score: score as u32,
            });
        }
    }

    /// Counts and removes the matches inside the band around `rep` that are
    /// collinear with it.
    fn count_band(&self, rep: KmerMatch, qlen: usize, seq_lo: u64, seq_hi: u64, backbone: &mut DiagonalBackbone) -> usize {
        let q0 = i64::from(rep.qoff);
        let s0 = i64::from(rep.soff);
        let slack = i64::from(self.opt.band_slack);
        let lo = (s0 - q0 - slack).max(seq_lo as i64);
        let hi = (s0 + (qlen as i64 - q0) + slack).min(seq_hi as i64);
        if lo >= hi {
            return 0;
        }

        let first = self.geometry.block_of(lo as u32);
        let last = self.geometry.block_of((hi - 1) as u32).min(backbone.num_blocks() - 1);
        let collinear = self.collinear;
        let mut n = 0;
        for b in first..=last {
            n += backbone.remove_where(b, |m| {
                let s = i64::from(m.soff);
                s >= lo && s < hi && collinear.is_related(i64::from(m.qoff), s, q0, s0)
            });
        }
        n
    }
}

/// Within runs of equal subject offset longer than
/// [`MAX_SHARED_SUBJECT_OFFSET`], keeps only the first match. `matches` must
/// be sorted by subject offset.
fn collapse_repeated_subjects(matches: &mut Vec<KmerMatch>) {
    let mut out = 0;
    let mut i = 0;
    while i < matches.len() {
        let mut j = i + 1;
        while j < matches.len() && matches[j].soff == matches[i].soff {
            j += 1;
        }
        let keep = if j - i > MAX_SHARED_SUBJECT_OFFSET { 1 } else { j - i };
        for t in i..i + keep {
            matches[out] = matches[t];
            out += 1;
        }
        i = j;
    }
    matches.truncate(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::chain::DpChainOracle;
    use crate::config::IndexOpt;

    fn make_reference(len: usize, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T'];
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                bases[(x >> 16) as usize % 4]
            })
            .collect()
    }

    fn index_opt() -> IndexOpt {
        IndexOpt { kmer_size: 15, window: 10, max_occurrences: 1000, workers: 2 }
    }

    fn search_opt() -> SearchOpt {
        SearchOpt { block_size: 2000, workers: 1, ..SearchOpt::default() }
    }

    /// 与 `make_reference` 无关的背景序列
    fn make_background(len: usize, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T'];
        let mut x = seed.max(1);
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                bases[(x >> 30) as usize]
            })
            .collect()
    }

    fn run(searcher: &CandidateSearcher<'_, DpChainOracle>, codes: &[u8]) -> (Vec<CandidateHit>, SearchWorker) {
        let mut worker = searcher.new_worker();
        let mut hits = Vec::new();
        searcher.search(&Query { id: 0, strand: Strand::Forward, codes }, &mut worker, &mut hits);
        (hits, worker)
    }

    #[test]
    fn collapse_keeps_small_runs() {
        let m = |qoff, soff| KmerMatch { qoff, soff };
        let mut v = vec![m(1, 5), m(2, 5), m(3, 5), m(1, 7), m(2, 7), m(3, 7), m(4, 7), m(9, 8)];
        collapse_repeated_subjects(&mut v);
        assert_eq!(v, vec![m(1, 5), m(2, 5), m(3, 5), m(1, 7), m(9, 8)]);
    }

    #[test]
    fn exact_substring_yields_candidate_near_origin() {
        let reference = make_reference(10_000, 42);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let opt = search_opt();
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &opt).unwrap();
        assert_eq!(searcher.geometry().size(), 2048);

        let codes = dna::encode_seq(&reference[3000..3500]);
        let mut worker = searcher.new_worker();
        let mut hits = Vec::new();
        searcher.search(&Query { id: 99, strand: Strand::Forward, codes: &codes }, &mut worker, &mut hits);

        let slack = opt.band_slack;
        let hit = hits
            .iter()
            .find(|h| h.subject_offset + slack >= 3000 && h.subject_offset <= 3000 + slack)
            .expect("candidate near offset 3000");
        assert_eq!(hit.subject_id, 0);
        assert_eq!(hit.query_length, 500);
        assert_eq!(hit.subject_length, 10_000);
        assert!(hit.score as usize >= opt.min_block_score);
        // 代表种子位于同一对角线
        assert_eq!(hit.subject_offset - hit.query_offset, 3000);
    }

    #[test]
    fn short_query_yields_nothing() {
        let reference = make_reference(5_000, 7);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt()).unwrap();

        let codes = dna::encode_seq(&reference[100..110]);
        let mut worker = searcher.new_worker();
        let mut hits = Vec::new();
        searcher.search(&Query { id: 0, strand: Strand::Forward, codes: &codes }, &mut worker, &mut hits);
        assert!(hits.is_empty());
        assert!(worker.backbone().active_blocks().is_empty());
    }

    #[test]
    fn reverse_complement_query_is_found_on_reverse_strand() {
        let reference = make_reference(8_000, 3);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt()).unwrap();

        let forward = dna::encode_seq(&reference[5000..5600]);
        let query = dna::revcomp_codes(&forward);
        let mut worker = searcher.new_worker();
        let mut hits = Vec::new();
        searcher.search_both_strands(5, &query, &mut worker, &mut hits);

        let rev: Vec<&CandidateHit> = hits.iter().filter(|h| h.query_strand == Strand::Reverse).collect();
        assert!(!rev.is_empty());
        assert!(rev.iter().any(|h| i64::from(h.subject_offset) - i64::from(h.query_offset) == 5000));
        assert!(hits.iter().all(|h| h.query_id == 5));
    }

    #[test]
    fn self_comparison_skips_own_sequence() {
        let a = make_reference(6_000, 11);
        let mut b = make_reference(6_000, 12);
        // b 的中段复制自 a
        b[1000..2000].copy_from_slice(&a[2000..3000]);
        let volume = Volume::in_memory(
            0,
            vec![("a".to_string(), a.clone()), ("b".to_string(), b)],
        );
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let opt = SearchOpt { self_compare: true, ..search_opt() };
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &opt).unwrap();

        let codes = dna::encode_seq(&a);
        let mut worker = searcher.new_worker();
        let mut hits = Vec::new();
        searcher.search(&Query { id: 0, strand: Strand::Forward, codes: &codes }, &mut worker, &mut hits);

        assert!(hits.iter().all(|h| h.subject_id != 0));
        assert!(hits.iter().any(|h| h.subject_id == 1));
    }

    #[test]
    fn sparse_neighbour_is_pulled_across_block_boundary() {
        let reference = make_reference(10_000, 42);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        // 采样点 2010..=2040 落在块 0，2050 与 2060 落在块 1
        let codes = dna::encode_seq(&reference[2010..2080]);

        let off = SearchOpt { pull_neighbors: false, ..search_opt() };
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &off).unwrap();
        assert_eq!(searcher.block_threshold(codes.len()), 5);
        let (hits, worker) = run(&searcher, &codes);
        assert!(hits.is_empty());
        assert_eq!(worker.backbone().count(0), 4);
        assert_eq!(worker.backbone().count(1), 2);

        let on = SearchOpt { pull_neighbors: true, ..search_opt() };
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &on).unwrap();
        let (hits, worker) = run(&searcher, &codes);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 6);
        assert_eq!(hits[0].subject_offset - hits[0].query_offset, 2010);
        assert_eq!(worker.backbone().count(0) + worker.backbone().count(1), 0);
    }

    #[test]
    fn short_queries_use_relaxed_threshold() {
        let reference = make_reference(10_000, 42);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt()).unwrap();
        assert_eq!(searcher.block_threshold(100), 5);
        assert_eq!(searcher.block_threshold(4095), 5);
        assert_eq!(searcher.block_threshold(4096), 10);

        let lenient = SearchOpt { min_block_score: 1, ..search_opt() };
        let lenient = CandidateSearcher::new(&volume, &table, &oracle, &lenient).unwrap();
        assert_eq!(lenient.block_threshold(100), 1);
        assert_eq!(lenient.block_threshold(5000), 1);

        // 80 个参考残基嵌入随机背景，产生 7 个采样命中
        let mut query = make_background(5_000, 99);
        query[100..180].copy_from_slice(&reference[3000..3080]);
        let codes = dna::encode_seq(&query);

        let (hits, worker) = run(&searcher, &codes);
        assert!(hits.is_empty());
        assert_eq!(worker.backbone().count(1), 7);

        let (hits, _) = run(&searcher, &codes[..400]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 7);
        assert_eq!(hits[0].subject_offset - hits[0].query_offset, 2900);
    }

    #[test]
    fn counted_matches_are_removed_from_later_blocks() {
        let reference = make_reference(20_000, 5);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let opt = search_opt();
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &opt).unwrap();

        let origin = 5000;
        let codes = dna::encode_seq(&reference[origin..origin + 6000]);
        let last = codes.len() - table.kmer_size();
        let mut expected = 0;
        let mut window = 0;
        while window <= last {
            let end = (window + opt.scan_lead).min(last + 1);
            expected += (window..end).filter(|q| (origin + q) % 10 == 0).count();
            window = end + opt.scan_gap;
        }
        assert_eq!(expected, 400);

        let (hits, worker) = run(&searcher, &codes);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score as usize, expected);
        assert_eq!(hits[0].subject_offset - hits[0].query_offset, origin as u32);
        let left: usize = (0..worker.backbone().num_blocks()).map(|b| worker.backbone().count(b)).sum();
        assert_eq!(left, 0);
    }

    #[test]
    fn tandem_repeat_query_is_collapsed() {
        let reference = make_reference(10_000, 42);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt()).unwrap();

        // 8 份拷贝都命中同一个参考位置 3000
        let unit = &reference[3000..3020];
        let query: Vec<u8> = unit.iter().copied().cycle().take(unit.len() * 8).collect();
        let codes = dna::encode_seq(&query);

        let (hits, worker) = run(&searcher, &codes);
        assert!(hits.is_empty());
        let matches = worker.backbone().matches(1);
        assert_eq!(matches.len(), 8);
        assert!(matches.iter().all(|m| m.soff == 3000));
    }

    #[test]
    fn worker_is_reusable_across_queries() {
        let reference = make_reference(10_000, 42);
        let volume = Volume::in_memory(0, vec![("ref".to_string(), reference.clone())]);
        let table = KmerTable::build(&volume, &index_opt()).unwrap();
        let oracle = DpChainOracle::default();
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt()).unwrap();
        let mut worker = searcher.new_worker();

        let codes = dna::encode_seq(&reference[3000..3500]);
        let mut first = Vec::new();
        searcher.search(&Query { id: 1, strand: Strand::Forward, codes: &codes }, &mut worker, &mut first);
        let mut second = Vec::new();
        searcher.search(&Query { id: 1, strand: Strand::Forward, codes: &codes }, &mut worker, &mut second);
        assert_eq!(first, second);
    }
}
