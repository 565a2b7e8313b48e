//! End-to-end: FASTA -> store -> k-mer table -> candidate search.

use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

use longseed::align::{CandidateSearcher, DpChainOracle, Query, Strand};
use longseed::config::{BuildOpt, IndexOpt, SearchOpt};
use longseed::index::KmerTable;
use longseed::store::{SeqStore, StoreBuilder};
use longseed::util::dna;

fn make_reference(len: usize, seed: u32) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut seq = Vec::with_capacity(len);
    let mut x = seed;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(bases[(x >> 16) as usize % 4]);
    }
    seq
}

fn store_with(dir: &TempDir, seqs: &[(&str, &[u8])]) -> SeqStore {
    let fasta = dir.path().join("ref.fa");
    let mut f = File::create(&fasta).unwrap();
    for (name, seq) in seqs {
        writeln!(f, ">{}", name).unwrap();
        for line in seq.chunks(60) {
            f.write_all(line).unwrap();
            writeln!(f).unwrap();
        }
    }
    drop(f);
    let prefix = dir.path().join("ref");
    StoreBuilder::new(&prefix, BuildOpt::default()).unwrap().build_from_file(&fasta).unwrap();
    SeqStore::open(&prefix).unwrap()
}

fn index_opt() -> IndexOpt {
    IndexOpt { kmer_size: 15, window: 10, max_occurrences: 1000, workers: 1 }
}

fn search_opt() -> SearchOpt {
    SearchOpt { block_size: 2000, workers: 1, ..SearchOpt::default() }
}

#[test]
fn substring_query_finds_its_origin() {
    let dir = TempDir::new().unwrap();
    let reference = make_reference(10_000, 42);
    let store = store_with(&dir, &[("ref", &reference[..])]);
    let volume = store.load_volume(1).unwrap();
    let table = KmerTable::build(&volume, &index_opt()).unwrap();
    let oracle = DpChainOracle::default();
    let opt = search_opt();
    let searcher = CandidateSearcher::new(&volume, &table, &oracle, &opt).unwrap();

    let codes = dna::encode_seq(&reference[3000..3500]);
    let mut worker = searcher.new_worker();
    let mut hits = Vec::new();
    searcher.search(&Query { id: 0, strand: Strand::Forward, codes: &codes }, &mut worker, &mut hits);

    let lo = 3000 - opt.band_slack;
    let hi = 3000 + opt.band_slack;
    assert!(
        hits.iter()
            .any(|h| (lo..=hi).contains(&h.subject_offset) && h.score as usize >= opt.min_block_score),
        "no candidate near 3000: {:?}",
        hits
    );
}

#[test]
fn query_shorter_than_kmer_has_no_hits() {
    let dir = TempDir::new().unwrap();
    let reference = make_reference(4_000, 1);
    let store = store_with(&dir, &[("ref", &reference[..])]);
    let volume = store.load_volume(1).unwrap();
    let table = KmerTable::build(&volume, &index_opt()).unwrap();
    let oracle = DpChainOracle::default();
    let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt()).unwrap();

    let codes = dna::encode_seq(&reference[10..24]);
    let mut worker = searcher.new_worker();
    let mut hits = Vec::new();
    searcher.search_both_strands(0, &codes, &mut worker, &mut hits);
    assert!(hits.is_empty());
}

#[test]
fn reverse_complemented_query_is_found_in_second_sequence() {
    let dir = TempDir::new().unwrap();
    let first = make_reference(5_000, 5);
    let second = make_reference(9_000, 6);
    let store = store_with(&dir, &[("first", &first[..]), ("second", &second[..])]);
    let volume = store.load_volume(1).unwrap();
    let table = KmerTable::build(&volume, &index_opt()).unwrap();
    let oracle = DpChainOracle::default();
    let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt()).unwrap();

    let query = dna::revcomp_codes(&dna::encode_seq(&second[6000..6800]));
    let mut worker = searcher.new_worker();
    let mut hits = Vec::new();
    searcher.search_both_strands(17, &query, &mut worker, &mut hits);

    let hit = hits
        .iter()
        .find(|h| h.query_strand == Strand::Reverse && h.subject_id == 1)
        .expect("reverse-strand hit on the second sequence");
    assert_eq!(hit.query_id, 17);
    assert_eq!(hit.subject_length, 9_000);
    assert_eq!(hit.query_length, 800);
    assert_eq!(i64::from(hit.subject_offset) - i64::from(hit.query_offset), 6000);
}
