use criterion::{black_box, criterion_group, criterion_main, Criterion};

use longseed::align::{CandidateSearcher, DpChainOracle, Query, Strand};
use longseed::config::{IndexOpt, SearchOpt};
use longseed::index::KmerTable;
use longseed::store::Volume;
use longseed::util::dna;

fn make_reference(len: usize) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = 42;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(bases[(x >> 16) as usize % 4]);
    }
    seq
}

fn make_volume(len: usize) -> Volume {
    Volume::in_memory(0, vec![("bench".to_string(), make_reference(len))])
}

fn index_opt() -> IndexOpt {
    IndexOpt { kmer_size: 15, window: 10, max_occurrences: 1000, workers: 1 }
}

fn bench_extract(c: &mut Criterion) {
    let volume = make_volume(100_000);
    let mut buf = Vec::new();

    c.bench_function("extract_10k_reverse", |b| {
        b.iter(|| {
            volume.extract(0, 40_000, 50_000, Strand::Reverse, &mut buf);
            black_box(buf.len());
        })
    });
}

fn bench_build_table(c: &mut Criterion) {
    let volume = make_volume(100_000);
    let opt = index_opt();

    c.bench_function("build_table_100k", |b| {
        b.iter(|| {
            black_box(KmerTable::build(black_box(&volume), &opt).map(|t| t.len()).unwrap_or(0));
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let reference = make_reference(200_000);
    let volume = Volume::in_memory(0, vec![("bench".to_string(), reference.clone())]);
    let table = match KmerTable::build(&volume, &index_opt()) {
        Ok(t) => t,
        Err(e) => panic!("table build failed: {}", e),
    };
    let oracle = DpChainOracle::default();
    let opt = SearchOpt { workers: 1, ..SearchOpt::default() };
    let searcher = match CandidateSearcher::new(&volume, &table, &oracle, &opt) {
        Ok(s) => s,
        Err(e) => panic!("invalid search options: {}", e),
    };
    let codes = dna::encode_seq(&reference[120_000..125_000]);
    let mut worker = searcher.new_worker();
    let mut hits = Vec::new();

    c.bench_function("search_5k_query", |b| {
        b.iter(|| {
            hits.clear();
            searcher.search(&Query { id: 0, strand: Strand::Forward, codes: black_box(&codes) }, &mut worker, &mut hits);
            black_box(hits.len());
        })
    });
}

criterion_group!(benches, bench_extract, bench_build_table, bench_search);
criterion_main!(benches);
