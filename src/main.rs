use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

use longseed::align::{CandidateHit, CandidateSearcher, DpChainOracle, Query, Strand};
use longseed::config::{BuildOpt, IndexOpt, SearchOpt};
use longseed::index::KmerTable;
use longseed::io::open_seq_file;
use longseed::store::{BuildOutcome, SeqStore, StoreBuilder};
use longseed::util::dna;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "longseed",
    author,
    version,
    about = "Candidate-region seeding for long-read alignment",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack a FASTA/FASTQ file into a sharded 2-bit store
    Build {
        /// Input FASTA or FASTQ file
        input: PathBuf,
        /// Output prefix for store files
        #[arg(short, long, default_value = "ref")]
        output: PathBuf,
        /// Skip sequences shorter than this
        #[arg(long = "min-len", default_value_t = 0)]
        min_len: usize,
        /// Skip sequences longer than this (0 = no limit)
        #[arg(long = "max-len", default_value_t = 0)]
        max_len: usize,
        /// Residues per volume
        #[arg(long = "volume-residues", default_value_t = 1_000_000_000)]
        volume_residues: u64,
        /// Sequences per volume
        #[arg(long = "volume-seqs", default_value_t = 10_000_000)]
        volume_seqs: u64,
        /// Replace headers with zero-padded sequence ids
        #[arg(long)]
        rename: bool,
        /// Rebuild even if the store matches the input
        #[arg(short, long)]
        force: bool,
    },
    /// Print store and volume statistics
    Info {
        /// Store prefix
        prefix: PathBuf,
    },
    /// Find candidate regions for queries against every volume of a store
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Store prefix
    #[arg(short = 'r', long = "ref")]
    reference: PathBuf,
    /// Query FASTA/FASTQ file; omit to compare the store against itself
    queries: Option<PathBuf>,
    /// Output TSV path (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
    #[arg(short = 'k', long = "kmer", default_value_t = 15)]
    kmer_size: usize,
    /// Reference sampling window
    #[arg(short = 'w', long = "window", default_value_t = 10)]
    window: usize,
    /// Drop k-mers occurring more often than this
    #[arg(long = "max-occ", default_value_t = 1000)]
    max_occurrences: usize,
    #[arg(long = "stride", default_value_t = 1)]
    query_stride: usize,
    #[arg(long = "scan-lead", default_value_t = 1000)]
    scan_lead: usize,
    #[arg(long = "scan-gap", default_value_t = 500)]
    scan_gap: usize,
    #[arg(long = "block-size", default_value_t = 2048)]
    block_size: u32,
    #[arg(long = "block-capacity", default_value_t = 1024)]
    block_capacity: usize,
    #[arg(long = "min-score", default_value_t = 10)]
    min_block_score: usize,
    #[arg(long = "band-slack", default_value_t = 500)]
    band_slack: u32,
    #[arg(long = "max-drift", default_value_t = 500)]
    max_drift: i64,
    #[arg(long = "max-skew", default_value_t = 0.25)]
    max_skew: f64,
    /// Do not merge sparse neighbour blocks into strong blocks
    #[arg(long = "no-neighbors")]
    no_neighbors: bool,
    /// Search the forward query strand only
    #[arg(long = "forward-only")]
    forward_only: bool,
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,
}

impl SearchArgs {
    fn index_opt(&self) -> IndexOpt {
        IndexOpt {
            kmer_size: self.kmer_size,
            window: self.window,
            max_occurrences: self.max_occurrences,
            workers: self.threads,
        }
    }

    fn search_opt(&self) -> SearchOpt {
        SearchOpt {
            query_stride: self.query_stride,
            scan_lead: self.scan_lead,
            scan_gap: self.scan_gap,
            block_size: self.block_size,
            block_capacity: self.block_capacity,
            min_block_score: self.min_block_score,
            band_slack: self.band_slack,
            max_drift: self.max_drift,
            max_skew: self.max_skew,
            self_compare: self.queries.is_none(),
            pull_neighbors: !self.no_neighbors,
            workers: self.threads,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build { input, output, min_len, max_len, volume_residues, volume_seqs, rename, force } => {
            let opt = BuildOpt {
                min_len,
                max_len,
                max_volume_residues: volume_residues,
                max_volume_seqs: volume_seqs,
                rename_headers: rename,
            };
            run_build(&input, &output, opt, force)
        }
        Commands::Info { prefix } => run_info(&prefix),
        Commands::Search(args) => run_search(&args),
    }
}

fn run_build(input: &Path, output: &Path, opt: BuildOpt, force: bool) -> Result<()> {
    let builder = StoreBuilder::new(output, opt).map_err(|e| anyhow!("invalid build options: {}", e))?;
    if force {
        let fpr = builder.paths().fingerprint();
        if fpr.exists() {
            std::fs::remove_file(&fpr).with_context(|| format!("cannot remove '{}'", fpr.display()))?;
        }
    }
    let outcome = builder
        .build_from_file(input)
        .with_context(|| format!("cannot build store '{}' from '{}'", output.display(), input.display()))?;
    match outcome {
        BuildOutcome::UpToDate => println!("store '{}' is up to date", output.display()),
        BuildOutcome::Built(summary) => {
            println!("input: {}", input.display());
            println!("sequences: {}", summary.sequences);
            println!("filtered: {}", summary.filtered);
            println!("residues: {}", summary.residues);
            println!("volumes: {}", summary.volumes);
        }
    }
    Ok(())
}

fn run_info(prefix: &Path) -> Result<()> {
    let store = SeqStore::open(prefix).with_context(|| format!("cannot open store '{}'", prefix.display()))?;
    println!("store: {}", prefix.display());
    println!("sequences: {}", store.num_seqs());
    println!("residues: {}", store.num_residues());
    println!("volumes: {}", store.num_volumes());
    for (i, d) in store.volume_descriptors().iter().enumerate() {
        println!(
            "  volume {}: first id {} sequences {} residues {} packed bytes {}",
            i + 1,
            d.first_id,
            d.seq_count,
            d.residue_count,
            d.pac_end.saturating_sub(d.pac_start)
        );
    }
    Ok(())
}

/// 查询按全局 id 编号：外部文件按出现顺序，自比对时即参考序列 id
fn load_queries(args: &SearchArgs, store: &SeqStore) -> Result<Vec<(u64, Vec<u8>)>> {
    let mut queries = Vec::new();
    match &args.queries {
        Some(path) => {
            let reader = open_seq_file(path).with_context(|| format!("cannot open queries '{}'", path.display()))?;
            for (id, rec) in reader.enumerate() {
                let rec = rec.with_context(|| format!("cannot parse queries '{}'", path.display()))?;
                queries.push((id as u64, dna::encode_seq(&rec.seq)));
            }
        }
        None => {
            for vi in 1..=store.num_volumes() {
                let volume = store.load_volume(vi)?;
                for id in 0..volume.len() {
                    let mut codes = Vec::new();
                    volume.extract(id, 0, volume.seq_size(id), Strand::Forward, &mut codes);
                    queries.push((volume.global_id(id), codes));
                }
            }
        }
    }
    Ok(queries)
}

fn run_search(args: &SearchArgs) -> Result<()> {
    let index_opt = args.index_opt();
    let search_opt = args.search_opt();
    index_opt.validate().map_err(|e| anyhow!("invalid index options: {}", e))?;
    search_opt.validate().map_err(|e| anyhow!("invalid search options: {}", e))?;

    let store = SeqStore::open(&args.reference)
        .with_context(|| format!("cannot open store '{}'", args.reference.display()))?;
    let queries = load_queries(args, &store)?;
    log::info!("{} queries against {} volumes", queries.len(), store.num_volumes());

    let mut out: Box<dyn Write> = match &args.out {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("cannot create '{}'", p.display()))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(search_opt.workers)
        .build()
        .map_err(|e| anyhow!("cannot start search workers: {}", e))?;
    let oracle = DpChainOracle::default();

    let mut total = 0usize;
    for vi in 1..=store.num_volumes() {
        // 切换分片：上一个分片的查找表和工作区随作用域一起释放
        let volume = store.load_volume(vi)?;
        log::info!("volume {}: {} sequences, {} residues", vi, volume.len(), volume.residue_count());
        let table = KmerTable::build(&volume, &index_opt)?;
        let searcher = CandidateSearcher::new(&volume, &table, &oracle, &search_opt)?;

        let hits: Vec<CandidateHit> = pool.install(|| {
            queries
                .par_iter()
                .map_init(
                    || searcher.new_worker(),
                    |worker, (id, codes)| {
                        let mut hits = Vec::new();
                        if args.forward_only {
                            searcher.search(&Query { id: *id, strand: Strand::Forward, codes }, worker, &mut hits);
                        } else {
                            searcher.search_both_strands(*id, codes, worker, &mut hits);
                        }
                        hits
                    },
                )
                .flatten()
                .collect()
        });

        for hit in &hits {
            writeln!(out, "{}", hit)?;
        }
        total += hits.len();
    }
    out.flush()?;
    log::info!("{} candidates written", total);
    Ok(())
}
