//! Validated build / index / search options.
//!
//! Every option struct is a plain value: it is filled in once (by the CLI or a
//! caller), checked with `validate()`, and then handed by reference to the
//! component that needs it. Nothing here is mutated once a run has started.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Store construction parameters. Part of the build fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildOpt {
    /// Sequences shorter than this are skipped.
    pub min_len: usize,
    /// Sequences longer than this are skipped; 0 disables the limit.
    pub max_len: usize,
    /// Upper bound on residues per volume.
    pub max_volume_residues: u64,
    /// Upper bound on sequences per volume.
    pub max_volume_seqs: u64,
    /// Replace every header with the zero-padded global id.
    pub rename_headers: bool,
}

impl Default for BuildOpt {
    fn default() -> Self {
        Self {
            min_len: 0,
            max_len: 0,
            max_volume_residues: 1_000_000_000,
            max_volume_seqs: 10_000_000,
            rename_headers: false,
        }
    }
}

impl BuildOpt {
    pub fn validate(&self) -> Result<()> {
        if self.max_volume_residues == 0 {
            return Err(Error::InvalidConfig("max volume residues must be positive".into()));
        }
        if self.max_volume_residues > u64::from(u32::MAX) {
            return Err(Error::InvalidConfig(format!(
                "max volume residues {} exceeds {}",
                self.max_volume_residues,
                u32::MAX
            )));
        }
        if self.max_volume_seqs == 0 {
            return Err(Error::InvalidConfig("max volume sequences must be positive".into()));
        }
        if self.max_len != 0 && self.max_len < self.min_len {
            return Err(Error::InvalidConfig(format!(
                "max length {} is below min length {}",
                self.max_len, self.min_len
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn accepts(&self, len: usize) -> bool {
        len >= self.min_len && (self.max_len == 0 || len <= self.max_len)
    }
}

/// K-mer lookup table parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOpt {
    pub kmer_size: usize,
    /// Reference positions are sampled every `window` residues.
    pub window: usize,
    /// K-mers occurring more often than this are dropped.
    pub max_occurrences: usize,
    pub workers: usize,
}

impl Default for IndexOpt {
    fn default() -> Self {
        Self {
            kmer_size: 15,
            window: 10,
            max_occurrences: 1000,
            workers: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        }
    }
}

impl IndexOpt {
    pub fn validate(&self) -> Result<()> {
        if self.kmer_size == 0 || self.kmer_size > 32 {
            return Err(Error::InvalidConfig(format!(
                "k-mer size {} not in 1..=32",
                self.kmer_size
            )));
        }
        if self.window == 0 {
            return Err(Error::InvalidConfig("sampling window must be positive".into()));
        }
        if self.max_occurrences == 0 {
            return Err(Error::InvalidConfig("occurrence ceiling must be positive".into()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("worker count must be positive".into()));
        }
        Ok(())
    }
}

/// Candidate search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOpt {
    /// Distance between consecutive query k-mers inside a scan window.
    pub query_stride: usize,
    /// Query positions scanned per window.
    pub scan_lead: usize,
    /// Query positions skipped after each window.
    pub scan_gap: usize,
    /// Rounded up to a power of two.
    pub block_size: u32,
    /// Matches kept per block per query.
    pub block_capacity: usize,
    pub min_block_score: usize,
    /// Extra subject residues on each side of the candidate band.
    pub band_slack: u32,
    /// Largest |dq - ds| the collinearity test tolerates.
    pub max_drift: i64,
    /// Largest relative skew |dq/ds - 1| the collinearity test tolerates.
    pub max_skew: f64,
    /// Reference and queries are the same collection; skip a query's own sequence.
    pub self_compare: bool,
    /// Pull sparse neighbour blocks into a high-scoring block before grouping.
    pub pull_neighbors: bool,
    pub workers: usize,
}

impl Default for SearchOpt {
    fn default() -> Self {
        Self {
            query_stride: 1,
            scan_lead: 1000,
            scan_gap: 500,
            block_size: 2048,
            block_capacity: 1024,
            min_block_score: 10,
            band_slack: 500,
            max_drift: 500,
            max_skew: 0.25,
            self_compare: false,
            pull_neighbors: true,
            workers: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        }
    }
}

impl SearchOpt {
    pub fn validate(&self) -> Result<()> {
        if self.query_stride == 0 {
            return Err(Error::InvalidConfig("query stride must be positive".into()));
        }
        if self.scan_lead == 0 {
            return Err(Error::InvalidConfig("scan lead must be positive".into()));
        }
        if self.block_size == 0 || self.block_size > 1 << 30 {
            return Err(Error::InvalidConfig(format!(
                "block size {} not in 1..=2^30",
                self.block_size
            )));
        }
        if self.block_capacity == 0 {
            return Err(Error::InvalidConfig("block capacity must be positive".into()));
        }
        if self.min_block_score == 0 {
            return Err(Error::InvalidConfig("minimum block score must be positive".into()));
        }
        if self.max_drift < 0 {
            return Err(Error::InvalidConfig("max drift must not be negative".into()));
        }
        if !(self.max_skew > 0.0 && self.max_skew.is_finite()) {
            return Err(Error::InvalidConfig(format!("max skew {} must be positive", self.max_skew)));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("worker count must be positive".into()));
        }
        Ok(())
    }

    pub fn geometry(&self) -> BlockGeometry {
        BlockGeometry::new(self.block_size)
    }
}

/// Block size, shift and mask for the diagonal backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    size: u32,
    shift: u32,
    mask: u32,
}

impl BlockGeometry {
    /// `block_size` is rounded up to the next power of two.
    pub fn new(block_size: u32) -> Self {
        let size = block_size.max(1).next_power_of_two();
        let shift = size.trailing_zeros();
        Self { size, shift, mask: size - 1 }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn shift(&self) -> u32 {
        self.shift
    }

    #[inline]
    pub fn mask(&self) -> u32 {
        self.mask
    }

    #[inline]
    pub fn block_of(&self, pos: u32) -> usize {
        (pos >> self.shift) as usize
    }

    /// Blocks needed to cover `extent` coordinates.
    pub fn blocks_for(&self, extent: u64) -> usize {
        ((extent + u64::from(self.mask)) >> self.shift) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rounds_to_power_of_two() {
        let g = BlockGeometry::new(2000);
        assert_eq!(g.size(), 2048);
        assert_eq!(g.shift(), 11);
        assert_eq!(g.mask(), 2047);
        assert_eq!(g.block_of(3000), 1);
        assert_eq!(g.blocks_for(10_000), 5);
        assert_eq!(BlockGeometry::new(1024).size(), 1024);
    }

    #[test]
    fn defaults_validate() {
        BuildOpt::default().validate().unwrap();
        IndexOpt::default().validate().unwrap();
        SearchOpt::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_options() {
        let idx = IndexOpt { kmer_size: 33, ..IndexOpt::default() };
        assert!(matches!(idx.validate(), Err(Error::InvalidConfig(_))));

        let build = BuildOpt { min_len: 100, max_len: 50, ..BuildOpt::default() };
        assert!(build.validate().is_err());

        let search = SearchOpt { max_skew: 0.0, ..SearchOpt::default() };
        assert!(search.validate().is_err());
    }

    #[test]
    fn length_filter() {
        let opt = BuildOpt { min_len: 10, max_len: 20, ..BuildOpt::default() };
        assert!(!opt.accepts(9));
        assert!(opt.accepts(10));
        assert!(opt.accepts(20));
        assert!(!opt.accepts(21));
        let open = BuildOpt { min_len: 10, ..BuildOpt::default() };
        assert!(open.accepts(1 << 30));
    }
}
