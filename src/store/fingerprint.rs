use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use rustc_hash::FxHasher;

use crate::config::BuildOpt;
use crate::error::Result;

/// Identity of one store build: which input file, in which state, with which
/// parameters. Two builds with equal digests produce the same store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFingerprint {
    pub input: PathBuf,
    pub input_len: u64,
    pub input_mtime_secs: u64,
    pub input_mtime_nanos: u32,
    pub opt: BuildOpt,
    pub digest: u64,
    /// Informational; not part of the identity.
    pub built_at: Option<String>,
}

impl BuildFingerprint {
    pub fn of_input(input: &Path, opt: &BuildOpt) -> Result<Self> {
        let input = input.canonicalize()?;
        let meta = std::fs::metadata(&input)?;
        let (secs, nanos) = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or((0, 0), |d| (d.as_secs(), d.subsec_nanos()));

        let mut fp = Self {
            input,
            input_len: meta.len(),
            input_mtime_secs: secs,
            input_mtime_nanos: nanos,
            opt: opt.clone(),
            digest: 0,
            built_at: None,
        };
        fp.digest = fp.compute_digest();
        Ok(fp)
    }

    fn compute_digest(&self) -> u64 {
        let mut h = FxHasher::default();
        self.input.hash(&mut h);
        self.input_len.hash(&mut h);
        self.input_mtime_secs.hash(&mut h);
        self.input_mtime_nanos.hash(&mut h);
        self.opt.hash(&mut h);
        h.finish()
    }

    /// Same input, same state, same parameters.
    pub fn same_build(&self, other: &Self) -> bool {
        self.digest == other.digest
            && self.input == other.input
            && self.input_len == other.input_len
            && self.input_mtime_secs == other.input_mtime_secs
            && self.input_mtime_nanos == other.input_mtime_nanos
            && self.opt == other.opt
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
        bincode::serialize_into(&mut f, self)?;
        Ok(())
    }

    /// `None` when no fingerprint has been written yet.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let f = std::io::BufReader::new(std::fs::File::open(path)?);
        Ok(Some(bincode::deserialize_from(f)?))
    }
}
