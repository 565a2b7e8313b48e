//! Sharded 2-bit packed sequence store.
//!
//! A store lives under one path prefix `P` as five parallel files:
//!
//! | file    | content                                   |
//! |---------|-------------------------------------------|
//! | `P.pac` | packed residues, each sequence byte-aligned |
//! | `P.hdr` | NUL-terminated headers                     |
//! | `P.idx` | one [`SeqRecord`] per sequence             |
//! | `P.amb` | one [`AmbRun`] per ambiguity run           |
//! | `P.vol` | volume descriptors, index 0 = whole store  |
//!
//! plus `P.fpr`, the fingerprint of the build that produced them.

pub mod builder;
pub mod fingerprint;
pub mod format;
pub mod volume;

pub use builder::{BuildOutcome, BuildSummary, StoreBuilder};
pub use format::{AmbRun, SeqRecord, VolumeDescriptor};
pub use volume::{Volume, VolumeSeq};

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use format::{VOLUME_HEADER_SIZE, VOLUME_MAGIC, VOLUME_VERSION};

#[derive(Debug, Clone)]
pub struct StorePaths {
    prefix: PathBuf,
}

impl StorePaths {
    pub fn new(prefix: impl AsRef<Path>) -> Self {
        Self { prefix: prefix.as_ref().to_path_buf() }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn with_ext(&self, ext: &str) -> PathBuf {
        let mut s = self.prefix.clone().into_os_string();
        s.push(".");
        s.push(ext);
        PathBuf::from(s)
    }

    pub fn packed(&self) -> PathBuf {
        self.with_ext("pac")
    }

    pub fn headers(&self) -> PathBuf {
        self.with_ext("hdr")
    }

    pub fn records(&self) -> PathBuf {
        self.with_ext("idx")
    }

    pub fn ambiguity(&self) -> PathBuf {
        self.with_ext("amb")
    }

    pub fn volumes(&self) -> PathBuf {
        self.with_ext("vol")
    }

    pub fn fingerprint(&self) -> PathBuf {
        self.with_ext("fpr")
    }

    pub fn all_exist(&self) -> bool {
        [self.packed(), self.headers(), self.records(), self.ambiguity(), self.volumes()]
            .iter()
            .all(|p| p.is_file())
    }
}

/// An opened store: its descriptors are in memory, residues stay on disk
/// until a volume is loaded.
#[derive(Debug)]
pub struct SeqStore {
    paths: StorePaths,
    descriptors: Vec<VolumeDescriptor>,
}

impl SeqStore {
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        let paths = StorePaths::new(prefix);
        let descriptors = read_volume_file(&paths.volumes())?;
        Ok(Self { paths, descriptors })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Number of volumes, not counting the whole-store sentinel.
    pub fn num_volumes(&self) -> usize {
        self.descriptors.len() - 1
    }

    /// Descriptor `index`; 0 is the whole store, 1.. are the volumes.
    pub fn descriptor(&self, index: usize) -> Option<&VolumeDescriptor> {
        self.descriptors.get(index)
    }

    pub fn volume_descriptors(&self) -> &[VolumeDescriptor] {
        &self.descriptors[1..]
    }

    pub fn num_seqs(&self) -> u64 {
        self.descriptors[0].seq_count
    }

    pub fn num_residues(&self) -> u64 {
        self.descriptors[0].residue_count
    }

    /// Loads volume `index` (0 loads the whole store as one volume).
    pub fn load_volume(&self, index: usize) -> Result<Volume> {
        let desc = self.descriptors.get(index).ok_or(Error::VolumeOutOfRange {
            index,
            available: self.descriptors.len(),
        })?;
        Volume::load(&self.paths, index, desc)
    }
}

fn bad_descriptor(path: &Path, reason: impl Into<String>) -> Error {
    Error::BadDescriptor { path: path.to_path_buf(), reason: reason.into() }
}

fn read_volume_file(path: &Path) -> Result<Vec<VolumeDescriptor>> {
    let file_len = std::fs::metadata(path)?.len();
    if file_len < VOLUME_HEADER_SIZE {
        return Err(bad_descriptor(path, "volume file truncated"));
    }
    let mut r = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != VOLUME_MAGIC {
        return Err(bad_descriptor(path, "bad magic"));
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != VOLUME_VERSION {
        return Err(bad_descriptor(path, format!("unsupported version {}", version)));
    }
    let count = u64::from(r.read_u32::<LittleEndian>()?);
    if count == 0 || file_len != VOLUME_HEADER_SIZE + count * VolumeDescriptor::SIZE {
        return Err(bad_descriptor(
            path,
            format!("{} descriptors do not match file size {}", count, file_len),
        ));
    }

    let mut descriptors = Vec::with_capacity(count as usize);
    for _ in 0..count {
        descriptors.push(VolumeDescriptor::read(&mut r)?);
    }

    // 记录区间必须可寻址，分片必须首尾相接地覆盖整库
    for (i, d) in descriptors.iter().enumerate() {
        if d.record_range().is_none() {
            return Err(bad_descriptor(
                path,
                format!("volume {} id range {}+{} overflows", i, d.first_id, d.seq_count),
            ));
        }
    }
    let whole = descriptors[0];
    let mut next_id = whole.first_id;
    let mut residues = 0u64;
    for (i, d) in descriptors.iter().enumerate().skip(1) {
        if d.first_id != next_id {
            return Err(bad_descriptor(
                path,
                format!("volume {} starts at id {}, expected {}", i, d.first_id, next_id),
            ));
        }
        next_id = d.first_id + d.seq_count;
        residues = residues
            .checked_add(d.residue_count)
            .ok_or_else(|| bad_descriptor(path, format!("volume {} residue count overflows", i)))?;
    }
    if Some(next_id) != whole.end_id() || residues != whole.residue_count {
        return Err(bad_descriptor(path, "volumes do not cover the whole store"));
    }
    Ok(descriptors)
}
