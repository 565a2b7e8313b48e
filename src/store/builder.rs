use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use log::info;

use super::fingerprint::BuildFingerprint;
use super::format::{AmbRun, SeqRecord, VolumeDescriptor, VOLUME_MAGIC, VOLUME_VERSION};
use super::StorePaths;
use crate::config::BuildOpt;
use crate::error::{Error, Result};
use crate::io::{open_seq_file, NamedSeq};
use crate::util::dna;
use crate::util::packed::{packed_len, PackedSeq};

/// Width of generated headers (zero-padded global id).
pub const GENERATED_HEADER_WIDTH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub sequences: u64,
    pub filtered: u64,
    pub residues: u64,
    pub volumes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(BuildSummary),
    /// Fingerprint matched the previous build; nothing was written.
    UpToDate,
}

/// Encodes `seq` into `packed`, appending one [`AmbRun`] per maximal run of
/// identical non-ACGT symbols. Ambiguous positions are packed as
/// [`dna::AMBIGUOUS_FILL`].
pub fn encode_residues(seq: &[u8], packed: &mut PackedSeq, runs: &mut Vec<AmbRun>) {
    for (i, &b) in seq.iter().enumerate() {
        match dna::to_code(b) {
            Some(c) => packed.push(c),
            None => {
                packed.push(dna::AMBIGUOUS_FILL);
                let sym = b.to_ascii_uppercase();
                let i = i as u32;
                match runs.last_mut() {
                    Some(run) if run.end() == u64::from(i) && run.symbol == sym => run.len += 1,
                    _ => runs.push(AmbRun { offset: i, len: 1, symbol: sym }),
                }
            }
        }
    }
}

/// Cuts records (in id order) into volumes. Index 0 of the result is the
/// whole-database sentinel.
pub fn partition_volumes(records: &[SeqRecord], opt: &BuildOpt) -> Vec<VolumeDescriptor> {
    let mut whole = VolumeDescriptor::default();
    let mut vols: Vec<VolumeDescriptor> = Vec::new();
    let mut cur: Option<VolumeDescriptor> = None;

    for (id, rec) in records.iter().enumerate() {
        let size = u64::from(rec.size);
        let pac_end = rec.pac_offset + packed_len(rec.size as usize) as u64;
        let hdr_end = rec.header_offset + u64::from(rec.header_len) + 1;
        let amb_end = (rec.amb_index + u64::from(rec.amb_count)) * AmbRun::SIZE;

        match cur.as_mut() {
            Some(v)
                if v.seq_count < opt.max_volume_seqs
                    && v.residue_count + size <= opt.max_volume_residues =>
            {
                v.seq_count += 1;
                v.residue_count += size;
                v.pac_end = pac_end;
                v.hdr_end = hdr_end;
                v.amb_end = amb_end;
            }
            _ => {
                vols.extend(cur.take());
                cur = Some(VolumeDescriptor {
                    first_id: id as u64,
                    seq_count: 1,
                    residue_count: size,
                    pac_start: rec.pac_offset,
                    pac_end,
                    hdr_start: rec.header_offset,
                    hdr_end,
                    amb_start: rec.amb_index * AmbRun::SIZE,
                    amb_end,
                });
            }
        }

        whole.seq_count += 1;
        whole.residue_count += size;
        whole.pac_end = pac_end;
        whole.hdr_end = hdr_end;
        whole.amb_end = amb_end;
    }
    vols.extend(cur);

    let mut out = Vec::with_capacity(vols.len() + 1);
    out.push(whole);
    out.extend(vols);
    out
}

pub(crate) fn write_volume_file(path: &Path, vols: &[VolumeDescriptor]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(VOLUME_MAGIC)?;
    w.write_u32::<LittleEndian>(VOLUME_VERSION)?;
    w.write_u32::<LittleEndian>(vols.len() as u32)?;
    for v in vols {
        v.write(&mut w)?;
    }
    w.flush()?;
    Ok(())
}

/// Writes a sharded packed store under one path prefix.
pub struct StoreBuilder {
    paths: StorePaths,
    opt: BuildOpt,
}

impl StoreBuilder {
    pub fn new(prefix: impl AsRef<Path>, opt: BuildOpt) -> Result<Self> {
        opt.validate()?;
        Ok(Self { paths: StorePaths::new(prefix), opt })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Builds from a FASTA/FASTQ file unless the persisted fingerprint shows
    /// an identical earlier build.
    pub fn build_from_file(&self, input: &Path) -> Result<BuildOutcome> {
        let mut fp = BuildFingerprint::of_input(input, &self.opt)?;
        let fpr_path = self.paths.fingerprint();
        if let Some(prev) = BuildFingerprint::load_from_file(&fpr_path)? {
            if prev.same_build(&fp) && self.paths.all_exist() {
                info!("store '{}' is up to date with '{}'", self.paths.prefix().display(), input.display());
                return Ok(BuildOutcome::UpToDate);
            }
        }
        // an interrupted build must not look current
        if fpr_path.exists() {
            std::fs::remove_file(&fpr_path)?;
        }

        let reader = open_seq_file(input)?;
        let summary = self.build(reader.map(|r| r.map(|NamedSeq { header, seq }| (header, seq))))?;

        fp.built_at = Some(chrono::Utc::now().to_rfc3339());
        fp.save_to_file(&fpr_path)?;
        Ok(BuildOutcome::Built(summary))
    }

    /// Packs an ordered stream of `(header, residues)` into the store files.
    pub fn build<I>(&self, seqs: I) -> Result<BuildSummary>
    where
        I: IntoIterator<Item = Result<(String, Vec<u8>)>>,
    {
        let mut pac = BufWriter::new(File::create(self.paths.packed())?);
        let mut hdr = BufWriter::new(File::create(self.paths.headers())?);
        let mut idx = BufWriter::new(File::create(self.paths.records())?);
        let mut amb = BufWriter::new(File::create(self.paths.ambiguity())?);

        let mut records: Vec<SeqRecord> = Vec::new();
        let mut summary = BuildSummary::default();
        let mut packed = PackedSeq::new();
        let mut runs: Vec<AmbRun> = Vec::new();
        let (mut pac_off, mut hdr_off, mut amb_idx) = (0u64, 0u64, 0u64);

        for item in seqs {
            let (header, seq) = item?;
            if !self.opt.accepts(seq.len()) {
                summary.filtered += 1;
                continue;
            }
            if seq.len() > u32::MAX as usize {
                return Err(Error::InvalidConfig(format!(
                    "sequence '{}' has {} residues, more than a record can hold",
                    header,
                    seq.len()
                )));
            }
            let id = records.len();

            packed.clear();
            runs.clear();
            encode_residues(&seq, &mut packed, &mut runs);
            pac.write_all(packed.as_bytes())?;

            let header = if self.opt.rename_headers {
                format!("{:0width$}", id, width = GENERATED_HEADER_WIDTH)
            } else {
                header
            };
            hdr.write_all(header.as_bytes())?;
            hdr.write_all(&[0])?;

            for run in &runs {
                run.write(&mut amb)?;
            }

            let rec = SeqRecord {
                pac_offset: pac_off,
                header_offset: hdr_off,
                amb_index: amb_idx,
                size: seq.len() as u32,
                header_len: header.len() as u32,
                amb_count: runs.len() as u32,
            };
            rec.write(&mut idx)?;
            records.push(rec);

            pac_off += packed.as_bytes().len() as u64;
            hdr_off += header.len() as u64 + 1;
            amb_idx += runs.len() as u64;
            summary.sequences += 1;
            summary.residues += seq.len() as u64;
        }

        pac.flush()?;
        hdr.flush()?;
        idx.flush()?;
        amb.flush()?;

        let vols = partition_volumes(&records, &self.opt);
        write_volume_file(&self.paths.volumes(), &vols)?;
        summary.volumes = vols.len() - 1;

        info!(
            "packed {} sequences ({} residues, {} filtered) into {} volumes at '{}'",
            summary.sequences,
            summary.residues,
            summary.filtered,
            summary.volumes,
            self.paths.prefix().display()
        );
        Ok(summary)
    }
}
