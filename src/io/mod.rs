pub mod fasta;
pub mod fastq;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// A named sequence as read from FASTA or FASTQ.
#[derive(Debug, Clone)]
pub struct NamedSeq {
    pub header: String,
    pub seq: Vec<u8>,
}

/// FASTA or FASTQ reader, chosen from the first non-blank line.
pub enum SeqReader<R: BufRead> {
    Fasta(fasta::FastaReader<R>),
    Fastq(fastq::FastqReader<R>),
    Empty,
}

impl<R: BufRead> SeqReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(SeqReader::Empty);
            }
            if let Some(rest) = line.strip_prefix('>') {
                let header = rest.trim().to_string();
                return Ok(SeqReader::Fasta(fasta::FastaReader::with_pending_header(reader, header)));
            }
            if let Some(rest) = line.strip_prefix('@') {
                let header = rest.trim_end().to_string();
                return Ok(SeqReader::Fastq(fastq::FastqReader::with_pending_header(reader, header)));
            }
            if !line.trim().is_empty() {
                return Err(Error::Parse(format!(
                    "expected '>' or '@' before sequence data, found '{}'",
                    line.trim_end()
                )));
            }
        }
    }

    pub fn next_seq(&mut self) -> Result<Option<NamedSeq>> {
        match self {
            SeqReader::Fasta(r) => Ok(r.next_record()?.map(|rec| NamedSeq { header: rec.header, seq: rec.seq })),
            SeqReader::Fastq(r) => Ok(r.next_record()?.map(|rec| {
                let header = match rec.desc {
                    Some(d) => format!("{} {}", rec.id, d),
                    None => rec.id,
                };
                NamedSeq { header, seq: rec.seq }
            })),
            SeqReader::Empty => Ok(None),
        }
    }
}

impl<R: BufRead> Iterator for SeqReader<R> {
    type Item = Result<NamedSeq>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_seq().transpose()
    }
}

pub fn open_seq_file(path: &Path) -> Result<SeqReader<BufReader<File>>> {
    SeqReader::new(BufReader::new(File::open(path)?))
}
