use std::io::BufRead;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    pending_header: Option<String>,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, pending_header: None }
    }

    pub(crate) fn with_pending_header(reader: R, header: String) -> Self {
        Self { reader, buf: String::new(), done: false, pending_header: Some(header) }
    }

    fn read_line(&mut self) -> Result<usize> {
        self.buf.clear();
        Ok(self.reader.read_line(&mut self.buf)?)
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        if self.done { return Ok(None); }

        // header line starting with '@'
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => loop {
                if self.read_line()? == 0 { self.done = true; return Ok(None); }
                if self.buf.trim().is_empty() { continue; }
                match self.buf.strip_prefix('@') {
                    Some(rest) => break rest.trim_end().to_string(),
                    None => return Err(Error::Parse("FASTQ header not starting with '@'".into())),
                }
            },
        };
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if self.read_line()? == 0 {
            return Err(Error::Parse(format!("unexpected EOF after header of '{}'", id)));
        }
        let seq: Vec<u8> = self.buf.trim_end().bytes().map(|b| b.to_ascii_uppercase()).collect();

        if self.read_line()? == 0 || !self.buf.starts_with('+') {
            return Err(Error::Parse(format!("missing '+' line in '{}'", id)));
        }

        if self.read_line()? == 0 {
            return Err(Error::Parse(format!("missing quality line in '{}'", id)));
        }
        let qual = self.buf.trim_end().as_bytes().to_vec();

        // line-wrapped FASTQ is not supported
        if qual.len() != seq.len() {
            return Err(Error::Parse(format!("seq/qual length mismatch in '{}'", id)));
        }

        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}
