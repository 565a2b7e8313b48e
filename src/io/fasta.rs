use std::io::BufRead;

use crate::error::Result;

/// 一条 FASTA 记录：完整的标题行（去掉 '>'）与原样保留的残基
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub header: String,
    pub seq: Vec<u8>,
}

impl FastaRecord {
    /// 标题行第一个空白之前的部分
    pub fn id(&self) -> &str {
        self.header.split(char::is_whitespace).next().unwrap_or("")
    }
}

/// 按字节读取的 FASTA 解析器，序列行不要求是合法 UTF-8
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: Vec<u8>,
    pending: Option<String>,
    eof: bool,
}

fn header_of(line: &[u8]) -> String {
    String::from_utf8_lossy(&line[1..]).trim().to_string()
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: Vec::new(), pending: None, eof: false }
    }

    /// 首个标题行已被格式探测读走时使用
    pub(crate) fn with_pending_header(reader: R, header: String) -> Self {
        Self { reader, line: Vec::new(), pending: Some(header), eof: false }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending.take() {
            Some(h) => h,
            None => loop {
                if self.eof || !self.read_line()? {
                    return Ok(None);
                }
                if self.line.first() == Some(&b'>') {
                    break header_of(&self.line);
                }
            },
        };

        let mut seq = Vec::new();
        while !self.eof && self.read_line()? {
            if self.line.first() == Some(&b'>') {
                self.pending = Some(header_of(&self.line));
                break;
            }
            seq.extend(
                self.line
                    .iter()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(u8::to_ascii_uppercase),
            );
        }

        Ok(Some(FastaRecord { header, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
