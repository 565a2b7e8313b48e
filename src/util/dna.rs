/// 非标准碱基在 packed 数组中的占位编码
pub const AMBIGUOUS_FILL: u8 = 0;

/// 链方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// 输出用单字符
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// 将 ASCII 碱基映射为 2-bit 编码；非 ACGT(U) 返回 None。
#[inline]
pub fn to_code(b: u8) -> Option<u8> {
    match b.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' | b'U' => Some(3),
        _ => None,
    }
}

/// 同 [`to_code`]，但歧义碱基落到 [`AMBIGUOUS_FILL`]。
#[inline]
pub fn to_code_or_fill(b: u8) -> u8 {
    to_code(b).unwrap_or(AMBIGUOUS_FILL)
}

#[inline]
pub fn from_code(c: u8) -> u8 {
    match c & 3 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        _ => b'T',
    }
}

#[inline]
pub fn complement_code(c: u8) -> u8 {
    3 - (c & 3)
}

/// ASCII 序列 -> 2-bit 编码序列（歧义碱基按 A 处理）
pub fn encode_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| to_code_or_fill(b)).collect()
}

pub fn decode_seq(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&c| from_code(c)).collect()
}

/// 编码序列的反向互补，写入调用方持有的缓冲区
pub fn revcomp_codes_into(codes: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(codes.iter().rev().map(|&c| complement_code(c)));
}

pub fn revcomp_codes(codes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(codes.len());
    revcomp_codes_into(codes, &mut out);
    out
}

/// Packs `codes[start..start + k]` into a k-mer value, first residue in the
/// high bits. `k` must be at most 32.
#[inline]
pub fn pack_kmer(codes: &[u8], start: usize, k: usize) -> u64 {
    let mut h = 0u64;
    for &c in &codes[start..start + k] {
        h = (h << 2) | u64::from(c & 3);
    }
    h
}

/// Inverse of [`pack_kmer`].
pub fn unpack_kmer(mut h: u64, k: usize) -> Vec<u8> {
    let mut out = vec![0u8; k];
    for slot in out.iter_mut().rev() {
        *slot = (h & 3) as u8;
        h >>= 2;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_cover_canonical_alphabet() {
        assert_eq!(encode_seq(b"ACGTacgtU"), vec![0, 1, 2, 3, 0, 1, 2, 3, 3]);
        assert_eq!(to_code(b'N'), None);
        assert_eq!(to_code_or_fill(b'R'), AMBIGUOUS_FILL);
        assert_eq!(decode_seq(&[0, 1, 2, 3]), b"ACGT");
    }

    #[test]
    fn revcomp_is_involution() {
        let codes = encode_seq(b"AACGTTTGCAGGC");
        let rc = revcomp_codes(&codes);
        assert_eq!(decode_seq(&rc), b"GCCTGCAAACGTT");
        assert_eq!(revcomp_codes(&rc), codes);
    }

    #[test]
    fn kmer_packing_is_reversible() {
        let codes = encode_seq(b"GATTACAGATTACA");
        let h = pack_kmer(&codes, 2, 9);
        assert_eq!(unpack_kmer(h, 9), codes[2..11].to_vec());
        assert_eq!(pack_kmer(&codes, 0, 2), 0b10_00);
    }
}
