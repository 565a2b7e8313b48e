/// 2-bit packed residue array, four residues per byte.
///
/// Residue `i` lives in byte `i / 4`; the first residue of a byte occupies the
/// high two bits. Callers never compute byte or bit offsets themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedSeq {
    bytes: Vec<u8>,
    len: usize,
}

#[inline]
fn shift_of(index: usize) -> u32 {
    ((3 - (index & 3)) << 1) as u32
}

/// Bytes needed to hold `residues` packed residues.
#[inline]
pub fn packed_len(residues: usize) -> usize {
    (residues + 3) / 4
}

impl PackedSeq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(residues: usize) -> Self {
        Self { bytes: Vec::with_capacity(packed_len(residues)), len: 0 }
    }

    pub fn from_codes(codes: &[u8]) -> Self {
        let mut p = Self::with_capacity(codes.len());
        for &c in codes {
            p.push(c);
        }
        p
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        debug_assert!(index < self.len);
        (self.bytes[index >> 2] >> shift_of(index)) & 3
    }

    #[inline]
    pub fn set(&mut self, index: usize, code: u8) {
        debug_assert!(index < self.len);
        let sh = shift_of(index);
        let b = &mut self.bytes[index >> 2];
        *b = (*b & !(3 << sh)) | ((code & 3) << sh);
    }

    pub fn push(&mut self, code: u8) {
        if self.len & 3 == 0 {
            self.bytes.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, code);
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.len = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..packed_len(self.len)]
    }
}

/// Read-only view over a packed region starting at a byte boundary.
#[derive(Debug, Clone, Copy)]
pub struct PackedView<'a> {
    bytes: &'a [u8],
    len: usize,
}

impl<'a> PackedView<'a> {
    pub fn new(bytes: &'a [u8], len: usize) -> Self {
        assert!(packed_len(len) <= bytes.len(), "packed view too short for {} residues", len);
        Self { bytes, len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        debug_assert!(index < self.len);
        (self.bytes[index >> 2] >> shift_of(index)) & 3
    }
}
