use std::path::PathBuf;

/// Result alias used by the store, the lookup table and option validation.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A descriptor names bytes that the backing file does not have.
    #[error("corrupt store '{}': {what} range {start}..{end} exceeds file size {actual}", .path.display())]
    CorruptStore {
        path: PathBuf,
        what: &'static str,
        start: u64,
        end: u64,
        actual: u64,
    },

    #[error("corrupt store '{}': {reason}", .path.display())]
    BadDescriptor { path: PathBuf, reason: String },

    #[error("volume {index} out of range (store has {available} volumes)")]
    VolumeOutOfRange { index: usize, available: usize },

    #[error("volume spans {residues} residues, more than the k-mer table can address")]
    VolumeTooLarge { residues: u64 },

    #[error("malformed input: {0}")]
    Parse(String),

    #[error("invalid option: {0}")]
    InvalidConfig(String),

    #[error("fingerprint: {0}")]
    Fingerprint(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for every error that means the on-disk store cannot be trusted.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptStore { .. } | Self::BadDescriptor { .. })
    }
}
