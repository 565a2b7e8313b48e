pub mod lookup;

pub use lookup::{KmerTable, TableStats};
