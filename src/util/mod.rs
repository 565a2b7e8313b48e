pub mod dna;
pub mod packed;
