//! Mapped reads as delivered by the alignment reader.

use serde::{Deserialize, Serialize};
use umi::UmiIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn is_reverse(self) -> bool {
        self == Strand::Reverse
    }
}

/// A base that differs from the reference, at `offset` from the start of
/// the read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub offset: u16,
    pub reference_base: u8,
    pub observed_base: u8,
}

impl Mismatch {
    pub fn new(offset: u16, reference_base: u8, observed_base: u8) -> Self {
        Mismatch {
            offset,
            reference_base,
            observed_base,
        }
    }
}

/// True if `offset` is at least `margin` bases away from both ends of a
/// read of `read_length` bases.
pub fn within_margin(offset: u16, read_length: u16, margin: u16) -> bool {
    offset >= margin && u32::from(offset) + u32::from(margin) < u32::from(read_length)
}

/// One aligned read. `position` is 1-based. `ambiguous` is set when the
/// aligner reported several equally good placements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedRead {
    pub chrom: String,
    pub position: u32,
    pub strand: Strand,
    pub barcode: u32,
    pub umi: UmiIndex,
    pub read_length: u16,
    pub ambiguous: bool,
    pub mismatches: Vec<Mismatch>,
}

impl MappedRead {
    pub fn new(
        chrom: impl Into<String>,
        position: u32,
        strand: Strand,
        barcode: u32,
        umi: impl Into<UmiIndex>,
        read_length: u16,
    ) -> Self {
        MappedRead {
            chrom: chrom.into(),
            position,
            strand,
            barcode,
            umi: umi.into(),
            read_length,
            ambiguous: false,
            mismatches: Vec::new(),
        }
    }

    pub fn with_mismatches(mut self, mismatches: Vec<Mismatch>) -> Self {
        self.mismatches = mismatches;
        self
    }

    pub fn with_ambiguous_placement(mut self) -> Self {
        self.ambiguous = true;
        self
    }

    /// Mismatches far enough from both read ends to be trusted.
    pub fn inner_mismatches(&self, margin: u16) -> impl Iterator<Item = &Mismatch> + '_ {
        self.mismatches
            .iter()
            .filter(move |m| within_margin(m.offset, self.read_length, margin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_margin() {
        // 10 bp read, margin 3: offsets 3..=6 are usable
        let usable: Vec<u16> = (0..10).filter(|&o| within_margin(o, 10, 3)).collect();
        assert_eq!(usable, vec![3, 4, 5, 6]);
        assert!(within_margin(0, 1, 0));
        assert!(!within_margin(2, 4, 2));
    }

    #[test]
    fn test_inner_mismatches() {
        let read = MappedRead::new("chr1", 100, Strand::Forward, 0, 3u32, 20).with_mismatches(vec![
            Mismatch::new(1, b'A', b'G'),
            Mismatch::new(10, b'C', b'T'),
            Mismatch::new(18, b'G', b'A'),
        ]);
        let inner: Vec<_> = read.inner_mismatches(5).map(|m| m.offset).collect();
        assert_eq!(inner, vec![10]);
    }
}
