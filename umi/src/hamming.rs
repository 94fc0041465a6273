//!
//! Precomputed pairwise Hamming distances between all UMIs of a fixed length.
//!
//! The table holds `4^L * 4^L` entries, so its size grows as `16^L` bytes:
//!
//! | L | entries | memory |
//! |---|---------|--------|
//! | 4 | 65 536  | 64 KiB |
//! | 5 | 1 M     | 1 MiB  |
//! | 6 | 16 M    | 16 MiB |
//! | 7 | 256 M   | 256 MiB |
//!
//! Lengths above `MAX_HAMMING_UMI_LENGTH` are rejected at construction.
//!
use crate::{num_umis, UmiError, UmiIndex};
use log::info;

/// Longest UMI for which a `HammingTable` may be built.
pub const MAX_HAMMING_UMI_LENGTH: usize = 7;

/// Number of mismatching bases between two 2-bit encoded UMIs.
#[inline]
pub fn umi_distance(a: u32, b: u32) -> u8 {
    let diff = a ^ b;
    // Fold each 2-bit base onto its low bit.
    ((diff | (diff >> 1)) & 0x5555_5555).count_ones() as u8
}

/// Hamming distances between every ordered pair of UMI indices of one length.
/// Built once and shared read-only, typically behind an `Arc`.
#[derive(Debug, Clone)]
pub struct HammingTable {
    umi_length: usize,
    num_umis: usize,
    distances: Vec<u8>,
}

impl HammingTable {
    pub fn new(umi_length: usize) -> Result<HammingTable, UmiError> {
        let n = num_umis(umi_length)?;
        if umi_length > MAX_HAMMING_UMI_LENGTH {
            return Err(UmiError::HammingTableTooLarge(umi_length));
        }
        info!(
            "building Hamming table for {umi_length}-nt UMIs ({} entries)",
            n * n
        );
        let mut distances = vec![0u8; n * n];
        for a in 0..n {
            let row = &mut distances[a * n..(a + 1) * n];
            for (b, d) in row.iter_mut().enumerate() {
                *d = umi_distance(a as u32, b as u32);
            }
        }
        Ok(HammingTable {
            umi_length,
            num_umis: n,
            distances,
        })
    }

    pub fn umi_length(&self) -> usize {
        self.umi_length
    }

    pub fn num_umis(&self) -> usize {
        self.num_umis
    }

    /// Distance between two UMI indices.
    ///
    /// Panics if either index is outside `[0, 4^L)`.
    #[inline]
    pub fn distance(&self, a: UmiIndex, b: UmiIndex) -> u8 {
        let (a, b) = (a.as_usize(), b.as_usize());
        assert!(
            a < self.num_umis && b < self.num_umis,
            "UMI index out of range for a {}-nt Hamming table: ({a}, {b})",
            self.umi_length
        );
        self.distances[a * self.num_umis + b]
    }

    /// All UMIs within `max_distance` of `umi`, excluding `umi` itself.
    pub fn neighbors(
        &self,
        umi: UmiIndex,
        max_distance: u8,
    ) -> impl Iterator<Item = UmiIndex> + '_ {
        let a = umi.as_usize();
        assert!(a < self.num_umis, "UMI index {a} out of range");
        self.distances[a * self.num_umis..(a + 1) * self.num_umis]
            .iter()
            .enumerate()
            .filter(move |&(b, &d)| b != a && d <= max_distance)
            .map(|(b, _)| UmiIndex::new(b as u32))
    }
}
