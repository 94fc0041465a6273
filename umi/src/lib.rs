//! Crate for dealing with UMI related types and functionalities.
//!
//! A UMI of length `L` is stored as a dense integer index in `[0, 4^L)`, two
//! bits per nucleotide with the first base in the most significant position.
//! Position aggregators use this index to address their per-UMI slots.
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub mod hamming;
pub use hamming::{HammingTable, MAX_HAMMING_UMI_LENGTH};

/// Longest UMI that fits into a `u32` index.
pub const MAX_UMI_LENGTH: usize = 16;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UmiError {
    #[error("UMI length must be between 1 and {max}, got {0}", max = MAX_UMI_LENGTH)]
    InvalidLength(usize),
    #[error(
        "UMI length {0} is too long for a pairwise Hamming table (at most {max} nt is supported)",
        max = MAX_HAMMING_UMI_LENGTH
    )]
    HammingTableTooLarge(usize),
}

/// Number of distinct UMI values of the given length.
pub fn num_umis(umi_length: usize) -> Result<usize, UmiError> {
    if umi_length == 0 || umi_length > MAX_UMI_LENGTH {
        return Err(UmiError::InvalidLength(umi_length));
    }
    Ok(1usize << (2 * umi_length))
}

fn encode_base(base: u8) -> Option<u32> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// A UMI encoded as a 2-bit-per-base integer.
#[derive(
    Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UmiIndex(u32);

impl UmiIndex {
    pub fn new(index: u32) -> Self {
        UmiIndex(index)
    }

    /// Encode a UMI sequence. Returns `None` if the sequence contains a base
    /// other than A, C, G or T, or is longer than `MAX_UMI_LENGTH`.
    ///
    /// # Example
    /// ```rust
    /// use umi::UmiIndex;
    /// assert_eq!(UmiIndex::encode(b"AC").unwrap().index(), 1);
    /// assert_eq!(UmiIndex::encode(b"TT").unwrap().index(), 15);
    /// assert!(UmiIndex::encode(b"AN").is_none());
    /// ```
    pub fn encode(seq: &[u8]) -> Option<UmiIndex> {
        if seq.len() > MAX_UMI_LENGTH {
            return None;
        }
        seq.iter()
            .try_fold(0u32, |acc, &b| Some((acc << 2) | encode_base(b)?))
            .map(UmiIndex)
    }

    /// Decode back into a sequence of `umi_length` bases.
    pub fn decode(self, umi_length: usize) -> Vec<u8> {
        (0..umi_length)
            .rev()
            .map(|i| BASES[((self.0 >> (2 * i)) & 3) as usize])
            .collect()
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for UmiIndex {
    fn from(index: u32) -> Self {
        UmiIndex(index)
    }
}

impl Display for UmiIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
