//! Key of a position aggregator within one chromosome.

use crate::read::Strand;
use serde::{Deserialize, Serialize};

/// A (position, strand) pair packed into one integer.
///
/// Bit layout of the `u64`:
///
/// | bits  | content                      |
/// |-------|------------------------------|
/// | 1..64 | 1-based position             |
/// | 0     | strand, 1 for `Reverse`      |
///
/// Keys sort by position first, forward before reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(u64);

const STRAND_MASK: u64 = 1;

impl PositionKey {
    pub fn new(position: u32, strand: Strand) -> Self {
        PositionKey((u64::from(position) << 1) | u64::from(strand.is_reverse()))
    }

    pub fn position(self) -> u32 {
        (self.0 >> 1) as u32
    }

    pub fn strand(self) -> Strand {
        if self.0 & STRAND_MASK == 0 {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}
