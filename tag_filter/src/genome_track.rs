//!
//! Per-chromosome genome tracks: molecule and read totals by position and
//! strand, summed over every finished barcode.
//!
use crate::read::Strand;
use metric::Metric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCounts {
    pub molecules: u64,
    pub reads: u64,
}

impl AddAssign for TrackCounts {
    fn add_assign(&mut self, other: TrackCounts) {
        self.molecules += other.molecules;
        self.reads += other.reads;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeTrack {
    forward: BTreeMap<u32, TrackCounts>,
    reverse: BTreeMap<u32, TrackCounts>,
}

impl GenomeTrack {
    fn strand(&self, strand: Strand) -> &BTreeMap<u32, TrackCounts> {
        match strand {
            Strand::Forward => &self.forward,
            Strand::Reverse => &self.reverse,
        }
    }

    pub fn add(&mut self, position: u32, strand: Strand, counts: TrackCounts) {
        let track = match strand {
            Strand::Forward => &mut self.forward,
            Strand::Reverse => &mut self.reverse,
        };
        *track.entry(position).or_default() += counts;
    }

    /// Totals at one position; zero where nothing was seen.
    pub fn get(&self, position: u32, strand: Strand) -> TrackCounts {
        self.strand(strand)
            .get(&position)
            .copied()
            .unwrap_or_default()
    }

    pub fn strand_totals(&self, strand: Strand) -> TrackCounts {
        self.strand(strand)
            .values()
            .fold(TrackCounts::default(), |mut acc, &c| {
                acc += c;
                acc
            })
    }

    /// Positions of one strand in increasing order.
    pub fn iter(&self, strand: Strand) -> impl Iterator<Item = (u32, TrackCounts)> + '_ {
        self.strand(strand).iter().map(|(&pos, &c)| (pos, c))
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }
}

impl Metric for GenomeTrack {
    fn merge(&mut self, other: Self) {
        for (pos, counts) in other.forward {
            self.add(pos, Strand::Forward, counts);
        }
        for (pos, counts) in other.reverse {
            self.add(pos, Strand::Reverse, counts);
        }
    }
}
