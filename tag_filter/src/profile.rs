//!
//! Per-position UMI occupancy.
//!
//! Two storages answer the same questions:
//! * `CountingProfile` keeps one saturating `u16` read counter per UMI slot.
//! * `TriStateProfile` keeps two bits per slot, "seen" and "seen more than
//!   once", and cannot tell 2 reads from 200.
//!
//! Molecule counts are computed once, in `UmiOccupancy::count_molecules`, from
//! the primitive queries both storages implement, so the two give identical
//! answers for the same sequence of `add` calls.
//!
//! Slot storage is allocated on the first `add`, and kept (zeroed) by `clear`
//! so that the next barcode reuses it.
//!
use crate::config::ProfileKind;
use crate::mutation_filter::UmiNeighborhood;
use std::ops::{Deref, DerefMut};
use umi::UmiIndex;

/// Largest per-slot read count of the counting profile.
pub const COUNTER_MAX: u16 = u16::MAX;

/// What `count_molecules` counts.
#[derive(Clone, Copy, Debug)]
pub enum MoleculeCount<'a> {
    /// Every read.
    ReadTotal,
    /// Slots with at least one read.
    AllOccupiedSlots,
    /// Slots with at least two reads.
    NonSingletonSlots,
    /// Non-singleton slots, plus singletons with no close non-singleton and
    /// no close singleton of lower index.
    NonMutationSingletonSlots(&'a UmiNeighborhood),
}

pub trait UmiOccupancy {
    fn num_umis(&self) -> usize;

    /// Register one read. Returns true if the slot was empty.
    fn add(&mut self, umi: UmiIndex) -> bool;

    fn is_occupied(&self, umi: UmiIndex) -> bool;

    /// Exactly one read in the slot.
    fn is_singleton(&self, umi: UmiIndex) -> bool;

    /// Reads in the slot. Profiles without exact counts report 2 for any
    /// slot seen more than once.
    fn slot_reads(&self, umi: UmiIndex) -> u32;

    fn has_exact_counts(&self) -> bool;

    fn total_reads(&self) -> u64;

    /// Occupied slots in increasing UMI order.
    fn occupied_umis(&self) -> Box<dyn Iterator<Item = UmiIndex> + '_>;

    /// Forget every read, keeping allocated storage.
    fn clear(&mut self);

    fn has_reads(&self) -> bool {
        self.total_reads() > 0
    }

    fn count_molecules(&self, kind: MoleculeCount<'_>) -> u64 {
        match kind {
            MoleculeCount::ReadTotal => self.total_reads(),
            MoleculeCount::AllOccupiedSlots => self.occupied_umis().count() as u64,
            MoleculeCount::NonSingletonSlots => self
                .occupied_umis()
                .filter(|&umi| !self.is_singleton(umi))
                .count() as u64,
            MoleculeCount::NonMutationSingletonSlots(neighborhood) => {
                let occupied: Vec<_> = self.occupied_umis().collect();
                occupied
                    .iter()
                    .filter(|&&umi| {
                        !self.is_singleton(umi)
                            || !occupied.iter().any(|&other| {
                                other != umi
                                    && neighborhood.is_close(umi, other)
                                    && (!self.is_singleton(other) || other < umi)
                            })
                    })
                    .count() as u64
            }
        }
    }
}

fn check_umi(umi: UmiIndex, num_umis: usize) -> usize {
    let idx = umi.as_usize();
    assert!(
        idx < num_umis,
        "UMI index {idx} out of range for {num_umis} UMI slots"
    );
    idx
}

#[derive(Clone, Debug)]
pub struct CountingProfile {
    num_umis: usize,
    counts: Vec<u16>,
    total: u64,
}

impl CountingProfile {
    pub fn new(num_umis: usize) -> Self {
        CountingProfile {
            num_umis,
            counts: Vec::new(),
            total: 0,
        }
    }

    fn count(&self, umi: UmiIndex) -> u16 {
        self.counts.get(umi.as_usize()).copied().unwrap_or(0)
    }
}

impl UmiOccupancy for CountingProfile {
    fn num_umis(&self) -> usize {
        self.num_umis
    }

    fn add(&mut self, umi: UmiIndex) -> bool {
        let idx = check_umi(umi, self.num_umis);
        if self.counts.is_empty() {
            self.counts = vec![0; self.num_umis];
        }
        let slot = &mut self.counts[idx];
        let was_empty = *slot == 0;
        *slot = slot.saturating_add(1);
        self.total += 1;
        was_empty
    }

    fn is_occupied(&self, umi: UmiIndex) -> bool {
        self.count(umi) > 0
    }

    fn is_singleton(&self, umi: UmiIndex) -> bool {
        self.count(umi) == 1
    }

    fn slot_reads(&self, umi: UmiIndex) -> u32 {
        u32::from(self.count(umi))
    }

    fn has_exact_counts(&self) -> bool {
        true
    }

    fn total_reads(&self) -> u64 {
        self.total
    }

    fn occupied_umis(&self) -> Box<dyn Iterator<Item = UmiIndex> + '_> {
        Box::new(
            self.counts
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c > 0)
                .map(|(i, _)| UmiIndex::new(i as u32)),
        )
    }

    fn clear(&mut self) {
        self.counts.fill(0);
        self.total = 0;
    }
}

/// Indices of the set bits of a word, lowest first.
struct SetBits(u64);

impl Iterator for SetBits {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

#[derive(Clone, Debug)]
pub struct TriStateProfile {
    num_umis: usize,
    seen: Vec<u64>,
    repeated: Vec<u64>,
    total: u64,
}

impl TriStateProfile {
    pub fn new(num_umis: usize) -> Self {
        TriStateProfile {
            num_umis,
            seen: Vec::new(),
            repeated: Vec::new(),
            total: 0,
        }
    }

    fn bit(words: &[u64], idx: usize) -> bool {
        words
            .get(idx / 64)
            .map_or(false, |w| w & (1 << (idx % 64)) != 0)
    }
}

impl UmiOccupancy for TriStateProfile {
    fn num_umis(&self) -> usize {
        self.num_umis
    }

    fn add(&mut self, umi: UmiIndex) -> bool {
        let idx = check_umi(umi, self.num_umis);
        if self.seen.is_empty() {
            let words = self.num_umis.div_ceil(64);
            self.seen = vec![0; words];
            self.repeated = vec![0; words];
        }
        let (word, mask) = (idx / 64, 1u64 << (idx % 64));
        self.total += 1;
        if self.seen[word] & mask == 0 {
            self.seen[word] |= mask;
            true
        } else {
            self.repeated[word] |= mask;
            false
        }
    }

    fn is_occupied(&self, umi: UmiIndex) -> bool {
        Self::bit(&self.seen, umi.as_usize())
    }

    fn is_singleton(&self, umi: UmiIndex) -> bool {
        self.is_occupied(umi) && !Self::bit(&self.repeated, umi.as_usize())
    }

    fn slot_reads(&self, umi: UmiIndex) -> u32 {
        let idx = umi.as_usize();
        u32::from(Self::bit(&self.seen, idx)) + u32::from(Self::bit(&self.repeated, idx))
    }

    fn has_exact_counts(&self) -> bool {
        false
    }

    fn total_reads(&self) -> u64 {
        self.total
    }

    fn occupied_umis(&self) -> Box<dyn Iterator<Item = UmiIndex> + '_> {
        Box::new(self.seen.iter().enumerate().flat_map(|(w, &word)| {
            SetBits(word).map(move |bit| UmiIndex::new(w as u32 * 64 + bit))
        }))
    }

    fn clear(&mut self) {
        self.seen.fill(0);
        self.repeated.fill(0);
        self.total = 0;
    }
}

/// The occupancy storage selected by `ProfileKind`.
#[derive(Clone, Debug)]
pub enum UmiProfile {
    Counting(CountingProfile),
    TriState(TriStateProfile),
}

impl UmiProfile {
    pub fn new(kind: ProfileKind, num_umis: usize) -> Self {
        match kind {
            ProfileKind::Counting => UmiProfile::Counting(CountingProfile::new(num_umis)),
            ProfileKind::TriState => UmiProfile::TriState(TriStateProfile::new(num_umis)),
        }
    }
}

impl Deref for UmiProfile {
    type Target = dyn UmiOccupancy + Send + Sync;

    fn deref(&self) -> &Self::Target {
        match self {
            UmiProfile::Counting(p) => p,
            UmiProfile::TriState(p) => p,
        }
    }
}

impl DerefMut for UmiProfile {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            UmiProfile::Counting(p) => p,
            UmiProfile::TriState(p) => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::{prop_assert, prop_assert_eq, proptest};
    use umi::HammingTable;

    fn umis(xs: &[u32]) -> Vec<UmiIndex> {
        xs.iter().copied().map(UmiIndex::new).collect()
    }

    fn fill(kind: ProfileKind, num_umis: usize, reads: &[u32]) -> UmiProfile {
        let mut profile = UmiProfile::new(kind, num_umis);
        for &umi in reads {
            profile.add(UmiIndex::new(umi));
        }
        profile
    }

    #[test]
    fn test_add_signals_first_read() {
        for kind in [ProfileKind::Counting, ProfileKind::TriState] {
            let mut profile = UmiProfile::new(kind, 16);
            assert!(!profile.has_reads());
            assert!(profile.add(UmiIndex::new(3)));
            assert!(!profile.add(UmiIndex::new(3)));
            assert!(profile.add(UmiIndex::new(15)));
            assert!(profile.is_occupied(UmiIndex::new(3)));
            assert!(!profile.is_occupied(UmiIndex::new(4)));
            assert!(profile.is_singleton(UmiIndex::new(15)));
            assert!(!profile.is_singleton(UmiIndex::new(3)));
            assert_eq!(profile.total_reads(), 3);
            assert_eq!(profile.occupied_umis().collect::<Vec<_>>(), umis(&[3, 15]));
        }
    }

    #[test]
    fn test_lazy_allocation_and_clear() {
        let mut profile = CountingProfile::new(256);
        assert!(profile.counts.is_empty());
        assert_eq!(profile.occupied_umis().count(), 0);
        profile.clear();
        assert!(profile.counts.is_empty());
        profile.add(UmiIndex::new(200));
        assert_eq!(profile.counts.len(), 256);
        profile.clear();
        assert_eq!(profile.counts.len(), 256);
        assert!(!profile.has_reads());
        assert_eq!(profile.occupied_umis().count(), 0);
        assert!(profile.add(UmiIndex::new(200)));
    }

    #[test]
    fn test_tristate_word_boundaries() {
        let profile = fill(ProfileKind::TriState, 256, &[0, 63, 64, 64, 255]);
        assert_eq!(
            profile.occupied_umis().collect::<Vec<_>>(),
            umis(&[0, 63, 64, 255])
        );
        assert_eq!(profile.slot_reads(UmiIndex::new(64)), 2);
        assert_eq!(profile.slot_reads(UmiIndex::new(63)), 1);
        assert_eq!(profile.slot_reads(UmiIndex::new(62)), 0);
        assert!(!profile.has_exact_counts());
    }

    #[test]
    fn test_counter_saturates() {
        let mut profile = CountingProfile::new(4);
        for _ in 0..(u32::from(COUNTER_MAX) + 10) {
            profile.add(UmiIndex::new(1));
        }
        assert_eq!(profile.slot_reads(UmiIndex::new(1)), u32::from(COUNTER_MAX));
        assert_eq!(profile.total_reads(), u64::from(COUNTER_MAX) + 10);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_umi() {
        let mut profile = UmiProfile::new(ProfileKind::Counting, 16);
        profile.add(UmiIndex::new(16));
    }

    #[test]
    fn test_molecule_counts() {
        // UMI 0 x3, UMI 1 x1, UMI 2 x4
        let profile = fill(ProfileKind::Counting, 16, &[0, 0, 0, 1, 2, 2, 2, 2]);
        assert_eq!(profile.count_molecules(MoleculeCount::ReadTotal), 8);
        assert_eq!(profile.count_molecules(MoleculeCount::AllOccupiedSlots), 3);
        assert_eq!(profile.count_molecules(MoleculeCount::NonSingletonSlots), 2);
    }

    #[test]
    fn test_mutation_singletons() {
        let neighborhood = UmiNeighborhood::new(HammingTable::new(2).unwrap(), 1);
        let code = |s: &[u8]| UmiIndex::encode(s).unwrap().index();

        // AA is a one-base mutation of AC, which has 5 reads
        let mut reads = vec![code(b"AA")];
        reads.extend([code(b"AC"); 5]);
        let profile = fill(ProfileKind::Counting, 16, &reads);
        let kind = MoleculeCount::NonMutationSingletonSlots(&neighborhood);
        assert_eq!(profile.count_molecules(kind), 1);

        // Two close singletons: only the lower index survives
        let profile = fill(ProfileKind::Counting, 16, &[code(b"AA"), code(b"AC")]);
        assert_eq!(profile.count_molecules(kind), 1);

        // Distant singletons both survive
        let profile = fill(ProfileKind::Counting, 16, &[code(b"AA"), code(b"CC")]);
        assert_eq!(profile.count_molecules(kind), 2);
    }

    proptest! {
        #[test]
        fn prop_test_profiles_agree(reads in vec(0u32..64, 0..200)) {
            let neighborhood = UmiNeighborhood::new(HammingTable::new(3).unwrap(), 1);
            let counting = fill(ProfileKind::Counting, 64, &reads);
            let tristate = fill(ProfileKind::TriState, 64, &reads);
            for kind in [
                MoleculeCount::ReadTotal,
                MoleculeCount::AllOccupiedSlots,
                MoleculeCount::NonSingletonSlots,
                MoleculeCount::NonMutationSingletonSlots(&neighborhood),
            ] {
                prop_assert_eq!(counting.count_molecules(kind), tristate.count_molecules(kind));
            }
            let all = counting.count_molecules(MoleculeCount::AllOccupiedSlots);
            let non_singleton = counting.count_molecules(MoleculeCount::NonSingletonSlots);
            let non_mutation =
                counting.count_molecules(MoleculeCount::NonMutationSingletonSlots(&neighborhood));
            prop_assert!(all >= non_singleton);
            prop_assert!(all >= non_mutation && non_mutation >= non_singleton);
            prop_assert!(all <= reads.len() as u64);
        }
    }
}
