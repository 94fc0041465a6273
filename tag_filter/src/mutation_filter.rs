//!
//! Mutation filters turn the UMI occupancy of one position into a corrected
//! molecule count. One filter is selected from the configuration when the
//! tag filter is built and is shared by every chromosome table.
//!
use crate::config::{MutationFilterKind, TagFilterConfig};
use crate::errors::TagFilterError;
use crate::profile::{MoleculeCount, UmiOccupancy};
use std::fmt::Debug;
use std::sync::Arc;
use umi::{HammingTable, UmiIndex};

/// Which UMIs are close enough to be mutations of each other.
#[derive(Debug, Clone)]
pub struct UmiNeighborhood {
    table: HammingTable,
    max_distance: u8,
}

impl UmiNeighborhood {
    pub fn new(table: HammingTable, max_distance: u8) -> Self {
        UmiNeighborhood {
            table,
            max_distance,
        }
    }

    pub fn is_close(&self, a: UmiIndex, b: UmiIndex) -> bool {
        self.table.distance(a, b) <= self.max_distance
    }

    pub fn table(&self) -> &HammingTable {
        &self.table
    }
}

pub trait MoleculeFilter: Debug + Send + Sync {
    /// Corrected number of molecules of the profile.
    fn count_molecules(&self, profile: &dyn UmiOccupancy) -> u64;
}

/// Slots with more reads than `fraction` of a reference count. The largest
/// slot always passes for `fraction < 1`.
fn count_above_cutoff(
    profile: &dyn UmiOccupancy,
    fraction: f64,
    reference: impl FnOnce(&[u32]) -> f64,
) -> u64 {
    let reads: Vec<u32> = profile
        .occupied_umis()
        .map(|umi| profile.slot_reads(umi))
        .collect();
    if reads.is_empty() {
        return 0;
    }
    let cutoff = fraction * reference(&reads);
    reads.iter().filter(|&&n| f64::from(n) > cutoff).count() as u64
}

/// Every read is a molecule. Used when the library carries no UMIs.
#[derive(Debug, Clone, Copy)]
pub struct ReadsAsMolecules;

impl MoleculeFilter for ReadsAsMolecules {
    fn count_molecules(&self, profile: &dyn UmiOccupancy) -> u64 {
        profile.count_molecules(MoleculeCount::ReadTotal)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FractionOfMax {
    pub fraction: f64,
}

impl MoleculeFilter for FractionOfMax {
    fn count_molecules(&self, profile: &dyn UmiOccupancy) -> u64 {
        count_above_cutoff(profile, self.fraction, |reads| {
            f64::from(reads.iter().copied().max().unwrap_or(0))
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FractionOfMean {
    pub fraction: f64,
}

impl MoleculeFilter for FractionOfMean {
    fn count_molecules(&self, profile: &dyn UmiOccupancy) -> u64 {
        count_above_cutoff(profile, self.fraction, |reads| {
            let sum: u64 = reads.iter().map(|&n| u64::from(n)).sum();
            sum as f64 / reads.len() as f64
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Singleton;

impl MoleculeFilter for Singleton {
    fn count_molecules(&self, profile: &dyn UmiOccupancy) -> u64 {
        profile.count_molecules(MoleculeCount::NonSingletonSlots)
    }
}

#[derive(Debug, Clone)]
pub struct Hamming1Singleton {
    neighborhood: Arc<UmiNeighborhood>,
}

impl Hamming1Singleton {
    pub fn new(neighborhood: Arc<UmiNeighborhood>) -> Self {
        Hamming1Singleton { neighborhood }
    }
}

impl MoleculeFilter for Hamming1Singleton {
    fn count_molecules(&self, profile: &dyn UmiOccupancy) -> u64 {
        profile.count_molecules(MoleculeCount::NonMutationSingletonSlots(&self.neighborhood))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LowPassFilter {
    pub min_reads: u32,
}

impl MoleculeFilter for LowPassFilter {
    fn count_molecules(&self, profile: &dyn UmiOccupancy) -> u64 {
        profile
            .occupied_umis()
            .filter(|&umi| profile.slot_reads(umi) >= self.min_reads)
            .count() as u64
    }
}

/// Build the filter selected by a validated configuration.
pub fn build_filter(config: &TagFilterConfig) -> Result<Arc<dyn MoleculeFilter>, TagFilterError> {
    if !config.uses_umis() {
        return Ok(Arc::new(ReadsAsMolecules));
    }
    let filter: Arc<dyn MoleculeFilter> = match config.mutation_filter {
        MutationFilterKind::FractionOfMax => Arc::new(FractionOfMax {
            fraction: config.filter_fraction,
        }),
        MutationFilterKind::FractionOfMean => Arc::new(FractionOfMean {
            fraction: config.filter_fraction,
        }),
        MutationFilterKind::Singleton => Arc::new(Singleton),
        MutationFilterKind::Hamming1Singleton => {
            let table = config
                .hamming_table()?
                .ok_or(TagFilterError::FilterRequiresUmis(config.mutation_filter))?;
            Arc::new(Hamming1Singleton::new(Arc::new(UmiNeighborhood::new(
                table,
                config.max_mutation_distance,
            ))))
        }
        MutationFilterKind::LowPassFilter => Arc::new(LowPassFilter {
            min_reads: config.low_pass_threshold,
        }),
    };
    Ok(filter)
}
