//!
//! `TagItem` aggregates the reads of one barcode at one (chromosome,
//! position, strand). It is created on the first read and cleared, not
//! dropped, when the barcode is finished.
//!
use crate::config::ProfileKind;
use crate::mutation_filter::MoleculeFilter;
use crate::profile::{UmiOccupancy, UmiProfile};
use crate::read::{within_margin, Mismatch};
use crate::variants::{VariantSummary, VariantTable};
use umi::UmiIndex;

#[derive(Clone, Debug)]
pub struct TagItem {
    profile: UmiProfile,
    /// Every read so far had several equally good placements.
    ambiguous: bool,
    variants: Option<Box<VariantTable>>,
}

impl TagItem {
    pub fn new(kind: ProfileKind, num_umis: usize) -> Self {
        TagItem {
            profile: UmiProfile::new(kind, num_umis),
            ambiguous: false,
            variants: None,
        }
    }

    /// Register one read. Returns true if its UMI slot was empty, i.e. the
    /// read is a new molecule before any mutation filtering.
    pub fn add(&mut self, umi: UmiIndex, ambiguous: bool) -> bool {
        self.ambiguous = if self.profile.has_reads() {
            self.ambiguous && ambiguous
        } else {
            ambiguous
        };
        self.profile.add(umi)
    }

    /// Track `offset` for sequence variants. Idempotent.
    pub fn register_expected_variant(&mut self, offset: u16) {
        self.variants
            .get_or_insert_with(Default::default)
            .register(offset, false);
    }

    /// Like `register_expected_variant`, but the site also survives `clear`.
    pub fn declare_variant(&mut self, offset: u16) {
        self.variants
            .get_or_insert_with(Default::default)
            .register(offset, true);
    }

    /// Store the base a read with `umi` shows at `offset`. Ignored for
    /// unregistered offsets and for positions reached only through ambiguous
    /// placements.
    pub fn record_variant_observation(&mut self, umi: UmiIndex, offset: u16, observed_base: u8) {
        if self.ambiguous {
            return;
        }
        if let Some(variants) = self.variants.as_mut() {
            variants.record(umi, offset, observed_base);
        }
    }

    /// Variant bookkeeping for one read that was just added. Trusted
    /// mismatches at tracked sites are recorded, and with `register_new` every
    /// trusted mismatch becomes a tracked site first. Tracked sites the read
    /// covers without a mismatch are recorded as the reference base.
    pub fn observe_read_bases(
        &mut self,
        umi: UmiIndex,
        mismatches: &[Mismatch],
        read_length: u16,
        margin: u16,
        register_new: bool,
    ) {
        for m in mismatches
            .iter()
            .filter(|m| within_margin(m.offset, read_length, margin))
        {
            if register_new {
                self.register_expected_variant(m.offset);
            }
            if let Some(variants) = self.variants.as_mut() {
                variants.set_reference(m.offset, m.reference_base);
            }
            self.record_variant_observation(umi, m.offset, m.observed_base);
        }
        let Some(variants) = self.variants.as_ref() else {
            return;
        };
        let matching: Vec<(u16, u8)> = variants
            .offsets()
            .filter(|&offset| {
                within_margin(offset, read_length, margin)
                    && !mismatches.iter().any(|m| m.offset == offset)
            })
            .filter_map(|offset| Some((offset, variants.reference(offset)?)))
            .collect();
        for (offset, reference_base) in matching {
            self.record_variant_observation(umi, offset, reference_base);
        }
    }

    pub fn number_of_reads(&self) -> u64 {
        self.profile.total_reads()
    }

    /// Corrected molecule count under `filter`, never more than the reads.
    pub fn number_of_molecules(&self, filter: &dyn MoleculeFilter) -> u64 {
        filter
            .count_molecules(&*self.profile)
            .min(self.number_of_reads())
    }

    /// Distinct UMI slots with at least one read.
    pub fn number_of_umis(&self) -> u64 {
        self.profile.occupied_umis().count() as u64
    }

    pub fn has_reads(&self) -> bool {
        self.profile.has_reads()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.has_reads() && self.ambiguous
    }

    pub fn profile(&self) -> &(dyn UmiOccupancy + Send + Sync) {
        &*self.profile
    }

    pub fn variant_summaries(&self) -> Vec<VariantSummary> {
        self.variants
            .as_ref()
            .map_or_else(Vec::new, |v| v.summaries())
    }

    /// Reset for the next barcode. Declared variant sites are kept.
    pub fn clear(&mut self) {
        self.profile.clear();
        self.ambiguous = false;
        if let Some(variants) = self.variants.as_mut() {
            variants.clear();
            if variants.is_empty() {
                self.variants = None;
            }
        }
    }
}
