//!
//! All position aggregators of one chromosome, and its genome track.
//!
use crate::config::{ProfileKind, TagFilterConfig};
use crate::genome_track::{GenomeTrack, TrackCounts};
use crate::mapped_tag::MappedTagItem;
use crate::mutation_filter::MoleculeFilter;
use crate::position_key::PositionKey;
use crate::read::{MappedRead, Strand};
use crate::stats::FilterStats;
use crate::tag_item::TagItem;
use itertools::{Either, Itertools};
use metric::TxHashMap;
use umi::UmiIndex;

/// The parts of `TagFilterConfig` every chromosome table needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableLayout {
    pub profile: ProfileKind,
    pub num_umis: usize,
    pub uses_umis: bool,
    pub analyze_variants: bool,
    pub variant_end_margin: u16,
}

impl TableLayout {
    /// UMI slot a read is counted in. Without UMIs every read shares slot 0.
    pub fn umi_slot(&self, umi: UmiIndex) -> UmiIndex {
        if self.uses_umis {
            umi
        } else {
            UmiIndex::new(0)
        }
    }
}

impl From<&TagFilterConfig> for TableLayout {
    fn from(config: &TagFilterConfig) -> Self {
        TableLayout {
            profile: config.profile,
            num_umis: config.num_umis(),
            uses_umis: config.uses_umis(),
            analyze_variants: config.analyze_variants,
            variant_end_margin: config.variant_end_margin,
        }
    }
}

#[derive(Debug)]
pub struct ChrTagData {
    name: String,
    layout: TableLayout,
    items: TxHashMap<PositionKey, TagItem>,
    track: GenomeTrack,
}

impl ChrTagData {
    pub fn new(name: impl Into<String>, layout: TableLayout) -> Self {
        ChrTagData {
            name: name.into(),
            layout,
            items: TxHashMap::default(),
            track: GenomeTrack::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn item_mut(&mut self, key: PositionKey) -> &mut TagItem {
        let layout = self.layout;
        self.items
            .entry(key)
            .or_insert_with(|| TagItem::new(layout.profile, layout.num_umis))
    }

    /// Route one read to its position aggregator. Returns true if the read
    /// filled an empty UMI slot, and always without UMIs.
    pub fn add(&mut self, read: &MappedRead) -> bool {
        debug_assert_eq!(read.chrom, self.name);
        let layout = self.layout;
        let umi = layout.umi_slot(read.umi);
        let item = self.item_mut(PositionKey::new(read.position, read.strand));
        let new_molecule = item.add(umi, read.ambiguous);
        item.observe_read_bases(
            umi,
            &read.mismatches,
            read.read_length,
            layout.variant_end_margin,
            layout.analyze_variants,
        );
        new_molecule || !layout.uses_umis
    }

    /// Declare a variant site ahead of the reads. The site is kept across
    /// barcodes.
    pub fn register_expected_variant(&mut self, position: u32, strand: Strand, offset: u16) {
        self.item_mut(PositionKey::new(position, strand))
            .declare_variant(offset);
    }

    /// Close the current barcode: add every populated position to the genome
    /// track and to `stats`, then clear it. Returns the barcode totals.
    pub fn finish_barcode(
        &mut self,
        filter: &dyn MoleculeFilter,
        stats: &mut FilterStats,
    ) -> TrackCounts {
        let uses_umis = self.layout.uses_umis;
        let mut totals = TrackCounts::default();
        for (key, item) in self.items.iter_mut().filter(|(_, item)| item.has_reads()) {
            let counts = TrackCounts {
                molecules: item.number_of_molecules(filter),
                reads: item.number_of_reads(),
            };
            let profile = item.profile();
            // without UMIs every read is its own molecule, all in slot 0
            let reads_per_molecule = if uses_umis {
                Either::Left(profile.occupied_umis().map(|umi| profile.slot_reads(umi)))
            } else {
                Either::Right(std::iter::repeat(1).take(counts.reads as usize))
            };
            stats.observe_position(
                item.number_of_umis(),
                reads_per_molecule,
                counts.molecules,
            );
            self.track.add(key.position(), key.strand(), counts);
            totals += counts;
            item.clear();
        }
        totals
    }

    /// Drop the reads of the current barcode without recording anything.
    pub fn discard_barcode(&mut self) {
        for item in self.items.values_mut().filter(|item| item.has_reads()) {
            item.clear();
        }
    }

    /// Views of the populated positions, by position then strand.
    pub fn iterate<'a>(
        &'a self,
        barcode: u32,
        filter: &'a dyn MoleculeFilter,
    ) -> impl Iterator<Item = MappedTagItem<'a>> + 'a {
        self.items
            .iter()
            .filter(|(_, item)| item.has_reads())
            .sorted_unstable_by_key(|&(&key, _)| key)
            .map(move |(&key, item)| MappedTagItem::new(&self.name, barcode, key, item, filter))
    }

    /// Positions with at least one read in the current barcode.
    pub fn distinct_mapping_count(&self) -> usize {
        self.items.values().filter(|item| item.has_reads()).count()
    }

    /// Aggregators kept for reuse, populated or not.
    pub fn allocated_positions(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, position: u32, strand: Strand) -> Option<&TagItem> {
        self.items.get(&PositionKey::new(position, strand))
    }

    pub fn track(&self) -> &GenomeTrack {
        &self.track
    }
}
