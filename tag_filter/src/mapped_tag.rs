use crate::mutation_filter::MoleculeFilter;
use crate::position_key::PositionKey;
use crate::read::Strand;
use crate::tag_item::TagItem;
use crate::variants::VariantSummary;
use serde::{Deserialize, Serialize};

/// Read-only view of one position aggregator of the current barcode.
///
/// A view borrows the chromosome table it came from, so the table cannot be
/// changed (or the barcode finished) while any view is alive. Use
/// `to_summary` to keep the numbers past that point.
#[derive(Clone, Copy, Debug)]
pub struct MappedTagItem<'a> {
    chrom: &'a str,
    barcode: u32,
    key: PositionKey,
    item: &'a TagItem,
    filter: &'a dyn MoleculeFilter,
}

/// Owned snapshot of a `MappedTagItem`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedTagSummary {
    pub chrom: String,
    pub position: u32,
    pub strand: Strand,
    pub barcode: u32,
    pub molecules: u64,
    pub reads: u64,
    pub ambiguous: bool,
    pub variants: Vec<VariantSummary>,
}

impl<'a> MappedTagItem<'a> {
    pub(crate) fn new(
        chrom: &'a str,
        barcode: u32,
        key: PositionKey,
        item: &'a TagItem,
        filter: &'a dyn MoleculeFilter,
    ) -> Self {
        MappedTagItem {
            chrom,
            barcode,
            key,
            item,
            filter,
        }
    }

    pub fn chrom(&self) -> &'a str {
        self.chrom
    }

    pub fn position(&self) -> u32 {
        self.key.position()
    }

    pub fn strand(&self) -> Strand {
        self.key.strand()
    }

    pub fn barcode(&self) -> u32 {
        self.barcode
    }

    pub fn molecule_count(&self) -> u64 {
        self.item.number_of_molecules(self.filter)
    }

    pub fn read_count(&self) -> u64 {
        self.item.number_of_reads()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.item.is_ambiguous()
    }

    pub fn variant_summaries(&self) -> Vec<VariantSummary> {
        self.item.variant_summaries()
    }

    pub fn to_summary(&self) -> MappedTagSummary {
        MappedTagSummary {
            chrom: self.chrom.to_string(),
            position: self.position(),
            strand: self.strand(),
            barcode: self.barcode,
            molecules: self.molecule_count(),
            reads: self.read_count(),
            ambiguous: self.is_ambiguous(),
            variants: self.variant_summaries(),
        }
    }
}
