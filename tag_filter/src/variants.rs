//! Per-offset base observations of one position aggregator.

use metric::TxHashMap;
use serde::{Deserialize, Serialize};
use umi::UmiIndex;

/// Bases reported in a `VariantSummary`, in output order.
pub const SUMMARY_BASES: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

fn normalize_base(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b @ (b'A' | b'C' | b'G' | b'T') => b,
        _ => b'N',
    }
}

#[derive(Clone, Debug)]
struct VariantSite {
    offset: u16,
    /// Declared ahead of the reads; survives `clear`.
    declared: bool,
    reference_base: Option<u8>,
    /// Reads per (UMI, observed base).
    observations: TxHashMap<(UmiIndex, u8), u32>,
}

/// Read and molecule support of one base at a variant site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlleleCount {
    pub base: u8,
    pub reads: u32,
    pub molecules: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub offset: u16,
    pub reference_base: Option<u8>,
    /// Only bases that were observed, in A, C, G, T, N order.
    pub alleles: Vec<AlleleCount>,
}

impl VariantSummary {
    pub fn total_reads(&self) -> u32 {
        self.alleles.iter().map(|a| a.reads).sum()
    }
}

/// Offsets within the read that are tracked for sequence variants. Sites are
/// few per position, so they are kept in a small vector sorted by offset.
#[derive(Clone, Debug, Default)]
pub struct VariantTable {
    sites: Vec<VariantSite>,
}

impl VariantTable {
    fn site_mut(&mut self, offset: u16) -> Option<&mut VariantSite> {
        self.sites.iter_mut().find(|s| s.offset == offset)
    }

    /// Track `offset`. Returns false if it was already tracked.
    pub fn register(&mut self, offset: u16, declared: bool) -> bool {
        if let Some(site) = self.site_mut(offset) {
            site.declared |= declared;
            return false;
        }
        let idx = self.sites.partition_point(|s| s.offset < offset);
        self.sites.insert(
            idx,
            VariantSite {
                offset,
                declared,
                reference_base: None,
                observations: TxHashMap::default(),
            },
        );
        true
    }

    pub fn is_registered(&self, offset: u16) -> bool {
        self.sites.iter().any(|s| s.offset == offset)
    }

    pub fn offsets(&self) -> impl Iterator<Item = u16> + '_ {
        self.sites.iter().map(|s| s.offset)
    }

    pub fn set_reference(&mut self, offset: u16, base: u8) {
        if let Some(site) = self.site_mut(offset) {
            site.reference_base.get_or_insert(normalize_base(base));
        }
    }

    pub fn reference(&self, offset: u16) -> Option<u8> {
        self.sites
            .iter()
            .find(|s| s.offset == offset)
            .and_then(|s| s.reference_base)
    }

    /// Record a base seen by a read carrying `umi`. Unregistered offsets are
    /// ignored; returns whether the observation was stored.
    pub fn record(&mut self, umi: UmiIndex, offset: u16, base: u8) -> bool {
        match self.site_mut(offset) {
            Some(site) => {
                *site
                    .observations
                    .entry((umi, normalize_base(base)))
                    .or_insert(0) += 1;
                true
            }
            None => false,
        }
    }

    pub fn summaries(&self) -> Vec<VariantSummary> {
        self.sites
            .iter()
            .filter(|s| !s.observations.is_empty())
            .map(|site| {
                let alleles = SUMMARY_BASES
                    .iter()
                    .filter_map(|&base| {
                        let (reads, molecules) = site
                            .observations
                            .iter()
                            .filter(|((_, b), _)| *b == base)
                            .fold((0, 0), |(reads, mols), (_, &n)| (reads + n, mols + 1));
                        (reads > 0).then_some(AlleleCount {
                            base,
                            reads,
                            molecules,
                        })
                    })
                    .collect();
                VariantSummary {
                    offset: site.offset,
                    reference_base: site.reference_base,
                    alleles,
                }
            })
            .collect()
    }

    /// Drop all observations and every site that was not declared.
    pub fn clear(&mut self) {
        self.sites.retain(|s| s.declared);
        for site in &mut self.sites {
            site.observations.clear();
            site.reference_base = None;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
