//!
//! Run-wide statistics of the tag filter. They are accumulated while
//! barcodes are finished and are never reset by `finish_barcode`.
//!
use metric::{CountMetric, JsonReport, JsonReporter, Metric, SimpleHistogram};
use serde::{Deserialize, Serialize};
use umi::UmiIndex;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Reads per UMI slot, over every position and barcode.
    pub reads_per_umi: Vec<u64>,
    /// Position aggregators by the number of distinct UMI slots they filled.
    pub distinct_umis_per_position: SimpleHistogram<u32>,
    /// Occupied UMI slots by the number of reads they received.
    pub reads_per_molecule: SimpleHistogram<u32>,
    /// Position aggregators by their corrected molecule count.
    pub molecules_per_position: SimpleHistogram<u32>,
    pub total_reads: CountMetric,
    /// Reads on chromosomes the filter does not know.
    pub skipped_reads: CountMetric,
    pub barcodes_finished: CountMetric,
    pub barcodes_discarded: CountMetric,
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl FilterStats {
    pub fn new(num_umis: usize) -> Self {
        FilterStats {
            reads_per_umi: vec![0; num_umis],
            ..Default::default()
        }
    }

    pub fn observe_read(&mut self, umi: UmiIndex) {
        self.total_reads.increment();
        if let Some(slot) = self.reads_per_umi.get_mut(umi.as_usize()) {
            *slot += 1;
        }
    }

    pub fn observe_skipped_read(&mut self) {
        self.skipped_reads.increment();
    }

    /// Record one position aggregator of a finished barcode: its occupied UMI
    /// slots, the read count of each molecule and the corrected molecules.
    pub fn observe_position(
        &mut self,
        distinct_umis: u64,
        reads_per_molecule: impl IntoIterator<Item = u32>,
        molecules: u64,
    ) {
        for reads in reads_per_molecule {
            self.reads_per_molecule.observe(reads);
        }
        self.distinct_umis_per_position
            .observe(saturating_u32(distinct_umis));
        self.molecules_per_position
            .observe(saturating_u32(molecules));
    }

    /// Fraction of UMI slots that received at least one read.
    pub fn slot_saturation_fraction(&self) -> Option<f64> {
        if self.reads_per_umi.is_empty() {
            return None;
        }
        let used = self.reads_per_umi.iter().filter(|&&n| n > 0).count();
        Some(used as f64 / self.reads_per_umi.len() as f64)
    }
}

impl Metric for FilterStats {
    fn merge(&mut self, other: Self) {
        if self.reads_per_umi.len() < other.reads_per_umi.len() {
            self.reads_per_umi.resize(other.reads_per_umi.len(), 0);
        }
        for (mine, theirs) in self.reads_per_umi.iter_mut().zip(other.reads_per_umi) {
            *mine += theirs;
        }
        self.distinct_umis_per_position
            .merge(other.distinct_umis_per_position);
        self.reads_per_molecule.merge(other.reads_per_molecule);
        self.molecules_per_position
            .merge(other.molecules_per_position);
        self.total_reads.merge(other.total_reads);
        self.skipped_reads.merge(other.skipped_reads);
        self.barcodes_finished.merge(other.barcodes_finished);
        self.barcodes_discarded.merge(other.barcodes_discarded);
    }
}

impl JsonReport for FilterStats {
    fn to_json_reporter(&self) -> JsonReporter {
        let mut reporter = JsonReporter::default();
        reporter.insert("reads_total", self.total_reads.count());
        reporter.insert("reads_skipped", self.skipped_reads.count());
        reporter.insert("barcodes_finished", self.barcodes_finished.count());
        reporter.insert("barcodes_discarded", self.barcodes_discarded.count());
        reporter.insert("positions", self.molecules_per_position.total());
        reporter.insert("occupied_slots_total", self.reads_per_molecule.total());
        reporter.insert("mean_reads_per_molecule", self.reads_per_molecule.mean());
        reporter.insert(
            "mean_distinct_umis_per_position",
            self.distinct_umis_per_position.mean(),
        );
        reporter.insert(
            "mean_molecules_per_position",
            self.molecules_per_position.mean(),
        );
        reporter.insert("slot_saturation_fraction", self.slot_saturation_fraction());
        reporter.add_prefix("umi")
    }
}
