//!
//! `RandomTagFilterByBc` is the entry point of the crate. It receives the
//! mapped reads of one barcode at a time, keeps one `ChrTagData` per
//! chromosome, and folds each finished barcode into the genome tracks and the
//! run-wide statistics.
//!
//! Reads of a barcode must arrive as one contiguous run, followed by
//! `finish_barcode` (or `discard_barcode`). The filter is not shared between
//! threads; parallel runs use one filter per shard of barcodes and merge the
//! resulting `FilterStats` and `GenomeTrack`s.
//!
use crate::chr_tag_data::{ChrTagData, TableLayout};
use crate::config::TagFilterConfig;
use crate::errors::TagFilterError;
use crate::genome_track::{GenomeTrack, TrackCounts};
use crate::mapped_tag::MappedTagItem;
use crate::mutation_filter::{build_filter, MoleculeFilter};
use crate::read::{MappedRead, Strand};
use crate::stats::FilterStats;
use log::{debug, info};
use metric::TxHashMap;
use std::sync::Arc;

/// Chromosomes visited by `RandomTagFilterByBc::iterate`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChromosomeSelection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl ChromosomeSelection {
    pub fn includes(&self, chrom: &str) -> bool {
        match self {
            ChromosomeSelection::All => true,
            ChromosomeSelection::Include(names) => names.iter().any(|n| n == chrom),
            ChromosomeSelection::Exclude(names) => !names.iter().any(|n| n == chrom),
        }
    }
}

#[derive(Debug)]
pub struct RandomTagFilterByBc {
    config: TagFilterConfig,
    layout: TableLayout,
    filter: Arc<dyn MoleculeFilter>,
    /// In the order the chromosomes were given.
    chromosomes: Vec<ChrTagData>,
    index: TxHashMap<String, usize>,
    stats: FilterStats,
    current_barcode: Option<u32>,
}

impl RandomTagFilterByBc {
    /// Validate `config` and set up one table per chromosome. Fails before
    /// anything large, such as the Hamming table, is allocated for an
    /// unusable configuration.
    pub fn new<S: Into<String>>(
        config: TagFilterConfig,
        chromosomes: impl IntoIterator<Item = S>,
    ) -> Result<Self, TagFilterError> {
        config.validate()?;
        let layout = TableLayout::from(&config);

        let mut index = TxHashMap::default();
        let mut tables = Vec::new();
        for name in chromosomes {
            let name = name.into();
            if index.insert(name.clone(), tables.len()).is_some() {
                return Err(TagFilterError::DuplicateChromosome(name));
            }
            tables.push(ChrTagData::new(name, layout));
        }

        let filter = build_filter(&config)?;
        info!(
            "tag filter over {} chromosomes: {} UMI slots per position, {:?} profile, {:?}",
            tables.len(),
            layout.num_umis,
            layout.profile,
            filter
        );

        Ok(RandomTagFilterByBc {
            stats: FilterStats::new(layout.num_umis),
            config,
            layout,
            filter,
            chromosomes: tables,
            index,
            current_barcode: None,
        })
    }

    /// Add one read of the current barcode. Returns true if the read is a new
    /// molecule before mutation filtering (always, without UMIs), and false
    /// for reads on unknown chromosomes, which are skipped.
    ///
    /// Panics if the read belongs to a different barcode than the reads
    /// before it and the barcode was not finished in between.
    pub fn add(&mut self, read: &MappedRead) -> bool {
        match self.current_barcode {
            None => self.current_barcode = Some(read.barcode),
            Some(barcode) => assert_eq!(
                barcode, read.barcode,
                "read of barcode {} while barcode {barcode} is open",
                read.barcode
            ),
        }
        let Some(&idx) = self.index.get(read.chrom.as_str()) else {
            debug!(
                "skipping read on unknown chromosome {} at {}",
                read.chrom, read.position
            );
            self.stats.observe_skipped_read();
            return false;
        };
        self.stats.observe_read(self.layout.umi_slot(read.umi));
        self.chromosomes[idx].add(read)
    }

    /// Close the current barcode: molecule and read counts of every populated
    /// position go to the genome tracks and statistics, then all positions
    /// are cleared. Calling it again without new reads adds nothing.
    pub fn finish_barcode(&mut self) -> TrackCounts {
        let positions = self.distinct_mapping_count();
        let mut totals = TrackCounts::default();
        for chrom in &mut self.chromosomes {
            totals += chrom.finish_barcode(&*self.filter, &mut self.stats);
        }
        if let Some(barcode) = self.current_barcode.take() {
            self.stats.barcodes_finished.increment();
            debug!(
                "finished barcode {barcode}: {positions} positions, {} reads, {} molecules",
                totals.reads, totals.molecules
            );
        }
        totals
    }

    /// Throw away the reads of the current barcode, e.g. when its processing
    /// is cancelled. Genome tracks and statistics are left untouched.
    pub fn discard_barcode(&mut self) {
        for chrom in &mut self.chromosomes {
            chrom.discard_barcode();
        }
        if let Some(barcode) = self.current_barcode.take() {
            self.stats.barcodes_discarded.increment();
            debug!("discarded barcode {barcode}");
        }
    }

    /// Views of the populated positions of the current barcode, chromosome by
    /// chromosome in the order given to `new`, then by position and strand.
    /// `barcode` must be the open barcode, if any.
    pub fn iterate<'a>(
        &'a self,
        barcode: u32,
        selection: &'a ChromosomeSelection,
    ) -> impl Iterator<Item = MappedTagItem<'a>> + 'a {
        debug_assert!(
            self.current_barcode.map_or(true, |open| open == barcode),
            "iterating barcode {barcode} while barcode {:?} is open",
            self.current_barcode
        );
        let filter: &'a dyn MoleculeFilter = &*self.filter;
        self.chromosomes
            .iter()
            .filter(move |chrom| selection.includes(chrom.name()))
            .flat_map(move |chrom| chrom.iterate(barcode, filter))
    }

    /// Populated positions of the current barcode, over all chromosomes.
    pub fn distinct_mapping_count(&self) -> usize {
        self.chromosomes
            .iter()
            .map(ChrTagData::distinct_mapping_count)
            .sum()
    }

    /// Declare a known variant site. Returns false for an unknown chromosome.
    pub fn register_expected_variant(
        &mut self,
        chrom: &str,
        position: u32,
        strand: Strand,
        offset: u16,
    ) -> bool {
        match self.index.get(chrom) {
            Some(&idx) => {
                self.chromosomes[idx].register_expected_variant(position, strand, offset);
                true
            }
            None => false,
        }
    }

    pub fn chromosome(&self, chrom: &str) -> Option<&ChrTagData> {
        self.index.get(chrom).map(|&idx| &self.chromosomes[idx])
    }

    pub fn genome_track(&self, chrom: &str) -> Option<&GenomeTrack> {
        self.chromosome(chrom).map(ChrTagData::track)
    }

    pub fn chromosome_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.chromosomes.iter().map(ChrTagData::name)
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    pub fn into_stats(self) -> FilterStats {
        self.stats
    }

    pub fn config(&self) -> &TagFilterConfig {
        &self.config
    }

    pub fn filter(&self) -> &dyn MoleculeFilter {
        &*self.filter
    }

    pub fn current_barcode(&self) -> Option<u32> {
        self.current_barcode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MutationFilterKind, ProfileKind};
    use crate::mapped_tag::MappedTagSummary;
    use crate::read::Mismatch;
    use metric::{JsonReport, Metric};
    use pretty_assertions::assert_eq;
    use proptest::collection::vec;
    use proptest::{prop_assert, proptest};
    use umi::UmiIndex;

    const CHROMS: [&str; 3] = ["chr1", "chr2", "chrM"];

    fn tag_filter(mutation_filter: MutationFilterKind) -> RandomTagFilterByBc {
        let config = TagFilterConfig {
            umi_length: Some(2),
            mutation_filter,
            ..TagFilterConfig::default()
        };
        RandomTagFilterByBc::new(config, CHROMS).unwrap()
    }

    fn read(chrom: &str, position: u32, barcode: u32, umi: u32) -> MappedRead {
        MappedRead::new(chrom, position, Strand::Forward, barcode, umi, 50)
    }

    fn counts(molecules: u64, reads: u64) -> TrackCounts {
        TrackCounts { molecules, reads }
    }

    /// Reads and molecules at chr1:100 for UMI codes [0,0,0,1,2,2,2,2].
    fn scenario(mutation_filter: MutationFilterKind, filter_fraction: f64) -> (u64, u64) {
        let config = TagFilterConfig {
            umi_length: Some(2),
            mutation_filter,
            filter_fraction,
            ..TagFilterConfig::default()
        };
        let mut filter = RandomTagFilterByBc::new(config, CHROMS).unwrap();
        for umi in [0, 0, 0, 1, 2, 2, 2, 2] {
            filter.add(&read("chr1", 100, 0, umi));
        }
        let view = filter.iterate(0, &ChromosomeSelection::All).next().unwrap();
        (view.read_count(), view.molecule_count())
    }

    #[test]
    fn test_fraction_of_max_scenario() {
        // max 4, cutoff 0.4: the 1-read slot still passes
        assert_eq!(scenario(MutationFilterKind::FractionOfMax, 0.1), (8, 3));
        // cutoff 1.0 drops it
        assert_eq!(scenario(MutationFilterKind::FractionOfMax, 0.25), (8, 2));
    }

    #[test]
    fn test_singleton_scenario() {
        assert_eq!(scenario(MutationFilterKind::Singleton, 0.1), (8, 2));
    }

    #[test]
    fn test_hamming_singleton_scenario() {
        let mut filter = tag_filter(MutationFilterKind::Hamming1Singleton);
        let code = |s: &[u8]| UmiIndex::encode(s).unwrap();
        let mut reads = vec![read("chr2", 7, 3, 0)];
        reads[0].umi = code(b"GA");
        for _ in 0..5 {
            let mut r = read("chr2", 7, 3, 0);
            r.umi = code(b"GC");
            reads.push(r);
        }
        for r in &reads {
            filter.add(r);
        }
        let views: Vec<_> = filter.iterate(3, &ChromosomeSelection::All).collect();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].molecule_count(), 1);
        assert_eq!(views[0].read_count(), 6);
    }

    #[test]
    fn test_barcodes_accumulate_in_tracks() {
        let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
        // barcode 1: P1 gets two singleton UMIs, P2 one UMI three times
        for umi in [1, 2] {
            filter.add(&read("chr1", 10, 1, umi));
        }
        for _ in 0..3 {
            filter.add(&read("chr1", 20, 1, 3));
        }
        assert_eq!(filter.distinct_mapping_count(), 2);
        assert_eq!(filter.finish_barcode(), counts(3, 5));

        let track = filter.genome_track("chr1").unwrap();
        assert_eq!(track.get(10, Strand::Forward), counts(2, 2));
        assert_eq!(track.get(20, Strand::Forward), counts(1, 3));

        // barcode 2: P1 only
        filter.add(&read("chr1", 10, 2, 5));
        filter.add(&read("chr1", 10, 2, 5));
        let chr1 = filter.chromosome("chr1").unwrap();
        assert_eq!(
            chr1.item(10, Strand::Forward).unwrap().number_of_reads(),
            2
        );
        assert!(!chr1.item(20, Strand::Forward).unwrap().has_reads());
        assert_eq!(filter.distinct_mapping_count(), 1);
        assert_eq!(filter.finish_barcode(), counts(1, 2));

        let track = filter.genome_track("chr1").unwrap();
        assert_eq!(track.get(10, Strand::Forward), counts(3, 4));
        assert_eq!(track.get(20, Strand::Forward), counts(1, 3));
        assert_eq!(track.strand_totals(Strand::Forward), counts(4, 7));
        assert_eq!(filter.stats().barcodes_finished.count(), 2);
    }

    #[test]
    fn test_finish_twice_does_not_double_count() {
        let mut filter = tag_filter(MutationFilterKind::Singleton);
        filter.add(&read("chr2", 1, 0, 1));
        filter.add(&read("chr2", 1, 0, 1));
        assert_eq!(filter.finish_barcode(), counts(1, 2));
        assert_eq!(filter.finish_barcode(), counts(0, 0));
        assert_eq!(
            filter.genome_track("chr2").unwrap().get(1, Strand::Forward),
            counts(1, 2)
        );
        assert_eq!(filter.stats().barcodes_finished.count(), 1);
        assert_eq!(filter.current_barcode(), None);
    }

    #[test]
    fn test_discard_barcode() {
        let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
        filter.add(&read("chr1", 1, 0, 1));
        filter.discard_barcode();
        assert_eq!(filter.distinct_mapping_count(), 0);
        assert!(filter.genome_track("chr1").unwrap().is_empty());
        assert_eq!(filter.stats().barcodes_discarded.count(), 1);
        // the next barcode may start right away
        filter.add(&read("chr1", 1, 1, 1));
        assert_eq!(filter.finish_barcode(), counts(1, 1));
    }

    #[test]
    #[should_panic(expected = "while barcode 0 is open")]
    fn test_barcode_switch_without_finish() {
        let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
        filter.add(&read("chr1", 1, 0, 1));
        filter.add(&read("chr1", 1, 1, 1));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "iterating barcode 1 while barcode Some(0) is open")]
    fn test_iterate_other_barcode() {
        let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
        filter.add(&read("chr1", 1, 0, 1));
        let _ = filter.iterate(1, &ChromosomeSelection::All).count();
    }

    #[test]
    fn test_unknown_chromosome_is_skipped() {
        let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
        assert!(!filter.add(&read("chrUn", 1, 0, 1)));
        assert!(filter.add(&read("chr1", 1, 0, 1)));
        assert_eq!(filter.stats().skipped_reads.count(), 1);
        assert_eq!(filter.stats().total_reads.count(), 1);
        assert!(filter.genome_track("chrUn").is_none());
        assert!(!filter.register_expected_variant("chrUn", 1, Strand::Forward, 10));
    }

    #[test]
    fn test_new_molecule_signal() {
        let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
        assert!(filter.add(&read("chr1", 1, 0, 1)));
        assert!(!filter.add(&read("chr1", 1, 0, 1)));
        assert!(filter.add(&read("chr1", 1, 0, 2)));

        let config = TagFilterConfig {
            umi_length: None,
            ..TagFilterConfig::default()
        };
        let mut no_umis = RandomTagFilterByBc::new(config, CHROMS).unwrap();
        assert!(no_umis.add(&read("chr1", 1, 0, 0)));
        assert!(no_umis.add(&read("chr1", 1, 0, 0)));
        assert_eq!(no_umis.finish_barcode(), counts(2, 2));
    }

    #[test]
    fn test_iterate_selection() {
        let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
        filter.add(&read("chrM", 5, 9, 0));
        filter.add(&read("chr1", 50, 9, 0));
        filter.add(&read("chr1", 7, 9, 0));
        filter.add(&read("chr2", 1, 9, 0));

        let located = |selection: ChromosomeSelection| {
            filter
                .iterate(9, &selection)
                .map(|view| (view.chrom().to_string(), view.position()))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            located(ChromosomeSelection::All),
            vec![
                ("chr1".to_string(), 7),
                ("chr1".to_string(), 50),
                ("chr2".to_string(), 1),
                ("chrM".to_string(), 5),
            ]
        );
        assert_eq!(
            located(ChromosomeSelection::Include(vec!["chrM".to_string()])),
            vec![("chrM".to_string(), 5)]
        );
        assert_eq!(
            located(ChromosomeSelection::Exclude(vec![
                "chr1".to_string(),
                "chrM".to_string()
            ])),
            vec![("chr2".to_string(), 1)]
        );
    }

    #[test]
    fn test_variant_summaries_through_views() {
        let config = TagFilterConfig {
            umi_length: Some(2),
            analyze_variants: true,
            ..TagFilterConfig::default()
        };
        let mut filter = RandomTagFilterByBc::new(config, CHROMS).unwrap();
        let snp = || vec![Mismatch::new(12, b'A', b'C')];
        filter.add(&read("chr1", 300, 4, 1).with_mismatches(snp()));
        filter.add(&read("chr1", 300, 4, 1).with_mismatches(snp()));
        filter.add(&read("chr1", 300, 4, 2));
        // multi-mapped reads elsewhere never feed variant data
        filter.add(
            &read("chr1", 900, 4, 1)
                .with_mismatches(snp())
                .with_ambiguous_placement(),
        );

        let summaries: Vec<MappedTagSummary> = filter
            .iterate(4, &ChromosomeSelection::All)
            .map(|view| view.to_summary())
            .collect();
        assert_eq!(summaries.len(), 2);
        let variants = &summaries[0].variants;
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].reference_base, Some(b'A'));
        assert_eq!(variants[0].total_reads(), 3);
        assert!(summaries[1].ambiguous);
        assert!(summaries[1].variants.is_empty());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = TagFilterConfig {
            umi_length: Some(9),
            mutation_filter: MutationFilterKind::Hamming1Singleton,
            ..TagFilterConfig::default()
        };
        assert!(RandomTagFilterByBc::new(config, CHROMS).is_err());

        let err = RandomTagFilterByBc::new(TagFilterConfig::default(), ["chr1", "chr1"])
            .unwrap_err();
        assert_eq!(err, TagFilterError::DuplicateChromosome("chr1".to_string()));
    }

    #[test]
    fn test_shards_merge() {
        let mut shards = Vec::new();
        for barcode in 0..2 {
            let mut filter = tag_filter(MutationFilterKind::FractionOfMax);
            filter.add(&read("chr1", 1, barcode, barcode));
            filter.finish_barcode();
            shards.push(filter.into_stats());
        }
        let stats = FilterStats::from_chunks(shards);
        assert_eq!(stats.total_reads.count(), 2);
        assert_eq!(stats.reads_per_umi[..2].to_vec(), vec![1, 1]);
        let report = stats.to_json_reporter();
        assert_eq!(
            report.get("umi_barcodes_finished"),
            Some(&serde_json::json!(2))
        );
    }

    proptest! {
        #[test]
        fn prop_test_molecules_never_exceed_reads(
            umis in vec(0u32..16, 1..60),
            tristate in proptest::bool::ANY,
        ) {
            let profile = if tristate { ProfileKind::TriState } else { ProfileKind::Counting };
            let mutation_filter = if tristate {
                MutationFilterKind::Hamming1Singleton
            } else {
                MutationFilterKind::FractionOfMean
            };
            let config = TagFilterConfig {
                umi_length: Some(2),
                profile,
                mutation_filter,
                ..TagFilterConfig::default()
            };
            let mut filter = RandomTagFilterByBc::new(config, CHROMS).unwrap();
            for &umi in &umis {
                filter.add(&read("chr1", 1, 0, umi));
            }
            for view in filter.iterate(0, &ChromosomeSelection::All) {
                prop_assert!(view.molecule_count() <= view.read_count());
                prop_assert!(view.molecule_count() <= 16);
            }
            let totals = filter.finish_barcode();
            prop_assert!(totals.molecules <= umis.len() as u64);
            prop_assert!(totals.reads == umis.len() as u64);
        }
    }
}
