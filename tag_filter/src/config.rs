//!
//! Parameters of the tag filter.
//!
//! A `TagFilterConfig` is handed to `RandomTagFilterByBc::new` and travels
//! down to every chromosome table and position aggregator from there. It can
//! be read from a TOML file; keys that are absent take their default value.
//!
use crate::errors::TagFilterError;
use crate::profile::COUNTER_MAX;
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use umi::{HammingTable, MAX_HAMMING_UMI_LENGTH};

/// Longest UMI for which per-position slot arrays are allocated
/// (4^12 slots, 8 MiB per populated position with the counting profile).
pub const MAX_PROFILE_UMI_LENGTH: usize = 12;

/// Storage used for the per-position UMI occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProfileKind {
    /// One saturating 16-bit read counter per UMI slot.
    #[default]
    Counting,
    /// Two bits per UMI slot: seen, and seen more than once.
    TriState,
}

/// How the corrected molecule count of a position is derived from its UMI
/// occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MutationFilterKind {
    /// Keep slots above `filter_fraction` of the largest slot.
    #[default]
    FractionOfMax,
    /// Keep slots above `filter_fraction` of the mean occupied slot.
    FractionOfMean,
    /// Drop every slot seen exactly once.
    Singleton,
    /// Drop singletons that are within `max_mutation_distance` of a
    /// non-singleton, or of a singleton with a lower UMI index.
    Hamming1Singleton,
    /// Drop slots with fewer than `low_pass_threshold` reads.
    LowPassFilter,
}

impl MutationFilterKind {
    /// True if the filter looks at exact per-UMI read counts.
    pub fn needs_exact_counts(self) -> bool {
        matches!(
            self,
            MutationFilterKind::FractionOfMax
                | MutationFilterKind::FractionOfMean
                | MutationFilterKind::LowPassFilter
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagFilterConfig {
    /// UMI length in nucleotides. `None` runs without UMIs: every read is
    /// its own molecule.
    pub umi_length: Option<usize>,
    pub profile: ProfileKind,
    pub mutation_filter: MutationFilterKind,
    /// Used by `FractionOfMax` and `FractionOfMean`.
    pub filter_fraction: f64,
    /// Used by `LowPassFilter`.
    pub low_pass_threshold: u32,
    /// Two UMIs this close or closer count as mutations of each other.
    pub max_mutation_distance: u8,
    /// Collect per-offset base observations for mismatching positions.
    pub analyze_variants: bool,
    /// Mismatches closer than this to either read end are ignored.
    pub variant_end_margin: u16,
}

impl Default for TagFilterConfig {
    fn default() -> Self {
        TagFilterConfig {
            umi_length: Some(6),
            profile: ProfileKind::Counting,
            mutation_filter: MutationFilterKind::FractionOfMax,
            filter_fraction: 0.1,
            low_pass_threshold: 2,
            max_mutation_distance: 1,
            analyze_variants: false,
            variant_end_margin: 5,
        }
    }
}

macro_rules! warn_if_non_default {
    ($config:ident, $default:ident, $($field:ident),+) => {
        $(
            if $config.$field != $default.$field {
                warn!("using non-default {} = {:?}", stringify!($field), $config.$field);
            }
        )+
    };
}

impl TagFilterConfig {
    /// Parse parameters from TOML.
    pub fn from_toml_str(s: &str) -> Result<TagFilterConfig> {
        let config: TagFilterConfig =
            toml::from_str(s).context("unable to parse tag filter parameters")?;
        config.warn_non_default();
        Ok(config)
    }

    /// Read parameters from a TOML file.
    pub fn from_path(path: &Path) -> Result<TagFilterConfig> {
        let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        TagFilterConfig::from_toml_str(&s).with_context(|| path.display().to_string())
    }

    fn warn_non_default(&self) {
        let default = TagFilterConfig::default();
        warn_if_non_default!(
            self,
            default,
            umi_length,
            profile,
            mutation_filter,
            filter_fraction,
            low_pass_threshold,
            max_mutation_distance,
            analyze_variants,
            variant_end_margin
        );
    }

    pub fn uses_umis(&self) -> bool {
        self.umi_length.is_some()
    }

    /// Number of UMI slots per position; a single slot without UMIs.
    pub fn num_umis(&self) -> usize {
        self.umi_length.map_or(1, |len| 1 << (2 * len))
    }

    /// Reject parameter combinations that cannot be honoured. Called when
    /// the tag filter is constructed, before anything is allocated.
    pub fn validate(&self) -> Result<(), TagFilterError> {
        if let Some(umi_length) = self.umi_length {
            umi::num_umis(umi_length)?;
            if umi_length > MAX_PROFILE_UMI_LENGTH {
                return Err(TagFilterError::UmiProfileTooLarge {
                    umi_length,
                    num_umis: self.num_umis(),
                    max_length: MAX_PROFILE_UMI_LENGTH,
                });
            }
        }

        let filter = self.mutation_filter;
        if filter == MutationFilterKind::Hamming1Singleton {
            match self.umi_length {
                None => return Err(TagFilterError::FilterRequiresUmis(filter)),
                Some(len) if len > MAX_HAMMING_UMI_LENGTH => {
                    return Err(umi::UmiError::HammingTableTooLarge(len).into())
                }
                Some(_) => {}
            }
            if self.max_mutation_distance == 0 {
                return Err(TagFilterError::InvalidMutationDistance);
            }
        }
        if self.uses_umis() && filter.needs_exact_counts() && self.profile == ProfileKind::TriState
        {
            return Err(TagFilterError::ExactCountsRequired {
                filter,
                profile: self.profile,
            });
        }
        if !(0.0..1.0).contains(&self.filter_fraction) {
            return Err(TagFilterError::InvalidFraction(self.filter_fraction));
        }
        if self.low_pass_threshold > u32::from(COUNTER_MAX) {
            return Err(TagFilterError::LowPassThresholdOverflow {
                threshold: self.low_pass_threshold,
                max: u32::from(COUNTER_MAX),
            });
        }
        Ok(())
    }

    /// Build the Hamming table when the selected filter needs one.
    pub(crate) fn hamming_table(&self) -> Result<Option<HammingTable>, TagFilterError> {
        match (self.mutation_filter, self.umi_length) {
            (MutationFilterKind::Hamming1Singleton, Some(len)) => Ok(Some(HammingTable::new(len)?)),
            _ => Ok(None),
        }
    }
}
