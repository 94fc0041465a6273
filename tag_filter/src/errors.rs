//! Configuration errors raised when the tag filter is constructed.

use crate::config::{MutationFilterKind, ProfileKind};
use umi::UmiError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TagFilterError {
    #[error(transparent)]
    Umi(#[from] UmiError),
    #[error(
        "a {umi_length}-nt UMI needs {num_umis} slots per position; \
         at most {max_length} nt is supported"
    )]
    UmiProfileTooLarge {
        umi_length: usize,
        num_umis: usize,
        max_length: usize,
    },
    #[error("the {0:?} mutation filter requires UMIs, but umi_length is not set")]
    FilterRequiresUmis(MutationFilterKind),
    #[error("the {filter:?} mutation filter needs exact per-UMI read counts, which the {profile:?} profile does not keep")]
    ExactCountsRequired {
        filter: MutationFilterKind,
        profile: ProfileKind,
    },
    #[error("filter_fraction must be in [0, 1), got {0}")]
    InvalidFraction(f64),
    #[error("max_mutation_distance must be at least 1")]
    InvalidMutationDistance,
    #[error("low_pass_threshold {threshold} exceeds the largest per-UMI read count a profile can hold ({max})")]
    LowPassThresholdOverflow { threshold: u32, max: u32 },
    #[error("chromosome {0} was given more than once")]
    DuplicateChromosome(String),
}
