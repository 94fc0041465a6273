// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]
// Other warnings (as of rust 1.55)
#![deny(
    asm_sub_register,
    bad_asm_style,
    bindings_with_variant_name,
    clashing_extern_declarations,
    confusable_idents,
    const_item_mutation,
    deprecated,
    deref_nullptr,
    drop_bounds,
    dyn_drop,
    elided_lifetimes_in_paths,
    exported_private_dependencies,
    function_item_references,
    improper_ctypes,
    improper_ctypes_definitions,
    incomplete_features,
    inline_no_sanitize,
    invalid_value,
    irrefutable_let_patterns,
    large_assignments,
    mixed_script_confusables,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overlapping_range_endpoints,
    renamed_and_removed_lints,
    stable_features,
    dangling_pointers_from_temporaries,
    trivial_bounds,
    type_alias_bounds,
    uncommon_codepoints,
    unconditional_recursion,
    unknown_lints,
    unnameable_test_items,
    unused_comparisons,
    while_true
)]

//! UMI-based molecule counting per genomic position.
//!
//! Mapped reads of one barcode are routed to a position aggregator per
//! (chromosome, position, strand). When the barcode is finished, every
//! aggregator reports a molecule count corrected for UMI sequencing errors by
//! the configured mutation filter, the counts are added to per-chromosome
//! genome tracks and run statistics, and the aggregators are cleared for the
//! next barcode.

pub mod chr_tag_data;
pub mod config;
mod errors;
pub mod filter_by_bc;
pub mod genome_track;
pub mod mapped_tag;
pub mod mutation_filter;
pub mod position_key;
pub mod profile;
pub mod read;
pub mod stats;
pub mod tag_item;
pub mod variants;

pub use config::{MutationFilterKind, ProfileKind, TagFilterConfig};
pub use errors::TagFilterError;
pub use filter_by_bc::{ChromosomeSelection, RandomTagFilterByBc};
pub use genome_track::{GenomeTrack, TrackCounts};
pub use mapped_tag::{MappedTagItem, MappedTagSummary};
pub use read::{MappedRead, Mismatch, Strand};
pub use stats::FilterStats;
pub use umi::UmiIndex;
