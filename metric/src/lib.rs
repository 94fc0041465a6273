#![deny(
    missing_docs,
    missing_copy_implementations,
    non_upper_case_globals,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

//!
//! This is documentation for the `metric` crate.
//!
//! This crate defines the data structures used for tracking run-wide
//! statistics of the tag filter. The `Metric` trait forms the core: every
//! statistic can be merged with another instance of itself, so that
//! shards processed by independent workers can be combined at the end.
//! Statistics that end up in a QC summary implement `JsonReport`.
//!

use ahash::AHasher;
use anyhow::{Context, Error};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{hash_map, HashMap, HashSet};
use std::fs::File;
use std::hash::BuildHasher;
use std::path::Path;

pub mod count_metric;
pub use crate::count_metric::CountMetric;
pub mod histogram;
pub use crate::histogram::SimpleHistogram;

/// A deterministic and fast hasher.
#[derive(Clone, Copy, Default)]
pub struct TxHasher;

impl TxHasher {
    fn random_state() -> ahash::RandomState {
        ahash::RandomState::with_seeds(0, 0, 0, 0)
    }

    /// Return a new hasher.
    pub fn hasher() -> AHasher {
        Self::random_state().build_hasher()
    }
}

impl BuildHasher for TxHasher {
    type Hasher = AHasher;

    fn build_hasher(&self) -> Self::Hasher {
        Self::hasher()
    }
}

/// A default HashMap using some faster hashing scheme
pub type TxHashMap<K, V> = HashMap<K, V, TxHasher>;

/// A default HashSet using some faster hashing scheme
pub type TxHashSet<K> = HashSet<K, TxHasher>;

/// The core trait in this crate. Any data structure representing a
/// run-wide statistic implements this trait.
pub trait Metric {
    /// Combine two Metric objects, modifying self in place,
    /// consuming the `other`
    fn merge(&mut self, other: Self);

    /// Merge metrics from an iterator, typically one per shard
    fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Self>,
        Self: Default + Sized,
    {
        chunks
            .into_iter()
            .fold(Default::default(), |mut merged, this| {
                merged.merge(this);
                merged
            })
    }
}

/// `JsonReporter` is a map from metric name to `serde_json::Value`.
/// Serialized, it is the QC summary json. Keys are written in sorted order.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct JsonReporter {
    hashmap: TxHashMap<String, Value>,
}

impl Serialize for JsonReporter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut xs: Vec<_> = self.hashmap.iter().collect();
        xs.sort_by_key(|&(k, _v)| k);
        let mut map = serializer.serialize_map(Some(xs.len()))?;
        for (k, v) in xs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl JsonReporter {
    /// Insert a new (key, value) pair. Panics if the key is already present.
    pub fn insert(&mut self, key: impl ToString, value: impl Into<Value>) {
        let key_str = key.to_string();
        assert!(
            !self.hashmap.contains_key(&key_str),
            "duplicate metric {key_str}"
        );
        self.hashmap.insert(key_str, value.into());
    }

    /// Get the value of a metric
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.hashmap.get(key)
    }

    /// Number of metrics in the report
    pub fn len(&self) -> usize {
        self.hashmap.len()
    }

    /// True if no metric has been inserted
    pub fn is_empty(&self) -> bool {
        self.hashmap.is_empty()
    }

    /// Add `prefix` to every key of the report
    pub fn add_prefix(self, prefix: &str) -> JsonReporter {
        JsonReporter {
            hashmap: self
                .hashmap
                .into_iter()
                .map(|(k, v)| (format!("{prefix}_{k}"), v))
                .collect(),
        }
    }

    /// Write the report as pretty printed json
    pub fn to_file(&self, filename: impl AsRef<Path>) -> Result<(), Error> {
        let path = filename.as_ref();
        let writer = File::create(path)
            .with_context(|| format!("Could not open file '{}' for writing", path.display()))?;
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Could not write JSON to '{}'", path.display()))?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a JsonReporter {
    type Item = (&'a String, &'a Value);
    type IntoIter = hash_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.hashmap.iter()
    }
}

/// `JsonReport` defines how a statistic is written out to a QC summary json.
pub trait JsonReport {
    /// Convert `self` into a `JsonReporter` object
    fn to_json_reporter(&self) -> JsonReporter;

    /// Generate a report by converting `self` into a `JsonReporter` and
    /// serializing it to `filename`
    fn report(&self, filename: &dyn AsRef<Path>) -> Result<(), Error> {
        self.to_json_reporter().to_file(filename)
    }
}

impl JsonReport for JsonReporter {
    fn to_json_reporter(&self) -> JsonReporter {
        self.clone()
    }
}
