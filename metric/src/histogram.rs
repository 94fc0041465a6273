//!
//! This module defines `SimpleHistogram<K>`, a histogram keeping track of
//! counts of different items. The tag filter uses it for its distributions
//! of distinct UMIs per position and reads per molecule.
//!
use crate::{CountMetric, Metric, TxHashMap};
use itertools::Itertools;
use num_traits::cast::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Use this struct to keep track of counts of various items.
/// The underlying representation is a `HashMap`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent, bound = "")]
pub struct SimpleHistogram<K>
where
    K: Eq + Hash + Serialize + for<'a> Deserialize<'a>,
{
    distribution: TxHashMap<K, CountMetric>,
}

impl<K> Default for SimpleHistogram<K>
where
    K: Eq + Hash + Serialize + for<'a> Deserialize<'a>,
{
    fn default() -> Self {
        SimpleHistogram {
            distribution: TxHashMap::default(),
        }
    }
}

impl<K> SimpleHistogram<K>
where
    K: Eq + Hash + Serialize + for<'a> Deserialize<'a>,
{
    /// Increment the counter of `key` by one
    ///
    /// # Example
    /// ```rust
    /// use metric::SimpleHistogram;
    /// let mut hist = SimpleHistogram::default();
    /// hist.observe(10u32);
    /// hist.observe(10u32);
    /// assert_eq!(hist.get(&10), 2);
    /// assert_eq!(hist.get(&11), 0);
    /// ```
    pub fn observe(&mut self, key: K) {
        self.observe_by(key, 1);
    }

    /// Increment the counter of `key` by `val`. Zero increments do not
    /// insert the key.
    pub fn observe_by(&mut self, key: K, val: impl Into<i64>) {
        let val = val.into();
        if val == 0 {
            return;
        }
        self.distribution
            .entry(key)
            .or_default()
            .increment_by(val);
    }

    /// Get the count for the `key`. Returns 0 if the key is not present
    pub fn get(&self, key: &K) -> i64 {
        self.distribution.get(key).map_or(0, |c| c.count())
    }

    /// Get a reference to the underlying hashmap
    pub fn distribution(&self) -> &TxHashMap<K, CountMetric> {
        &self.distribution
    }

    /// Total number of observations
    pub fn total(&self) -> i64 {
        self.distribution.values().map(|c| c.count()).sum()
    }

    /// True if nothing has been observed
    pub fn is_empty(&self) -> bool {
        self.distribution.is_empty()
    }

    /// Iterate over (key, count) pairs in increasing key order
    pub fn sorted_counts(&self) -> impl Iterator<Item = (&K, i64)> + '_
    where
        K: Ord,
    {
        self.distribution
            .iter()
            .map(|(k, c)| (k, c.count()))
            .sorted()
    }

    /// Return the maximum key observed, or None if the histogram is empty
    pub fn max_key(&self) -> Option<K>
    where
        K: Ord + Clone,
    {
        self.distribution.keys().max().cloned()
    }

    /// Return the mean of the histogram, or None if the histogram is empty
    pub fn mean(&self) -> Option<f64>
    where
        K: AsPrimitive<f64>,
    {
        if self.distribution.is_empty() {
            return None;
        }
        let (sum, n) = self
            .distribution
            .iter()
            .fold((0.0, 0.0), |(sum, n), (k, c)| {
                let count = c.count() as f64;
                (sum + count * k.as_(), n + count)
            });
        Some(sum / n)
    }
}

impl<K> Metric for SimpleHistogram<K>
where
    K: Eq + Hash + Serialize + for<'a> Deserialize<'a>,
{
    fn merge(&mut self, other: Self) {
        for (key, count) in other.distribution {
            self.distribution.entry(key).or_default().merge(count);
        }
    }
}

impl<K> FromIterator<K> for SimpleHistogram<K>
where
    K: Eq + Hash + Serialize + for<'a> Deserialize<'a>,
{
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut histogram = SimpleHistogram::default();
        for key in iter {
            histogram.observe(key);
        }
        histogram
    }
}
