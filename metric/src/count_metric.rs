//!
//! This module defines the `CountMetric` struct, a plain `i64` counter used
//! for read, molecule and barcode totals.

use crate::Metric;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Use this struct to keep track of metrics which can be represented using
/// a single `i64` variable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Ord, PartialOrd)]
#[serde(transparent)]
pub struct CountMetric {
    pub(crate) count: i64,
}

impl Metric for CountMetric {
    /// Merging two `CountMetric` objects is just adding up the two counts
    ///
    /// # Example
    /// ```rust
    /// use metric::{Metric, CountMetric};
    /// let mut c1 = CountMetric::default();
    /// c1.increment();
    /// c1.merge(CountMetric::from(50));
    /// assert_eq!(c1, CountMetric::from(51));
    /// ```
    fn merge(&mut self, other: Self) {
        self.count += other.count;
    }
}

impl CountMetric {
    /// Increment the counter by 1
    pub fn increment(&mut self) {
        self.count += 1;
    }

    /// Increment the counter by anything which can be cast into `i64`
    pub fn increment_by<T>(&mut self, val: T)
    where
        T: Into<i64>,
    {
        self.count += val.into();
    }

    /// Return the count
    pub fn count(self) -> i64 {
        self.count
    }
}

impl<T: Into<i64>> From<T> for CountMetric {
    fn from(val: T) -> Self {
        CountMetric { count: val.into() }
    }
}

impl Add for CountMetric {
    type Output = CountMetric;
    fn add(self, other: CountMetric) -> CountMetric {
        CountMetric {
            count: self.count + other.count,
        }
    }
}

impl AddAssign for CountMetric {
    fn add_assign(&mut self, other: CountMetric) {
        self.count += other.count;
    }
}

impl Sum for CountMetric {
    fn sum<I: Iterator<Item = CountMetric>>(iter: I) -> CountMetric {
        iter.fold(CountMetric::default(), Add::add)
    }
}
