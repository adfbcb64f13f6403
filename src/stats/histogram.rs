use std::fmt;

use crate::common::{KilnError, Result};
use crate::execution::Op;

/// Fixed-width histogram over one integer field.
///
/// The domain `[min, max]` is fixed at construction and split into
/// `bucket_count` buckets of `width = ceil((max - min + 1) / bucket_count)`
/// values each; the last bucket is cut off at `max`. Only per-bucket counts
/// are kept, so memory does not grow with the number of values added.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    counts: Vec<u64>,
    min: i64,
    max: i64,
    width: i64,
    total: u64,
}

impl IntHistogram {
    pub fn new(bucket_count: usize, min: i32, max: i32) -> Result<Self> {
        if bucket_count == 0 {
            return Err(KilnError::InvalidConfiguration(
                "histogram needs at least one bucket".into(),
            ));
        }
        if min > max {
            return Err(KilnError::InvalidConfiguration(format!(
                "histogram domain [{}, {}] is empty",
                min, max
            )));
        }

        let (min, max) = (i64::from(min), i64::from(max));
        let buckets = bucket_count as i64;
        let width = (max - min + 1 + buckets - 1) / buckets;

        Ok(Self {
            counts: vec![0; bucket_count],
            min,
            max,
            width,
            total: 0,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    pub fn bucket_width(&self) -> i64 {
        self.width
    }

    pub fn min(&self) -> i32 {
        self.min as i32
    }

    pub fn max(&self) -> i32 {
        self.max as i32
    }

    /// Number of values added so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn bucket_counts(&self) -> &[u64] {
        &self.counts
    }

    /// Records one value. Values outside the domain are counted in the
    /// nearest edge bucket.
    pub fn add_value(&mut self, v: i32) {
        let v = i64::from(v).clamp(self.min, self.max);
        let idx = self.bucket_of(v);
        self.counts[idx] += 1;
        self.total += 1;
    }

    /// Estimates the fraction of added values `x` for which `x op v` holds.
    /// The result is always within [0, 1].
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        if self.total == 0 {
            return match op {
                Op::NotEquals => 1.0,
                Op::Like => self.avg_selectivity(),
                _ => 0.0,
            };
        }

        let v = i64::from(v);
        let selectivity = match op {
            Op::Equals => self.equals(v),
            Op::NotEquals => 1.0 - self.equals(v),
            Op::GreaterThan => self.greater_than(v),
            Op::GreaterThanOrEq => self.greater_than(v) + self.equals(v),
            Op::LessThan => self.less_than(v),
            Op::LessThanOrEq => self.less_than(v) + self.equals(v),
            Op::Like => self.avg_selectivity(),
        };
        selectivity.clamp(0.0, 1.0)
    }

    /// Selectivity assumed when nothing is known about the operand.
    pub fn avg_selectivity(&self) -> f64 {
        1.0
    }

    fn bucket_of(&self, v: i64) -> usize {
        let idx = ((v - self.min) / self.width) as usize;
        idx.min(self.counts.len() - 1)
    }

    fn bucket_left(&self, idx: usize) -> i64 {
        self.min + idx as i64 * self.width
    }

    fn bucket_right(&self, idx: usize) -> i64 {
        (self.bucket_left(idx) + self.width - 1).min(self.max)
    }

    fn fraction(&self, count: u64) -> f64 {
        count as f64 / self.total as f64
    }

    fn equals(&self, v: i64) -> f64 {
        if v < self.min || v > self.max {
            return 0.0;
        }
        let idx = self.bucket_of(v);
        self.fraction(self.counts[idx]) / self.width as f64
    }

    fn greater_than(&self, v: i64) -> f64 {
        if v > self.max {
            return 0.0;
        }
        if v < self.min {
            return 1.0;
        }
        let idx = self.bucket_of(v);
        let in_bucket =
            self.fraction(self.counts[idx]) * (self.bucket_right(idx) - v) as f64 / self.width as f64;
        let after: u64 = self.counts[idx + 1..].iter().sum();
        in_bucket + self.fraction(after)
    }

    fn less_than(&self, v: i64) -> f64 {
        if v > self.max {
            return 1.0;
        }
        if v < self.min {
            return 0.0;
        }
        let idx = self.bucket_of(v);
        let in_bucket =
            self.fraction(self.counts[idx]) * (v - self.bucket_left(idx)) as f64 / self.width as f64;
        let before: u64 = self.counts[..idx].iter().sum();
        in_bucket + self.fraction(before)
    }
}

impl fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntHistogram[{}..={}, width {}, {} values]:",
            self.min, self.max, self.width, self.total
        )?;
        for (idx, count) in self.counts.iter().enumerate() {
            write!(
                f,
                " [{}..={}]={}",
                self.bucket_left(idx),
                self.bucket_right(idx),
                count
            )?;
        }
        Ok(())
    }
}
