use std::fmt;

use super::IntHistogram;
use crate::common::Result;
use crate::execution::Op;

/// Largest string key; every string ordering after "zzzz" maps onto it.
const MAX_KEY_STRING: &str = "zzzz";

/// Histogram over a string field.
///
/// Strings are reduced to an integer key built from their first four bytes,
/// which preserves byte-wise ordering on those bytes, and counted in an
/// `IntHistogram` over the key domain.
#[derive(Debug, Clone)]
pub struct StringHistogram {
    inner: IntHistogram,
}

impl StringHistogram {
    pub fn new(bucket_count: usize) -> Result<Self> {
        Ok(Self {
            inner: IntHistogram::new(bucket_count, min_key(), max_key())?,
        })
    }

    pub fn add_value(&mut self, s: &str) {
        self.inner.add_value(string_key(s));
    }

    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.inner.estimate_selectivity(op, string_key(s))
    }

    pub fn avg_selectivity(&self) -> f64 {
        self.inner.avg_selectivity()
    }

    pub fn total(&self) -> u64 {
        self.inner.total()
    }
}

impl fmt::Display for StringHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringHistogram over {}", self.inner)
    }
}

fn raw_key(s: &str) -> i64 {
    let mut bytes = [0u8; 4];
    for (dst, src) in bytes.iter_mut().zip(s.bytes()) {
        *dst = src;
    }
    i64::from(u32::from_be_bytes(bytes))
}

fn min_key() -> i32 {
    raw_key("") as i32
}

fn max_key() -> i32 {
    raw_key(MAX_KEY_STRING) as i32
}

/// Maps a string to its histogram key within `[min_key(), max_key()]`.
pub(crate) fn string_key(s: &str) -> i32 {
    raw_key(s).clamp(i64::from(min_key()), i64::from(max_key())) as i32
}
