use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::TupleStream;
use crate::common::{KilnError, Result};
use crate::tuple::{Column, DataType, Schema, Tuple, Value};

/// Aggregate functions computed over one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateOp {
    /// `Count` works on any column; the others need integers.
    pub fn accepts(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (AggregateOp::Count, _) | (_, DataType::Int)
        )
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Count => "COUNT",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    count: u64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

impl Accumulator {
    fn add(&mut self, value: &Value) {
        self.count += 1;
        if let Value::Int(v) = *value {
            self.sum = self.sum.saturating_add(i64::from(v));
            self.min = Some(self.min.map_or(v, |m| m.min(v)));
            self.max = Some(self.max.map_or(v, |m| m.max(v)));
        }
    }

    fn finish(&self, op: AggregateOp) -> Result<i32> {
        let wide = match op {
            AggregateOp::Count => i64::try_from(self.count).unwrap_or(i64::MAX),
            AggregateOp::Sum => self.sum,
            // truncates toward zero
            AggregateOp::Avg => self.sum / i64::try_from(self.count.max(1)).unwrap_or(i64::MAX),
            AggregateOp::Min => self.min.map_or(0, i64::from),
            AggregateOp::Max => self.max.map_or(0, i64::from),
        };
        i32::try_from(wide).map_err(|_| KilnError::AggregateOverflow {
            op: op.to_string(),
            value: wide,
        })
    }
}

/// Grouped aggregation over a child stream.
///
/// Opening the operator drains the child and folds every tuple into the
/// accumulator of its group. Output tuples are `(group, aggregate)`, or just
/// `(aggregate)` without grouping, in the order groups were first seen. The
/// aggregate column is an integer named after the aggregated field; `AVG`
/// truncates toward zero. An empty child yields no tuples, even without
/// grouping.
pub struct Aggregate {
    child: Box<dyn TupleStream>,
    aggregate_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    schema: Arc<Schema>,
    /// Result tuples and the index of the next one; `None` while closed
    results: Option<(Vec<Tuple>, usize)>,
}

impl Aggregate {
    /// Creates an aggregate of `op` over `aggregate_field`, grouped by
    /// `group_field` when one is given.
    ///
    /// Fails with `ColumnOutOfRange` for a missing field and with
    /// `InvalidConfiguration` if `op` is not defined over the aggregated
    /// column's type.
    pub fn new(
        child: Box<dyn TupleStream>,
        aggregate_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        let child_schema = child.schema();
        let aggregated = child_schema
            .column(aggregate_field)
            .ok_or(KilnError::ColumnOutOfRange(aggregate_field))?;
        if !op.accepts(aggregated.data_type()) {
            return Err(KilnError::InvalidConfiguration(format!(
                "{} is not defined over {} column {}",
                op,
                aggregated.data_type(),
                aggregated.name()
            )));
        }

        let mut columns = Vec::with_capacity(2);
        if let Some(g) = group_field {
            let grouped = child_schema
                .column(g)
                .ok_or(KilnError::ColumnOutOfRange(g))?;
            columns.push(grouped.clone());
        }
        columns.push(Column::new(aggregated.name(), DataType::Int));
        let schema = Arc::new(Schema::new(columns));

        Ok(Self {
            child,
            aggregate_field,
            group_field,
            op,
            schema,
            results: None,
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn aggregate_field(&self) -> usize {
        self.aggregate_field
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_field
    }

    pub fn aggregate_field_name(&self) -> &str {
        self.child
            .schema()
            .column(self.aggregate_field)
            .map_or("", |c| c.name())
    }

    /// Name of the grouping field, or `None` without grouping.
    pub fn group_field_name(&self) -> Option<&str> {
        let g = self.group_field?;
        self.child.schema().column(g).map(|c| c.name())
    }

    fn compute(&mut self) -> Result<Vec<Tuple>> {
        let mut index: HashMap<Option<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Option<Value>, Accumulator)> = Vec::new();

        while let Some(tuple) = self.child.next_tuple()? {
            let key = match self.group_field {
                Some(g) => Some(
                    tuple
                        .value(g)
                        .cloned()
                        .ok_or(KilnError::ColumnOutOfRange(g))?,
                ),
                None => None,
            };
            let value = tuple
                .value(self.aggregate_field)
                .ok_or(KilnError::ColumnOutOfRange(self.aggregate_field))?;

            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, Accumulator::default()));
                    groups.len() - 1
                }
            };
            groups[slot].1.add(value);
        }

        let mut tuples = Vec::with_capacity(groups.len());
        for (key, acc) in groups {
            let mut values: Vec<Value> = key.into_iter().collect();
            values.push(Value::Int(acc.finish(self.op)?));
            tuples.push(Tuple::new(Arc::clone(&self.schema), values)?);
        }
        Ok(tuples)
    }
}

impl TupleStream for Aggregate {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        let tuples = self.compute()?;
        debug!(op = %self.op, groups = tuples.len(), "computed aggregate");
        self.results = Some((tuples, 0));
        Ok(())
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        let (tuples, next) = self.results.as_mut().ok_or(KilnError::NoSuchElement)?;
        let tuple = tuples.get(*next).cloned();
        if tuple.is_some() {
            *next += 1;
        }
        Ok(tuple)
    }

    /// Replays the computed groups without reading the child again.
    fn rewind(&mut self) -> Result<()> {
        let (_, next) = self.results.as_mut().ok_or(KilnError::NoSuchElement)?;
        *next = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.results = None;
        self.child.close();
    }
}
