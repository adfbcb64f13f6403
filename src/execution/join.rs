use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use super::{JoinPredicate, Op, TupleStream};
use crate::common::{KilnError, Result};
use crate::tuple::{Schema, Tuple};

/// Block-bounded sort-merge join of two tuple streams.
///
/// The outer stream is consumed in blocks of `memory_budget / tuple_size`
/// tuples. For every outer block the inner stream is rewound and read in
/// blocks of its own capacity; each (outer block, inner block) pair is
/// sorted on the join fields and merged:
///
/// - `=`: the cross product of every pair of equal-key runs
/// - `>`, `>=`: for each outer tuple, inner tuples from the front while the
///   predicate holds
/// - `<`, `<=`: for each outer tuple, inner tuples from the back while the
///   predicate holds
///
/// Output tuples are the outer fields followed by the inner fields. The
/// result is produced lazily, one block pair at a time, and as a multiset is
/// the same as a nested-loop join for any budget. Order is only sorted
/// within a block pair.
pub struct Join {
    predicate: JoinPredicate,
    outer: Box<dyn TupleStream>,
    inner: Box<dyn TupleStream>,
    schema: Arc<Schema>,
    outer_capacity: usize,
    inner_capacity: usize,
    state: Option<JoinState>,
}

#[derive(Default)]
struct JoinState {
    /// Current outer block, sorted on the left join field
    outer_block: Vec<Tuple>,
    /// The outer stream has no more tuples after the current block
    outer_done: bool,
    /// The inner stream is exhausted for the current outer block
    inner_done: bool,
    /// Joined tuples of the last merged block pair not yet returned
    output: VecDeque<Tuple>,
}

impl Join {
    /// Creates a join of `outer` and `inner` on `predicate`.
    ///
    /// Fails with `ColumnOutOfRange` if a join field does not exist, and
    /// with `InvalidConfiguration` if the operator cannot drive a merge, the
    /// two join fields are of different kinds, or the budget does not fit a
    /// single tuple of either side.
    pub fn new(
        predicate: JoinPredicate,
        outer: Box<dyn TupleStream>,
        inner: Box<dyn TupleStream>,
        memory_budget: usize,
    ) -> Result<Self> {
        if matches!(predicate.op, Op::NotEquals | Op::Like) {
            return Err(KilnError::InvalidConfiguration(format!(
                "join operator {} is not supported",
                predicate.op
            )));
        }

        let left = outer
            .schema()
            .column(predicate.left_field)
            .ok_or(KilnError::ColumnOutOfRange(predicate.left_field))?;
        let right = inner
            .schema()
            .column(predicate.right_field)
            .ok_or(KilnError::ColumnOutOfRange(predicate.right_field))?;
        if !left.data_type().is_comparable_with(right.data_type()) {
            return Err(KilnError::InvalidConfiguration(format!(
                "cannot join {} ({}) with {} ({})",
                left.name(),
                left.data_type(),
                right.name(),
                right.data_type()
            )));
        }

        let outer_capacity = block_capacity(memory_budget, outer.schema())?;
        let inner_capacity = block_capacity(memory_budget, inner.schema())?;
        let schema = Arc::new(Schema::merge(outer.schema(), inner.schema()));

        Ok(Self {
            predicate,
            outer,
            inner,
            schema,
            outer_capacity,
            inner_capacity,
            state: None,
        })
    }

    pub fn predicate(&self) -> &JoinPredicate {
        &self.predicate
    }

    /// Name of the outer join field.
    pub fn left_field_name(&self) -> &str {
        self.outer
            .schema()
            .column(self.predicate.left_field)
            .map_or("", |c| c.name())
    }

    /// Name of the inner join field.
    pub fn right_field_name(&self) -> &str {
        self.inner
            .schema()
            .column(self.predicate.right_field)
            .map_or("", |c| c.name())
    }

    /// Tuples per block as (outer, inner).
    pub fn block_capacities(&self) -> (usize, usize) {
        (self.outer_capacity, self.inner_capacity)
    }
}

impl TupleStream for Join {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.outer.open()?;
        self.inner.open()?;
        self.state = Some(JoinState::default());
        Ok(())
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        let state = self.state.as_mut().ok_or(KilnError::NoSuchElement)?;
        let (left_field, right_field) = (self.predicate.left_field, self.predicate.right_field);

        loop {
            if let Some(tuple) = state.output.pop_front() {
                return Ok(Some(tuple));
            }

            if state.outer_block.is_empty() || state.inner_done {
                if state.outer_done {
                    return Ok(None);
                }
                let mut block = fill_block(&mut *self.outer, self.outer_capacity)?;
                state.outer_done = block.len() < self.outer_capacity;
                if block.is_empty() {
                    state.outer_block.clear();
                    return Ok(None);
                }
                block.sort_by(|a, b| compare_field(a, b, left_field));
                state.outer_block = block;
                self.inner.rewind()?;
                state.inner_done = false;
            }

            let mut inner_block = fill_block(&mut *self.inner, self.inner_capacity)?;
            state.inner_done = inner_block.len() < self.inner_capacity;
            if inner_block.is_empty() {
                continue;
            }
            inner_block.sort_by(|a, b| compare_field(a, b, right_field));

            merge_blocks(
                &self.predicate,
                &self.schema,
                &state.outer_block,
                &inner_block,
                &mut state.output,
            );
            trace!(
                outer = state.outer_block.len(),
                inner = inner_block.len(),
                produced = state.output.len(),
                "merged block pair"
            );
        }
    }

    fn rewind(&mut self) -> Result<()> {
        if self.state.is_none() {
            return Err(KilnError::NoSuchElement);
        }
        self.outer.rewind()?;
        self.state = Some(JoinState::default());
        Ok(())
    }

    fn close(&mut self) {
        self.state = None;
        self.outer.close();
        self.inner.close();
    }
}

fn block_capacity(memory_budget: usize, schema: &Schema) -> Result<usize> {
    let capacity = memory_budget.checked_div(schema.tuple_size()).unwrap_or(0);
    if capacity == 0 {
        return Err(KilnError::InvalidConfiguration(format!(
            "join memory budget of {} bytes cannot hold a {}-byte tuple",
            memory_budget,
            schema.tuple_size()
        )));
    }
    Ok(capacity)
}

/// Reads up to `capacity` tuples from the stream.
fn fill_block(stream: &mut dyn TupleStream, capacity: usize) -> Result<Vec<Tuple>> {
    let mut block = Vec::new();
    while block.len() < capacity {
        match stream.next_tuple()? {
            Some(tuple) => block.push(tuple),
            None => break,
        }
    }
    Ok(block)
}

fn compare_field(a: &Tuple, b: &Tuple, field: usize) -> Ordering {
    compare_values(a, field, b, field)
}

fn compare_values(a: &Tuple, a_field: usize, b: &Tuple, b_field: usize) -> Ordering {
    match (a.value(a_field), b.value(b_field)) {
        (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Joins two blocks sorted on their join fields, appending matches to `out`.
fn merge_blocks(
    predicate: &JoinPredicate,
    schema: &Arc<Schema>,
    outer: &[Tuple],
    inner: &[Tuple],
    out: &mut VecDeque<Tuple>,
) {
    let (lf, rf) = (predicate.left_field, predicate.right_field);
    let joined = |o: &Tuple, i: &Tuple| Tuple::merge(Arc::clone(schema), o, i);

    match predicate.op {
        Op::Equals => {
            let (mut i, mut j) = (0, 0);
            while i < outer.len() && j < inner.len() {
                match compare_values(&outer[i], lf, &inner[j], rf) {
                    Ordering::Less => i += 1,
                    Ordering::Greater => j += 1,
                    Ordering::Equal => {
                        let i_end = run_end(outer, i, lf);
                        let j_end = run_end(inner, j, rf);
                        for o in &outer[i..i_end] {
                            for t in &inner[j..j_end] {
                                out.push_back(joined(o, t));
                            }
                        }
                        i = i_end;
                        j = j_end;
                    }
                }
            }
        }
        Op::GreaterThan | Op::GreaterThanOrEq => {
            for o in outer {
                for t in inner.iter().take_while(|t| predicate.filter(o, t)) {
                    out.push_back(joined(o, t));
                }
            }
        }
        Op::LessThan | Op::LessThanOrEq => {
            for o in outer {
                for t in inner.iter().rev().take_while(|t| predicate.filter(o, t)) {
                    out.push_back(joined(o, t));
                }
            }
        }
        // rejected by Join::new
        Op::NotEquals | Op::Like => {}
    }
}

/// Returns the end of the run of tuples sharing `block[start]`'s key.
fn run_end(block: &[Tuple], start: usize, field: usize) -> usize {
    let mut end = start + 1;
    while end < block.len() && compare_field(&block[start], &block[end], field) == Ordering::Equal {
        end += 1;
    }
    end
}
