use std::sync::Arc;

use crate::common::{KilnError, Result};
use crate::tuple::{Schema, Tuple};

/// A restartable, pull-based source of tuples.
///
/// A stream must be opened before tuples are pulled from it. `next_tuple`
/// returns `Ok(None)` once the stream is exhausted and keeps returning it
/// until the stream is rewound; pulling from a stream that is not open
/// fails with `NoSuchElement`.
pub trait TupleStream {
    /// Schema of every tuple this stream yields.
    fn schema(&self) -> &Arc<Schema>;

    fn open(&mut self) -> Result<()>;

    fn next_tuple(&mut self) -> Result<Option<Tuple>>;

    /// Restarts the stream from its first tuple. The stream stays open.
    fn rewind(&mut self) -> Result<()>;

    fn close(&mut self);
}

impl<S: TupleStream + ?Sized> TupleStream for Box<S> {
    fn schema(&self) -> &Arc<Schema> {
        (**self).schema()
    }

    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        (**self).next_tuple()
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Stream over an owned, in-memory list of tuples.
pub struct VecStream {
    schema: Arc<Schema>,
    tuples: Vec<Tuple>,
    /// Position of the next tuple; `None` while closed
    cursor: Option<usize>,
}

impl VecStream {
    /// Creates a stream over `tuples`, all of which must use `schema`.
    pub fn new(schema: Arc<Schema>, tuples: Vec<Tuple>) -> Result<Self> {
        if let Some(bad) = tuples.iter().find(|t| **t.schema() != *schema) {
            return Err(KilnError::SchemaMismatch(format!(
                "tuple {} does not match the stream schema",
                bad
            )));
        }
        Ok(Self {
            schema,
            tuples,
            cursor: None,
        })
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl TupleStream for VecStream {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.cursor = Some(0);
        Ok(())
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        let cursor = self.cursor.as_mut().ok_or(KilnError::NoSuchElement)?;
        let tuple = self.tuples.get(*cursor).cloned();
        if tuple.is_some() {
            *cursor += 1;
        }
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<()> {
        if self.cursor.is_none() {
            return Err(KilnError::NoSuchElement);
        }
        self.cursor = Some(0);
        Ok(())
    }

    fn close(&mut self) {
        self.cursor = None;
    }
}

/// Drains an open stream into a vector.
pub fn collect_stream<S: TupleStream + ?Sized>(stream: &mut S) -> Result<Vec<Tuple>> {
    let mut tuples = Vec::new();
    while let Some(tuple) = stream.next_tuple()? {
        tuples.push(tuple);
    }
    Ok(tuples)
}
