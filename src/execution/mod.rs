//! Pull-based query execution: tuple streams, predicates, the join and
//! grouped aggregation.

mod aggregate;
mod join;
mod predicate;
mod stream;

pub use aggregate::{Aggregate, AggregateOp};
pub use join::Join;
pub use predicate::{JoinPredicate, Op};
pub use stream::{collect_stream, TupleStream, VecStream};
