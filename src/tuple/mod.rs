mod data_type;
mod schema;
mod tuple;
mod value;

pub use data_type::DataType;
pub use schema::{Column, Schema, SchemaBuilder};
pub use tuple::{Tuple, TupleBuilder};
pub use value::Value;
