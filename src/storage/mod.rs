pub mod schema;
pub mod tuple;

pub use schema::{small_int_schema, FieldItem, Schema, Type};
pub use tuple::{Cell, RecordID, Tuple};
