pub mod item;

pub use item::{Direction, ParseEnumError, Priority, QuerySort, Record, SortKey, Todo};
