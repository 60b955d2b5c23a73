pub mod common;
pub mod query;
pub mod schema;

pub use common::*;
pub use query::*;
pub use schema::*;
