//! Setting schemas, per-callable mappings and call-time resolution

mod schema;
pub use schema::*;

mod mapping;
pub use mapping::*;

mod source;
pub use source::*;
