//! Core abstractions shared by the engine and the drivers.
//!
//! - [`value`]: relational cell values and their BSON normalization
//! - [`row`]: source rows with typed accessors
//! - [`entity`]: the fixed set of migrated entity types
//! - [`traits`]: source reader and document sink seams

pub mod entity;
pub mod row;
pub mod traits;
pub mod value;

pub use entity::EntityType;
pub use row::SourceRow;
pub use traits::{DocumentSink, SourceReader};
pub use value::Value;

pub use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
