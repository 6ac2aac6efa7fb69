//! Database plumbing: pooled connections, cached reads, transactional writes,
//! catalog introspection and statement assembly for the monitored table.

pub mod cache;
pub mod connection;
pub mod data_access;
pub mod error;
pub mod params;
pub mod query_builder;
pub mod schema;
pub mod table;

pub use data_access::{DataAccess, Fetched, WriteOutcome};
pub use error::DataError;
pub use params::{QueryParams, SqlValue};
pub use query_builder::RecordPayload;
pub use schema::ColumnDescriptor;
pub use table::Table;
