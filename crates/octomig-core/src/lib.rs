//! Result-file data model for the octomig migration system: the
//! object-oriented in-memory state, the benchmark catalog, and the
//! converters between the column-oriented on-disk layout and the object
//! form that migrations mutate.

pub mod catalog;
pub mod convert;
pub mod state;

pub use catalog::BenchmarkCatalog;
pub use state::{
    migration_index, ObjectState, Record, StateError, INITIAL_MIGRATION, MIGRATION_MARKER_KEY,
    NO_MIGRATION_INDEX,
};
