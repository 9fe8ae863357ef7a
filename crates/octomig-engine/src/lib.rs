//! Migration engine for octobus benchmark result files: a validated
//! registry of named migrations, schema-edit operations over the object
//! form, and an executor plus batch runner that bring result files up to
//! a target migration.

pub mod batch;
pub mod error;
pub mod executor;
pub mod migration;
pub mod operation;
pub mod registry;

pub use batch::{migrate_results_dir, BatchReport};
pub use error::{DataError, MigrateError, RegistryError};
pub use executor::Executor;
pub use migration::Migration;
pub use operation::{AddBenchParam, Operation};
pub use registry::{BuildOperations, MigrationUnit, Registry};
