use crate::error::DataError;
use crate::operation::Operation;
use octomig_core::{migration_index, ObjectState, NO_MIGRATION_INDEX};
use tracing::debug;

/// A named, ordered batch of operations. The name carries the position in
/// the migration history as its `<index>_<identifier>` prefix.
#[derive(Debug)]
pub struct Migration {
    name: String,
    operations: Vec<Box<dyn Operation>>,
}

impl Migration {
    pub fn new(name: impl Into<String>, operations: Vec<Box<dyn Operation>>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        migration_index(&self.name).unwrap_or(NO_MIGRATION_INDEX)
    }

    pub fn operations(&self) -> &[Box<dyn Operation>] {
        &self.operations
    }

    pub fn apply(&self, state: &mut ObjectState) -> Result<(), DataError> {
        debug!("applying migration {}", self.name);
        for operation in &self.operations {
            operation.apply(state)?;
        }
        Ok(())
    }

    pub fn unapply(&self, state: &mut ObjectState) -> Result<(), DataError> {
        debug!("unapplying migration {}", self.name);
        for operation in self.operations.iter().rev() {
            operation.unapply(state)?;
        }
        Ok(())
    }
}
