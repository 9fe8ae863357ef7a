use crate::error::{MigrateError, RegistryError};
use crate::registry::Registry;
use octomig_core::{convert, BenchmarkCatalog, ObjectState, StateError, INITIAL_MIGRATION};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Drives one result file from whatever migration it carries up to the
/// resolved target. Holds the validated registry, the benchmark catalog
/// used to bootstrap never-migrated files, and the resolved target.
#[derive(Debug)]
pub struct Executor {
    registry: Registry,
    catalog: BenchmarkCatalog,
    target_index: u32,
    target_name: String,
}

impl Executor {
    pub fn new(
        registry: Registry,
        catalog: BenchmarkCatalog,
        target: Option<&str>,
    ) -> Result<Self, RegistryError> {
        let (target_index, target_name) = registry.resolve_target(target)?;
        Ok(Self {
            registry,
            catalog,
            target_index,
            target_name,
        })
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn pending_names(&self, file_index: u32) -> Result<Vec<&'static str>, RegistryError> {
        self.registry.pending_names(file_index, self.target_index)
    }

    /// Migrate a parsed result file to the target, returning the value to
    /// persist. The input is never mutated, so a failure partway through
    /// the chain leaves nothing half-migrated.
    pub fn migrate_file(&self, path: &Path, contents: &Value) -> Result<Value, MigrateError> {
        let raw = contents
            .as_object()
            .ok_or_else(|| MigrateError::from(StateError::NotAnObject))?;

        let file_index = match raw
            .get(octomig_core::MIGRATION_MARKER_KEY)
            .and_then(Value::as_str)
        {
            None => 0,
            Some(marker) => octomig_core::migration_index(marker)
                .ok_or_else(|| MigrateError::from(StateError::BadMarker(marker.to_string())))?,
        };

        let bootstrapped = file_index == 0;
        let mut state = if bootstrapped {
            let mut state = convert::bootstrap(raw, &self.catalog)?;
            state.marker = Some(INITIAL_MIGRATION.to_string());
            state
        } else {
            ObjectState::from_migrated(raw)?
        };

        // The bootstrap already brought the file to the initial migration,
        // so only migrations after it are pending.
        let current_index = state.migration_index()?;
        let pending = self.pending_names(current_index)?;
        if pending.is_empty() {
            debug!("{} is already at {}", path.display(), self.target_name);
            // A freshly bootstrapped file still gains the object form and
            // marker even with nothing else to apply.
            return if bootstrapped {
                Ok(state.to_object_value())
            } else {
                Ok(contents.clone())
            };
        }

        debug!(
            "migrating {} from index {} to {}",
            path.display(),
            current_index,
            self.target_name
        );
        for name in pending {
            let migration = self.registry.migration(name)?;
            migration.apply(&mut state)?;
        }
        state.marker = Some(self.target_name.clone());
        Ok(state.into_file_value()?)
    }
}
