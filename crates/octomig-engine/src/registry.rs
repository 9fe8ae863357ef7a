use crate::error::{DataError, MigrateError, RegistryError};
use crate::migration::Migration;
use crate::operation::Operation;
use octomig_core::migration_index;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Builds the operation batch for one migration. A plain function pointer
/// so the full history can live in a `const`-friendly slice.
pub type BuildOperations = fn() -> Result<Vec<Box<dyn Operation>>, DataError>;

/// One entry of the compile-time migration history.
#[derive(Debug)]
pub struct MigrationUnit {
    pub name: &'static str,
    pub build: BuildOperations,
}

#[derive(Debug)]
struct Registered {
    index: u32,
    unit: MigrationUnit,
}

/// The validated migration history: names parse to indexes, indexes are
/// unique and contiguous from 1. Operation batches are built lazily on
/// first use and memoized, so listing migrations never pays for building
/// every batch.
#[derive(Debug)]
pub struct Registry {
    units: Vec<Registered>,
    instances: RefCell<HashMap<String, Rc<Migration>>>,
}

impl Registry {
    pub fn new(units: Vec<MigrationUnit>) -> Result<Self, RegistryError> {
        let mut registered = Vec::with_capacity(units.len());
        for unit in units {
            let index = migration_index(unit.name)
                .filter(|index| *index > 0)
                .ok_or_else(|| RegistryError::InvalidUnitName(unit.name.to_string()))?;
            registered.push(Registered { index, unit });
        }
        registered.sort_by_key(|entry| entry.index);

        let mut last_index = 0;
        for entry in &registered {
            if entry.index == last_index {
                let first = registered
                    .iter()
                    .find(|other| other.index == entry.index)
                    .map(|other| other.unit.name.to_string())
                    .unwrap_or_default();
                return Err(RegistryError::ConflictingIndex {
                    index: entry.index,
                    first,
                    second: entry.unit.name.to_string(),
                });
            }
            if entry.index != last_index + 1 {
                return Err(RegistryError::NonContiguousIndex {
                    previous: last_index,
                    found: entry.index,
                });
            }
            last_index = entry.index;
        }
        if registered.is_empty() {
            return Err(RegistryError::NoMigrationsFound);
        }

        Ok(Self {
            units: registered,
            instances: RefCell::new(HashMap::new()),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.units.iter().map(|entry| entry.unit.name)
    }

    pub fn contains_index(&self, index: u32) -> bool {
        self.units.iter().any(|entry| entry.index == index)
    }

    pub fn last_index(&self) -> u32 {
        // new() rejects empty histories, so the last entry exists.
        self.units.last().map(|entry| entry.index).unwrap_or(0)
    }

    /// Resolve the migration every file should end up at. `None` means the
    /// newest registered migration.
    pub fn resolve_target(&self, target: Option<&str>) -> Result<(u32, String), RegistryError> {
        match target {
            Some(name) => {
                let entry = self
                    .units
                    .iter()
                    .find(|entry| entry.unit.name == name)
                    .ok_or_else(|| RegistryError::UnknownTarget(name.to_string()))?;
                Ok((entry.index, entry.unit.name.to_string()))
            }
            None => {
                let entry = self.units.last().ok_or(RegistryError::NoMigrationsFound)?;
                Ok((entry.index, entry.unit.name.to_string()))
            }
        }
    }

    /// Names of the migrations a file at `file_index` still needs to reach
    /// `target_index`, in application order.
    pub fn pending_names(
        &self,
        file_index: u32,
        target_index: u32,
    ) -> Result<Vec<&'static str>, RegistryError> {
        if file_index != 0 && !self.contains_index(file_index) {
            return Err(RegistryError::MigrationDoesNotExist { index: file_index });
        }
        Ok(self
            .units
            .iter()
            .filter(|entry| file_index < entry.index && entry.index <= target_index)
            .map(|entry| entry.unit.name)
            .collect())
    }

    /// Materialize a migration, building its operations on first access.
    pub fn migration(&self, name: &str) -> Result<Rc<Migration>, MigrateError> {
        if let Some(instance) = self.instances.borrow().get(name) {
            return Ok(Rc::clone(instance));
        }
        let entry = self
            .units
            .iter()
            .find(|entry| entry.unit.name == name)
            .ok_or_else(|| RegistryError::UnknownMigration(name.to_string()))?;
        let operations = (entry.unit.build)()?;
        let instance = Rc::new(Migration::new(entry.unit.name, operations));
        self.instances
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&instance));
        Ok(instance)
    }
}
