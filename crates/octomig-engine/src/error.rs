use octomig_core::StateError;
use thiserror::Error;

/// Problems with the migration set itself. These abort an entire batch:
/// continuing would migrate files against a broken history.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no migration units registered, aborting")]
    NoMigrationsFound,
    #[error("conflicting migration index {index}: `{first}` and `{second}`")]
    ConflictingIndex {
        index: u32,
        first: String,
        second: String,
    },
    #[error("migration indexes should be contiguous: `{previous}` and `{found}`")]
    NonContiguousIndex { previous: u32, found: u32 },
    #[error("invalid migration unit name `{0}`, expected `<index>_<identifier>`")]
    InvalidUnitName(String),
    #[error("unknown target migration `{0}`")]
    UnknownTarget(String),
    #[error("`{index}` is an unknown migration, synchronize your migration set")]
    MigrationDoesNotExist { index: u32 },
    #[error("migration `{0}` is not registered")]
    UnknownMigration(String),
}

/// Problems with one file's data or one operation's configuration. The
/// batch runner skips the file with a warning and keeps going.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("values must be unique: `{0}`")]
    DuplicateValues(String),
    #[error("wrong default value `{default}`, must be in `{values}`")]
    DefaultNotInValues { default: String, values: String },
    #[error("invalid `targets` pattern: {0}")]
    InvalidTargets(#[from] regex::Error),
    #[error("cannot insert param `{name}`: `{side}` ({anchor}) param not found")]
    AnchorNotFound {
        name: String,
        side: &'static str,
        anchor: String,
    },
    #[error(
        "cannot insert param `{name}`: `insert_after` ({after}) and \
         `insert_before` ({before}) are not adjacent"
    )]
    AnchorsNotAdjacent {
        name: String,
        after: String,
        before: String,
    },
    #[error("backward migration is not supported for {0}")]
    BackwardUnsupported(String),
    #[error(transparent)]
    State(#[from] StateError),
}

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Fatal errors indicate the migration set or the machine is broken
    /// and abort the whole batch; data errors only skip one file.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MigrateError::Data(_))
    }
}

impl From<StateError> for MigrateError {
    fn from(err: StateError) -> Self {
        MigrateError::Data(DataError::State(err))
    }
}
