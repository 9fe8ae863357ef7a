use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Top-level field recording the last migration applied to a result file.
pub const MIGRATION_MARKER_KEY: &str = "octobus_migration_version";

/// Name of the migration that marks a file as readied for migrations.
pub const INITIAL_MIGRATION: &str = "0001_initial";

/// Sentinel index for a file that has never been migrated.
pub const NO_MIGRATION_INDEX: u32 = 0;

pub const RESULTS_KEY: &str = "results";
pub const RESULT_COLUMNS_KEY: &str = "result_columns";
pub const OBJECT_RESULTS_KEY: &str = "octobus_results";
pub const PARAM_NAMES_KEY: &str = "bench_param_names";
pub const PARAMS_COLUMN: &str = "params";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("result file is not a JSON object")]
    NotAnObject,
    #[error("`result_columns` is missing or not an array of strings")]
    MissingResultColumns,
    #[error("`results` is not a JSON object")]
    MalformedResults,
    #[error("results data should contain non-empty `octobus_results`")]
    MissingObjectResults,
    #[error("malformed `{key}` entry for benchmark `{benchmark}`")]
    MalformedEntry { key: String, benchmark: String },
    #[error("no `bench_param_names` entry for benchmark `{benchmark}`")]
    MissingParamNames { benchmark: String },
    #[error("record for benchmark `{benchmark}` is missing param `{param}`")]
    MissingParamValue { benchmark: String, param: String },
    #[error("malformed migration marker `{0}`")]
    BadMarker(String),
}

/// One parameter combination's measurement.
///
/// `params` maps dimension name to value; `fields` holds every other
/// declared column that was present for this combination. A field absent
/// from the map is distinct from a field set to `null`: the former means
/// the column was never recorded, the latter means "not measured".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub params: BTreeMap<String, Value>,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn from_value(benchmark: &str, value: &Value) -> Result<Self, StateError> {
        let malformed = || StateError::MalformedEntry {
            key: OBJECT_RESULTS_KEY.to_string(),
            benchmark: benchmark.to_string(),
        };
        let object = value.as_object().ok_or_else(malformed)?;
        let mut record = Record::default();
        for (key, value) in object {
            if key == PARAMS_COLUMN {
                let params = value.as_object().ok_or_else(malformed)?;
                record.params = params
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
            } else {
                record.fields.insert(key.clone(), value.clone());
            }
        }
        Ok(record)
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        let params: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        object.insert(PARAMS_COLUMN.to_string(), Value::Object(params));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Object-oriented form of one result file: one discrete record per
/// parameter combination, plus per-benchmark parameter-name order and
/// every other top-level file field carried through untouched.
#[derive(Debug, Clone)]
pub struct ObjectState {
    pub marker: Option<String>,
    pub columns: Vec<String>,
    pub benchmarks: BTreeMap<String, Vec<Record>>,
    pub param_names: BTreeMap<String, Vec<String>>,
    pub(crate) extra: Map<String, Value>,
}

impl ObjectState {
    /// Parse a file that has already been through at least its initial
    /// migration: `octobus_results` and `bench_param_names` are read
    /// directly, no catalog needed.
    pub fn from_migrated(raw: &Map<String, Value>) -> Result<Self, StateError> {
        let marker = raw
            .get(MIGRATION_MARKER_KEY)
            .and_then(Value::as_str)
            .map(String::from);
        let columns = parse_result_columns(raw)?;

        let mut benchmarks = BTreeMap::new();
        if let Some(value) = raw.get(OBJECT_RESULTS_KEY) {
            let object = value.as_object().ok_or(StateError::MalformedResults)?;
            for (bench, records) in object {
                let entries = records.as_array().ok_or_else(|| StateError::MalformedEntry {
                    key: OBJECT_RESULTS_KEY.to_string(),
                    benchmark: bench.clone(),
                })?;
                let records = entries
                    .iter()
                    .map(|entry| Record::from_value(bench, entry))
                    .collect::<Result<Vec<_>, _>>()?;
                benchmarks.insert(bench.clone(), records);
            }
        }

        let mut param_names = BTreeMap::new();
        if let Some(value) = raw.get(PARAM_NAMES_KEY) {
            let object = value.as_object().ok_or(StateError::MalformedResults)?;
            for (bench, names) in object {
                let malformed = || StateError::MalformedEntry {
                    key: PARAM_NAMES_KEY.to_string(),
                    benchmark: bench.clone(),
                };
                let names = names
                    .as_array()
                    .ok_or_else(malformed)?
                    .iter()
                    .map(|name| name.as_str().map(String::from).ok_or_else(malformed))
                    .collect::<Result<Vec<_>, _>>()?;
                param_names.insert(bench.clone(), names);
            }
        }

        let mut extra = raw.clone();
        extra.remove(MIGRATION_MARKER_KEY);
        extra.remove(OBJECT_RESULTS_KEY);
        extra.remove(PARAM_NAMES_KEY);

        Ok(ObjectState {
            marker,
            columns,
            benchmarks,
            param_names,
            extra,
        })
    }

    /// Index parsed from the migration marker; the sentinel 0 when the
    /// file has never been migrated.
    pub fn migration_index(&self) -> Result<u32, StateError> {
        match &self.marker {
            None => Ok(NO_MIGRATION_INDEX),
            Some(marker) => {
                migration_index(marker).ok_or_else(|| StateError::BadMarker(marker.clone()))
            }
        }
    }

    /// Serialize without regenerating the column `results`: passthrough
    /// fields, marker, and the object form.
    pub fn to_object_value(&self) -> Value {
        let mut object = self.extra.clone();
        if let Some(marker) = &self.marker {
            object.insert(MIGRATION_MARKER_KEY.to_string(), Value::String(marker.clone()));
        }
        let results: Map<String, Value> = self
            .benchmarks
            .iter()
            .map(|(bench, records)| {
                let entries: Vec<Value> = records.iter().map(Record::to_value).collect();
                (bench.clone(), Value::Array(entries))
            })
            .collect();
        object.insert(OBJECT_RESULTS_KEY.to_string(), Value::Object(results));
        let param_names: Map<String, Value> = self
            .param_names
            .iter()
            .map(|(bench, names)| {
                let names: Vec<Value> = names
                    .iter()
                    .map(|name| Value::String(name.clone()))
                    .collect();
                (bench.clone(), Value::Array(names))
            })
            .collect();
        object.insert(PARAM_NAMES_KEY.to_string(), Value::Object(param_names));
        Value::Object(object)
    }

    /// Serialize for persistence: the object form plus the regenerated
    /// column-oriented `results`.
    pub fn into_file_value(self) -> Result<Value, StateError> {
        let results = crate::convert::collapse(&self)?;
        let mut object = match self.to_object_value() {
            Value::Object(object) => object,
            _ => unreachable!("to_object_value always builds an object"),
        };
        object.insert(RESULTS_KEY.to_string(), Value::Object(results));
        Ok(Value::Object(object))
    }
}

/// Parse the leading decimal index of a `<index>_<identifier>` migration name.
pub fn migration_index(name: &str) -> Option<u32> {
    name.split('_').next().and_then(|index| index.parse().ok())
}

pub fn parse_result_columns(raw: &Map<String, Value>) -> Result<Vec<String>, StateError> {
    raw.get(RESULT_COLUMNS_KEY)
        .and_then(Value::as_array)
        .and_then(|columns| {
            columns
                .iter()
                .map(|column| column.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or(StateError::MissingResultColumns)
}
