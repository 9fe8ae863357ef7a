//! Bidirectional conversion between the compact column-oriented on-disk
//! layout and the object-oriented in-memory layout.
//!
//! On disk, each benchmark maps to parallel arrays aligned with the
//! declared `result_columns` order; the `params` column is itself one
//! ordered list of distinct values per parameter dimension. In memory,
//! every parameter combination is one discrete [`Record`]. The column
//! arrays are assumed to follow the row-major order of the cartesian
//! product over the parameter dimensions; the inverse direction is
//! lossless only when the record set is exactly that full product, which
//! the converter relies on but does not verify.

use crate::catalog::BenchmarkCatalog;
use crate::state::{
    ObjectState, Record, StateError, MIGRATION_MARKER_KEY, OBJECT_RESULTS_KEY, PARAMS_COLUMN,
    PARAM_NAMES_KEY, RESULTS_KEY,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Columns recorded once per benchmark rather than once per combination.
const SCALAR_COLUMNS: &[&str] = &["version", "started_at", "duration"];

/// One-time column-to-object conversion of a file that has never been
/// migrated. Parameter-name order comes from the benchmark catalog;
/// benchmarks the catalog does not know are skipped with a warning.
pub fn bootstrap(
    raw: &Map<String, Value>,
    catalog: &BenchmarkCatalog,
) -> Result<ObjectState, StateError> {
    let marker = raw
        .get(MIGRATION_MARKER_KEY)
        .and_then(Value::as_str)
        .map(String::from);
    let mut extra = raw.clone();
    extra.remove(MIGRATION_MARKER_KEY);
    extra.remove(OBJECT_RESULTS_KEY);
    extra.remove(PARAM_NAMES_KEY);

    let Some(results) = raw.get(RESULTS_KEY) else {
        return Ok(ObjectState {
            marker,
            columns: Vec::new(),
            benchmarks: BTreeMap::new(),
            param_names: BTreeMap::new(),
            extra,
        });
    };
    let results = results.as_object().ok_or(StateError::MalformedResults)?;
    let columns = crate::state::parse_result_columns(raw)?;

    let mut benchmarks = BTreeMap::new();
    let mut param_names = BTreeMap::new();
    for (bench, line) in results {
        let Some(names) = catalog.param_names(bench) else {
            warn!("benchmark `{bench}` does not exist in the catalog, skipping");
            continue;
        };
        let malformed = |key: &str| StateError::MalformedEntry {
            key: key.to_string(),
            benchmark: bench.clone(),
        };
        let line = line.as_array().ok_or_else(|| malformed(RESULTS_KEY))?;
        param_names.insert(bench.clone(), names.to_vec());

        // Zip declared column order against the parallel arrays; a line
        // shorter than the declared order just means trailing optional
        // columns were never written.
        let fields: BTreeMap<&str, &Value> = columns
            .iter()
            .map(String::as_str)
            .zip(line.iter())
            .collect();

        let dims_raw = fields
            .get(PARAMS_COLUMN)
            .and_then(|params| params.as_array())
            .ok_or_else(|| malformed(PARAMS_COLUMN))?;
        let dims: Vec<&Vec<Value>> = names
            .iter()
            .zip(dims_raw.iter())
            .map(|(_, dim)| dim.as_array().ok_or_else(|| malformed(PARAMS_COLUMN)))
            .collect::<Result<_, _>>()?;

        let combos = cartesian(&dims);
        let mut records = Vec::with_capacity(combos.len());
        for (index, combo) in combos.into_iter().enumerate() {
            let mut record = Record {
                params: names.iter().cloned().zip(combo).collect(),
                fields: BTreeMap::new(),
            };
            for column in &columns {
                if column == PARAMS_COLUMN {
                    continue;
                }
                // A column absent from the source is omitted from every
                // record; a vector yields its element at this combination
                // index (missing index means null); anything else is a
                // scalar applied identically to every combination.
                let Some(&value) = fields.get(column.as_str()) else {
                    continue;
                };
                let value = match value {
                    Value::Array(items) => items.get(index).cloned().unwrap_or(Value::Null),
                    scalar => scalar.clone(),
                };
                record.fields.insert(column.clone(), value);
            }
            records.push(record);
        }
        benchmarks.insert(bench.clone(), records);
    }

    Ok(ObjectState {
        marker,
        columns,
        benchmarks,
        param_names,
        extra,
    })
}

/// Object-to-column conversion for persistence: regenerates the `results`
/// map from the record lists.
pub fn collapse(state: &ObjectState) -> Result<Map<String, Value>, StateError> {
    if state.benchmarks.is_empty() {
        return Err(StateError::MissingObjectResults);
    }

    let mut results = Map::new();
    for (bench, records) in &state.benchmarks {
        let names = state
            .param_names
            .get(bench)
            .ok_or_else(|| StateError::MissingParamNames {
                benchmark: bench.clone(),
            })?;

        let mut dims: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let mut scalars: BTreeMap<&str, Value> = BTreeMap::new();
        let mut vectors: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for record in records {
            for column in &state.columns {
                if column == PARAMS_COLUMN {
                    for (dim, name) in dims.iter_mut().zip(names) {
                        let value = record.params.get(name).ok_or_else(|| {
                            StateError::MissingParamValue {
                                benchmark: bench.clone(),
                                param: name.clone(),
                            }
                        })?;
                        // Order-preserving dedup: first-seen order becomes
                        // the dimension's candidate-value column.
                        if !dim.contains(value) {
                            dim.push(value.clone());
                        }
                    }
                    continue;
                }
                if SCALAR_COLUMNS.contains(&column.as_str()) {
                    scalars
                        .entry(column)
                        .or_insert_with(|| record.fields.get(column).cloned().unwrap_or(Value::Null));
                    continue;
                }
                match record.fields.get(column) {
                    Some(value) => vectors.entry(column).or_default().push(value.clone()),
                    // Declared fields are ordered with optional ones
                    // trailing, so the first missing field ends this
                    // record's contribution.
                    None => break,
                }
            }
        }

        let mut line = Vec::new();
        for column in &state.columns {
            if column == PARAMS_COLUMN {
                let dims_value = if records.is_empty() {
                    Vec::new()
                } else {
                    dims.drain(..).map(Value::Array).collect()
                };
                line.push(Value::Array(dims_value));
            } else if let Some(value) = scalars.remove(column.as_str()) {
                line.push(value);
            } else if let Some(values) = vectors.remove(column.as_str()) {
                line.push(Value::Array(values));
            }
            // A column no record carried is dropped entirely.
        }
        results.insert(bench.clone(), Value::Array(line));
    }
    Ok(results)
}

/// Row-major cartesian product across the parameter dimensions. Zero
/// dimensions yield one empty combination (a single unparameterized
/// record); an empty dimension yields no combinations.
fn cartesian(dims: &[&Vec<Value>]) -> Vec<Vec<Value>> {
    let mut combos: Vec<Vec<Value>> = vec![Vec::new()];
    for dim in dims {
        let mut next = Vec::with_capacity(combos.len() * dim.len());
        for combo in &combos {
            for value in dim.iter() {
                let mut extended = combo.clone();
                extended.push(value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}
