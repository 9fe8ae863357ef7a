use crate::state::StateError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    param_names: Vec<String>,
}

/// Read-only view of `benchmarks.json`: benchmark name to its ordered
/// parameter-name list. Only needed while bootstrapping files that have
/// never been migrated.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkCatalog {
    entries: BTreeMap<String, Vec<String>>,
}

impl BenchmarkCatalog {
    /// Entries that do not look like a benchmark (the top-level schema
    /// version marker, entries without `param_names`) are ignored.
    pub fn from_value(value: &Value) -> Result<Self, StateError> {
        let object = value.as_object().ok_or(StateError::NotAnObject)?;
        let mut entries = BTreeMap::new();
        for (name, entry) in object {
            let Ok(parsed) = serde_json::from_value::<CatalogEntry>(entry.clone()) else {
                continue;
            };
            entries.insert(name.clone(), parsed.param_names);
        }
        Ok(Self { entries })
    }

    pub fn insert(&mut self, benchmark: impl Into<String>, param_names: Vec<String>) {
        self.entries.insert(benchmark.into(), param_names);
    }

    pub fn param_names(&self, benchmark: &str) -> Option<&[String]> {
        self.entries.get(benchmark).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_benchmark_entries_and_skips_the_rest() {
        let value = json!({
            "version": 2,
            "track_commits.time_commit": {
                "code": "def time_commit(self): ...",
                "name": "track_commits.time_commit",
                "param_names": ["repo", "revs"],
                "params": [["'small'"], ["10", "100"]],
                "unit": "seconds"
            },
            "broken_entry": {"name": "no param names here"}
        });
        let catalog = BenchmarkCatalog::from_value(&value).expect("catalog");
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.param_names("track_commits.time_commit"),
            Some(&["repo".to_string(), "revs".to_string()][..])
        );
        assert_eq!(catalog.param_names("broken_entry"), None);
    }

    #[test]
    fn rejects_non_object_input() {
        let err = BenchmarkCatalog::from_value(&json!([1, 2])).expect_err("should fail");
        assert!(matches!(err, StateError::NotAnObject));
    }
}
