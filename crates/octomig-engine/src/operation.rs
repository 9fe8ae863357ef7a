use crate::error::DataError;
use octomig_core::ObjectState;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use tracing::debug;

/// One atomic schema edit over the object-form result state.
///
/// Implementations mutate the state in place; the executor guarantees the
/// caller never observes a partially mutated state by cloning before the
/// first operation runs. Backward transforms stay unsupported until their
/// row-collapsing semantics are specified, so `unapply` fails by default.
pub trait Operation {
    fn apply(&self, state: &mut ObjectState) -> Result<(), DataError>;

    fn unapply(&self, _state: &mut ObjectState) -> Result<(), DataError> {
        Err(DataError::BackwardUnsupported(self.describe()))
    }

    /// Brief summary of what the operation does, for logs and `octomig list`.
    fn describe(&self) -> String;
}

impl fmt::Debug for dyn Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Derived-statistics columns that describe a combination which was never
/// actually measured, dropped from non-default replicas.
const UNMEASURED_COLUMNS: &[&str] = &[
    "stats_ci_99_a",
    "stats_ci_99_b",
    "stats_q_25",
    "stats_q_75",
    "stats_number",
    "stats_repeat",
    "samples",
    "profile",
];

const RESULT_FIELD: &str = "result";
const VERSION_FIELD: &str = "version";

/// Adds a parameter dimension to targeted benchmarks, multiplying each
/// record into one replica per candidate value. The replica carrying the
/// default value keeps the original measurement; every other replica has
/// its result nulled and its derived statistics dropped.
#[derive(Debug)]
pub struct AddBenchParam {
    name: String,
    values: Vec<Value>,
    default: Option<Value>,
    targets: Regex,
    targets_pattern: String,
    insert_after: Option<String>,
    insert_before: Option<String>,
}

impl AddBenchParam {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Result<Self, DataError> {
        for (index, value) in values.iter().enumerate() {
            if values[..index].contains(value) {
                return Err(DataError::DuplicateValues(render_values(&values)));
            }
        }
        Ok(Self {
            name: name.into(),
            values,
            default: None,
            targets: anchored(".*")?,
            targets_pattern: ".*".to_string(),
            insert_after: None,
            insert_before: None,
        })
    }

    pub fn default_value(mut self, default: Value) -> Result<Self, DataError> {
        if !self.values.contains(&default) {
            return Err(DataError::DefaultNotInValues {
                default: default.to_string(),
                values: render_values(&self.values),
            });
        }
        self.default = Some(default);
        Ok(self)
    }

    /// Restrict the operation to benchmarks whose identifier the pattern
    /// matches as a prefix.
    pub fn targets(mut self, pattern: &str) -> Result<Self, DataError> {
        self.targets = anchored(pattern)?;
        self.targets_pattern = pattern.to_string();
        Ok(self)
    }

    pub fn insert_after(mut self, param: impl Into<String>) -> Self {
        self.insert_after = Some(param.into());
        self
    }

    pub fn insert_before(mut self, param: impl Into<String>) -> Self {
        self.insert_before = Some(param.into());
        self
    }

    pub fn boxed(self) -> Box<dyn Operation> {
        Box::new(self)
    }

    fn is_benchmark_targeted(&self, benchmark: &str) -> bool {
        self.targets.is_match(benchmark)
    }

    /// An absent default behaves like a null default: a candidate value
    /// of `null` with no declared default is still grandfathered.
    fn effective_default(&self) -> &Value {
        self.default.as_ref().unwrap_or(&Value::Null)
    }

    /// Resolve where the new dimension lands in a benchmark's ordered
    /// parameter-name list, honoring `insert_after`/`insert_before`.
    fn insert_param_name(&self, names: &mut Vec<String>) -> Result<(), DataError> {
        if names.iter().any(|name| *name == self.name) {
            return Ok(());
        }
        let position_of = |anchor: &String, side: &'static str| {
            names
                .iter()
                .position(|name| name == anchor)
                .ok_or_else(|| DataError::AnchorNotFound {
                    name: self.name.clone(),
                    side,
                    anchor: anchor.clone(),
                })
        };
        match (&self.insert_after, &self.insert_before) {
            (None, None) => names.push(self.name.clone()),
            (Some(after), Some(before)) => {
                let position = position_of(after, "insert_after")?;
                if names.get(position + 1) != Some(before) {
                    return Err(DataError::AnchorsNotAdjacent {
                        name: self.name.clone(),
                        after: after.clone(),
                        before: before.clone(),
                    });
                }
                names.insert(position + 1, self.name.clone());
            }
            (Some(after), None) => {
                let position = position_of(after, "insert_after")?;
                names.insert(position + 1, self.name.clone());
            }
            (None, Some(before)) => {
                let position = position_of(before, "insert_before")?;
                names.insert(position, self.name.clone());
            }
        }
        Ok(())
    }
}

impl Operation for AddBenchParam {
    fn apply(&self, state: &mut ObjectState) -> Result<(), DataError> {
        debug!("applying operation {}", self.describe());
        let benchmarks = mem::take(&mut state.benchmarks);
        let mut migrated = BTreeMap::new();

        for (bench, records) in benchmarks {
            if !self.is_benchmark_targeted(&bench) {
                migrated.insert(bench, records);
                continue;
            }
            let names = state.param_names.entry(bench.clone()).or_default();
            self.insert_param_name(names)?;

            let mut replicas = Vec::with_capacity(records.len() * self.values.len());
            for record in &records {
                for value in &self.values {
                    let mut replica = record.clone();
                    if value == self.effective_default() {
                        // Grandfathered variant: this replica stands for
                        // the measurement recorded before the dimension
                        // existed, so the original fields survive.
                        replica
                            .params
                            .entry(self.name.clone())
                            .or_insert_with(|| value.clone());
                    } else {
                        replica.params.insert(self.name.clone(), value.clone());
                        replica.fields.insert(RESULT_FIELD.to_string(), Value::Null);
                        for column in UNMEASURED_COLUMNS {
                            replica.fields.remove(*column);
                        }
                    }
                    // Force downstream re-validation of every replica.
                    replica.fields.insert(VERSION_FIELD.to_string(), Value::Null);
                    replicas.push(replica);
                }
            }
            migrated.insert(bench, replicas);
        }

        state.benchmarks = migrated;
        Ok(())
    }

    fn describe(&self) -> String {
        let mut summary = format!(
            "AddBenchParam(name={}, values={}",
            self.name,
            render_values(&self.values)
        );
        if let Some(default) = &self.default {
            summary.push_str(&format!(", default={default}"));
        }
        if self.targets_pattern != ".*" {
            summary.push_str(&format!(", targets={}", self.targets_pattern));
        }
        if let Some(after) = &self.insert_after {
            summary.push_str(&format!(", insert_after={after}"));
        }
        if let Some(before) = &self.insert_before {
            summary.push_str(&format!(", insert_before={before}"));
        }
        summary.push(')');
        summary
    }
}

/// Python-style `re.match` semantics: the pattern must match at the start
/// of the benchmark identifier, not anywhere inside it.
fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\A(?:{pattern})"))
}

fn render_values(values: &[Value]) -> String {
    Value::Array(values.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use octomig_core::ObjectState;
    use serde_json::json;

    fn state_with(raw: serde_json::Value) -> ObjectState {
        ObjectState::from_migrated(raw.as_object().expect("object")).expect("state")
    }

    #[test]
    fn duplicate_values_are_rejected() {
        let err = AddBenchParam::new("p", vec![json!(1), json!(1)]).expect_err("should fail");
        assert!(matches!(err, DataError::DuplicateValues(_)));
    }

    #[test]
    fn default_must_be_one_of_the_values() {
        let err = AddBenchParam::new("p", vec![json!(1), json!(2)])
            .expect("operation")
            .default_value(json!(3))
            .expect_err("should fail");
        assert!(matches!(err, DataError::DefaultNotInValues { .. }));
    }

    #[test]
    fn fresh_name_without_anchors_is_appended_last() {
        let operation = AddBenchParam::new("b", vec![json!(null)]).expect("operation");
        let mut names = vec!["a".to_string(), "c".to_string()];
        operation.insert_param_name(&mut names).expect("insert");
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn already_present_name_is_a_no_op() {
        let operation = AddBenchParam::new("a", vec![json!(null)]).expect("operation");
        let mut names = vec!["a".to_string(), "c".to_string()];
        operation.insert_param_name(&mut names).expect("insert");
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn missing_insert_after_anchor_fails() {
        let operation = AddBenchParam::new("b", vec![json!(null)])
            .expect("operation")
            .insert_after("doesnotexist");
        let mut names = vec!["a".to_string(), "c".to_string(), "d".to_string()];
        let err = operation
            .insert_param_name(&mut names)
            .expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "cannot insert param `b`: `insert_after` (doesnotexist) param not found"
        );
    }

    #[test]
    fn missing_insert_before_anchor_fails() {
        let operation = AddBenchParam::new("b", vec![json!(null)])
            .expect("operation")
            .insert_before("doesnotexist");
        let mut names = vec!["a".to_string(), "c".to_string(), "d".to_string()];
        let err = operation
            .insert_param_name(&mut names)
            .expect_err("should fail");
        assert!(matches!(
            err,
            DataError::AnchorNotFound {
                side: "insert_before",
                ..
            }
        ));
    }

    #[test]
    fn non_adjacent_anchors_fail() {
        let operation = AddBenchParam::new("b", vec![json!(null)])
            .expect("operation")
            .insert_after("a")
            .insert_before("d");
        let mut names = vec!["a".to_string(), "c".to_string(), "d".to_string()];
        let err = operation
            .insert_param_name(&mut names)
            .expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "cannot insert param `b`: `insert_after` (a) and `insert_before` (d) are not adjacent"
        );
    }

    #[test]
    fn adjacent_anchors_insert_between_them() {
        let operation = AddBenchParam::new("b", vec![json!(null)])
            .expect("operation")
            .insert_after("a")
            .insert_before("c");
        let mut names = vec!["a".to_string(), "c".to_string(), "d".to_string()];
        operation.insert_param_name(&mut names).expect("insert");
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn expansion_multiplies_records_and_grandfathers_the_default() {
        let mut state = state_with(json!({
            "result_columns": ["result", "params", "version", "stats_q_25", "samples"],
            "octobus_results": {
                "bench": [
                    {"result": 0.5, "params": {"repo": "big"}, "version": "v",
                     "stats_q_25": 6, "samples": [1, 2, 3]}
                ]
            },
            "bench_param_names": {"bench": ["repo"]}
        }));
        let operation = AddBenchParam::new("max_worker_count", vec![json!("1"), json!("2")])
            .expect("operation")
            .default_value(json!("1"))
            .expect("default");
        operation.apply(&mut state).expect("apply");

        let records = &state.benchmarks["bench"];
        assert_eq!(records.len(), 2);
        assert_eq!(
            state.param_names["bench"],
            vec!["repo", "max_worker_count"]
        );

        let grandfathered = &records[0];
        assert_eq!(grandfathered.params["max_worker_count"], json!("1"));
        assert_eq!(grandfathered.fields["result"], json!(0.5));
        assert_eq!(grandfathered.fields["stats_q_25"], json!(6));
        assert_eq!(grandfathered.fields["version"], Value::Null);

        let unmeasured = &records[1];
        assert_eq!(unmeasured.params["max_worker_count"], json!("2"));
        assert_eq!(unmeasured.fields["result"], Value::Null);
        assert!(!unmeasured.fields.contains_key("stats_q_25"));
        assert!(!unmeasured.fields.contains_key("samples"));
        assert_eq!(unmeasured.fields["version"], Value::Null);
    }

    #[test]
    fn existing_param_value_survives_the_default_replica() {
        let mut state = state_with(json!({
            "result_columns": ["result", "params", "version"],
            "octobus_results": {
                "bench": [{"result": 0.5, "params": {"p": "2"}}]
            },
            "bench_param_names": {"bench": ["p"]}
        }));
        let operation = AddBenchParam::new("p", vec![json!("1")])
            .expect("operation")
            .default_value(json!("1"))
            .expect("default");
        operation.apply(&mut state).expect("apply");

        // The record already carried p=2; the default replica must not
        // overwrite it.
        let records = &state.benchmarks["bench"];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].params["p"], json!("2"));
        assert_eq!(records[0].fields["result"], json!(0.5));
    }

    #[test]
    fn null_value_without_default_is_grandfathered() {
        let mut state = state_with(json!({
            "result_columns": ["result", "params", "version"],
            "octobus_results": {
                "bench": [{"result": 0.5, "params": {}}]
            },
            "bench_param_names": {"bench": []}
        }));
        let operation = AddBenchParam::new("p", vec![json!(null)]).expect("operation");
        operation.apply(&mut state).expect("apply");

        let records = &state.benchmarks["bench"];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].params["p"], Value::Null);
        assert_eq!(records[0].fields["result"], json!(0.5));
    }

    #[test]
    fn prefix_targeting_leaves_other_benchmarks_untouched() {
        let mut state = state_with(json!({
            "result_columns": ["result", "params", "version"],
            "octobus_results": {
                "status.mard.track": [{"result": 0.001, "params": {}}],
                "status.mardu.time": [{"result": 0.002, "params": {}}]
            },
            "bench_param_names": {}
        }));
        let operation = AddBenchParam::new("benchparam", vec![json!(1)])
            .expect("operation")
            .default_value(json!(1))
            .expect("default")
            .targets(r"^status\.mard\..*")
            .expect("targets");
        operation.apply(&mut state).expect("apply");

        let targeted = &state.benchmarks["status.mard.track"][0];
        assert_eq!(targeted.params["benchparam"], json!(1));
        assert_eq!(targeted.fields["version"], Value::Null);

        let untouched = &state.benchmarks["status.mardu.time"][0];
        assert!(untouched.params.is_empty());
        assert!(!untouched.fields.contains_key("version"));
        assert!(!state.param_names.contains_key("status.mardu.time"));
    }

    #[test]
    fn targets_match_prefixes_not_substrings() {
        let operation = AddBenchParam::new("p", vec![json!(1)])
            .expect("operation")
            .targets("mard")
            .expect("targets");
        assert!(operation.is_benchmark_targeted("mard.track"));
        assert!(!operation.is_benchmark_targeted("status.mard.track"));
    }

    #[test]
    fn unapply_is_unsupported() {
        let mut state = state_with(json!({
            "result_columns": ["result", "params"],
            "octobus_results": {},
            "bench_param_names": {}
        }));
        let operation = AddBenchParam::new("p", vec![json!(1)]).expect("operation");
        let err = operation.unapply(&mut state).expect_err("should fail");
        assert!(matches!(err, DataError::BackwardUnsupported(_)));
    }

    #[test]
    fn boxed_operations_debug_format_as_their_description() {
        let operation = AddBenchParam::new("p", vec![json!(1)])
            .expect("operation")
            .boxed();
        assert_eq!(format!("{operation:?}"), operation.describe());
    }

    #[test]
    fn describe_names_the_configuration() {
        let operation = AddBenchParam::new("p", vec![json!("1")])
            .expect("operation")
            .default_value(json!("1"))
            .expect("default")
            .insert_after("repo");
        let description = operation.describe();
        assert!(description.contains("name=p"), "{description}");
        assert!(description.contains("insert_after=repo"), "{description}");
    }
}
