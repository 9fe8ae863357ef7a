//! The migration history. Append-only: every entry keeps its index
//! forever, and a new migration takes the next free index.

use octomig_engine::{AddBenchParam, MigrationUnit};
use serde_json::json;

pub fn units() -> Vec<MigrationUnit> {
    vec![
        // Marks a file as converted to the object form. The conversion
        // itself happens before any migration is applied, so there is
        // nothing to do here.
        MigrationUnit {
            name: "0001_initial",
            build: || Ok(Vec::new()),
        },
        MigrationUnit {
            name: "0002_add_worker_count",
            build: || {
                Ok(vec![AddBenchParam::new(
                    "max_worker_count",
                    vec![json!("1"), json!("2")],
                )?
                .default_value(json!("1"))?
                .boxed()])
            },
        },
    ]
}
