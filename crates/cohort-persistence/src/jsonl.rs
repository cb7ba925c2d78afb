//! File-backed result store.
//!
//! Layout under the data directory:
//!
//! ```text
//! runs.jsonl         RunMetadata (written at start and again at stop)
//! results.jsonl      ResultRecord per member
//! operations.jsonl   OperationRecord per operation-log entry
//! comparisons.jsonl  CohortComparison per run
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use cohort_core::{CohortComparison, MemberResult, OperationEntry, RunMetadata};
use parking_lot::Mutex;
use tracing::info;

use crate::error::PersistenceResult;
use crate::store::{OperationRecord, ResultRecord, ResultStore};
use crate::writer::{read_json_lines, JsonLinesWriter};

pub const RUNS_FILE: &str = "runs.jsonl";
pub const RESULTS_FILE: &str = "results.jsonl";
pub const OPERATIONS_FILE: &str = "operations.jsonl";
pub const COMPARISONS_FILE: &str = "comparisons.jsonl";

/// JSON Lines result store rooted at one directory.
pub struct JsonLinesStore {
    dir: PathBuf,
    runs: Mutex<JsonLinesWriter>,
    results: Mutex<JsonLinesWriter>,
    operations: Mutex<JsonLinesWriter>,
    comparisons: Mutex<JsonLinesWriter>,
}

impl JsonLinesStore {
    /// Create the store, creating `dir` if needed.
    pub fn open(dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Result store ready");

        Ok(Self {
            runs: Mutex::new(JsonLinesWriter::new(dir.join(RUNS_FILE))),
            results: Mutex::new(JsonLinesWriter::new(dir.join(RESULTS_FILE))),
            operations: Mutex::new(JsonLinesWriter::new(dir.join(OPERATIONS_FILE))),
            comparisons: Mutex::new(JsonLinesWriter::new(dir.join(COMPARISONS_FILE))),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Latest metadata per run, in first-seen order.
    pub fn load_runs(&self) -> PersistenceResult<Vec<RunMetadata>> {
        let mut latest: Vec<RunMetadata> = Vec::new();
        for run in read_json_lines::<RunMetadata>(&self.dir.join(RUNS_FILE))? {
            match latest.iter_mut().find(|r| r.run_id == run.run_id) {
                Some(existing) => *existing = run,
                None => latest.push(run),
            }
        }
        Ok(latest)
    }

    pub fn load_results(&self, run_id: &str) -> PersistenceResult<Vec<MemberResult>> {
        Ok(read_json_lines::<ResultRecord>(&self.dir.join(RESULTS_FILE))?
            .into_iter()
            .filter(|r| r.run_id == run_id)
            .map(|r| r.result)
            .collect())
    }

    pub fn load_operations(
        &self,
        run_id: &str,
        parameter_set_id: &str,
    ) -> PersistenceResult<Vec<OperationEntry>> {
        Ok(read_json_lines::<OperationRecord>(&self.dir.join(OPERATIONS_FILE))?
            .into_iter()
            .filter(|r| r.run_id == run_id && r.parameter_set_id == parameter_set_id)
            .map(|r| r.entry)
            .collect())
    }

    pub fn load_comparisons(&self) -> PersistenceResult<Vec<CohortComparison>> {
        read_json_lines(&self.dir.join(COMPARISONS_FILE))
    }
}

impl ResultStore for JsonLinesStore {
    fn save_run(&self, run: &RunMetadata) -> PersistenceResult<()> {
        self.runs.lock().append_one(run)
    }

    fn save_result(&self, run_id: &str, result: &MemberResult) -> PersistenceResult<()> {
        let record = ResultRecord {
            run_id: run_id.to_string(),
            saved_at: Utc::now(),
            result: result.clone(),
        };
        self.results.lock().append_one(&record)
    }

    fn save_operations(
        &self,
        run_id: &str,
        parameter_set_id: &str,
        operations: &[OperationEntry],
    ) -> PersistenceResult<()> {
        let records: Vec<OperationRecord> = operations
            .iter()
            .map(|entry| OperationRecord {
                run_id: run_id.to_string(),
                parameter_set_id: parameter_set_id.to_string(),
                entry: entry.clone(),
            })
            .collect();
        self.operations.lock().append(&records).map(|_| ())
    }

    fn save_comparison(&self, comparison: &CohortComparison) -> PersistenceResult<()> {
        self.comparisons.lock().append_one(comparison)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::{
        MetricsSummary, OperationAction, OrderSide, Price, RunStatus, SimConfig, Size, TopOfBook,
    };
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn run(status: RunStatus) -> RunMetadata {
        RunMetadata {
            run_id: "run-1".to_string(),
            symbol: "BTC".to_string(),
            parameter_set_ids: vec!["a".to_string()],
            duration_minutes: 5,
            started_at: Utc::now(),
            ended_at: None,
            status,
        }
    }

    fn result(id: &str) -> MemberResult {
        MemberResult {
            parameter_set_id: id.to_string(),
            name: id.to_uppercase(),
            description: String::new(),
            config: SimConfig::default(),
            metrics: MetricsSummary {
                fill_count: 3,
                simulated_pnl: dec!(1.2),
                ..Default::default()
            },
            effective_points: dec!(42.5),
        }
    }

    #[test]
    fn test_run_metadata_latest_wins() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path().join("data")).unwrap();

        store.save_run(&run(RunStatus::Running)).unwrap();
        store.save_run(&run(RunStatus::Completed)).unwrap();

        let runs = store.load_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
    }

    #[test]
    fn test_results_and_comparison_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path()).unwrap();

        store.save_result("run-1", &result("a")).unwrap();
        store.save_result("run-2", &result("b")).unwrap();

        let results = store.load_results("run-1").unwrap();
        assert_eq!(results, vec![result("a")]);

        let comparison = CohortComparison {
            run_id: Some("run-1".to_string()),
            members: vec![result("a")],
            ..CohortComparison::default()
        };
        store.save_comparison(&comparison).unwrap();
        assert_eq!(store.load_comparisons().unwrap(), vec![comparison]);
    }

    #[test]
    fn test_operations_filtered_by_member() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path()).unwrap();

        let entry = OperationEntry {
            timestamp: Utc::now(),
            tick_seq: 7,
            action: OperationAction::Fill,
            side: Some(OrderSide::Sell),
            order_price: Some(Price::new(dec!(50040))),
            mid_price: Price::new(dec!(50050)),
            distance_bps: Some(dec!(1.998)),
            reason: "crossed".to_string(),
            top_of_book: TopOfBook {
                bid_price: Price::new(dec!(50049.5)),
                bid_qty: Size::new(dec!(1)),
                ask_price: Price::new(dec!(50050.5)),
                ask_qty: Size::new(dec!(1)),
            },
        };
        store.save_operations("run-1", "a", &[entry.clone()]).unwrap();
        store.save_operations("run-1", "b", &[]).unwrap();

        assert_eq!(store.load_operations("run-1", "a").unwrap(), vec![entry]);
        assert!(store.load_operations("run-1", "b").unwrap().is_empty());
    }
}
