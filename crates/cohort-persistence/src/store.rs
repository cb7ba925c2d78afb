//! Result store boundary and its record shapes.

use chrono::{DateTime, Utc};
use cohort_core::{CohortComparison, MemberResult, OperationEntry, RunMetadata};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceResult;

/// Destination for run metadata, member results, operation logs and comparisons.
///
/// Calls are synchronous and short; the runner treats every failure as
/// best effort and only logs it.
pub trait ResultStore: Send + Sync {
    fn save_run(&self, run: &RunMetadata) -> PersistenceResult<()>;

    fn save_result(&self, run_id: &str, result: &MemberResult) -> PersistenceResult<()>;

    fn save_operations(
        &self,
        run_id: &str,
        parameter_set_id: &str,
        operations: &[OperationEntry],
    ) -> PersistenceResult<()>;

    fn save_comparison(&self, comparison: &CohortComparison) -> PersistenceResult<()>;
}

/// A member result tagged with its run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub run_id: String,
    pub saved_at: DateTime<Utc>,
    pub result: MemberResult,
}

/// One operation-log entry tagged with its run and member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub run_id: String,
    pub parameter_set_id: String,
    pub entry: OperationEntry,
}
