//! In-process result store for tests and dry runs.

use std::sync::atomic::{AtomicBool, Ordering};

use cohort_core::{CohortComparison, MemberResult, OperationEntry, RunMetadata};
use parking_lot::Mutex;

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::ResultStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: Mutex<Vec<RunMetadata>>,
    results: Mutex<Vec<(String, MemberResult)>>,
    operations: Mutex<Vec<(String, String, Vec<OperationEntry>)>>,
    comparisons: Mutex<Vec<CohortComparison>>,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn runs(&self) -> Vec<RunMetadata> {
        self.runs.lock().clone()
    }

    pub fn results(&self) -> Vec<(String, MemberResult)> {
        self.results.lock().clone()
    }

    /// Saved operation logs as (run id, parameter set id, entries).
    pub fn operations(&self) -> Vec<(String, String, Vec<OperationEntry>)> {
        self.operations.lock().clone()
    }

    pub fn comparisons(&self) -> Vec<CohortComparison> {
        self.comparisons.lock().clone()
    }

    fn check(&self) -> PersistenceResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

impl ResultStore for MemoryStore {
    fn save_run(&self, run: &RunMetadata) -> PersistenceResult<()> {
        self.check()?;
        self.runs.lock().push(run.clone());
        Ok(())
    }

    fn save_result(&self, run_id: &str, result: &MemberResult) -> PersistenceResult<()> {
        self.check()?;
        self.results
            .lock()
            .push((run_id.to_string(), result.clone()));
        Ok(())
    }

    fn save_operations(
        &self,
        run_id: &str,
        parameter_set_id: &str,
        operations: &[OperationEntry],
    ) -> PersistenceResult<()> {
        self.check()?;
        self.operations.lock().push((
            run_id.to_string(),
            parameter_set_id.to_string(),
            operations.to_vec(),
        ));
        Ok(())
    }

    fn save_comparison(&self, comparison: &CohortComparison) -> PersistenceResult<()> {
        self.check()?;
        self.comparisons.lock().push(comparison.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_switch() {
        let store = MemoryStore::new();
        store.save_comparison(&CohortComparison::empty()).unwrap();

        store.set_fail(true);
        assert!(matches!(
            store.save_comparison(&CohortComparison::empty()),
            Err(PersistenceError::Unavailable(_))
        ));
        assert_eq!(store.comparisons().len(), 1);
    }
}
