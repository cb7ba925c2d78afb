//! Result persistence for cohort runs.
//!
//! Run metadata, member results, operation logs and comparisons are written
//! as JSON Lines so that partially written files stay readable.

pub mod error;
pub mod jsonl;
pub mod memory;
pub mod store;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use jsonl::JsonLinesStore;
pub use memory::MemoryStore;
pub use store::{OperationRecord, ResultRecord, ResultStore};
pub use writer::{read_json_lines, JsonLinesWriter};
