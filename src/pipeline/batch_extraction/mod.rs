//! Batch extraction run.
//!
//! Loads cases, queries the provider once per case per iteration, normalizes
//! the answers and appends one row per case to the iteration's store:
//! ```text
//! cases → throttle → provider → sanitize → normalizer → record → store
//! ```
//! Iterations repeat the whole pass so answers can be compared for consistency.

pub mod error;
pub mod types;
pub mod traits;
pub mod cases;
pub mod throttle;
pub mod store;
pub mod scheduler;

pub use error::{CaseSourceError, ExtractionError, PersistenceError};
pub use types::*;
pub use traits::*;
pub use cases::{load_cases, select_sections, SectionSelection};
pub use throttle::FixedWindowThrottle;
pub use store::{CsvRecordStore, IterationTable};
pub use scheduler::BatchScheduler;
