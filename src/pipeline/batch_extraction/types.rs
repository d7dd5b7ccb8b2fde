use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::taxonomy::TaskDefinition;
use crate::pipeline::types::{AnswerEntry, Extraction};

/// Explicit marker for a canonical column the record has no value for.
pub const EMPTY_CELL: &str = "";

// ═══════════════════════════════════════════
// Input
// ═══════════════════════════════════════════

/// One unit of work: a case identifier and the context text for its prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub id: String,
    pub context: String,
}

impl Case {
    pub fn new(id: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: context.into(),
        }
    }
}

// ═══════════════════════════════════════════
// Records
// ═══════════════════════════════════════════

/// One normalized answer with provenance, ready for the iteration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRecord {
    pub case_id: String,
    /// Keys are canonical variable names only.
    pub values: Extraction,
    /// Provider text exactly as received.
    pub raw_answer: String,
    pub context: String,
}

impl ExtractionRecord {
    /// Build a record, filling un-asserted variables with the task default.
    pub fn from_extraction(
        case: &Case,
        task: &TaskDefinition,
        mut values: Extraction,
        raw_answer: String,
    ) -> Self {
        if let Some(default) = task.default_answer {
            for variable in task.taxonomy.variables() {
                values
                    .entry(variable.clone())
                    .or_insert_with(|| AnswerEntry::new(default));
            }
        }
        Self {
            case_id: case.id.clone(),
            values,
            raw_answer,
            context: case.context.clone(),
        }
    }

    /// Rendered cell for `variable`, or the empty marker.
    pub fn cell(&self, variable: &str) -> String {
        self.values
            .get(variable)
            .map(AnswerEntry::render)
            .unwrap_or_else(|| EMPTY_CELL.to_string())
    }

    /// Row in store column order: case id, variables, raw answer, context.
    pub fn to_row(&self, variables: &[String]) -> Vec<String> {
        let mut row = Vec::with_capacity(variables.len() + 3);
        row.push(self.case_id.clone());
        row.extend(variables.iter().map(|v| self.cell(v)));
        row.push(self.raw_answer.clone());
        row.push(self.context.clone());
        row
    }
}

// ═══════════════════════════════════════════
// Run configuration and reporting
// ═══════════════════════════════════════════

/// Scheduler settings derived from the run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub iterations: u32,
    /// Requests allowed per window. `None` disables throttling.
    pub quota: Option<u32>,
    pub window_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            iterations: 3,
            quota: None,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running { iteration: u32 },
    Done,
}

/// A case that produced no row in an iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub case_id: String,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationReport {
    /// 1-based.
    pub iteration: u32,
    pub records_written: usize,
    pub failures: Vec<CaseFailure>,
    /// `None` when nothing was written.
    pub store_path: Option<PathBuf>,
    /// Set when a persistence failure stopped the iteration early.
    pub aborted: Option<String>,
    /// Store from an earlier run that this iteration appended to.
    pub existing_store: Option<PathBuf>,
}

impl IterationReport {
    pub fn new(iteration: u32) -> Self {
        Self {
            iteration,
            records_written: 0,
            failures: Vec::new(),
            store_path: None,
            aborted: None,
            existing_store: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub iterations: Vec<IterationReport>,
}

impl RunSummary {
    pub fn duration_secs(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }

    pub fn total_records(&self) -> usize {
        self.iterations.iter().map(|r| r.records_written).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.iterations.iter().map(|r| r.failures.len()).sum()
    }

    pub fn aborted_iterations(&self) -> impl Iterator<Item = &IterationReport> {
        self.iterations.iter().filter(|r| r.aborted.is_some())
    }
}
