//! CSV result store: one file per task, provider and iteration.
//!
//! Every append loads the existing table, adds the row and rewrites the whole
//! file through a sibling temp file, so a crash mid-write never leaves a
//! truncated store behind.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::PersistenceError;
use super::traits::RecordStore;
use super::types::ExtractionRecord;

pub const CASE_ID_COLUMN: &str = "case_id";
pub const RAW_ANSWER_COLUMN: &str = "raw_answer";
pub const CONTEXT_COLUMN: &str = "context";

/// Fixed column schema for a task's variables.
pub fn store_columns(variables: &[String]) -> Vec<String> {
    let mut columns = Vec::with_capacity(variables.len() + 3);
    columns.push(CASE_ID_COLUMN.to_string());
    columns.extend(variables.iter().cloned());
    columns.push(RAW_ANSWER_COLUMN.to_string());
    columns.push(CONTEXT_COLUMN.to_string());
    columns
}

/// An iteration store read back into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl IterationTable {
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;
        let columns = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    /// Row whose `case_id` column equals `case_id`.
    pub fn find_case(&self, case_id: &str) -> Option<usize> {
        let idx = self.columns.iter().position(|c| c == CASE_ID_COLUMN)?;
        self.rows
            .iter()
            .position(|r| r.get(idx).map(String::as_str) == Some(case_id))
    }

    fn write_atomic(&self, path: &Path) -> Result<(), PersistenceError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = (|| -> Result<(), PersistenceError> {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(&self.columns)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
            Ok(())
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Task names and nicknames become part of a file name: no separators, no
/// parent references.
fn check_name(field: &'static str, value: &str) -> Result<(), PersistenceError> {
    let bad = value.trim().is_empty()
        || value.contains("..")
        || value.contains(['/', '\\', ':'])
        || value.chars().any(char::is_control);
    if bad {
        return Err(PersistenceError::InvalidName {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// File-backed store for one task and provider.
pub struct CsvRecordStore {
    output_dir: PathBuf,
    task_name: String,
    nickname: String,
    columns: Vec<String>,
}

impl CsvRecordStore {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        task_name: &str,
        nickname: &str,
        variables: &[String],
    ) -> Result<Self, PersistenceError> {
        check_name("task name", task_name)?;
        check_name("nickname", nickname)?;
        Ok(Self {
            output_dir: output_dir.into(),
            task_name: task_name.to_string(),
            nickname: nickname.to_string(),
            columns: store_columns(variables),
        })
    }

    pub fn path_for(&self, iteration: u32) -> PathBuf {
        self.output_dir.join(format!(
            "output_{}_{}_{}.csv",
            self.task_name, self.nickname, iteration
        ))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl RecordStore for CsvRecordStore {
    fn append(
        &mut self,
        iteration: u32,
        record: &ExtractionRecord,
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.path_for(iteration);

        let mut table = if path.exists() {
            let existing = IterationTable::load(&path)?;
            if existing.columns != self.columns {
                return Err(PersistenceError::SchemaMismatch {
                    path,
                    expected: self.columns.clone(),
                    found: existing.columns,
                });
            }
            existing
        } else {
            fs::create_dir_all(&self.output_dir)?;
            IterationTable {
                columns: self.columns.clone(),
                rows: Vec::new(),
            }
        };

        // Variables are the columns between case_id and the two provenance columns.
        let variables = &self.columns[1..self.columns.len() - 2];
        table.rows.push(record.to_row(variables));
        table.write_atomic(&path)?;

        tracing::debug!(
            iteration,
            case_id = %record.case_id,
            rows = table.len(),
            "Record appended"
        );
        Ok(path)
    }

    fn existing(&self, iteration: u32) -> Option<PathBuf> {
        let path = self.path_for(iteration);
        path.exists().then_some(path)
    }
}
