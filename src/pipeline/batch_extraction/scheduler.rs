//! BatchScheduler: drives repeated passes over the case list.
//!
//! Strictly sequential: one provider call in flight, one case at a time, one
//! iteration at a time. A provider failure skips the case for that iteration;
//! a store failure ends the iteration. Neither stops the run.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::error::PersistenceError;
use super::throttle::FixedWindowThrottle;
use super::traits::{Clock, RecordStore, SystemClock};
use super::types::*;
use crate::pipeline::normalizer::ResponseNormalizer;
use crate::pipeline::output_sanitize::sanitize_llm_output;
use crate::pipeline::prompt_templates::render_for_task;
use crate::pipeline::providers::{LlmProvider, ProviderError};
use crate::pipeline::taxonomy::TaskDefinition;

pub struct BatchScheduler {
    provider: Box<dyn LlmProvider>,
    task: TaskDefinition,
    normalizer: ResponseNormalizer,
    store: Box<dyn RecordStore>,
    throttle: FixedWindowThrottle,
    clock: Box<dyn Clock>,
    iterations: u32,
    state: SchedulerState,
}

impl BatchScheduler {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        task: TaskDefinition,
        store: Box<dyn RecordStore>,
        config: &SchedulerConfig,
    ) -> Result<Self, regex::Error> {
        let normalizer = ResponseNormalizer::new(&task)?;
        Ok(Self {
            provider,
            task,
            normalizer,
            store,
            throttle: FixedWindowThrottle::new(
                config.quota,
                Duration::from_secs(config.window_secs),
            ),
            clock: Box::new(SystemClock::new()),
            iterations: config.iterations,
            state: SchedulerState::Idle,
        })
    }

    /// Replace the wall clock used by the throttle.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run every iteration over `cases` in list order.
    pub fn run(&mut self, cases: &[Case]) -> RunSummary {
        let mut summary = RunSummary {
            started_at: Some(chrono::Utc::now()),
            ..RunSummary::default()
        };

        for iteration in 1..=self.iterations {
            self.state = SchedulerState::Running { iteration };
            tracing::info!(
                iteration,
                cases = cases.len(),
                provider = self.provider.nickname(),
                task = %self.task.name,
                "Iteration started"
            );

            let report = self.run_iteration(iteration, cases);

            match (&report.store_path, &report.aborted) {
                (_, Some(cause)) => tracing::error!(
                    iteration,
                    written = report.records_written,
                    error = %cause,
                    "Iteration aborted"
                ),
                (None, None) => tracing::warn!(
                    iteration,
                    failed = report.failures.len(),
                    "No case succeeded, no store written"
                ),
                (Some(path), None) => tracing::info!(
                    iteration,
                    written = report.records_written,
                    failed = report.failures.len(),
                    store = %path.display(),
                    "Iteration complete"
                ),
            }

            summary.iterations.push(report);
        }

        self.state = SchedulerState::Done;
        summary.finished_at = Some(chrono::Utc::now());
        summary
    }

    fn run_iteration(&mut self, iteration: u32, cases: &[Case]) -> IterationReport {
        let mut report = IterationReport::new(iteration);

        if let Some(path) = self.store.existing(iteration) {
            tracing::warn!(
                iteration,
                store = %path.display(),
                "Store already exists, new rows are appended and case ids may repeat"
            );
            report.existing_store = Some(path);
        }

        for case in cases {
            self.throttle.acquire(self.clock.as_ref());
            let start = Instant::now();

            let record = match self.extract_case(case) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        iteration,
                        case_id = %case.id,
                        provider = self.provider.nickname(),
                        error = %e,
                        "Case failed, skipping for this iteration"
                    );
                    report.failures.push(CaseFailure {
                        case_id: case.id.clone(),
                        cause: e.to_string(),
                    });
                    continue;
                }
            };

            match self.persist(iteration, &record) {
                Ok(path) => {
                    report.records_written += 1;
                    report.store_path = Some(path);
                    tracing::info!(
                        iteration,
                        case_id = %case.id,
                        provider = self.provider.nickname(),
                        asserted = record.values.len(),
                        answer_len = record.raw_answer.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Case extracted"
                    );
                }
                Err(e) => {
                    report.aborted = Some(e.to_string());
                    break;
                }
            }
        }

        report
    }

    /// Query the provider for one case and normalize the answer.
    fn extract_case(&self, case: &Case) -> Result<ExtractionRecord, ProviderError> {
        let rendered = render_for_task(&self.task, &case.context);
        let raw_answer = self.provider.query(&rendered.prompt, &rendered.system)?;

        let answer = sanitize_llm_output(&raw_answer);
        let values = self.normalizer.normalize(&answer);
        if values.is_empty() {
            tracing::debug!(
                case_id = %case.id,
                answer_len = answer.len(),
                "No variable recognized in answer"
            );
        }

        Ok(ExtractionRecord::from_extraction(
            case,
            &self.task,
            values,
            raw_answer,
        ))
    }

    fn persist(
        &mut self,
        iteration: u32,
        record: &ExtractionRecord,
    ) -> Result<PathBuf, PersistenceError> {
        self.store.append(iteration, record)
    }
}
