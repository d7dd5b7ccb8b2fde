pub mod cli;
pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

use crate::config::RunConfig;
use crate::pipeline::batch_extraction::{
    load_cases, BatchScheduler, CsvRecordStore, ExtractionError, RunSummary,
};
use crate::pipeline::providers::build_provider;

/// Install the global subscriber. `RUST_LOG` wins over `level`, which wins
/// over the built-in default.
pub fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(config::default_log_filter())))
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a full extraction: resolve the task, load cases, build the provider
/// and drive every iteration.
///
/// Errors here are setup errors. Failures during the run are reported in the
/// returned summary.
pub fn run_extraction(config: &RunConfig) -> Result<RunSummary, ExtractionError> {
    config.validate()?;

    let task = config.task_definition()?;
    let cases = load_cases(&config.input_dir, config.case_limit, &config.sections)?;
    let provider = build_provider(config.provider, config.provider_settings())?;

    tracing::info!(
        version = config::APP_VERSION,
        task = %task.name,
        provider = provider.nickname(),
        model = provider.model(),
        cases = cases.len(),
        iterations = config.iterations,
        quota = ?config.effective_quota(),
        "Starting extraction run"
    );

    let store = CsvRecordStore::new(
        &config.output_dir,
        &task.name,
        provider.nickname(),
        task.taxonomy.variables(),
    )?;
    let mut scheduler =
        BatchScheduler::new(provider, task, Box::new(store), &config.scheduler_config())?;

    Ok(scheduler.run(&cases))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::config::ConfigError;
    use crate::pipeline::batch_extraction::PersistenceError;
    use crate::pipeline::providers::ProviderKind;

    fn config_with_cases(root: &std::path::Path, ids: &[&str]) -> RunConfig {
        let input = root.join("cases");
        for id in ids {
            let dir = input.join(id);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("letter.txt"), "Postoperative course uneventful.").unwrap();
        }
        RunConfig {
            input_dir: input,
            output_dir: root.join("results"),
            // Closed port: every query fails fast with a connection error.
            base_url: Some("http://127.0.0.1:9".into()),
            timeout_secs: 2,
            iterations: 2,
            ..RunConfig::default()
        }
    }

    #[test]
    fn unreachable_provider_fails_cases_not_run() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_cases(tmp.path(), &["C1", "C2"]);

        let summary = run_extraction(&config).unwrap();

        assert_eq!(summary.iterations.len(), 2);
        assert_eq!(summary.total_records(), 0);
        assert_eq!(summary.total_failures(), 4);
        assert!(summary.iterations.iter().all(|r| r.store_path.is_none()));
        assert!(!tmp.path().join("results").exists());
    }

    #[test]
    fn invalid_config_is_setup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RunConfig {
            iterations: 0,
            ..config_with_cases(tmp.path(), &["C1"])
        };
        assert!(matches!(
            run_extraction(&config),
            Err(ExtractionError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn missing_input_dir_is_setup_error() {
        let config = RunConfig {
            input_dir: PathBuf::from("/nonexistent/cases"),
            ..RunConfig::default()
        };
        assert!(matches!(
            run_extraction(&config),
            Err(ExtractionError::CaseSource(_))
        ));
    }

    #[test]
    fn path_like_nickname_is_setup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RunConfig {
            nickname: Some("../outside".into()),
            ..config_with_cases(tmp.path(), &["C1"])
        };
        assert!(matches!(
            run_extraction(&config),
            Err(ExtractionError::Persistence(PersistenceError::InvalidName { .. }))
        ));
        assert!(!tmp.path().join("outside").exists());
    }

    #[test]
    fn cloud_provider_without_key_is_setup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RunConfig {
            provider: ProviderKind::Anthropic,
            ..config_with_cases(tmp.path(), &["C1"])
        };
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return;
        }
        assert!(matches!(
            run_extraction(&config),
            Err(ExtractionError::Provider(_))
        ));
    }
}
