//! Command-line surface. Flags override the JSON config field by field.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{ConfigError, RunConfig};
use crate::pipeline::batch_extraction::{ExtractionError, RunSummary, SectionSelection};
use crate::pipeline::providers::ProviderKind;
use crate::pipeline::taxonomy::{BuiltinTask, TaskDefinition};

#[derive(Parser, Debug)]
#[command(
    name = "clinical-extract",
    version,
    about = "Extract clinical observation flags from case notes with LLMs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log filter (overridden by RUST_LOG).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query the provider for every case, once per iteration.
    Run(RunArgs),
    /// List the variables of the built-in tasks or of a task file.
    Tasks {
        #[arg(long)]
        task_file: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON config file. Defaults to config.json in the data directory, if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// ollama, openai, anthropic or gemini.
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Name used in output file names.
    #[arg(long)]
    pub nickname: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,

    /// Requests allowed per window.
    #[arg(long)]
    pub quota: Option<u32>,
    #[arg(long)]
    pub window_secs: Option<u64>,
    #[arg(long)]
    pub iterations: Option<u32>,
    /// Process only the first N cases.
    #[arg(long)]
    pub limit: Option<usize>,
    /// "all" or a comma-separated list of section headings.
    #[arg(long, value_delimiter = ',')]
    pub sections: Vec<String>,

    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub num_ctx: Option<u32>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// preop, postop or disease-course.
    #[arg(long)]
    pub task: Option<String>,
    #[arg(long)]
    pub task_file: Option<PathBuf>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Base config (file or defaults) with every given flag applied.
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::load_default()?,
        };
        self.apply_to(&mut config)?;
        Ok(config)
    }

    pub fn apply_to(self, config: &mut RunConfig) -> Result<(), ConfigError> {
        if let Some(name) = self.provider {
            config.provider =
                ProviderKind::from_str(&name).ok_or(ConfigError::UnknownProvider(name))?;
        }
        if self.model.is_some() {
            config.model = self.model;
        }
        if self.nickname.is_some() {
            config.nickname = self.nickname;
        }
        if self.base_url.is_some() {
            config.base_url = self.base_url;
        }
        if self.quota.is_some() {
            config.quota = self.quota;
        }
        if let Some(secs) = self.window_secs {
            config.window_secs = secs;
        }
        if let Some(n) = self.iterations {
            config.iterations = n;
        }
        if self.limit.is_some() {
            config.case_limit = self.limit;
        }
        if !self.sections.is_empty() {
            config.sections = parse_sections(self.sections);
        }
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
        if let Some(n) = self.num_ctx {
            config.num_ctx = n;
        }
        if let Some(n) = self.max_tokens {
            config.max_tokens = n;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(dir) = self.input {
            config.input_dir = dir;
        }
        if let Some(dir) = self.output {
            config.output_dir = dir;
        }
        if let Some(task) = self.task {
            config.task = task;
        }
        if self.task_file.is_some() {
            config.task_file = self.task_file;
        }
        Ok(())
    }
}

fn parse_sections(values: Vec<String>) -> SectionSelection {
    let headings: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if headings.len() == 1 && headings[0].eq_ignore_ascii_case("all") {
        SectionSelection::All
    } else {
        SectionSelection::Headings(headings)
    }
}

impl Cli {
    pub fn run(self) -> Result<(), ExtractionError> {
        match self.command {
            Command::Run(args) => {
                let json = args.json;
                let config = args.into_config()?;
                let summary = crate::run_extraction(&config)?;
                if json {
                    match serde_json::to_string_pretty(&summary) {
                        Ok(out) => println!("{out}"),
                        Err(e) => tracing::error!(error = %e, "Cannot serialize summary"),
                    }
                } else {
                    print!("{}", render_summary(&summary));
                }
                Ok(())
            }
            Command::Tasks { task_file } => {
                let tasks = match task_file {
                    Some(path) => vec![TaskDefinition::load(&path).map_err(ConfigError::from)?],
                    None => BuiltinTask::all()
                        .iter()
                        .map(|t| t.definition())
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(ConfigError::from)?,
                };
                for task in &tasks {
                    print!("{}", render_task(task));
                }
                Ok(())
            }
        }
    }
}

/// Human-readable run summary.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for report in &summary.iterations {
        let store = report
            .store_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "no store written".to_string());
        out.push_str(&format!(
            "iteration {}: {} written, {} failed -> {}\n",
            report.iteration,
            report.records_written,
            report.failures.len(),
            store
        ));
        for failure in &report.failures {
            out.push_str(&format!("  {}: {}\n", failure.case_id, failure.cause));
        }
        if let Some(path) = &report.existing_store {
            out.push_str(&format!("  appended to existing {}\n", path.display()));
        }
        if let Some(cause) = &report.aborted {
            out.push_str(&format!("  aborted: {cause}\n"));
        }
    }
    if let Some(secs) = summary.duration_secs() {
        out.push_str(&format!("finished in {secs}s\n"));
    }
    out
}

fn render_task(task: &TaskDefinition) -> String {
    let default = task
        .default_answer
        .map(|a| a.as_str())
        .unwrap_or("(empty)");
    let mut out = format!("{} (default: {default})\n", task.name);
    for variable in task.taxonomy.variables() {
        out.push_str(&format!("  {variable}\n"));
    }
    out
}
