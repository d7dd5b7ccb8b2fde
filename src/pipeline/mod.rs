pub mod types;
pub mod taxonomy; // Task-scoped variable tables
pub mod normalizer; // Free-text answer → canonical record
pub mod output_sanitize;
pub mod prompt_templates;
pub mod providers; // Uniform LLM backend interface
pub mod batch_extraction; // Iterations, throttle, result store
