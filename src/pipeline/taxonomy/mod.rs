//! Variable taxonomy: maps free-form label phrases to canonical variable names.
//!
//! A taxonomy is task-scoped. Matching is an ordered, first-match-wins scan of
//! (fragments → variable) rules with case-insensitive substring tests, so an
//! ambiguous phrase resolves to whichever rule is listed first.

pub mod tasks;

pub use tasks::*;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("Taxonomy declares no variables")]
    EmptyTaxonomy,

    #[error("Variable declared twice: {0}")]
    DuplicateVariable(String),

    #[error("Rule targets undeclared variable: {0}")]
    UnknownVariable(String),

    #[error("Rule for {0} contains an empty fragment")]
    EmptyFragment(String),

    #[error("Task definition parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One synonym set. Any fragment found inside a phrase selects `variable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyRule {
    pub variable: String,
    pub fragments: Vec<String>,
}

impl TaxonomyRule {
    pub fn new(variable: &str, fragments: &[&str]) -> Self {
        Self {
            variable: variable.to_string(),
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableTaxonomy {
    /// Canonical names in output column order.
    variables: Vec<String>,
    /// Matching order. Fragments are stored lower-cased.
    rules: Vec<TaxonomyRule>,
}

impl VariableTaxonomy {
    pub fn new(variables: Vec<String>, rules: Vec<TaxonomyRule>) -> Result<Self, TaxonomyError> {
        if variables.is_empty() {
            return Err(TaxonomyError::EmptyTaxonomy);
        }

        let mut seen = HashSet::new();
        for v in &variables {
            if !seen.insert(v.as_str()) {
                return Err(TaxonomyError::DuplicateVariable(v.clone()));
            }
        }

        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            if !seen.contains(rule.variable.as_str()) {
                return Err(TaxonomyError::UnknownVariable(rule.variable));
            }
            let mut fragments = Vec::with_capacity(rule.fragments.len());
            for fragment in &rule.fragments {
                let fragment = fragment.trim().to_lowercase();
                if fragment.is_empty() {
                    return Err(TaxonomyError::EmptyFragment(rule.variable));
                }
                fragments.push(fragment);
            }
            normalized.push(TaxonomyRule {
                variable: rule.variable,
                fragments,
            });
        }

        Ok(Self {
            variables,
            rules: normalized,
        })
    }

    /// Resolve a label phrase to its canonical variable, if any rule matches.
    pub fn canonicalize(&self, phrase: &str) -> Option<&str> {
        let phrase = phrase.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.fragments.iter().any(|f| phrase.contains(f.as_str())))
            .map(|rule| rule.variable.as_str())
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn rules(&self) -> &[TaxonomyRule] {
        &self.rules
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.variables.iter().any(|v| v == variable)
    }
}
