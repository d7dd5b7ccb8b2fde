//! Response normalizer: turns a model's free-form answer into canonical
//! variable → answer entries.
//!
//! Line grammar, tried in priority order:
//! 1. Structured bullet: `- Label: Value`, `* Label: Value`, `**Label:** Value`,
//!    `• Label: Value`, `3. Label: Value`. Accepted anywhere in the answer.
//! 2. Standalone `Label: Value`. Accepted only after a "final answer" marker.
//!
//! Any other non-empty line annotates the variable set most recently.
//! Unresolvable labels are dropped; later lines overwrite earlier ones.

use std::sync::LazyLock;

use regex::Regex;

use super::taxonomy::{TaskDefinition, VariableTaxonomy};
use super::types::{Answer, AnswerEntry, Extraction};

static FINAL_ANSWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfinal answers?\b").expect("valid regex"));

const AFFIRMATIVE: &[&str] = &["yes", "ja"];
const NEGATIVE: &[&str] = &["no", "nein"];

/// What one line of an answer turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineShape<'a> {
    FinalAnswerMarker,
    Assignment {
        label: &'a str,
        value: &'a str,
        tail: &'a str,
    },
    Other,
}

/// Task-scoped normalizer. Build once per task, reuse for every answer.
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    taxonomy: VariableTaxonomy,
    uncertain_tokens: Vec<String>,
    bullet_re: Regex,
    standalone_re: Regex,
}

impl ResponseNormalizer {
    pub fn new(task: &TaskDefinition) -> Result<Self, regex::Error> {
        let uncertain_tokens: Vec<String> = task
            .uncertain_tokens
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let value = value_alternation(&uncertain_tokens);

        let bullet_re = Regex::new(&format!(
            r#"(?i)^\s*(?:[\x{{2022}}\-–]|\*+|[1-5]\.)\s*\**\s*([^:]+?)\**\s*:\s*\**\s*['"]?({value})\b['"]?\**(.*)$"#
        ))?;
        let standalone_re = Regex::new(&format!(
            r#"(?i)^\s*([\p{{L}}\d][^:*\x{{2022}}]*?)\s*:\s*['"]?({value})\b['"]?(.*)$"#
        ))?;

        Ok(Self {
            taxonomy: task.taxonomy.clone(),
            uncertain_tokens,
            bullet_re,
            standalone_re,
        })
    }

    pub fn taxonomy(&self) -> &VariableTaxonomy {
        &self.taxonomy
    }

    /// Normalize one raw answer. Variables the model never mentioned are absent.
    pub fn normalize(&self, raw_answer: &str) -> Extraction {
        let mut record = Extraction::new();
        let mut in_final_section = false;
        // Canonical name of the variable set by the latest assignment line, if
        // that line resolved to one.
        let mut current: Option<String> = None;

        for line in raw_answer.lines() {
            let line = line.trim();

            match self.classify(line, in_final_section) {
                LineShape::FinalAnswerMarker => {
                    in_final_section = true;
                }
                LineShape::Assignment { label, value, tail } => {
                    current = None;
                    let Some(answer) = self.normalize_value(value) else {
                        continue;
                    };
                    let Some(variable) = self.taxonomy.canonicalize(clean_label(label)) else {
                        tracing::trace!(label, "Unrecognized label dropped");
                        continue;
                    };
                    let mut entry = AnswerEntry::new(answer);
                    entry.annotate(clean_tail(tail));
                    record.insert(variable.to_string(), entry);
                    current = Some(variable.to_string());
                }
                LineShape::Other => {
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(entry) = current.as_ref().and_then(|v| record.get_mut(v)) {
                        entry.annotate(line);
                    }
                }
            }
        }

        record
    }

    fn classify<'a>(&self, line: &'a str, in_final_section: bool) -> LineShape<'a> {
        if FINAL_ANSWER_RE.is_match(line) {
            return LineShape::FinalAnswerMarker;
        }

        let captures = self.bullet_re.captures(line).or_else(|| {
            if in_final_section {
                self.standalone_re.captures(line)
            } else {
                None
            }
        });

        match captures {
            Some(caps) => match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(label), Some(value), tail) => LineShape::Assignment {
                    label: label.as_str(),
                    value: value.as_str(),
                    tail: tail.map_or("", |m| m.as_str()),
                },
                _ => LineShape::Other,
            },
            None => LineShape::Other,
        }
    }

    /// Map a matched value token onto the categorical vocabulary.
    fn normalize_value(&self, token: &str) -> Option<Answer> {
        let token = collapse_whitespace(&token.to_lowercase());
        if AFFIRMATIVE.contains(&token.as_str()) {
            Some(Answer::Yes)
        } else if NEGATIVE.contains(&token.as_str()) {
            Some(Answer::No)
        } else if self.uncertain_tokens.iter().any(|t| *t == token) {
            Some(Answer::Unknown)
        } else {
            None
        }
    }
}

/// Regex alternation of every accepted value token, longest first so that
/// multi-word tokens win over their prefixes.
fn value_alternation(uncertain_tokens: &[String]) -> String {
    let mut tokens: Vec<String> = AFFIRMATIVE
        .iter()
        .chain(NEGATIVE.iter())
        .map(|t| t.to_string())
        .chain(uncertain_tokens.iter().cloned())
        .collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    tokens.dedup();

    tokens
        .iter()
        .map(|t| {
            t.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn clean_label(label: &str) -> &str {
    label
        .trim()
        .trim_matches(|c: char| c == '*' || c == '\'' || c == '"' || c == '`')
        .trim()
}

fn clean_tail(tail: &str) -> &str {
    tail.trim()
        .trim_start_matches(|c: char| {
            matches!(c, '-' | '–' | '—' | ':' | ',' | ';' | '.' | '*' | '\'' | '"') || c.is_whitespace()
        })
        .trim_end_matches('*')
        .trim()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::taxonomy::BuiltinTask;

    fn normalizer(task: BuiltinTask) -> ResponseNormalizer {
        ResponseNormalizer::new(&task.definition().unwrap()).unwrap()
    }

    fn answer_of(record: &Extraction, key: &str) -> Option<Answer> {
        record.get(key).map(|e| e.answer)
    }

    #[test]
    fn dash_bullet_is_recognized() {
        let n = normalizer(BuiltinTask::PreOp);
        let record = n.normalize("- Vertigo: Yes");
        assert_eq!(record.len(), 1);
        assert_eq!(record["Vertigo"], AnswerEntry::new(Answer::Yes));
    }

    #[test]
    fn bullet_variants_are_recognized() {
        let n = normalizer(BuiltinTask::PreOp);
        let answer = "* Vertigo: No\n\
                      **Lacrimation:** Yes\n\
                      • Facial Numbness: 'No'\n\
                      3. Facial Muscle Spasm: \"Yes\"\n\
                      *   **Other**: No";
        let record = n.normalize(answer);
        assert_eq!(answer_of(&record, "Vertigo"), Some(Answer::No));
        assert_eq!(answer_of(&record, "Lacrimation"), Some(Answer::Yes));
        assert_eq!(answer_of(&record, "FacialNumbness"), Some(Answer::No));
        assert_eq!(answer_of(&record, "FacialMuscleSpasm"), Some(Answer::Yes));
        assert_eq!(answer_of(&record, "Other"), Some(Answer::No));
    }

    #[test]
    fn german_answer_matches_english_answer() {
        let n = normalizer(BuiltinTask::PreOp);
        let german = n.normalize("- Taubheit: Ja");
        let english = n.normalize("- Numbness: Yes");
        assert_eq!(german, english);
        assert_eq!(answer_of(&german, "FacialNumbness"), Some(Answer::Yes));

        let nein = n.normalize("- Schwindel: Nein");
        assert_eq!(answer_of(&nein, "Vertigo"), Some(Answer::No));
    }

    #[test]
    fn later_line_wins() {
        let n = normalizer(BuiltinTask::PreOp);
        let record = n.normalize("- Vertigo: Yes\n- Vertigo: No");
        assert_eq!(answer_of(&record, "Vertigo"), Some(Answer::No));
    }

    #[test]
    fn standalone_line_gated_by_final_answer_marker() {
        let n = normalizer(BuiltinTask::PostOp);

        let before = n.normalize("Infection: No\nFinal answer:");
        assert!(before.is_empty());

        let after = n.normalize("Final answer:\nInfection: No");
        assert_eq!(answer_of(&after, "Infection"), Some(Answer::No));
    }

    #[test]
    fn marker_found_anywhere_in_line() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("Here is my **Final Answer** for you\nCSF Leak: Yes");
        assert_eq!(answer_of(&record, "CSFLeak"), Some(Answer::Yes));
    }

    #[test]
    fn marker_line_contributes_no_data() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("- Final answer: Yes");
        assert!(record.is_empty());
    }

    #[test]
    fn bullet_accepted_before_marker() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("Looking at the notes:\n- Hearing loss: Yes\nmore reasoning");
        assert_eq!(answer_of(&record, "HearingLoss"), Some(Answer::Yes));
    }

    #[test]
    fn continuation_annotates_without_changing_answer() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("- Facial Palsy: Yes\nHouse-Brackmann II on day 2\n\nresolved at discharge");
        let entry = &record["FacialPalsy"];
        assert_eq!(entry.answer, Answer::Yes);
        assert_eq!(
            entry.notes,
            vec!["House-Brackmann II on day 2".to_string(), "resolved at discharge".to_string()]
        );
    }

    #[test]
    fn continuation_ignored_when_no_variable_set() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("Some reasoning\nmore reasoning\n- Infection: No");
        assert_eq!(record["Infection"], AnswerEntry::new(Answer::No));
    }

    #[test]
    fn continuation_after_unresolved_label_is_dropped() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("- Infection: No\n- Vertigo: Yes\nexplanation for vertigo");
        assert_eq!(record.len(), 1);
        assert!(record["Infection"].notes.is_empty());
    }

    #[test]
    fn unknown_label_is_dropped() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("- Tinnitus: Yes\n- Infection: No");
        assert_eq!(record.len(), 1);
        assert!(!record.contains_key("Tinnitus"));
    }

    #[test]
    fn final_answer_scenario() {
        let n = normalizer(BuiltinTask::PostOp);
        let raw = "Reasoning...\nFinal answer:\nCSF Leak: No\nInfection: No\nFacial Palsy: Yes - mild, resolved in days";
        let record = n.normalize(raw);

        assert_eq!(record.len(), 3);
        assert_eq!(record["CSFLeak"].render(), "No");
        assert_eq!(record["Infection"].render(), "No");
        assert_eq!(record["FacialPalsy"].answer, Answer::Yes);
        assert_eq!(record["FacialPalsy"].render(), "Yes - mild, resolved in days");
    }

    #[test]
    fn uncertain_tokens_map_to_unknown() {
        let n = normalizer(BuiltinTask::DiseaseCourse);
        let raw = "Final answer:\n\
                   - Free of pain after second surgery: Not provided\n\
                   - Thermocoagulation was carried out: I don't know\n\
                   - A second surgery was carried out: No";
        let record = n.normalize(raw);
        assert_eq!(answer_of(&record, "PainFreeAfterSecondSurgery"), Some(Answer::Unknown));
        assert_eq!(answer_of(&record, "Thermocoagulation"), Some(Answer::Unknown));
        assert_eq!(answer_of(&record, "SecondSurgery"), Some(Answer::No));
    }

    #[test]
    fn not_provided_is_not_read_as_no_when_disabled() {
        // Tasks without uncertain tokens must not fold "Not provided" into "No".
        let mut task = BuiltinTask::PostOp.definition().unwrap();
        task.uncertain_tokens.clear();
        let n = ResponseNormalizer::new(&task).unwrap();
        let record = n.normalize("- Infection: Not provided");
        assert!(record.is_empty());
    }

    #[test]
    fn uncertain_answers_kept_for_defaulted_tasks() {
        let post = normalizer(BuiltinTask::PostOp).normalize("Final answer:\n- Infection: Not provided");
        assert_eq!(answer_of(&post, "Infection"), Some(Answer::Unknown));
        let pre = normalizer(BuiltinTask::PreOp).normalize("Final answer:\n- Vertigo: I don't know");
        assert_eq!(answer_of(&pre, "Vertigo"), Some(Answer::Unknown));
    }

    #[test]
    fn preop_prompt_labels_echoed_back() {
        let n = normalizer(BuiltinTask::PreOp);
        let raw = "Final answer:\n\
                   - Sudden Severe Facial Pain: Yes\n\
                   - Facial Numbness: No\n\
                   - Vertigo: No\n\
                   - Lacrimation: Yes\n\
                   - Facial Muscle Spasm: No\n\
                   - Other (related to trigeminal neuralgia): No";
        let record = n.normalize(raw);
        assert_eq!(record.len(), 6);
        assert_eq!(answer_of(&record, "TrigeminalPain"), Some(Answer::Yes));
        assert_eq!(answer_of(&record, "Lacrimation"), Some(Answer::Yes));
        assert_eq!(answer_of(&record, "Other"), Some(Answer::No));
    }

    #[test]
    fn value_must_be_a_whole_word() {
        let n = normalizer(BuiltinTask::PostOp);
        let record = n.normalize("- Infection: None documented");
        assert!(record.is_empty());
    }

    #[test]
    fn empty_answer_gives_empty_record() {
        let n = normalizer(BuiltinTask::PreOp);
        assert!(n.normalize("").is_empty());
    }

    #[test]
    fn value_alternation_orders_longest_first() {
        let alt = value_alternation(&["not provided".to_string(), "unknown".to_string()]);
        assert!(alt.starts_with(r"not\s+provided|unknown"));
        assert!(alt.contains("|nein|"));
    }
}
