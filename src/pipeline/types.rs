//! Value types shared by the normalizer, the tasks and the result store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Categorical answer for one clinical variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
    /// Model said the information is not available. Kept apart from `No`:
    /// "absent" and "not documented" mean different things clinically.
    Unknown,
}

impl Answer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded answer plus any free-text annotation the model attached to it.
///
/// Annotations never change `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub answer: Answer,
    pub notes: Vec<String>,
}

impl AnswerEntry {
    pub fn new(answer: Answer) -> Self {
        Self {
            answer,
            notes: Vec::new(),
        }
    }

    pub fn annotate(&mut self, note: &str) {
        let note = note.trim();
        if !note.is_empty() {
            self.notes.push(note.to_string());
        }
    }

    /// Cell text: the categorical token, then `" - note"` per annotation.
    pub fn render(&self) -> String {
        let mut out = self.answer.as_str().to_string();
        for note in &self.notes {
            out.push_str(" - ");
            out.push_str(note);
        }
        out
    }
}

/// Partial record produced by the normalizer, keyed by canonical variable name.
///
/// Variables the model never mentioned are absent ("not asserted").
pub type Extraction = BTreeMap<String, AnswerEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_roundtrip() {
        for a in [Answer::Yes, Answer::No, Answer::Unknown] {
            assert_eq!(Answer::from_str(a.as_str()), Some(a));
        }
        assert_eq!(Answer::from_str(" YES "), Some(Answer::Yes));
        assert_eq!(Answer::from_str("maybe"), None);
    }

    #[test]
    fn render_without_notes_is_bare_token() {
        assert_eq!(AnswerEntry::new(Answer::No).render(), "No");
    }

    #[test]
    fn render_appends_notes_in_order() {
        let mut entry = AnswerEntry::new(Answer::Yes);
        entry.annotate("mild");
        entry.annotate("  ");
        entry.annotate("resolved in days");
        assert_eq!(entry.render(), "Yes - mild - resolved in days");
        assert_eq!(entry.answer, Answer::Yes);
    }

    #[test]
    fn answer_serializes_as_variant_name() {
        let json = serde_json::to_string(&Answer::Unknown).unwrap();
        assert_eq!(json, "\"Unknown\"");
    }
}
