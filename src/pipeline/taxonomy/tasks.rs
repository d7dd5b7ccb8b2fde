//! Built-in extraction tasks and loading of custom task files.
//!
//! A task bundles everything that differs between extraction studies: the
//! prompt wording, the variable taxonomy, the extra "uncertain" answer tokens
//! and the default applied to variables the model never mentioned.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{TaxonomyError, TaxonomyRule, VariableTaxonomy};
use crate::pipeline::types::Answer;

const ASSISTANT_PREAMBLE: &str =
    "You are a helpful physician assistant tasked with extracting clinical data for a study.";

const COURSE_PREAMBLE: &str = "You are a capable physician assistant. You are given medical \
documents of patients who underwent microvascular decompression surgery, contained within \
<context> tags. Your role is to analyze the patient's disease course carefully and then provide \
specific data points as your final answer. You must strictly rely on the content provided inside \
<context></context> XML tags. Never fabricate or add external information. If data is missing, \
respond with I don't know or Not provided.";

const PREOP_INSTRUCTIONS: &str = "In the provided document please look for the following \
preoperative symptoms: Sudden Severe Facial Pain, Facial Numbness, Vertigo, Lacrimation, Facial \
Muscle Spasm, and Other (related to trigeminal neuralgia). In your Answer, first reason whether \
any of your findings can really be considered a preoperative symptom. Focus on the fact that it \
is only a preoperative symptom if it was already present before the FIRST surgery. Always \
consider the first surgery if the patient underwent multiple ones. Consider the symptom only if \
it is explicitly mentioned in the documents; if it is not mentioned, always assume the symptom is \
not present. After reasoning about your findings, provide a final answer in the form of bullet \
points with 'Name of the Symptom': 'Yes' or 'No' for each individual point.";

const POSTOP_INSTRUCTIONS: &str = "In the provided document, please look for the following \
postoperative complications: CSF leak, infection, facial palsy, facial numbness, and hearing \
loss. In your Answer, first reason whether any of your findings can really be considered a \
surgical complication. Focus on the fact that it is only a complication if it was not present \
before surgery and it is present afterwards. Complications, if present, are always explicitly \
mentioned in the documents; if it is not mentioned, you must assume that the complication is not \
present. Please be mindful about the fact that the surgical access area is behind the ear, \
therefore numbness in that area should NOT be considered under facial numbness. After reasoning \
about your findings, provide a final answer in the form of bullet points with 'Name of the \
Complication': 'Yes' or 'No' for each individual point. Do not use bold text.";

const COURSE_INSTRUCTIONS: &str = "In the provided document, please analyze the patient's \
disease course based on the text within <context> and determine the correct values for each of \
the following requested data points. After providing a summary of the patient's disease course, \
provide a final answer in the form of bullet points following the same structure of the data \
points below.\n\
- Any improvement of pain after first surgery (Yes/No/Not provided)\n\
- Completely free of pain after first surgery (Yes/No/Not provided)\n\
- Symptom recurrence after first surgery (Yes/No, if it is not explicitly mentioned, assume there was no recurrence)\n\
- A second surgery was carried out (Yes/No, if it is not explicitly mentioned, assume there was no second surgery)\n\
- Free of pain after second surgery (Yes/No/Not provided)\n\
- Recurrence after second surgery (Yes/No/Not provided)\n\
- Thermocoagulation was carried out (Yes/No/Not provided)";

/// Answer phrases meaning "the documents do not say".
const UNCERTAIN_TOKENS: &[&str] = &[
    "not provided",
    "i don't know",
    "don't know",
    "do not know",
    "unknown",
    "nicht angegeben",
    "unbekannt",
];

/// Everything the scheduler and normalizer need to run one extraction study.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub name: String,
    /// System instruction sent to the provider.
    pub preamble: String,
    /// The query appended after the context block.
    pub instructions: String,
    pub taxonomy: VariableTaxonomy,
    /// Extra value tokens normalized to `Answer::Unknown`. Empty disables them.
    pub uncertain_tokens: Vec<String>,
    /// Filled in for un-asserted variables before a record is stored.
    /// `None` leaves the cell empty.
    pub default_answer: Option<Answer>,
}

/// On-disk shape of a custom task (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFile {
    pub name: String,
    #[serde(default = "default_preamble")]
    pub preamble: String,
    pub instructions: String,
    pub variables: Vec<String>,
    pub rules: Vec<TaxonomyRule>,
    #[serde(default)]
    pub uncertain_tokens: Vec<String>,
    #[serde(default)]
    pub default_answer: Option<Answer>,
}

fn default_preamble() -> String {
    ASSISTANT_PREAMBLE.to_string()
}

impl TaskDefinition {
    pub fn from_task_file(file: TaskFile) -> Result<Self, TaxonomyError> {
        let taxonomy = VariableTaxonomy::new(file.variables, file.rules)?;
        Ok(Self {
            name: file.name,
            preamble: file.preamble,
            instructions: file.instructions,
            taxonomy,
            uncertain_tokens: file.uncertain_tokens,
            default_answer: file.default_answer,
        })
    }

    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let data = std::fs::read_to_string(path)?;
        let file: TaskFile = serde_json::from_str(&data)?;
        Self::from_task_file(file)
    }
}

/// The three studies shipped with the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinTask {
    PreOp,
    PostOp,
    DiseaseCourse,
}

impl BuiltinTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreOp => "preop",
            Self::PostOp => "postop",
            Self::DiseaseCourse => "disease-course",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preop" => Some(Self::PreOp),
            "postop" => Some(Self::PostOp),
            "disease-course" => Some(Self::DiseaseCourse),
            _ => None,
        }
    }

    pub fn all() -> &'static [BuiltinTask] {
        &[Self::PreOp, Self::PostOp, Self::DiseaseCourse]
    }

    pub fn definition(&self) -> Result<TaskDefinition, TaxonomyError> {
        let file = match self {
            Self::PreOp => preop(),
            Self::PostOp => postop(),
            Self::DiseaseCourse => disease_course(),
        };
        TaskDefinition::from_task_file(file)
    }
}

impl fmt::Display for BuiltinTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn preop() -> TaskFile {
    TaskFile {
        name: BuiltinTask::PreOp.as_str().into(),
        preamble: ASSISTANT_PREAMBLE.into(),
        instructions: PREOP_INSTRUCTIONS.into(),
        variables: names(&[
            "TrigeminalPain",
            "FacialNumbness",
            "Vertigo",
            "Lacrimation",
            "FacialMuscleSpasm",
            "Other",
        ]),
        rules: vec![
            TaxonomyRule::new("TrigeminalPain", &["sudden", "facial pain", "gesichtsschmerz"]),
            TaxonomyRule::new("FacialNumbness", &["facial numbness", "numbness", "taub", "hypästhes", "hypesthes"]),
            TaxonomyRule::new("Vertigo", &["vertigo", "dizz", "schwindel"]),
            TaxonomyRule::new("Lacrimation", &["lacrimation", "tear", "tränen"]),
            TaxonomyRule::new("FacialMuscleSpasm", &["spasm", "muscle", "muskel", "zucken"]),
            TaxonomyRule::new("Other", &["other", "sonstige", "andere"]),
        ],
        uncertain_tokens: names(UNCERTAIN_TOKENS),
        default_answer: Some(Answer::No),
    }
}

fn postop() -> TaskFile {
    TaskFile {
        name: BuiltinTask::PostOp.as_str().into(),
        preamble: ASSISTANT_PREAMBLE.into(),
        instructions: POSTOP_INSTRUCTIONS.into(),
        variables: names(&[
            "CSFLeak",
            "Infection",
            "FacialPalsy",
            "FacialNumbness",
            "HearingLoss",
        ]),
        rules: vec![
            TaxonomyRule::new("CSFLeak", &["leak", "liquor", "csf"]),
            TaxonomyRule::new("Infection", &["infection", "infektion"]),
            TaxonomyRule::new("FacialPalsy", &["facial palsy", "palsy", "gesichtslähmung", "fazialisparese"]),
            TaxonomyRule::new("FacialNumbness", &["facial numbness", "numbness", "taub"]),
            TaxonomyRule::new("HearingLoss", &["hearing loss", "hörverlust", "hörminderung"]),
        ],
        uncertain_tokens: names(UNCERTAIN_TOKENS),
        default_answer: Some(Answer::No),
    }
}

fn disease_course() -> TaskFile {
    TaskFile {
        name: BuiltinTask::DiseaseCourse.as_str().into(),
        preamble: COURSE_PREAMBLE.into(),
        instructions: COURSE_INSTRUCTIONS.into(),
        variables: names(&[
            "ImprovementAfterFirstSurgery",
            "PainFreeAfterFirstSurgery",
            "RecurrenceAfterFirstSurgery",
            "SecondSurgery",
            "PainFreeAfterSecondSurgery",
            "RecurrenceAfterSecondSurgery",
            "Thermocoagulation",
        ]),
        // Second-surgery outcomes are listed first: their labels also contain
        // "second surgery" and would otherwise land on SecondSurgery.
        rules: vec![
            TaxonomyRule::new(
                "PainFreeAfterSecondSurgery",
                &[
                    "free of pain after second",
                    "free of pain after 2",
                    "painfree after second",
                    "painfree after 2",
                    "pain-free after second",
                    "pain free after second",
                    "schmerzfrei nach der zweiten",
                ],
            ),
            TaxonomyRule::new(
                "RecurrenceAfterSecondSurgery",
                &["recurrence after second", "recurrence after 2", "rezidiv nach der zweiten"],
            ),
            TaxonomyRule::new("ImprovementAfterFirstSurgery", &["improvement", "betterment", "besserung"]),
            TaxonomyRule::new(
                "PainFreeAfterFirstSurgery",
                &[
                    "free of pain after first",
                    "free of pain after 1",
                    "painfree after first",
                    "painfree after 1",
                    "pain-free after first",
                    "pain free after first",
                    "schmerzfrei",
                ],
            ),
            TaxonomyRule::new(
                "RecurrenceAfterFirstSurgery",
                &["recurrence after first", "recurrence after 1", "rezidiv"],
            ),
            TaxonomyRule::new(
                "SecondSurgery",
                &["second surgery", "2nd surgery", "2. surgery", "zweite operation", "reoperation"],
            ),
            TaxonomyRule::new("Thermocoagulation", &["thermocoag", "coagulation", "thermokoag"]),
        ],
        uncertain_tokens: names(UNCERTAIN_TOKENS),
        default_answer: None,
    }
}
