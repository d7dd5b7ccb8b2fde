//! Case loading from a folder tree: one sub-directory per case, plain-text
//! notes inside.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::CaseSourceError;
use super::types::Case;

/// Which parts of a case's notes go into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionSelection {
    #[default]
    All,
    /// Keep lines containing any of these headings (case-insensitive), each
    /// followed by the next line when it is not blank.
    Headings(Vec<String>),
}

/// Load every case under `input_dir`, sorted by directory name.
pub fn load_cases(
    input_dir: &Path,
    limit: Option<usize>,
    sections: &SectionSelection,
) -> Result<Vec<Case>, CaseSourceError> {
    if !input_dir.is_dir() {
        return Err(CaseSourceError::NotADirectory(input_dir.to_path_buf()));
    }

    let mut case_dirs: Vec<PathBuf> = read_dir_sorted(input_dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    if let Some(limit) = limit {
        case_dirs.truncate(limit);
    }

    let mut cases = Vec::with_capacity(case_dirs.len());
    for dir in case_dirs {
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let notes = read_case_notes(&dir)?;
        let context = select_sections(&notes, sections);
        tracing::debug!(case_id = %id, context_len = context.len(), "Case loaded");
        cases.push(Case::new(id, context));
    }

    Ok(cases)
}

/// Concatenate the `.txt` files of one case directory in name order.
fn read_case_notes(dir: &Path) -> Result<String, CaseSourceError> {
    let mut parts = Vec::new();
    for path in read_dir_sorted(dir)? {
        let is_text = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if !path.is_file() || !is_text {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|source| CaseSourceError::Io {
            path: path.clone(),
            source,
        })?;
        parts.push(collapse_blank_lines(&text));
    }
    Ok(parts.join("\n"))
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, CaseSourceError> {
    let io_err = |source| CaseSourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    paths.sort();
    Ok(paths)
}

/// Drop blank lines so paragraphs sit on consecutive lines.
fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply the section selection to a case's notes.
pub fn select_sections(text: &str, selection: &SectionSelection) -> String {
    let headings = match selection {
        SectionSelection::All => return text.to_string(),
        SectionSelection::Headings(headings) => headings
            .iter()
            .map(|h| h.to_lowercase())
            .collect::<Vec<_>>(),
    };

    let lines: Vec<&str> = text.split('\n').collect();
    let mut kept = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if headings.iter().any(|h| lower.contains(h.as_str())) {
            kept.push(*line);
            if let Some(next) = lines.get(i + 1) {
                if !next.trim().is_empty() {
                    kept.push(*next);
                }
            }
        }
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_case(root: &Path, id: &str, files: &[(&str, &str)]) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        for (name, body) in files {
            fs::write(dir.join(name), body).unwrap();
        }
    }

    #[test]
    fn cases_sorted_and_limited() {
        let tmp = tempfile::tempdir().unwrap();
        write_case(tmp.path(), "C3", &[("a.txt", "three")]);
        write_case(tmp.path(), "C1", &[("a.txt", "one")]);
        write_case(tmp.path(), "C2", &[("a.txt", "two")]);
        fs::write(tmp.path().join("stray.txt"), "not a case").unwrap();

        let cases = load_cases(tmp.path(), Some(2), &SectionSelection::All).unwrap();
        let ids: Vec<_> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["C1", "C2"]);
        assert_eq!(cases[0].context, "one");
    }

    #[test]
    fn text_files_joined_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_case(
            tmp.path(),
            "C1",
            &[
                ("b_report.txt", "Second\n\n\nreport"),
                ("a_letter.txt", "First letter"),
                ("scan.pdf", "binary"),
            ],
        );
        let cases = load_cases(tmp.path(), None, &SectionSelection::All).unwrap();
        assert_eq!(cases[0].context, "First letter\nSecond\nreport");
    }

    #[test]
    fn empty_case_directory_gives_empty_context() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("C9")).unwrap();
        let cases = load_cases(tmp.path(), None, &SectionSelection::All).unwrap();
        assert_eq!(cases, vec![Case::new("C9", "")]);
    }

    #[test]
    fn missing_input_dir_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_cases(&tmp.path().join("nope"), None, &SectionSelection::All).unwrap_err();
        assert!(matches!(err, CaseSourceError::NotADirectory(_)));
    }

    #[test]
    fn headings_keep_heading_and_next_line() {
        let text = "Anamnese\nPatient reports vertigo.\nDiagnose\nVestibular schwannoma\nProcedere\nMRI in 6 months";
        let selection = SectionSelection::Headings(vec!["anamnese".into(), "PROCEDERE".into()]);
        assert_eq!(
            select_sections(text, &selection),
            "Anamnese\nPatient reports vertigo.\nProcedere\nMRI in 6 months"
        );
    }

    #[test]
    fn heading_followed_by_blank_line_kept_alone() {
        let text = "Befund\n\nunrelated";
        let selection = SectionSelection::Headings(vec!["Befund".into()]);
        assert_eq!(select_sections(text, &selection), "Befund");
    }

    #[test]
    fn all_keeps_everything() {
        let text = "a\nb\nc";
        assert_eq!(select_sections(text, &SectionSelection::All), text);
    }

    #[test]
    fn selection_deserializes() {
        let all: SectionSelection = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, SectionSelection::All);
        let some: SectionSelection =
            serde_json::from_str(r#"{"headings":["Anamnese"]}"#).unwrap();
        assert_eq!(some, SectionSelection::Headings(vec!["Anamnese".into()]));
    }
}
