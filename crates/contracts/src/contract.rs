//! Contract file model (ground: `contracts.py::Contracts`).

use std::path::{Path, PathBuf};

use regex::Regex;

fn pending_regex() -> Regex {
    Regex::new(r"(?m)^pending\s*$").expect("static regex")
}

fn title_regex() -> Regex {
    Regex::new(r"(?m)^# (.+)$").expect("static regex")
}

/// A parsed contract file.
#[derive(Debug, Clone)]
pub struct Contract {
    pub path: PathBuf,
    pub title: String,
    pub body: String,
}

impl Contract {
    /// Load and parse a contract file from disk.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        let title = parse_title(&body);
        Ok(Self {
            path: path.to_path_buf(),
            title,
            body,
        })
    }

    pub fn is_pending(&self) -> bool {
        pending_regex().is_match(&self.body)
    }

    /// The prompt handed to the sub-agent (ground:
    /// `Contracts.execute`'s `f"Contract file: {path.resolve()}\n\n{text}"`).
    pub fn prompt(&self) -> String {
        format!("Contract file: {}\n\n{}", self.path.display(), self.body)
    }
}

/// Title is the first `# …` heading, else the first non-blank line, else
/// `"empty"` (ground: `Contracts._parse_title`).
fn parse_title(text: &str) -> String {
    if let Some(captures) = title_regex().captures(text) {
        return captures[1].trim().to_string();
    }
    for line in text.lines() {
        if !line.trim().is_empty() {
            return line.trim().to_string();
        }
    }
    "empty".to_string()
}

/// Sorted list of pending contract files under `contracts_dir` (ground:
/// `Contracts._find_pending`). Absent directory yields an empty list.
pub fn find_pending(contracts_dir: &Path) -> std::io::Result<Vec<Contract>> {
    if !contracts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(contracts_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    let mut pending = Vec::new();
    for path in paths {
        let contract = Contract::load(&path)?;
        if contract.is_pending() {
            pending.push(contract);
        }
    }
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_heading() {
        assert_eq!(parse_title("# My Title\npending\n"), "My Title");
    }

    #[test]
    fn title_falls_back_to_first_nonblank_line() {
        assert_eq!(parse_title("\n\nFirst real line\nmore\n"), "First real line");
    }

    #[test]
    fn title_falls_back_to_empty_label() {
        assert_eq!(parse_title("\n\n   \n"), "empty");
    }

    #[test]
    fn pending_requires_standalone_line() {
        let body = "# Title\npending\nDo the thing.\n";
        let contract = Contract {
            path: PathBuf::from("x.md"),
            title: "Title".to_string(),
            body: body.to_string(),
        };
        assert!(contract.is_pending());
    }

    #[test]
    fn pending_false_when_word_embedded() {
        let body = "# Title\nstatus: pending review\n";
        let contract = Contract {
            path: PathBuf::from("x.md"),
            title: "Title".to_string(),
            body: body.to_string(),
        };
        assert!(!contract.is_pending());
    }

    #[test]
    fn find_pending_returns_empty_for_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("contracts");
        let result = find_pending(&missing).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn find_pending_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let contracts = dir.path().join("contracts");
        std::fs::create_dir_all(&contracts).unwrap();
        std::fs::write(contracts.join("b.md"), "# B\npending\n").unwrap();
        std::fs::write(contracts.join("a.md"), "# A\npending\n").unwrap();
        std::fs::write(contracts.join("c.md"), "# C\ndone\n").unwrap();

        let pending = find_pending(&contracts).unwrap();
        let titles: Vec<_> = pending.iter().map(|c| c.title.clone()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }
}
