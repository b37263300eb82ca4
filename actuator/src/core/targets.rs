//! Lexical justfile target scanning and task-class validation rules.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Coarse classification of the work a build validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskClass {
    /// Application code: build, test, and lint targets are all required.
    Application,
    /// Operations work: only a build target is required.
    Operations,
}

impl TaskClass {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "application" => Some(Self::Application),
            "operations" => Some(Self::Operations),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Operations => "operations",
        }
    }

    pub fn required_targets(self) -> &'static [&'static str] {
        match self {
            Self::Application => &["build", "test", "lint"],
            Self::Operations => &["build"],
        }
    }
}

/// A valid recipe name.
static RECIPE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("recipe name pattern"));

/// Recipe names declared in a justfile, lexically.
///
/// A declaration is a column-zero line whose first unquoted-looking `:` is
/// not part of a `:=` assignment; the recipe name is the first token before
/// that colon. Indented lines are recipe bodies; comments, `set`/`export`
/// directives and variable assignments are skipped. No evaluation of the
/// file is performed.
pub fn scan_targets(contents: &str) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    for line in contents.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.starts_with("set ") || trimmed.starts_with("import ") || trimmed.starts_with("export ") {
            continue;
        }
        let Some(idx) = trimmed.find(':') else {
            continue;
        };
        if trimmed[idx + 1..].starts_with('=') {
            continue;
        }
        let Some(name) = trimmed[..idx].split_whitespace().next() else {
            continue;
        };
        if RECIPE_NAME.is_match(name) {
            targets.insert(name.to_string());
        }
    }
    targets
}

/// Targets required by `class` but not declared.
pub fn missing_targets(declared: &BTreeSet<String>, class: TaskClass) -> Vec<String> {
    class
        .required_targets()
        .iter()
        .filter(|target| !declared.contains(**target))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUSTFILE: &str = r#"set shell := ["bash", "-eu", "-o", "pipefail", "-c"]

# build the whole workspace
build:
  cargo build

version := "1.0"

ci: build
  @echo done

lint:
  cargo clippy
"#;

    #[test]
    fn scans_recipe_declarations_only() {
        let targets = scan_targets(JUSTFILE);
        let names: Vec<&str> = targets.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["build", "ci", "lint"]);
    }

    #[test]
    fn skips_indented_bodies_and_assignments() {
        let targets = scan_targets(JUSTFILE);
        assert!(!targets.contains("cargo"));
        assert!(!targets.contains("version"));
        assert!(!targets.contains("set"));
    }

    #[test]
    fn recipe_with_parameters_is_detected() {
        let targets = scan_targets("test filter='':\n  cargo test {{filter}}\n");
        assert!(targets.contains("test"));
    }

    #[test]
    fn application_class_reports_every_missing_target() {
        let declared = scan_targets("build:\n  cargo build\n");
        assert_eq!(
            missing_targets(&declared, TaskClass::Application),
            vec!["test".to_string(), "lint".to_string()]
        );
    }

    #[test]
    fn application_class_reports_single_missing_target() {
        let declared = scan_targets("build:\n  true\nlint:\n  true\n");
        assert_eq!(
            missing_targets(&declared, TaskClass::Application),
            vec!["test".to_string()]
        );
    }

    #[test]
    fn operations_class_requires_only_build() {
        let declared = scan_targets("build:\n  true\n");
        assert!(missing_targets(&declared, TaskClass::Operations).is_empty());
    }

    #[test]
    fn parse_round_trips_class_names() {
        assert_eq!(TaskClass::parse("application"), Some(TaskClass::Application));
        assert_eq!(TaskClass::parse("operations"), Some(TaskClass::Operations));
        assert_eq!(TaskClass::parse("other"), None);
    }
}
