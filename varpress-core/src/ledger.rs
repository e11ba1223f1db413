//! Generation ledger: the append-only record of generated variants.
//!
//! The ledger is a single YAML sequence on disk. Insertion order is
//! generation order and is preserved everywhere: appends rewrite the whole
//! file with one entry added, and grouping keeps first-seen ordering for
//! courses and for modules within a course. The publish pipeline only ever
//! reads it; mutation happens at generation time.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Course key used when a ledger entry carries no course id.
///
/// Generation currently never sets one, so in practice every run groups
/// under this key unless the caller pre-filters with an explicit course id.
pub const FALLBACK_COURSE_ID: &str = "varpress-preview";

/// One generated variant, as recorded at generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub module_id: String,
    pub module_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    pub audience: String,
    pub locale: String,
    /// Variant file path, relative to the ledger root directory.
    pub output_file: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}

/// Errors from reading or appending the ledger file.
#[derive(Debug)]
pub enum LedgerError {
    /// The ledger file does not exist; generation has to run first.
    Missing(PathBuf),
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Missing(path) => write!(f, "no ledger found at {}", path.display()),
            LedgerError::Io(e) => write!(f, "ledger io error: {e}"),
            LedgerError::Yaml(e) => write!(f, "ledger parse error: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Io(e)
    }
}

impl From<serde_yaml::Error> for LedgerError {
    fn from(e: serde_yaml::Error) -> Self {
        LedgerError::Yaml(e)
    }
}

/// Load the whole ledger in insertion order.
///
/// A missing file is a distinct error so callers can print remediation
/// guidance. An empty or null-parsed file is an empty sequence, not an
/// error: there is simply nothing to publish.
pub fn load(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
    if !path.exists() {
        return Err(LedgerError::Missing(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        info!(ledger = %path.display(), "Ledger file is empty");
        return Ok(Vec::new());
    }
    let entries: Option<Vec<LedgerEntry>> = serde_yaml::from_str(&text)?;
    let entries = entries.unwrap_or_default();
    info!(ledger = %path.display(), entries = entries.len(), "Loaded ledger");
    Ok(entries)
}

/// Append one entry, preserving forward-append semantics: read the whole
/// sequence, push one, rewrite the whole file.
pub fn append(path: &Path, entry: LedgerEntry) -> Result<(), LedgerError> {
    let mut entries = if path.exists() {
        load(path)?
    } else {
        Vec::new()
    };
    entries.push(entry);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let text = serde_yaml::to_string(&entries)?;
    fs::write(path, text)?;
    debug!(ledger = %path.display(), entries = entries.len(), "Appended ledger entry");
    Ok(())
}

/// Desired state for one course: a title and the modules grouped under it.
#[derive(Debug, Clone)]
pub struct CourseGroup {
    pub course_id: String,
    pub title: String,
    pub modules: Vec<ModuleGroup>,
}

/// The ordered variants recorded for one module.
#[derive(Debug, Clone)]
pub struct ModuleGroup {
    pub module_id: String,
    pub entries: Vec<LedgerEntry>,
}

/// Group flat ledger entries into the course → module → variants hierarchy.
///
/// Single pass, stable: courses appear in first-seen order, modules within a
/// course in first-seen order, variants in ledger (generation) order.
pub fn group_by_course(entries: &[LedgerEntry]) -> Vec<CourseGroup> {
    let mut courses: Vec<CourseGroup> = Vec::new();
    for entry in entries {
        let course_id = entry
            .course_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| FALLBACK_COURSE_ID.to_string());
        let idx = match courses.iter().position(|c| c.course_id == course_id) {
            Some(i) => i,
            None => {
                courses.push(CourseGroup {
                    title: display_title(&course_id),
                    course_id,
                    modules: Vec::new(),
                });
                courses.len() - 1
            }
        };
        let course = &mut courses[idx];
        let module_id = if entry.module_id.is_empty() {
            entry.module_path.clone()
        } else {
            entry.module_id.clone()
        };
        match course.modules.iter_mut().find(|m| m.module_id == module_id) {
            Some(module) => module.entries.push(entry.clone()),
            None => course.modules.push(ModuleGroup {
                module_id,
                entries: vec![entry.clone()],
            }),
        }
    }
    courses
}

/// Derive a display title from a course key: separators become spaces and
/// each word is capitalised, e.g. `prompt-engineering` → `Prompt Engineering`.
pub fn display_title(course_id: &str) -> String {
    course_id
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
