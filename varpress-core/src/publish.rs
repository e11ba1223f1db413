//! High-level pipeline: reconciles the grouped ledger into remote resources.
//!
//! Walks the desired course → module → variant hierarchy and drives the
//! [`LmsApi`] capability to make the remote side match:
//!   - Courses are idempotent: looked up by idnumber before creation, so
//!     re-running against the same ledger never duplicates a course.
//!   - Pages are append-only: they have no externally visible identifier to
//!     look up, so every pass that reaches page creation creates. Re-running
//!     the publish step duplicates pages; the report is the audit trail.
//!   - Missing variant files are skipped with a warning and recorded; one
//!     lost artifact does not abort the batch.
//!
//! All other failures (transport, domain rejection, unreadable file) abort
//! the run immediately. There are no retries.
//!
//! # Callable From
//! - The CLI crate with a concrete LMS client, and integration tests with a
//!   `MockLmsApi`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::contract::{LmsApi, LmsError, NewCourse, NewPage};
use crate::ledger::{CourseGroup, ModuleGroup};
use crate::markup::{markdown_to_html, page_title, strip_front_matter};

/// Category id that exists on every fresh install of the target LMS.
pub const DEFAULT_CATEGORY_ID: i64 = 1;

/// Remote shortnames are length-limited.
const SHORTNAME_MAX: usize = 100;

/// Settings for one publish run.
#[derive(Debug)]
pub struct PublishOptions {
    /// Directory that ledger-relative paths (`output_file`, `module_path`)
    /// resolve against.
    pub ledger_root: PathBuf,
    /// Course section new pages land in.
    pub section: i64,
    pub category_id: i64,
}

impl PublishOptions {
    pub fn new(ledger_root: PathBuf) -> Self {
        PublishOptions {
            ledger_root,
            section: 0,
            category_id: DEFAULT_CATEGORY_ID,
        }
    }
}

/// What one publish run did, course by course.
#[derive(Debug)]
pub struct PublishReport {
    pub courses: Vec<CourseReport>,
}

#[derive(Debug)]
pub struct CourseReport {
    pub course_id: String,
    /// LMS-internal id the course resolved to.
    pub remote_id: i64,
    /// Whether this run created the course or found it already present.
    pub created: bool,
    /// Titles of the pages created, in creation order.
    pub pages: Vec<String>,
    /// `output_file` values whose variant files were missing on disk.
    pub skipped: Vec<String>,
}

/// Return the LMS-internal id for a course, creating it if absent.
///
/// Lookup runs against the externally visible idnumber, the idempotency
/// key: on a hit no creation call is issued and the existing id is returned
/// unchanged. Safe to repeat across runs.
pub async fn ensure_course<A: LmsApi>(
    api: &A,
    course_id: &str,
    title: &str,
    category_id: i64,
) -> Result<(i64, bool), LmsError> {
    if let Some(existing) = api.find_course_by_idnumber(course_id).await? {
        info!(
            course_id,
            remote_id = existing.id,
            "Course already exists"
        );
        return Ok((existing.id, false));
    }

    let shortname: String = course_id.chars().take(SHORTNAME_MAX).collect();
    let created = api
        .create_course(NewCourse {
            fullname: title,
            shortname: &shortname,
            idnumber: course_id,
            category_id,
        })
        .await?;
    info!(course_id, remote_id = created.id, "Created course");
    Ok((created.id, true))
}

/// Publish every grouped course in ledger order.
pub async fn publish<A: LmsApi>(
    api: &A,
    groups: &[CourseGroup],
    opts: &PublishOptions,
) -> Result<PublishReport, LmsError> {
    let mut courses = Vec::new();

    for group in groups {
        println!("Course: {} ({})", group.title, group.course_id);
        let (remote_id, created) =
            ensure_course(api, &group.course_id, &group.title, opts.category_id).await?;

        let mut report = CourseReport {
            course_id: group.course_id.clone(),
            remote_id,
            created,
            pages: Vec::new(),
            skipped: Vec::new(),
        };

        for module in &group.modules {
            publish_module(api, module, remote_id, opts, &mut report).await?;
        }

        courses.push(report);
    }

    Ok(PublishReport { courses })
}

/// Create one page per variant of a module, in ledger (generation) order.
async fn publish_module<A: LmsApi>(
    api: &A,
    module: &ModuleGroup,
    remote_course_id: i64,
    opts: &PublishOptions,
    report: &mut CourseReport,
) -> Result<(), LmsError> {
    let title = module_title(&opts.ledger_root, module);
    println!(
        "  Module: {} ({} variants)",
        title,
        module.entries.len()
    );

    for entry in &module.entries {
        let variant_path = opts.ledger_root.join(&entry.output_file);
        if !variant_path.exists() {
            warn!(path = %variant_path.display(), "Variant file not found, skipping");
            println!("    [!] Variant file not found, skipping: {}", variant_path.display());
            report.skipped.push(entry.output_file.clone());
            continue;
        }

        let raw = fs::read_to_string(&variant_path)?;
        let body = strip_front_matter(&raw);
        let html = markdown_to_html(body);
        let page_name = page_title(&title, &entry.audience, &entry.locale);

        api.create_page(NewPage {
            course_id: remote_course_id,
            section: opts.section,
            title: &page_name,
            html: &html,
        })
        .await?;
        info!(page = %page_name, course = remote_course_id, "Created page");
        println!("    + Uploaded: {page_name}");
        report.pages.push(page_name);
    }

    Ok(())
}

/// Resolve a human-readable module title from the module's own metadata
/// file, falling back to the raw module id when the file or field is absent.
fn module_title(ledger_root: &Path, module: &ModuleGroup) -> String {
    if let Some(first) = module.entries.first() {
        let meta_path = ledger_root.join(&first.module_path).join("metadata.yaml");
        if let Ok(text) = fs::read_to_string(&meta_path) {
            if let Ok(meta) = serde_yaml::from_str::<serde_yaml::Value>(&text) {
                if let Some(title) = meta.get("title").and_then(|t| t.as_str()) {
                    return title.to_string();
                }
            }
        }
    }
    module.module_id.clone()
}
