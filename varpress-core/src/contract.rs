//! # contract: capability interfaces for the LMS boundary
//!
//! This module defines the traits the publishing pipeline depends on, plus
//! the plain request/response types they exchange. The pipeline never talks
//! HTTP directly; it calls [`LmsApi`] for remote lookups and creations and
//! [`Provisioner`] for first-time credential bootstrap, so a different LMS
//! (or a mock in tests) can be wired in without touching the reconciler.
//!
//! ## Interface & Extensibility
//! - Implement [`LmsApi`] to target a concrete LMS. The reconciler does not
//!   branch on transport: course lookup/creation may ride a token-bearing
//!   REST surface while page creation rides a scraped browser session, and
//!   that split stays inside the implementor.
//! - Implement [`Provisioner`] for the privileged bootstrap channel. A
//!   remote system that never needs bootstrap can supply a no-op.
//! - All methods are async and return boxed error trait objects.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Uniform boxed error for all LMS-boundary calls.
pub type LmsError = Box<dyn std::error::Error + Send + Sync>;

/// The minimum data needed to create a remote course.
pub struct NewCourse<'a> {
    /// Human-readable course title.
    pub fullname: &'a str,
    /// Short identifier shown in course listings (length-limited remotely).
    pub shortname: &'a str,
    /// Externally visible idempotency key; lookups run against this field.
    pub idnumber: &'a str,
    /// Category the course is filed under.
    pub category_id: i64,
}

/// A course as it exists remotely.
#[derive(Debug, Clone)]
pub struct RemoteCourse {
    /// The LMS-internal numeric id.
    pub id: i64,
    pub fullname: String,
    /// The idempotency key the course was created with.
    pub idnumber: String,
}

/// The minimum data needed to create a page resource inside a course.
///
/// Pages have no externally visible identifier, so there is no corresponding
/// lookup: creation is append-only by construction.
pub struct NewPage<'a> {
    /// LMS-internal id of the course the page belongs to.
    pub course_id: i64,
    /// Course section the page lands in.
    pub section: i64,
    /// Display title of the page.
    pub title: &'a str,
    /// Rendered HTML body.
    pub html: &'a str,
}

/// Site metadata returned by the token-validation call.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub sitename: String,
    pub release: String,
}

/// Capability interface for the remote LMS.
///
/// One implementor per target system. Course operations are idempotent-safe
/// (lookup before create); page creation is not and always creates.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LmsApi: Send + Sync {
    /// Look up a course by its externally visible idnumber.
    ///
    /// Returns `Ok(None)` when no course carries that idnumber; errors are
    /// reserved for transport or domain failures.
    async fn find_course_by_idnumber(
        &self,
        idnumber: &str,
    ) -> Result<Option<RemoteCourse>, LmsError>;

    /// Create a new course. The returned course echoes the assigned id.
    async fn create_course<'a>(&self, req: NewCourse<'a>) -> Result<RemoteCourse, LmsError>;

    /// Create a page resource inside an existing course.
    async fn create_page<'a>(&self, req: NewPage<'a>) -> Result<(), LmsError>;

    /// Fetch site metadata; used to validate a token before publishing.
    async fn site_info(&self) -> Result<SiteInfo, LmsError>;
}

/// Capability interface for first-time credential bootstrap.
///
/// The target LMS cannot enable its own web-service surface over HTTP, so
/// minting runs through a privileged execution channel. Implementors that
/// target an already-provisioned system can make both methods no-ops.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Block until the LMS answers on its login page, or fail after a
    /// bounded wait. First-run initialisation can take minutes.
    async fn wait_until_ready(&self) -> Result<(), LmsError>;

    /// Mint a fresh API token, replacing any previous service definition
    /// registered under the same shortname.
    async fn mint_token(&self) -> Result<String, LmsError>;
}
