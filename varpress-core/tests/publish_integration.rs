use std::fs;

use tempfile::tempdir;

use varpress_core::contract::{
    MockLmsApi, NewCourse, NewPage, RemoteCourse,
};
use varpress_core::ledger::{group_by_course, LedgerEntry};
use varpress_core::publish::{ensure_course, publish, PublishOptions, DEFAULT_CATEGORY_ID};

fn entry(course: Option<&str>, module: &str, audience: &str, locale: &str) -> LedgerEntry {
    LedgerEntry {
        module_id: module.to_string(),
        module_path: format!("modules/{module}"),
        course_id: course.map(|c| c.to_string()),
        audience: audience.to_string(),
        locale: locale.to_string(),
        output_file: format!("variants/{module}/{audience}-{locale}.md"),
        generated_at: "2026-01-01T00:00:00Z".to_string(),
        model: None,
        input_tokens: None,
        output_tokens: None,
    }
}

fn remote(id: i64, idnumber: &str) -> RemoteCourse {
    RemoteCourse {
        id,
        fullname: format!("Course {idnumber}"),
        idnumber: idnumber.to_string(),
    }
}

#[tokio::test]
async fn ensure_course_returns_existing_id_without_creating() {
    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .withf(|id: &str| id == "c1")
        .return_once(|id: &str| Ok(Some(remote(42, id))));
    api.expect_create_course().times(0);

    let (id, created) = ensure_course(&api, "c1", "Course C1", DEFAULT_CATEGORY_ID)
        .await
        .expect("ensure_course should succeed");
    assert_eq!(id, 42);
    assert!(!created);
}

#[tokio::test]
async fn ensure_course_creates_exactly_once_when_absent() {
    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .return_once(|_| Ok(None));
    api.expect_create_course()
        .times(1)
        .withf(|req: &NewCourse<'_>| {
            req.idnumber == "c1" && req.fullname == "Course C1" && req.category_id == 1
        })
        .returning(|req: NewCourse<'_>| Ok(remote(7, req.idnumber)));

    let (id, created) = ensure_course(&api, "c1", "Course C1", DEFAULT_CATEGORY_ID)
        .await
        .expect("ensure_course should succeed");
    assert_eq!(id, 7);
    assert!(created);
}

#[tokio::test]
async fn ensure_course_truncates_long_shortnames() {
    let long_id = "x".repeat(250);
    let expected = long_id.clone();

    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .return_once(|_| Ok(None));
    api.expect_create_course()
        .withf(move |req: &NewCourse<'_>| {
            req.shortname.len() == 100 && req.idnumber == expected
        })
        .returning(|req: NewCourse<'_>| Ok(remote(9, req.idnumber)));

    ensure_course(&api, &long_id, "Long", DEFAULT_CATEGORY_ID)
        .await
        .expect("ensure_course should succeed");
}

#[tokio::test]
async fn publish_creates_course_then_page_for_single_entry() {
    // End-to-end shape: one ledger entry, course absent remotely, expect one
    // course creation with the idnumber and one page whose title carries the
    // audience/locale pair.
    let root = tempdir().unwrap();
    let variant = root.path().join("variants/m1/developer-en-US.md");
    fs::create_dir_all(variant.parent().unwrap()).unwrap();
    fs::write(&variant, "---\nid: m1\n---\n\n# Adapted\n\nBody text.").unwrap();

    let groups = group_by_course(&[entry(Some("c1"), "m1", "developer", "en-US")]);

    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .withf(|id: &str| id == "c1")
        .return_once(|_| Ok(None));
    api.expect_create_course()
        .times(1)
        .withf(|req: &NewCourse<'_>| req.idnumber == "c1")
        .returning(|req: NewCourse<'_>| Ok(remote(11, req.idnumber)));
    api.expect_create_page()
        .times(1)
        .withf(|req: &NewPage<'_>| {
            req.course_id == 11
                && req.title.contains("developer / en-US")
                && req.html.contains("<h1>Adapted</h1>")
                && !req.html.contains("id: m1")
        })
        .returning(|_| Ok(()));

    let opts = PublishOptions::new(root.path().to_path_buf());
    let report = publish(&api, &groups, &opts).await.expect("publish should succeed");

    assert_eq!(report.courses.len(), 1);
    assert!(report.courses[0].created);
    assert_eq!(report.courses[0].remote_id, 11);
    assert_eq!(report.courses[0].pages.len(), 1);
    assert!(report.courses[0].skipped.is_empty());
}

#[tokio::test]
async fn publish_skips_missing_variant_files_and_continues() {
    let root = tempdir().unwrap();
    let present = root.path().join("variants/m1/executive-en-US.md");
    fs::create_dir_all(present.parent().unwrap()).unwrap();
    fs::write(&present, "# Exec view\n").unwrap();
    // The developer variant is never written to disk.

    let groups = group_by_course(&[
        entry(Some("c1"), "m1", "developer", "en-US"),
        entry(Some("c1"), "m1", "executive", "en-US"),
    ]);

    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .return_once(|id: &str| Ok(Some(remote(3, id))));
    api.expect_create_page()
        .times(1)
        .withf(|req: &NewPage<'_>| req.title.contains("executive / en-US"))
        .returning(|_| Ok(()));

    let opts = PublishOptions::new(root.path().to_path_buf());
    let report = publish(&api, &groups, &opts).await.expect("publish should succeed");

    let course = &report.courses[0];
    assert_eq!(course.pages.len(), 1);
    assert_eq!(course.skipped, vec!["variants/m1/developer-en-US.md"]);
}

#[tokio::test]
async fn publish_with_no_groups_issues_no_calls() {
    let api = MockLmsApi::new();
    let opts = PublishOptions::new(std::path::PathBuf::from("."));
    let report = publish(&api, &[], &opts).await.expect("empty publish should succeed");
    assert!(report.courses.is_empty());
}

#[tokio::test]
async fn publish_resolves_module_title_from_metadata() {
    let root = tempdir().unwrap();
    let module_dir = root.path().join("modules/m1");
    fs::create_dir_all(&module_dir).unwrap();
    fs::write(module_dir.join("metadata.yaml"), "id: m1\ntitle: Core Concepts\n").unwrap();
    let variant = root.path().join("variants/m1/developer-en-US.md");
    fs::create_dir_all(variant.parent().unwrap()).unwrap();
    fs::write(&variant, "Body").unwrap();

    let groups = group_by_course(&[entry(Some("c1"), "m1", "developer", "en-US")]);

    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .return_once(|id: &str| Ok(Some(remote(5, id))));
    api.expect_create_page()
        .withf(|req: &NewPage<'_>| req.title == "Core Concepts [developer / en-US]")
        .returning(|_| Ok(()));

    let opts = PublishOptions::new(root.path().to_path_buf());
    publish(&api, &groups, &opts).await.expect("publish should succeed");
}

#[tokio::test]
async fn publish_keeps_ledger_order_across_variants() {
    let root = tempdir().unwrap();
    for name in ["executive-en-US", "developer-en-US"] {
        let path = root.path().join(format!("variants/m1/{name}.md"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "Body").unwrap();
    }

    // Executive was generated first; it must publish first.
    let groups = group_by_course(&[
        entry(Some("c1"), "m1", "executive", "en-US"),
        entry(Some("c1"), "m1", "developer", "en-US"),
    ]);

    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .return_once(|id: &str| Ok(Some(remote(5, id))));
    api.expect_create_page().times(2).returning(|_| Ok(()));

    let opts = PublishOptions::new(root.path().to_path_buf());
    let report = publish(&api, &groups, &opts).await.expect("publish should succeed");
    let titles = &report.courses[0].pages;
    assert!(titles[0].contains("executive"));
    assert!(titles[1].contains("developer"));
}

#[tokio::test]
async fn publish_aborts_on_page_creation_failure() {
    let root = tempdir().unwrap();
    let variant = root.path().join("variants/m1/developer-en-US.md");
    fs::create_dir_all(variant.parent().unwrap()).unwrap();
    fs::write(&variant, "Body").unwrap();

    let groups = group_by_course(&[entry(Some("c1"), "m1", "developer", "en-US")]);

    let mut api = MockLmsApi::new();
    api.expect_find_course_by_idnumber()
        .return_once(|id: &str| Ok(Some(remote(5, id))));
    api.expect_create_page()
        .returning(|_| Err("Moodle API error [mod_page]: invalid sesskey".into()));

    let opts = PublishOptions::new(root.path().to_path_buf());
    let result = publish(&api, &groups, &opts).await;
    assert!(result.is_err(), "domain failure must abort the run");
}
