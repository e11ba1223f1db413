//! Moodle implementation of the [`LmsApi`] capability.
//!
//! Courses ride the token-bearing REST surface; pages ride the scraped
//! browser session, because Moodle's web services expose no function for
//! creating Page resources. The split stays inside this module; the
//! publishing pipeline never branches on transport.

use async_trait::async_trait;
use serde_json::Value;

use varpress_core::contract::{LmsApi, LmsError, NewCourse, NewPage, RemoteCourse, SiteInfo};

use crate::rest::MoodleRest;
use crate::session::MoodleSession;

pub struct MoodleClient {
    rest: MoodleRest,
    session: MoodleSession,
}

impl MoodleClient {
    pub fn new(rest: MoodleRest, session: MoodleSession) -> Self {
        MoodleClient { rest, session }
    }
}

#[async_trait]
impl LmsApi for MoodleClient {
    async fn find_course_by_idnumber(
        &self,
        idnumber: &str,
    ) -> Result<Option<RemoteCourse>, LmsError> {
        let data = self
            .rest
            .call(
                "core_course_get_courses_by_field",
                &[
                    ("field", "idnumber".to_string()),
                    ("value", idnumber.to_string()),
                ],
            )
            .await?;
        match data
            .get("courses")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        {
            Some(course) => Ok(Some(parse_course(course)?)),
            None => Ok(None),
        }
    }

    async fn create_course<'a>(&self, req: NewCourse<'a>) -> Result<RemoteCourse, LmsError> {
        let params = [
            ("courses[0][fullname]", req.fullname.to_string()),
            ("courses[0][shortname]", req.shortname.to_string()),
            ("courses[0][idnumber]", req.idnumber.to_string()),
            ("courses[0][categoryid]", req.category_id.to_string()),
            (
                "courses[0][summary]",
                "Auto-generated by varpress.".to_string(),
            ),
            ("courses[0][summaryformat]", "1".to_string()),
            ("courses[0][format]", "topics".to_string()),
            ("courses[0][visible]", "1".to_string()),
        ];
        let data = self.rest.call("core_course_create_courses", &params).await?;
        let created = data
            .as_array()
            .and_then(|list| list.first())
            .ok_or("core_course_create_courses returned no course")?;
        let id = created
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or("course creation response missing numeric id")?;
        Ok(RemoteCourse {
            id,
            fullname: req.fullname.to_string(),
            idnumber: req.idnumber.to_string(),
        })
    }

    async fn create_page<'a>(&self, req: NewPage<'a>) -> Result<(), LmsError> {
        self.session
            .create_page(req.course_id, req.section, req.title, req.html)
            .await
    }

    async fn site_info(&self) -> Result<SiteInfo, LmsError> {
        let data = self
            .rest
            .call("core_webservice_get_site_info", &[])
            .await?;
        Ok(SiteInfo {
            sitename: string_field(&data, "sitename"),
            release: string_field(&data, "release"),
        })
    }
}

fn parse_course(value: &Value) -> Result<RemoteCourse, LmsError> {
    let id = value
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or("course lookup response missing numeric id")?;
    Ok(RemoteCourse {
        id,
        fullname: string_field(value, "fullname"),
        idnumber: string_field(value, "idnumber"),
    })
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("?")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_course_reads_lookup_shape() {
        let value = json!({
            "id": 42,
            "fullname": "Prompt Engineering Fundamentals",
            "idnumber": "prompt-engineering-fundamentals",
            "shortname": "prompt-engineering-fundamentals"
        });
        let course = parse_course(&value).expect("course should parse");
        assert_eq!(course.id, 42);
        assert_eq!(course.idnumber, "prompt-engineering-fundamentals");
    }

    #[test]
    fn parse_course_rejects_missing_id() {
        let value = json!({ "fullname": "No id here" });
        assert!(parse_course(&value).is_err());
    }
}
