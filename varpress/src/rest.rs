//! Moodle Web Services REST client.
//!
//! Every call is a form-encoded POST to the single `server.php` endpoint,
//! identified by a `wsfunction` name and authenticated by `wstoken`. Moodle
//! signals application-level rejection in-band: a JSON object carrying an
//! `exception` key, regardless of which function was called. Transport-level
//! failures (non-2xx, connection refused, timeout) surface as reqwest errors
//! and are fatal for the run.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error};

use varpress_core::contract::LmsError;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Token-bearing, stateless client for the REST endpoint.
pub struct MoodleRest {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

/// An application-level rejection reported by the server.
#[derive(Debug)]
pub struct ApiError {
    pub function: String,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Moodle API error [{}]: {}", self.function, self.message)
    }
}

impl std::error::Error for ApiError {}

impl MoodleRest {
    pub fn new(base_url: &str, token: &str) -> Result<Self, LmsError> {
        let http = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(MoodleRest {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Call a web-service function with named parameters.
    pub async fn call(&self, function: &str, params: &[(&str, String)]) -> Result<Value, LmsError> {
        let mut form: Vec<(&str, String)> = vec![
            ("wstoken", self.token.clone()),
            ("moodlewsrestformat", "json".to_string()),
            ("wsfunction", function.to_string()),
        ];
        form.extend(params.iter().map(|(key, value)| (*key, value.clone())));

        let url = format!("{}/webservice/rest/server.php", self.base_url);
        debug!(function, url = %url, "Calling REST function");
        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let data: Value = response.json().await?;

        if let Some(api_error) = domain_error(function, &data) {
            error!(function, message = %api_error.message, "REST call rejected by server");
            return Err(Box::new(api_error));
        }
        Ok(data)
    }
}

/// Detect the uniform in-band failure signal: a top-level mapping containing
/// an `exception` key. Arrays and scalars are never failures.
fn domain_error(function: &str, data: &Value) -> Option<ApiError> {
    let map = data.as_object()?;
    if !map.contains_key("exception") {
        return None;
    }
    let message = map
        .get("message")
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
        .unwrap_or_else(|| data.to_string());
    Some(ApiError {
        function: function.to_string(),
        message,
    })
}
