//! First-time web-service bootstrap for a containerised Moodle.
//!
//! Moodle cannot enable its own web-service subsystem over HTTP, so minting
//! runs a PHP CLI script inside the container through `docker exec`: enable
//! web services, enable the REST protocol, recreate the external service
//! definition under a fixed shortname and mint an admin token. The
//! delete-before-insert makes repeated minting converge on a single live
//! token instead of accumulating orphans.
//!
//! A fresh container initialises asynchronously and can take minutes before
//! its login page answers, so minting is preceded by a bounded readiness
//! poll.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use varpress_core::contract::{LmsError, Provisioner};

pub const DEFAULT_CONTAINER: &str = "varpress-moodle";

const READY_TIMEOUT: Duration = Duration::from_secs(180);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const SCRIPT_PATH: &str = "/tmp/varpress_setup.php";

/// PHP CLI script executed inside the Moodle container. Enables web
/// services + the REST protocol, recreates the `varpress_publish` external
/// service with the functions the publisher needs, and prints a fresh admin
/// token on the last line.
const BOOTSTRAP_PHP: &str = r#"<?php
define('CLI_SCRIPT', true);
require('/bitnami/moodle/config.php');
require_once($CFG->libdir . '/adminlib.php');
require_once($CFG->dirroot . '/webservice/lib.php');

set_config('enablewebservices', 1);

$protos = get_config('core', 'webserviceprotocols');
$protos_arr = $protos ? explode(',', $protos) : [];
if (!in_array('rest', $protos_arr)) {
    $protos_arr[] = 'rest';
    set_config('webserviceprotocols', implode(',', $protos_arr));
}

$DB->delete_records('external_services', ['shortname' => 'varpress_publish']);
$service = new stdClass();
$service->name = 'Varpress Publish';
$service->shortname = 'varpress_publish';
$service->enabled = 1;
$service->restrictedusers = 0;
$service->downloadfiles = 0;
$service->uploadfiles = 0;
$service->timecreated = time();
$service->timemodified = time();
$sid = $DB->insert_record('external_services', $service);

$functions = [
    'core_course_create_courses',
    'core_course_get_courses_by_field',
    'core_course_get_contents',
    'core_webservice_get_site_info',
];
foreach ($functions as $fname) {
    $rec = new stdClass();
    $rec->externalserviceid = $sid;
    $rec->functionname = $fname;
    $DB->insert_record('external_services_functions', $rec);
}

$DB->delete_records('external_tokens', ['externalserviceid' => $sid]);
$token = new stdClass();
$token->token = md5(uniqid(rand(), true));
$token->tokentype = EXTERNAL_TOKEN_PERMANENT;
$token->userid = 2;
$token->externalserviceid = $sid;
$token->contextid = context_system::instance()->id;
$token->creatorid = 2;
$token->timecreated = time();
$token->validuntil = 0;
$token->iprestriction = null;
$DB->insert_record('external_tokens', $token);

echo $token->token . PHP_EOL;
"#;

/// Provisioner backed by `docker exec` against the Moodle container.
pub struct DockerProvisioner {
    http: reqwest::Client,
    base_url: String,
    container: String,
}

impl DockerProvisioner {
    pub fn new(base_url: &str, container: &str) -> Result<Self, LmsError> {
        let http = reqwest::Client::builder().build()?;
        Ok(DockerProvisioner {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            container: container.to_string(),
        })
    }
}

#[async_trait]
impl Provisioner for DockerProvisioner {
    async fn wait_until_ready(&self) -> Result<(), LmsError> {
        let login_url = format!("{}/login/index.php", self.base_url);
        println!("Waiting for LMS at {} ...", self.base_url);
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            match self
                .http
                .get(&login_url)
                .timeout(POLL_REQUEST_TIMEOUT)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    info!(url = %login_url, "LMS is ready");
                    println!("LMS is ready.");
                    return Ok(());
                }
                Ok(response) => {
                    warn!(status = %response.status(), "LMS not ready yet");
                }
                Err(_) => {}
            }
            if Instant::now() >= deadline {
                return Err(format!(
                    "LMS at {} did not become ready within {}s",
                    self.base_url,
                    READY_TIMEOUT.as_secs()
                )
                .into());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn mint_token(&self) -> Result<String, LmsError> {
        println!("Setting up LMS web services (requires Docker)...");
        info!(container = %self.container, "Writing bootstrap script into container");

        // Pipe the script in over stdin rather than mounting anything.
        let mut write = Command::new("docker")
            .args([
                "exec",
                "-i",
                &self.container,
                "bash",
                "-c",
                &format!("cat > {SCRIPT_PATH}"),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| exec_failure("spawn docker exec", &e.to_string()))?;
        if let Some(stdin) = write.stdin.as_mut() {
            stdin.write_all(BOOTSTRAP_PHP.as_bytes()).await?;
        }
        let write_result = write.wait_with_output().await?;
        if !write_result.status.success() {
            return Err(exec_failure(
                "write bootstrap script",
                &String::from_utf8_lossy(&write_result.stderr),
            ));
        }

        info!(container = %self.container, "Running bootstrap script");
        let run_result = Command::new("docker")
            .args(["exec", &self.container, "php", SCRIPT_PATH])
            .output()
            .await
            .map_err(|e| exec_failure("run docker exec", &e.to_string()))?;
        if !run_result.status.success() {
            return Err(exec_failure(
                "run bootstrap script",
                &String::from_utf8_lossy(&run_result.stderr),
            ));
        }

        let stdout = String::from_utf8_lossy(&run_result.stdout);
        let token = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string();
        if !looks_like_token(&token) {
            return Err(format!("Unexpected PHP output while minting token: {stdout:?}").into());
        }
        info!("Web services enabled, token minted");
        println!("  Web services enabled. Token: {token}");
        Ok(token)
    }
}

fn exec_failure(stage: &str, detail: &str) -> LmsError {
    format!(
        "docker exec failed ({stage}): {detail}\nIs the container running? Try: docker compose up -d"
    )
    .into()
}

/// Moodle tokens are 32 lowercase hex characters.
fn looks_like_token(candidate: &str) -> bool {
    match Regex::new(r"^[0-9a-f]{32}$") {
        Ok(re) => re.is_match(candidate),
        Err(_) => false,
    }
}
