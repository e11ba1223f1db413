//! API token resolution.
//!
//! Precedence: explicit token > cached token file > freshly minted token.
//! An explicit token short-circuits everything, including a forced mint; the
//! cache file is only consulted and only rewritten on the mint path. The
//! cache is a single-line file with no locking; concurrent runs can race
//! on it.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::contract::{LmsError, Provisioner};

/// Resolve the token to use for REST calls.
///
/// `force_mint` skips the cache and re-provisions (first-time setup, or a
/// token known to be dead). Minting waits for the LMS to become reachable
/// first, then writes the new token back to `cache_path`.
pub async fn resolve<P: Provisioner>(
    explicit: Option<String>,
    cache_path: &Path,
    force_mint: bool,
    provisioner: &P,
) -> Result<String, LmsError> {
    if let Some(token) = explicit {
        info!("Using explicitly supplied token");
        return Ok(token);
    }

    if !force_mint {
        if let Ok(cached) = fs::read_to_string(cache_path) {
            let cached = cached.trim();
            if !cached.is_empty() {
                info!(cache = %cache_path.display(), "Using cached token");
                return Ok(cached.to_string());
            }
        }
    }

    provisioner.wait_until_ready().await?;
    let token = provisioner.mint_token().await?;
    match fs::write(cache_path, &token) {
        Ok(()) => info!(cache = %cache_path.display(), "Token cached"),
        // Non-fatal: the minted token is still returned.
        Err(e) => warn!(error = %e, cache = %cache_path.display(), "Failed to cache token"),
    }
    Ok(token)
}
