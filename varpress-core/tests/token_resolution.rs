use std::fs;

use tempfile::tempdir;

use varpress_core::contract::MockProvisioner;
use varpress_core::token::resolve;

#[tokio::test]
async fn explicit_token_short_circuits_cache_and_mint() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join(".moodle-token");
    fs::write(&cache, "cachedtoken000000000000000000000").unwrap();

    let mut provisioner = MockProvisioner::new();
    provisioner.expect_wait_until_ready().times(0);
    provisioner.expect_mint_token().times(0);

    let token = resolve(
        Some("explicit-token".to_string()),
        &cache,
        false,
        &provisioner,
    )
    .await
    .expect("explicit token should resolve");
    assert_eq!(token, "explicit-token");
    // Cache is untouched.
    assert_eq!(
        fs::read_to_string(&cache).unwrap(),
        "cachedtoken000000000000000000000"
    );
}

#[tokio::test]
async fn explicit_token_wins_even_with_force_mint() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join(".moodle-token");

    let mut provisioner = MockProvisioner::new();
    provisioner.expect_wait_until_ready().times(0);
    provisioner.expect_mint_token().times(0);

    let token = resolve(Some("explicit".to_string()), &cache, true, &provisioner)
        .await
        .expect("explicit token should resolve");
    assert_eq!(token, "explicit");
}

#[tokio::test]
async fn cached_token_is_used_when_no_explicit_token() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join(".moodle-token");
    fs::write(&cache, "cachedtoken\n").unwrap();

    let mut provisioner = MockProvisioner::new();
    provisioner.expect_wait_until_ready().times(0);
    provisioner.expect_mint_token().times(0);

    let token = resolve(None, &cache, false, &provisioner)
        .await
        .expect("cached token should resolve");
    assert_eq!(token, "cachedtoken");
}

#[tokio::test]
async fn minting_waits_for_readiness_and_writes_cache() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join(".moodle-token");

    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_wait_until_ready()
        .times(1)
        .returning(|| Ok(()));
    provisioner
        .expect_mint_token()
        .times(1)
        .returning(|| Ok("freshtoken".to_string()));

    let token = resolve(None, &cache, false, &provisioner)
        .await
        .expect("mint should resolve");
    assert_eq!(token, "freshtoken");
    assert_eq!(fs::read_to_string(&cache).unwrap(), "freshtoken");
}

#[tokio::test]
async fn force_mint_ignores_cache_contents() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join(".moodle-token");
    fs::write(&cache, "staletoken").unwrap();

    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_wait_until_ready()
        .times(1)
        .returning(|| Ok(()));
    provisioner
        .expect_mint_token()
        .times(1)
        .returning(|| Ok("replacement".to_string()));

    let token = resolve(None, &cache, true, &provisioner)
        .await
        .expect("forced mint should resolve");
    assert_eq!(token, "replacement");
    assert_eq!(fs::read_to_string(&cache).unwrap(), "replacement");
}

#[tokio::test]
async fn provisioning_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join(".moodle-token");

    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_wait_until_ready()
        .returning(|| Err("LMS did not become ready within 180s".into()));
    provisioner.expect_mint_token().times(0);

    let result = resolve(None, &cache, false, &provisioner).await;
    assert!(result.is_err());
    assert!(!cache.exists(), "no token should be cached on failure");
}
