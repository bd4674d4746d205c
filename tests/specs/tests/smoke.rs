// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `strava-token` binary against
//! a temp env file and a local token endpoint.

use std::time::Duration;

use strava_token_specs::{
    deliver_redirect, epoch_secs, free_port, output, strava_token, EnvFile, MockStrava, Running,
};

const TIMEOUT: Duration = Duration::from_secs(20);

fn registered_env(expires_at: u64) -> String {
    format!(
        "# strava app\n\
         STRAVA_CLIENT_ID=12345\n\
         STRAVA_CLIENT_SECRET=test-secret\n\
         STRAVA_REDIRECT_URI=http://localhost:8080/exchange_token\n\
         STRAVA_ACCESS_TOKEN=old-access-token\n\
         STRAVA_REFRESH_TOKEN=old-refresh-token\n\
         STRAVA_EXPIRES_AT={expires_at}\n\
         OTHER=kept\n"
    )
}

fn token_body(expires_at: u64) -> serde_json::Value {
    serde_json::json!({
        "token_type": "Bearer",
        "access_token": "fresh-access-token",
        "refresh_token": "fresh-refresh-token",
        "expires_at": expires_at,
        "expires_in": 21600,
        "athlete": { "id": 1 }
    })
}

fn stdout(out: &std::process::Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

// -- Valid ---------------------------------------------------------------------

#[tokio::test]
async fn valid_token_is_left_alone() -> anyhow::Result<()> {
    let strava = MockStrava::spawn(500, serde_json::json!({})).await?;
    let env = EnvFile::new(&registered_env(epoch_secs() + 3600))?;
    let before = env.contents()?;

    let out = output(strava_token(&env, &strava.token_url())?).await?;

    assert_eq!(out.status.code(), Some(0), "stdout: {}", stdout(&out));
    assert!(stdout(&out).contains("still valid"));
    assert_eq!(strava.call_count(), 0);
    assert_eq!(env.contents()?, before);
    Ok(())
}

// -- Refresh -------------------------------------------------------------------

#[tokio::test]
async fn expired_token_is_refreshed_in_place() -> anyhow::Result<()> {
    let new_expiry = epoch_secs() + 21600;
    let strava = MockStrava::spawn(200, token_body(new_expiry)).await?;
    let env = EnvFile::new(&registered_env(epoch_secs() - 100))?;

    let out = output(strava_token(&env, &strava.token_url())?).await?;

    assert_eq!(out.status.code(), Some(0), "stdout: {}", stdout(&out));
    assert_eq!(strava.call_count(), 1);
    let form = strava.last_form().await.unwrap_or_default();
    assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(form.get("refresh_token").map(String::as_str), Some("old-refresh-token"));

    let after = env.contents()?;
    let lines: Vec<&str> = after.lines().collect();
    assert_eq!(lines[0], "# strava app");
    assert_eq!(lines[4], "STRAVA_ACCESS_TOKEN=fresh-access-token");
    assert_eq!(lines[5], "STRAVA_REFRESH_TOKEN=fresh-refresh-token");
    assert_eq!(lines[6], format!("STRAVA_EXPIRES_AT={new_expiry}"));
    assert_eq!(lines[7], "OTHER=kept");

    // Masked previews only.
    let printed = stdout(&out);
    assert!(printed.contains("fres..."));
    assert!(!printed.contains("fresh-access-token"));
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_exits_nonzero_without_writing() -> anyhow::Result<()> {
    let strava =
        MockStrava::spawn(401, serde_json::json!({ "message": "Authorization Error" })).await?;
    let env = EnvFile::new(&registered_env(epoch_secs() - 100))?;
    let before = env.contents()?;

    let out = output(strava_token(&env, &strava.token_url())?).await?;

    assert_eq!(out.status.code(), Some(5));
    assert!(stdout(&out).contains("❌"));
    assert_eq!(strava.call_count(), 1);
    assert_eq!(env.contents()?, before);
    Ok(())
}

#[tokio::test]
async fn always_exit_zero_masks_failure() -> anyhow::Result<()> {
    let strava =
        MockStrava::spawn(401, serde_json::json!({ "message": "Authorization Error" })).await?;
    let env = EnvFile::new(&registered_env(epoch_secs() - 100))?;

    let mut cmd = strava_token(&env, &strava.token_url())?;
    cmd.arg("--always-exit-zero");
    let out = output(cmd).await?;

    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("❌"));
    Ok(())
}

#[tokio::test]
async fn missing_client_id_is_config_error() -> anyhow::Result<()> {
    let strava = MockStrava::spawn(200, token_body(epoch_secs() + 21600)).await?;
    let contents = registered_env(epoch_secs() - 100).replace("STRAVA_CLIENT_ID=12345\n", "");
    let env = EnvFile::new(&contents)?;

    let out = output(strava_token(&env, &strava.token_url())?).await?;

    assert_eq!(out.status.code(), Some(2));
    assert!(stdout(&out).contains("STRAVA_CLIENT_ID"));
    assert_eq!(strava.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_log_format_is_rejected_before_running() -> anyhow::Result<()> {
    let strava = MockStrava::spawn(200, token_body(epoch_secs() + 21600)).await?;
    let env = EnvFile::new(&registered_env(epoch_secs() - 100))?;

    let mut cmd = strava_token(&env, &strava.token_url())?;
    cmd.args(["--log-format", "yaml"]);
    let out = output(cmd).await?;

    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid log format"));
    assert_eq!(strava.call_count(), 0);
    Ok(())
}

// -- Browser flow --------------------------------------------------------------

fn unauthorized_env(port: u16) -> String {
    format!(
        "STRAVA_CLIENT_ID=12345\n\
         STRAVA_CLIENT_SECRET=test-secret\n\
         STRAVA_REDIRECT_URI=http://127.0.0.1:{port}/exchange_token\n"
    )
}

#[tokio::test]
async fn browser_flow_writes_new_triple() -> anyhow::Result<()> {
    let new_expiry = epoch_secs() + 21600;
    let strava = MockStrava::spawn(200, token_body(new_expiry)).await?;
    let port = free_port()?;
    let env = EnvFile::new(&unauthorized_env(port))?;

    let running = Running::spawn(strava_token(&env, &strava.token_url())?)?;
    let page =
        deliver_redirect(port, "state=&code=ABC123&scope=read,activity:read_all", TIMEOUT).await?;
    let out = running.wait(TIMEOUT).await?;

    assert!(page.contains("Authorization successful"));
    assert_eq!(out.status.code(), Some(0), "stdout: {}", stdout(&out));
    assert!(stdout(&out).contains("response_type=code"));

    let form = strava.last_form().await.unwrap_or_default();
    assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
    assert_eq!(form.get("code").map(String::as_str), Some("ABC123"));

    let after = env.contents()?;
    assert!(after.starts_with(&unauthorized_env(port)));
    assert!(after.contains("STRAVA_ACCESS_TOKEN=fresh-access-token\n"));
    assert!(after.contains("STRAVA_REFRESH_TOKEN=fresh-refresh-token\n"));
    assert!(after.contains(&format!("STRAVA_EXPIRES_AT={new_expiry}\n")));
    Ok(())
}

#[tokio::test]
async fn denied_browser_flow_exits_with_denial() -> anyhow::Result<()> {
    let strava = MockStrava::spawn(200, token_body(epoch_secs() + 21600)).await?;
    let port = free_port()?;
    let env = EnvFile::new(&unauthorized_env(port))?;
    let before = env.contents()?;

    let running = Running::spawn(strava_token(&env, &strava.token_url())?)?;
    deliver_redirect(port, "state=&error=access_denied", TIMEOUT).await?;
    let out = running.wait(TIMEOUT).await?;

    assert_eq!(out.status.code(), Some(3));
    assert!(stdout(&out).contains("access_denied"));
    assert_eq!(stdout(&out).matches("❌").count(), 1);
    assert_eq!(strava.call_count(), 0);
    assert_eq!(env.contents()?, before);
    Ok(())
}
