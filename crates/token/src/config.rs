// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::error::AuthError;

pub const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";
pub const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
pub const DEFAULT_SCOPE: &str = "read,activity:read_all";
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Keep a Strava OAuth access token fresh.
///
/// Every value falls back to its `STRAVA_*` environment variable, which the
/// env file (default `.env`) populates before parsing.
#[derive(Debug, Clone, Parser)]
#[command(name = "strava-token", version, about)]
pub struct Config {
    /// Application client ID.
    #[arg(long, env = "STRAVA_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Application client secret.
    #[arg(long, env = "STRAVA_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Registered redirect URI; the callback listener binds to its host and port.
    #[arg(long, env = "STRAVA_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Current access token.
    #[arg(long, env = "STRAVA_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Current refresh token.
    #[arg(long, env = "STRAVA_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Access token expiry as Unix seconds (blank or unset means no token).
    #[arg(long, env = "STRAVA_EXPIRES_AT")]
    pub expires_at: Option<String>,

    /// Env file that is loaded at start and rewritten after a token exchange.
    #[arg(long, env = "STRAVA_ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Scopes requested during interactive authorization.
    #[arg(long, env = "STRAVA_SCOPE", default_value = DEFAULT_SCOPE)]
    pub scope: String,

    #[arg(long, hide = true, env = "STRAVA_AUTHORIZE_URL", default_value = STRAVA_AUTHORIZE_URL)]
    pub authorize_url: String,

    #[arg(long, hide = true, env = "STRAVA_TOKEN_URL", default_value = STRAVA_TOKEN_URL)]
    pub token_url: String,

    /// Seconds before expiry at which the token is refreshed.
    #[arg(long, env = "STRAVA_REFRESH_MARGIN_SECS", default_value_t = 60)]
    pub refresh_margin_secs: u64,

    /// Seconds to wait for the browser redirect (0 waits forever).
    #[arg(long, env = "STRAVA_CALLBACK_TIMEOUT_SECS", default_value_t = 120)]
    pub callback_timeout_secs: u64,

    /// Per-request timeout for token endpoint calls.
    #[arg(long, env = "STRAVA_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Print the authorization URL instead of launching a browser.
    #[arg(long, env = "STRAVA_NO_BROWSER")]
    pub no_browser: bool,

    /// Exit 0 even when the run fails.
    #[arg(long, env = "STRAVA_TOKEN_ALWAYS_EXIT_ZERO")]
    pub always_exit_zero: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "STRAVA_TOKEN_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "STRAVA_TOKEN_LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other} (expected json or text)"),
        }

        for (name, endpoint) in [("authorize", &self.authorize_url), ("token", &self.token_url)] {
            reqwest::Url::parse(endpoint)
                .map_err(|e| anyhow::anyhow!("invalid {name} URL {endpoint:?}: {e}"))?;
        }

        if let Some(uri) = non_empty(&self.redirect_uri) {
            let url = reqwest::Url::parse(uri)
                .map_err(|e| anyhow::anyhow!("invalid redirect URI {uri:?}: {e}"))?;
            if url.scheme() != "http" {
                anyhow::bail!("redirect URI must use http:// for the local listener: {uri}");
            }
            if url.host_str().is_none() {
                anyhow::bail!("redirect URI has no host: {uri}");
            }
        }

        Ok(())
    }

    pub fn require_client_id(&self) -> Result<&str, AuthError> {
        non_empty(&self.client_id).ok_or(AuthError::ConfigMissing("STRAVA_CLIENT_ID"))
    }

    pub fn require_client_secret(&self) -> Result<&str, AuthError> {
        non_empty(&self.client_secret).ok_or(AuthError::ConfigMissing("STRAVA_CLIENT_SECRET"))
    }

    pub fn require_redirect_uri(&self) -> Result<&str, AuthError> {
        non_empty(&self.redirect_uri).ok_or(AuthError::ConfigMissing("STRAVA_REDIRECT_URI"))
    }

    /// `None` waits for the redirect indefinitely.
    pub fn callback_timeout(&self) -> Option<Duration> {
        (self.callback_timeout_secs > 0).then(|| Duration::from_secs(self.callback_timeout_secs))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Load the env file into the process environment.
///
/// Variables already set in the environment win over the file. A missing
/// file is not an error and yields `Ok(false)`.
pub fn load_env_file(path: &Path) -> anyhow::Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(anyhow::anyhow!("failed to load {}: {e}", path.display())),
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
