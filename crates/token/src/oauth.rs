// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint exchanges and the authorization URL.

use crate::config::Config;
use crate::credential::TokenResponse;
use crate::error::AuthError;

/// Client for the provider's token endpoint.
///
/// Every call is a single form-encoded POST. Failures are returned as-is;
/// nothing is retried.
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    /// Build a client from the registration values in `config`.
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let client_id = config.require_client_id()?.to_owned();
        let client_secret = config.require_client_secret()?.to_owned();
        crate::ensure_crypto();
        let http = reqwest::Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self { http, token_url: config.token_url.clone(), client_id, client_secret })
    }

    /// Redeem an authorization code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        self.post_token("authorization_code", &[("code", code)]).await
    }

    /// Trade a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.post_token("refresh_token", &[("refresh_token", refresh_token)]).await
    }

    async fn post_token(
        &self,
        grant_type: &str,
        extra: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(extra);
        form.push(("grant_type", grant_type));

        tracing::debug!(url = %self.token_url, grant_type, "token request");
        let resp = self.http.post(&self.token_url).form(&form).send().await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AuthError::Http { status: Some(status.as_u16()), message: text });
        }

        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Parse(e.to_string()))?;
        tracing::debug!(grant_type, expires_at = ?token.expires_at, "token response parsed");
        Ok(token)
    }
}

/// Build the browser URL for interactive authorization.
///
/// Carries exactly `client_id`, `redirect_uri`, `response_type=code`,
/// `approval_prompt=force` and `scope`.
pub fn authorize_url(
    endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
) -> Result<String, AuthError> {
    let url = reqwest::Url::parse_with_params(
        endpoint,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("approval_prompt", "force"),
            ("scope", scope),
        ],
    )
    .map_err(|e| AuthError::Parse(format!("invalid authorize endpoint {endpoint:?}: {e}")))?;
    Ok(url.into())
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
