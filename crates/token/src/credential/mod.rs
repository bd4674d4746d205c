// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single persisted credential set and the rule that classifies it.

pub mod store;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::config::{non_empty, Config};

/// Most characters shown when a secret is printed.
const MASK_PREFIX_LEN: usize = 8;

/// Where a credential set stands relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Access token usable for longer than the refresh margin.
    Valid,
    /// Expired or inside the margin, with a refresh token to trade in.
    NeedsRefresh,
    /// Nothing usable on hand; the user must authorize in a browser.
    NeedsFullAuth,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::NeedsRefresh => "needs_refresh",
            Self::NeedsFullAuth => "needs_full_auth",
        }
    }
}

/// The stored token triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Expiry as epoch seconds; 0 means no usable token.
    pub expires_at: u64,
}

impl CredentialSet {
    /// Read the credential set out of the parsed configuration.
    ///
    /// A blank or unset expiry becomes 0. An expiry that is not an integer
    /// is logged and also treated as 0.
    pub fn from_config(config: &Config) -> Self {
        let expires_at = match non_empty(&config.expires_at) {
            None => 0,
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|e| {
                tracing::warn!(value = raw, err = %e, "ignoring unparsable STRAVA_EXPIRES_AT");
                0
            }),
        };

        Self {
            access_token: non_empty(&config.access_token).map(str::to_owned),
            refresh_token: non_empty(&config.refresh_token).map(str::to_owned),
            expires_at,
        }
    }

    /// Classify the stored tokens at `now`.
    ///
    /// Both tokens must be present and `expires_at` positive before the
    /// expiry is even considered; anything less needs a browser round trip.
    pub fn state_at(&self, now: u64, margin_secs: u64) -> TokenState {
        let has_access = self.access_token.as_deref().is_some_and(|t| !t.is_empty());
        let has_refresh = self.refresh_token.as_deref().is_some_and(|t| !t.is_empty());
        if !has_access || !has_refresh || self.expires_at == 0 {
            return TokenState::NeedsFullAuth;
        }

        // Signed so that an already-expired token compares as negative.
        let remaining = self.expires_at as i128 - now as i128;
        if remaining > margin_secs as i128 {
            TokenState::Valid
        } else {
            TokenState::NeedsRefresh
        }
    }
}

/// A complete token triple ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: u64,
}

/// JSON body returned by the token endpoint for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Athlete summary, only present on the code exchange.
    #[serde(default)]
    pub athlete: Option<serde_json::Value>,
}

impl TokenResponse {
    /// Resolve into a full triple.
    ///
    /// `previous_refresh` is kept when the endpoint does not rotate the
    /// refresh token. The expiry comes from `expires_at`, else
    /// `now + expires_in`.
    pub fn into_grant(
        self,
        now: u64,
        previous_refresh: Option<&str>,
    ) -> Result<TokenGrant, crate::error::AuthError> {
        use crate::error::AuthError;

        if self.access_token.is_empty() {
            return Err(AuthError::Parse("empty access_token".to_owned()));
        }

        let refresh_token = match self.refresh_token.filter(|t| !t.is_empty()) {
            Some(t) => t,
            None => previous_refresh
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| AuthError::Parse("missing refresh_token".to_owned()))?,
        };

        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) if at > 0 => at,
            (_, Some(secs)) if secs > 0 => now
                .checked_add(secs)
                .ok_or_else(|| AuthError::Parse("expires_in out of range".to_owned()))?,
            _ => return Err(AuthError::Parse("missing expires_at and expires_in".to_owned())),
        };

        Ok(TokenGrant { access_token: self.access_token, refresh_token, expires_at })
    }
}

/// Short prefix of a secret for operator output.
///
/// At most a quarter of the secret is shown, so short values print as `...`.
pub fn mask(secret: &str) -> String {
    let shown = MASK_PREFIX_LEN.min(secret.chars().count() / 4);
    let prefix: String = secret.chars().take(shown).collect();
    format!("{prefix}...")
}

pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
