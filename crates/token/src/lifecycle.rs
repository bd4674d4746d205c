// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token lifecycle: decide between keeping, refreshing, or re-authorizing,
//! then persist whatever the provider hands back.

use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::callback::RedirectCapture;
use crate::config::Config;
use crate::credential::store::CredentialStore;
use crate::credential::{epoch_secs, mask, CredentialSet, TokenGrant, TokenState};
use crate::error::AuthError;
use crate::oauth::{authorize_url, OAuthClient};

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Stored token still good; nothing was sent anywhere.
    Valid { expires_at: u64 },
    /// A refresh exchange produced and persisted a new triple.
    Refreshed(TokenGrant),
    /// The interactive flow produced and persisted a new triple.
    Authorized(TokenGrant),
}

/// Drives one run of the token state machine.
pub struct TokenLifecycle<'a> {
    config: &'a Config,
    store: CredentialStore,
    browser: Box<dyn Browser>,
}

impl<'a> TokenLifecycle<'a> {
    pub fn new(config: &'a Config, browser: Box<dyn Browser>) -> Self {
        Self { config, store: CredentialStore::new(&config.env_file), browser }
    }

    pub async fn run(&self, creds: &CredentialSet) -> Result<Outcome, AuthError> {
        self.run_at(creds, epoch_secs()).await
    }

    /// Run with an explicit clock.
    pub async fn run_at(&self, creds: &CredentialSet, now: u64) -> Result<Outcome, AuthError> {
        let state = creds.state_at(now, self.config.refresh_margin_secs);
        info!(state = state.as_str(), expires_at = creds.expires_at, now, "checked stored token");

        match state {
            TokenState::Valid => {
                println!("✅ Token still valid until {}. Nothing to do.", local_time(creds.expires_at));
                Ok(Outcome::Valid { expires_at: creds.expires_at })
            }
            TokenState::NeedsRefresh => {
                println!("🔄 Token expired or about to expire. Refreshing...");
                let grant = self.refresh(creds, now).await?;
                self.save(&grant)?;
                Ok(Outcome::Refreshed(grant))
            }
            TokenState::NeedsFullAuth => {
                println!("🌐 No usable token. Starting browser authorization...");
                let grant = self.authorize(now).await?;
                self.save(&grant)?;
                Ok(Outcome::Authorized(grant))
            }
        }
    }

    async fn refresh(&self, creds: &CredentialSet, now: u64) -> Result<TokenGrant, AuthError> {
        let client = OAuthClient::new(self.config)?;
        let previous = creds.refresh_token.as_deref().unwrap_or_default();
        let response = client.refresh(previous).await?;
        let grant = response.into_grant(now, Some(previous))?;
        info!(rotated = grant.refresh_token != previous, "access token refreshed");
        Ok(grant)
    }

    async fn authorize(&self, now: u64) -> Result<TokenGrant, AuthError> {
        let client = OAuthClient::new(self.config)?;
        let client_id = self.config.require_client_id()?;
        let redirect_uri = self.config.require_redirect_uri()?;
        let url =
            authorize_url(&self.config.authorize_url, client_id, redirect_uri, &self.config.scope)?;

        // Bound before the browser opens so the redirect cannot beat the listener.
        let capture = RedirectCapture::bind(redirect_uri).await?;
        let addr = capture.local_addr();
        let handle = capture.spawn();
        info!(%addr, "redirect listener started");

        println!("📋 Authorize in your browser:");
        println!("   {url}");
        if let Err(e) = self.browser.open(&url) {
            warn!(err = %e, "could not open browser");
            println!("⚠️  Could not open a browser ({e}). Open the URL above manually.");
        }
        println!("🔌 Waiting for the redirect at {redirect_uri} ...");

        let redirect = handle.wait(self.config.callback_timeout()).await?;
        let Some(code) = redirect.code() else {
            return Err(AuthError::AuthorizationDenied { reason: redirect.error.clone() });
        };
        debug!("authorization code received");

        if let Some(granted) = redirect.scope.as_deref() {
            let missing = missing_scopes(&self.config.scope, granted);
            if !missing.is_empty() {
                warn!(granted, missing = ?missing, "narrower scope granted than requested");
                println!("⚠️  Granted scope {granted:?} lacks: {}", missing.join(", "));
            }
        }

        let response = client.exchange_code(code).await?;
        if let Some(id) = response.athlete.as_ref().and_then(|a| a.get("id")) {
            info!(athlete = %id, "authorization code exchanged");
        }
        response.into_grant(now, None)
    }

    fn save(&self, grant: &TokenGrant) -> Result<(), AuthError> {
        self.store.save(grant)?;
        info!(path = %self.store.path().display(), expires_at = grant.expires_at, "credentials saved");

        println!();
        println!("✅ Token values saved to {}:", self.store.path().display());
        println!("   STRAVA_ACCESS_TOKEN={}", mask(&grant.access_token));
        println!("   STRAVA_REFRESH_TOKEN={}", mask(&grant.refresh_token));
        println!("   STRAVA_EXPIRES_AT={}  # {}", grant.expires_at, local_time(grant.expires_at));
        Ok(())
    }
}

/// Requested scopes (comma separated) absent from the granted list.
pub fn missing_scopes<'s>(requested: &'s str, granted: &str) -> Vec<&'s str> {
    let granted: Vec<&str> = granted.split(',').map(str::trim).collect();
    requested
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !granted.contains(s))
        .collect()
}

fn local_time(epoch: u64) -> String {
    i64::try_from(epoch)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|t| t.with_timezone(&chrono::Local).format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
