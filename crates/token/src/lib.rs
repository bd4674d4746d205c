// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! strava-token: keep a Strava OAuth token triple fresh in a `.env` file.

pub mod browser;
pub mod callback;
pub mod config;
pub mod credential;
pub mod error;
pub mod lifecycle;
pub mod oauth;


use std::sync::Once;

use crate::browser::{Browser, NoBrowser, SystemBrowser};
use crate::config::Config;
use crate::credential::CredentialSet;
use crate::error::AuthError;
use crate::lifecycle::{Outcome, TokenLifecycle};

static CRYPTO_INIT: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Check the stored token and refresh or re-authorize as needed.
pub async fn run(config: &Config) -> Result<Outcome, AuthError> {
    ensure_crypto();
    let creds = CredentialSet::from_config(config);
    let browser: Box<dyn Browser> =
        if config.no_browser { Box::new(NoBrowser) } else { Box::new(SystemBrowser) };
    TokenLifecycle::new(config, browser).run(&creds).await
}
