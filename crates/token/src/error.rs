// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Fatal outcomes of a token run. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A registration value needed by the chosen path is absent.
    #[error("missing configuration: {0} is not set")]
    ConfigMissing(&'static str),

    /// Non-2xx answer or transport failure talking to the token endpoint.
    #[error("token endpoint request failed{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Http { status: Option<u16>, message: String },

    /// The token endpoint answered 2xx with a body we cannot use.
    #[error("invalid token response: {0}")]
    Parse(String),

    /// The redirect carried no authorization code.
    #[error("authorization denied: {}", .reason.as_deref().unwrap_or("no code received"))]
    AuthorizationDenied { reason: Option<String> },

    #[error("no redirect received within {}s", .0.as_secs())]
    CallbackTimeout(Duration),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AuthError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMissing(_) => "CONFIG_MISSING",
            Self::Http { .. } => "HTTP_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::AuthorizationDenied { .. } => "AUTHORIZATION_DENIED",
            Self::CallbackTimeout(_) => "CALLBACK_TIMEOUT",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Process exit status for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } => 1,
            Self::ConfigMissing(_) => 2,
            Self::AuthorizationDenied { .. } => 3,
            Self::CallbackTimeout(_) => 4,
            Self::Http { .. } => 5,
            Self::Parse(_) => 6,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http { status: e.status().map(|s| s.as_u16()), message: e.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
