// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot listener that captures the OAuth redirect.
//!
//! The listener binds to the redirect URI's host and port, answers exactly
//! one request on any path with a static page, hands the query parameters to
//! the waiting flow through a oneshot channel, and shuts down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

pub const SUCCESS_HTML: &str =
    "<h1>Authorization successful! You can close this window.</h1>";
pub const FAILURE_HTML: &str = "<h1>Authorization failed. No code received.</h1>";

/// How long the server task may take to wind down after the redirect.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Query parameters carried by the provider's redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirect {
    pub code: Option<String>,
    /// Provider error such as `access_denied`.
    pub error: Option<String>,
    /// Scopes the user actually granted.
    pub scope: Option<String>,
}

impl Redirect {
    /// Build from decoded query pairs.
    ///
    /// Blank values are dropped and a repeated key keeps its first value.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut redirect = Self::default();
        for (key, value) in pairs.into_iter().filter(|(_, v)| !v.is_empty()) {
            let slot = match key.as_str() {
                "code" => &mut redirect.code,
                "error" => &mut redirect.error,
                "scope" => &mut redirect.scope,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        redirect
    }


    /// The authorization code, if the redirect carried a non-empty one.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }
}

struct CaptureState {
    slot: Mutex<Option<oneshot::Sender<Redirect>>>,
    done: CancellationToken,
}

/// Router that resolves `tx` with the first request it sees.
pub fn router(tx: oneshot::Sender<Redirect>, done: CancellationToken) -> Router {
    let state = Arc::new(CaptureState { slot: Mutex::new(Some(tx)), done });
    Router::new().fallback(capture).with_state(state)
}

async fn capture(
    State(state): State<Arc<CaptureState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Html<&'static str> {
    let redirect = match query {
        Ok(Query(pairs)) => Redirect::from_pairs(pairs),
        Err(e) => {
            tracing::warn!(err = %e, "malformed redirect query");
            Redirect::default()
        }
    };

    let Some(tx) = state.slot.lock().await.take() else {
        tracing::debug!("redirect already captured, ignoring request");
        return Html(FAILURE_HTML);
    };

    let found = redirect.code().is_some();
    tracing::debug!(found, error = ?redirect.error, "redirect captured");
    let _ = tx.send(redirect);
    state.done.cancel();

    Html(if found { SUCCESS_HTML } else { FAILURE_HTML })
}

/// A bound, not yet serving, redirect listener.
pub struct RedirectCapture {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RedirectCapture {
    /// Bind to the host and port named by `redirect_uri`.
    pub async fn bind(redirect_uri: &str) -> Result<Self, AuthError> {
        let url = reqwest::Url::parse(redirect_uri).map_err(|e| {
            AuthError::io(
                format!("invalid redirect URI {redirect_uri:?}"),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            )
        })?;
        let addrs = url
            .socket_addrs(|| None)
            .map_err(|e| AuthError::io(format!("cannot resolve {redirect_uri}"), e))?;

        let listener = TcpListener::bind(&addrs[..])
            .await
            .map_err(|e| AuthError::io(format!("failed to bind redirect listener for {redirect_uri}"), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AuthError::io("failed to read listener address", e))?;
        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start serving on a dedicated task.
    pub fn spawn(self) -> CaptureHandle {
        let (tx, rx) = oneshot::channel();
        let done = CancellationToken::new();
        let app = router(tx, done.clone());
        let shutdown = done.clone();
        let task = tokio::spawn(async move {
            axum::serve(self.listener, app).with_graceful_shutdown(shutdown.cancelled_owned()).await
        });
        CaptureHandle { rx, done, task }
    }
}

/// Handle to a running capture task.
pub struct CaptureHandle {
    rx: oneshot::Receiver<Redirect>,
    done: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl CaptureHandle {
    /// Wait for the redirect, then join the server task.
    ///
    /// `None` waits forever. On timeout the listener is shut down before
    /// the error is returned.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<Redirect, AuthError> {
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.shutdown().await;
                    return Err(AuthError::CallbackTimeout(limit));
                }
            },
            None => (&mut self.rx).await,
        };

        match received {
            Ok(redirect) => {
                self.shutdown().await;
                Ok(redirect)
            }
            // Sender dropped without a value: the server task died.
            Err(_) => {
                self.done.cancel();
                let err = match self.task.await {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => std::io::Error::other("listener stopped before a redirect"),
                    Err(e) => std::io::Error::other(e),
                };
                Err(AuthError::io("redirect listener failed", err))
            }
        }
    }

    async fn shutdown(self) {
        self.done.cancel();
        let mut task = self.task;
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => tracing::debug!("redirect listener stopped"),
            Ok(Ok(Err(e))) => tracing::warn!(err = %e, "redirect listener exited with error"),
            Ok(Err(e)) => tracing::warn!(err = %e, "redirect listener task failed"),
            Err(_) => {
                tracing::warn!("redirect listener did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
