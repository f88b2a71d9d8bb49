//! Request transport that stamps every outgoing request with a fresh JWT.

use std::future::Future;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Response};
use tracing::debug;

use crate::auth::TokenIssuer;
use crate::error::{Error, Result};

/// Anything that can send one request and hand back one response.
pub trait RequestSender: Send + Sync {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl RequestSender for reqwest::Client {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        let pending = self.execute(request);
        async move { pending.await.map_err(Error::Transport) }
    }
}

/// Wraps a [`RequestSender`] and authenticates every request it forwards.
///
/// A new token is minted per request; nothing is cached between calls.
#[derive(Debug)]
pub struct AuthTransport<S = reqwest::Client> {
    issuer: TokenIssuer,
    inner: S,
}

impl<S: RequestSender> AuthTransport<S> {
    pub fn new(issuer: TokenIssuer, inner: S) -> Self {
        Self { issuer, inner }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }
}

impl<S: RequestSender> RequestSender for AuthTransport<S> {
    fn send(&self, mut request: Request) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let token = self.issuer.issue()?;
            let mut value = HeaderValue::try_from(format!("Bearer {token}"))?;
            value.set_sensitive(true);
            // insert drops any values the caller already set
            request.headers_mut().insert(AUTHORIZATION, value);

            debug!(
                method = %request.method(),
                url = %request.url(),
                kid = %self.issuer.identity().key_id,
                "sending authenticated request"
            );
            self.inner.send(request).await
        }
    }
}
