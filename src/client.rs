//! HTTP client for the App Store Server (StoreKit) API.

use reqwest::StatusCode;
use tracing::debug;

use crate::auth::TokenIssuer;
use crate::error::{Error, Result};
use crate::transport::{AuthTransport, RequestSender};
use crate::types::SendTestNotificationResponse;

const STOREKIT_PRODUCTION: &str = "https://api.storekit.itunes.apple.com";
const STOREKIT_SANDBOX: &str = "https://api.storekit-sandbox.itunes.apple.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    pub fn from_sandbox_flag(use_sandbox: bool) -> Self {
        if use_sandbox {
            Self::Sandbox
        } else {
            Self::Production
        }
    }

    pub fn storekit_base(self) -> &'static str {
        match self {
            Self::Production => STOREKIT_PRODUCTION,
            Self::Sandbox => STOREKIT_SANDBOX,
        }
    }
}

pub struct AscClient {
    http: reqwest::Client,
    transport: AuthTransport<reqwest::Client>,
    storekit_base: String,
}

impl AscClient {
    pub fn new(issuer: TokenIssuer, environment: Environment) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("app-store-connect-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::BuildRequest)?;
        Ok(Self {
            transport: AuthTransport::new(issuer, http.clone()),
            http,
            storekit_base: environment.storekit_base().to_string(),
        })
    }

    #[cfg(test)]
    fn with_storekit_base(mut self, base: impl Into<String>) -> Self {
        self.storekit_base = base.into();
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        self.transport.issuer()
    }

    /// Ask Apple to send a test App Store Server Notification.
    ///
    /// Returns the test notification token, empty if Apple did not include one.
    pub async fn request_test_notification(&self) -> Result<String> {
        let url = format!("{}/inApps/v1/notifications/test", self.storekit_base);
        debug!(url = %url, "POST");
        let req = self.http.post(&url).build().map_err(Error::BuildRequest)?;
        let resp = self.transport.send(req).await?;

        match resp.status() {
            StatusCode::OK => {
                let body = resp.text().await.map_err(Error::Transport)?;
                if body.trim().is_empty() {
                    return Ok(String::new());
                }
                let parsed: SendTestNotificationResponse =
                    serde_json::from_str(&body).map_err(Error::Decode)?;
                Ok(parsed.test_notification_token.unwrap_or_default())
            }
            StatusCode::NOT_FOUND => Err(Error::NotificationEndpointNotFound),
            status => Err(Error::from_status(status, "request test notification")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerErrorKind;
    use crate::test_support::{identity, key_pair};
    use httpmock::prelude::*;

    const PATH: &str = "/inApps/v1/notifications/test";

    fn client(server: &MockServer) -> AscClient {
        let (enc, _) = key_pair();
        AscClient::new(TokenIssuer::new(identity(), enc), Environment::Sandbox)
            .unwrap()
            .with_storekit_base(server.base_url())
    }

    #[test]
    fn sandbox_flag_selects_host() {
        assert_eq!(
            Environment::from_sandbox_flag(true).storekit_base(),
            "https://api.storekit-sandbox.itunes.apple.com"
        );
        assert_eq!(
            Environment::from_sandbox_flag(false).storekit_base(),
            "https://api.storekit.itunes.apple.com"
        );
    }

    #[tokio::test]
    async fn test_notification_returns_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(PATH)
                    .header_exists("authorization");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"testNotificationToken":"tok_123"}"#);
            })
            .await;

        let token = client(&server).request_test_notification().await.unwrap();
        assert_eq!(token, "tok_123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_body_yields_empty_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(200);
            })
            .await;

        let token = client(&server).request_test_notification().await.unwrap();
        assert!(token.is_empty());
    }

    #[tokio::test]
    async fn not_found_means_endpoint_not_configured() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(404);
            })
            .await;

        let err = client(&server).request_test_notification().await.unwrap_err();
        assert!(matches!(err, Error::NotificationEndpointNotFound));
    }

    #[tokio::test]
    async fn unauthorized_is_classified() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(401);
            })
            .await;

        let err = client(&server).request_test_notification().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "request test notification: unauthorized, check your credentials"
        );
    }

    #[tokio::test]
    async fn other_statuses_are_unknown() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(503);
            })
            .await;

        match client(&server).request_test_notification().await.unwrap_err() {
            Error::Server { action, kind } => {
                assert_eq!(action, "request test notification");
                assert_eq!(kind, ServerErrorKind::Unknown(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(200).body("not json");
            })
            .await;

        let err = client(&server).request_test_notification().await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
