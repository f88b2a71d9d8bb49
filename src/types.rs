//! StoreKit server API response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /inApps/v1/notifications/test`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTestNotificationResponse {
    pub test_notification_token: Option<String>,
}

/// Output of the `token` command.
#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub token: String,
    pub key_id: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
