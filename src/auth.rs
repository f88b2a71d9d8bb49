//! ES256 JWT generation for App Store Connect API authentication.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Audience every App Store Connect token must carry.
pub const AUDIENCE: &str = "appstoreconnect-v1";

pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(20 * 60);

/// Apple rejects tokens that live longer than this.
pub const MAX_VALIDITY: Duration = Duration::from_secs(60 * 60);

/// Identifiers of the API key, as shown in App Store Connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub issuer_id: String,
    pub bundle_id: String,
    pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
    pub aud: Vec<String>,
    pub bid: String,
}

/// Source of the current unix time, in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: Claims,
}

/// Generate a short-lived ES256 JWT issued at `issued_at`.
pub fn generate_token(
    identity: &Identity,
    private_key: &EncodingKey,
    issued_at: u64,
    validity: Duration,
) -> Result<SignedToken> {
    let claims = Claims {
        iss: identity.issuer_id.clone(),
        iat: issued_at,
        exp: issued_at + validity.as_secs(),
        aud: vec![AUDIENCE.to_string()],
        bid: identity.bundle_id.clone(),
    };

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(identity.key_id.clone());
    header.typ = Some("JWT".to_string());

    let token = encode(&header, &claims, private_key).map_err(Error::Signing)?;
    Ok(SignedToken { token, claims })
}

/// Issue a token valid for [`DEFAULT_VALIDITY`] from now.
pub fn issue(identity: &Identity, private_key: &EncodingKey) -> Result<String> {
    generate_token(identity, private_key, SystemClock.now(), DEFAULT_VALIDITY).map(|t| t.token)
}

/// Binds an identity and key so fresh tokens can be minted on demand.
///
/// Holds no mutable state, so one issuer can be shared by concurrent requests.
#[derive(Clone)]
pub struct TokenIssuer {
    identity: Identity,
    key: EncodingKey,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(identity: Identity, key: EncodingKey) -> Self {
        Self {
            identity,
            key,
            validity: DEFAULT_VALIDITY,
            clock: Arc::new(SystemClock),
        }
    }

    /// Override the validity window. Must be non-zero and at most [`MAX_VALIDITY`].
    pub fn with_validity(mut self, validity: Duration) -> Result<Self> {
        if validity.as_secs() == 0 || validity > MAX_VALIDITY {
            return Err(Error::Config(format!(
                "token validity must be between 1 and {} seconds, got {}",
                MAX_VALIDITY.as_secs(),
                validity.as_secs()
            )));
        }
        self.validity = validity;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn mint(&self) -> Result<SignedToken> {
        let signed = generate_token(&self.identity, &self.key, self.clock.now(), self.validity)?;
        debug!(
            kid = %self.identity.key_id,
            iat = signed.claims.iat,
            exp = signed.claims.exp,
            "JWT generated"
        );
        Ok(signed)
    }

    pub fn issue(&self) -> Result<String> {
        self.mint().map(|t| t.token)
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("identity", &self.identity)
            .field("validity", &self.validity)
            .field("key", &"<redacted>")
            .finish()
    }
}
