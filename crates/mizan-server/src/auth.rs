//! Request authentication.
//!
//! The identity provider in front of the service has already authenticated
//! the user; this layer only checks that the request came through it:
//! a shared API key, an optional HMAC over the raw body, and the subject id
//! the provider forwards in `x-user-id`.

use std::convert::Infallible;

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use mizan_primitives::Locale;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Largest body the signature check will buffer.
pub const MAX_SIGNED_BODY_BYTES: usize = 1_048_576;

type HmacSha256 = Hmac<Sha256>;

/// Secrets the middleware checks requests against.
pub struct AuthConfig {
    api_key: SecretString,
    hmac_secret: Option<SecretString>,
    require_signature: bool,
}

impl AuthConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            hmac_secret: None,
            require_signature: false,
        }
    }

    #[must_use]
    pub fn with_hmac_secret(mut self, secret: SecretString, required: bool) -> Self {
        self.hmac_secret = Some(secret);
        self.require_signature = required;
        self
    }

    fn key_matches(&self, presented: &str) -> bool {
        let expected = self.api_key.expose_secret().as_bytes();
        expected.ct_eq(presented.as_bytes()).into()
    }
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign_body(secret: &[u8], body: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("invalid HMAC secret: {e}"))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Middleware guarding every route except health.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }
    let auth = &state.auth;

    let key_ok = header(req.headers(), API_KEY_HEADER).is_some_and(|k| auth.key_matches(k));
    if !key_ok {
        warn!(path = %req.uri().path(), "rejected request with missing or wrong API key");
        return Err(ApiError::Unauthorized("invalid API key").into_response());
    }

    if header(req.headers(), USER_ID_HEADER).is_none() {
        return Err(ApiError::Unauthorized("missing x-user-id").into_response());
    }

    let signature = header(req.headers(), SIGNATURE_HEADER).map(str::to_owned);
    match (&auth.hmac_secret, signature) {
        (Some(secret), Some(signature)) => {
            let body = std::mem::take(req.body_mut());
            let bytes = to_bytes(body, MAX_SIGNED_BODY_BYTES)
                .await
                .map_err(|_| ApiError::BadRequest("request body too large to sign".into()).into_response())?;

            let presented = hex::decode(&signature)
                .map_err(|_| ApiError::Unauthorized("malformed signature").into_response())?;
            let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
                .map_err(|e| ApiError::Internal(e.to_string()).into_response())?;
            mac.update(&bytes);
            if mac.verify_slice(&presented).is_err() {
                warn!(path = %req.uri().path(), "rejected request with bad signature");
                return Err(ApiError::Unauthorized("invalid signature").into_response());
            }
            debug!(bytes = bytes.len(), "signature verified");
            *req.body_mut() = Body::from(bytes);
        }
        (Some(_), None) if auth.require_signature => {
            return Err(ApiError::Unauthorized("missing signature").into_response());
        }
        // No secret configured: a signature cannot be checked and is ignored.
        _ => {}
    }

    Ok(next.run(req).await)
}

/// The authenticated user, taken from `x-user-id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header(&parts.headers, USER_ID_HEADER).map(str::to_owned)))
    }
}

/// Language requested through `Accept-Language`, English by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lang(pub Locale);

impl<S: Send + Sync> FromRequestParts<S> for Lang {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = header(&parts.headers, "accept-language")
            .map_or(Locale::En, Locale::from_accept_language);
        Ok(Self(locale))
    }
}
