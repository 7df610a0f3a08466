//! Blocking HTTP client for the mizan API.
//!
//! Every request carries the API key and user id; when an HMAC secret is
//! configured the raw body (empty for reads) is signed into `x-signature`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use hmac::{Hmac, Mac};
use mizan_config::ClientConfig;
use mizan_core::api::ApiResponse;
use reqwest::{
    Method,
    blocking::{Client, RequestBuilder},
    header::{ACCEPT_LANGUAGE, CONTENT_TYPE},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::{debug, instrument, warn};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    hmac_secret: Option<SecretString>,
    user_id: String,
    lang: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.server_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            hmac_secret: config.hmac_secret.clone(),
            user_id: config.user_id.clone(),
            lang: config.lang.as_str().to_owned(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None::<&()>, None::<&()>)
    }

    pub fn get_with<Q: Serialize, T: DeserializeOwned>(&self, path: &str, query: &Q) -> Result<T> {
        self.send(Method::GET, path, Some(query), None::<&()>)
    }

    pub fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::POST, path, None::<&()>, Some(body))
    }

    pub fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::PUT, path, None::<&()>, Some(body))
    }

    pub fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::DELETE, path, None::<&()>, None::<&()>)
    }

    #[instrument(skip(self, query, body))]
    fn send<Q: Serialize, B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> Result<T> {
        let payload = match body {
            Some(body) => serde_json::to_vec(body).context("failed to encode request body")?,
            None => Vec::new(),
        };

        let mut req = self
            .http
            .request(method, self.url(path))
            .header("x-api-key", self.api_key.expose_secret())
            .header("x-user-id", &self.user_id)
            .header(ACCEPT_LANGUAGE, &self.lang);
        if let Some(query) = query {
            req = req.query(query);
        }
        req = self.sign(req, &payload)?;
        if body.is_some() {
            req = req.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let resp = req
            .send()
            .with_context(|| format!("request to {path} failed; is mizan-server running?"))?;
        let status = resp.status();
        debug!(status = %status, "response received");

        let envelope: ApiResponse<T> = resp
            .json()
            .with_context(|| format!("unreadable response from {path} ({status})"))?;
        unwrap_envelope(envelope, status.as_u16())
    }

    fn sign(&self, req: RequestBuilder, payload: &[u8]) -> Result<RequestBuilder> {
        let Some(secret) = &self.hmac_secret else {
            return Ok(req);
        };
        let signature = sign_body(secret.expose_secret().as_bytes(), payload)?;
        Ok(req.header("x-signature", signature))
    }
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign_body(secret: &[u8], body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("invalid HMAC secret: {e}"))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn unwrap_envelope<T>(envelope: ApiResponse<T>, status: u16) -> Result<T> {
    if !envelope.success {
        let message = envelope.error.unwrap_or_else(|| "unknown error".into());
        warn!(status, error = %message, "request rejected");
        bail!("{message} ({status})");
    }
    envelope
        .data
        .with_context(|| format!("server answered {status} without data"))
}
