//! Service-account JWT bearer flow (RFC 7523).
//!
//! Build `base64url(header).base64url(claims)`, sign it with RS256, and trade
//! the assertion for an access token at the credential's token endpoint.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    signature::{SignatureEncoding, Signer},
    RsaPrivateKey,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};

use tgdrive_core::{
    domain::{BearerToken, Credential},
    errors::Error,
    ports::TokenProvider,
    Result,
};

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Strip the PEM armor lines and decode the base64 body.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    // Keys pasted into env files often keep JSON-style `\n` escapes.
    let pem = pem.replace("\\n", "\n");
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    if body.is_empty() {
        return Err(Error::Auth("private key is empty".to_string()));
    }

    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| Error::Auth(format!("private key is not valid base64: {e}")))
}

fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    let der = pem_to_der(pem)?;
    let parsed = if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_der(&der).map_err(|e| e.to_string())
    } else {
        RsaPrivateKey::from_pkcs8_der(&der).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::Auth(format!("invalid RSA private key: {e}")))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

/// Signed RS256 assertion for `credential`, issued at `now` (epoch seconds).
pub fn build_assertion(credential: &Credential, now: i64) -> Result<String> {
    let header = encode_segment(&JwtHeader {
        alg: "RS256",
        typ: "JWT",
    })?;
    let claims = encode_segment(&JwtClaims {
        iss: &credential.issuer,
        scope: &credential.scope,
        aud: &credential.token_endpoint,
        exp: now + ASSERTION_LIFETIME_SECS,
        iat: now,
    })?;
    let signing_input = format!("{header}.{claims}");

    let key = load_private_key(&credential.private_key)?;
    let signature = SigningKey::<Sha256>::new(key)
        .try_sign(signing_input.as_bytes())
        .map_err(|e| Error::Auth(format!("signing assertion failed: {e}")))?;

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_vec())
    ))
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Mints a fresh bearer token per call. Wrap in `TokenCache` to reuse tokens.
#[derive(Clone)]
pub struct TokenMinter {
    http: reqwest::Client,
    clock: Clock,
}

impl TokenMinter {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn mint(&self, credential: &Credential) -> Result<BearerToken> {
        let now = (self.clock)();
        let assertion = build_assertion(credential, now)?;

        let resp = self
            .http
            .post(&credential.token_endpoint)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Auth(format!("token response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Auth(format!("token response is not JSON: {e}")))?;
        let value = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth(format!("token response lacks access_token: {body}")))?;

        let lifetime = parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        debug!(lifetime, "token endpoint answered");
        info!(issuer = %credential.issuer, "minted bearer token");

        Ok(BearerToken {
            value,
            expires_at_epoch_seconds: now + lifetime,
        })
    }
}

#[async_trait]
impl TokenProvider for TokenMinter {
    async fn token(&self, credential: &Credential) -> Result<BearerToken> {
        self.mint(credential).await
    }
}
