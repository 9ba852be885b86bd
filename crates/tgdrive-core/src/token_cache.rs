use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{BearerToken, Credential},
    ports::TokenProvider,
    Result,
};

/// Seconds before expiry at which a cached token is no longer handed out.
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 60;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Caller-owned token cache keyed by credential identity.
///
/// Wraps any `TokenProvider`; the engine only sees the trait, so it stays
/// unaware of whether tokens are reused.
pub struct TokenCache<P> {
    inner: P,
    skew_secs: i64,
    clock: Clock,
    entries: Mutex<HashMap<String, BearerToken>>,
}

impl<P: TokenProvider> TokenCache<P> {
    pub fn new(inner: P) -> Self {
        Self::with_clock(
            inner,
            DEFAULT_EXPIRY_SKEW_SECS,
            Arc::new(|| chrono::Utc::now().timestamp()),
        )
    }

    pub fn with_clock(inner: P, skew_secs: i64, clock: Clock) -> Self {
        Self {
            inner,
            skew_secs,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for TokenCache<P> {
    async fn token(&self, credential: &Credential) -> Result<BearerToken> {
        let key = credential.identity();
        let now = (self.clock)();

        if let Some(tok) = self.entries.lock().await.get(&key) {
            if tok.is_fresh_at(now, self.skew_secs) {
                tracing::debug!(issuer = %credential.issuer, "reusing cached bearer token");
                return Ok(tok.clone());
            }
        }

        let tok = self.inner.token(credential).await?;
        self.entries.lock().await.insert(key, tok.clone());
        Ok(tok)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use super::*;

    struct CountingMinter {
        mints: AtomicUsize,
        lifetime: i64,
        now: Arc<AtomicI64>,
    }

    #[async_trait]
    impl TokenProvider for CountingMinter {
        async fn token(&self, _credential: &Credential) -> Result<BearerToken> {
            let n = self.mints.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(BearerToken {
                value: format!("tok-{n}"),
                expires_at_epoch_seconds: self.now.load(Ordering::SeqCst) + self.lifetime,
            })
        }
    }

    fn cred(issuer: &str) -> Credential {
        Credential {
            issuer: issuer.to_string(),
            private_key: "k".to_string(),
            scope: "s".to_string(),
            token_endpoint: "https://token".to_string(),
        }
    }

    fn cache(lifetime: i64) -> (TokenCache<CountingMinter>, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(1_000));
        let minter = CountingMinter {
            mints: AtomicUsize::new(0),
            lifetime,
            now: now.clone(),
        };
        let clock_now = now.clone();
        let c = TokenCache::with_clock(
            minter,
            60,
            Arc::new(move || clock_now.load(Ordering::SeqCst)),
        );
        (c, now)
    }

    #[tokio::test]
    async fn reuses_token_until_close_to_expiry() {
        let (c, now) = cache(3600);
        let a = cred("a@x");

        assert_eq!(c.token(&a).await.unwrap().value, "tok-1");
        assert_eq!(c.token(&a).await.unwrap().value, "tok-1");

        now.store(1_000 + 3600 - 30, Ordering::SeqCst);
        assert_eq!(c.token(&a).await.unwrap().value, "tok-2");
    }

    #[tokio::test]
    async fn keys_by_credential_identity() {
        let (c, _) = cache(3600);
        assert_eq!(c.token(&cred("a@x")).await.unwrap().value, "tok-1");
        assert_eq!(c.token(&cred("b@x")).await.unwrap().value, "tok-2");
        assert_eq!(c.token(&cred("a@x")).await.unwrap().value, "tok-1");
    }

    #[tokio::test]
    async fn short_lived_tokens_are_never_cached() {
        let (c, _) = cache(30);
        let a = cred("a@x");
        assert_eq!(c.token(&a).await.unwrap().value, "tok-1");
        assert_eq!(c.token(&a).await.unwrap().value, "tok-2");
    }
}
