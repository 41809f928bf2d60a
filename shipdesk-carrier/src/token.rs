use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use shipdesk_core::carrier::CarrierError;

/// Performs the carrier's login/token exchange. Injected so tests can
/// substitute a fake carrier.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<String, CarrierError>;
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Per-carrier session token cache: Absent -> Valid -> Expired -> Absent.
///
/// The refresh runs while holding the cache's mutex, so concurrent callers
/// hitting an expired entry await the single in-flight exchange instead of
/// each triggering their own.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    ttl: Duration,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached token when valid, otherwise exchange a fresh one.
    pub async fn get(&self) -> Result<String, CarrierError> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let value = self.provider.fetch_token().await?;
        *slot = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(value)
    }

    /// Evict the cached token. Callers do this on a 401; the cache never
    /// sees response codes itself.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

/// Authenticated request helper shared by the adapters: acquire a token,
/// send, and on a 401 invalidate + retry exactly once.
pub async fn send_authed<F>(
    cache: &TokenCache,
    make: F,
) -> Result<reqwest::Response, CarrierError>
where
    F: Fn(&str) -> reqwest::RequestBuilder,
{
    let token = cache.get().await?;
    let response = make(&token)
        .send()
        .await
        .map_err(|e| CarrierError::Network(e.to_string()))?;

    if response.status() != reqwest::StatusCode::UNAUTHORIZED {
        return Ok(response);
    }

    cache.invalidate().await;
    let token = cache.get().await?;
    let response = make(&token)
        .send()
        .await
        .map_err(|e| CarrierError::Network(e.to_string()))?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Err(CarrierError::AuthFailure(
            "carrier rejected a freshly issued token".to_string(),
        ));
    }
    Ok(response)
}

/// Provider for carriers authenticating with a static API key. Wrapping the
/// key in the cache keeps the 401 evict-and-retry path uniform.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn fetch_token(&self) -> Result<String, CarrierError> {
        Ok(self.0.clone())
    }
}
