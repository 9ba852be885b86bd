use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{domain::ChatId, ports::NotificationSink, Result};

/// Per-chat limiters are swept once the map holds this many chats.
const SWEEP_AT: usize = 64;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound notifications (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between notifications per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.next <= now
    }
}

/// NotificationSink decorator that spaces outbound messages.
///
/// Concurrent uploads each report progress; this keeps their combined output
/// under Telegram's flood limits.
pub struct ThrottledNotifier {
    inner: Arc<dyn NotificationSink>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledNotifier {
    pub fn new(inner: Arc<dyn NotificationSink>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if map.len() >= SWEEP_AT && !map.contains_key(&chat_id) {
            // A chat whose next slot already passed has nothing left to space out.
            let now = Instant::now();
            map.retain(|_, lim| {
                Arc::strong_count(lim) > 1
                    || lim.try_lock().map_or(true, |l| !l.is_idle(now))
            });
        }
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl NotificationSink for ThrottledNotifier {
    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.throttle_chat(chat_id.0).await;
        self.inner.notify(chat_id, text).await
    }
}
