//! Shared state for the Telegram bot.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use plantmama_agent::PlantAssistant;
use plantmama_core::Settings;
use plantmama_persistence::DataStore;
use tokio::sync::Mutex;
use tracing::debug;

/// Sliding-window limiter keyed by Telegram user id.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<i64, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Allow `max_requests` per `window` for each user.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests as usize,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request and report whether it is allowed.
    pub async fn check(&self, user_id: i64) -> bool {
        self.check_at(user_id, Instant::now()).await
    }

    /// [`check`](Self::check) at an explicit instant.
    pub async fn check_at(&self, user_id: i64, now: Instant) -> bool {
        let mut hits = self.hits.lock().await;
        for entries in hits.values_mut() {
            while let Some(&oldest) = entries.front() {
                if now.saturating_duration_since(oldest) >= self.window {
                    entries.pop_front();
                } else {
                    break;
                }
            }
        }
        hits.retain(|_, entries| !entries.is_empty());

        let entries = hits.entry(user_id).or_default();
        if entries.len() >= self.max_requests {
            debug!(user_id, count = entries.len(), "Rate limit exceeded");
            return false;
        }
        entries.push_back(now);
        true
    }

    /// Number of users with requests inside the window.
    pub async fn tracked_users(&self) -> usize {
        self.hits.lock().await.len()
    }

    /// Window length in seconds, for user-facing messages.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}

/// Everything the handlers share.
pub struct BotState {
    pub settings: Settings,
    pub agent: Arc<dyn PlantAssistant>,
    pub store: Arc<DataStore>,
    pub rate_limiter: RateLimiter,
}

impl BotState {
    pub fn new(settings: Settings, agent: Arc<dyn PlantAssistant>, store: Arc<DataStore>) -> Self {
        let rate_limiter = RateLimiter::new(
            settings.rate_limit_per_user,
            Duration::from_secs(settings.rate_limit_window_secs),
        );
        Self {
            settings,
            agent,
            store,
            rate_limiter,
        }
    }
}

/// Create shared state for the dispatcher.
pub fn create_shared_state(
    settings: Settings,
    agent: Arc<dyn PlantAssistant>,
    store: Arc<DataStore>,
) -> Arc<BotState> {
    Arc::new(BotState::new(settings, agent, store))
}
