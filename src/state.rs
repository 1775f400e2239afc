//! Application state: configuration, provider client factory and the in-memory session table.
//!
//! Every quiz session owns its own controller and its own provider client (and
//! therefore its own session token). Sessions share one reqwest connection pool.
//!
//! The table is bounded: sessions idle longer than `[sessions] idle_timeout_secs`
//! are swept by a background task, and at `max_sessions` the least recently used
//! entry is dropped to admit a new one.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{load_config_from_env, QuizConfig};
use crate::error::TriviaError;
use crate::quiz::{Outcome, QuizController};
use crate::trivia::{OpenTrivia, TriviaApi};

pub type ApiFactory = Arc<dyn Fn() -> Arc<dyn TriviaApi> + Send + Sync>;

struct SessionEntry {
    ctl: Arc<QuizController>,
    last_seen: Instant,
    /// Monotonic use stamp; orders entries even when `last_seen` ties.
    stamp: u64,
}

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    clock: Arc<AtomicU64>,
    pub config: QuizConfig,
    api_factory: ApiFactory,
}

impl AppState {
    /// Build state from env: load config and prepare the Open Trivia client factory.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, TriviaError> {
        let config = load_config_from_env();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs.max(1)))
            .build()
            .map_err(|e| TriviaError::Network(e.to_string()))?;

        let base_url = config.api.base_url.clone();
        let retry = config.retry.clone();
        info!(
            target: "trivia_quiz",
            %base_url,
            retry_attempts = retry.max_attempts,
            "Trivia provider configured"
        );

        let factory: ApiFactory = Arc::new(move || {
            let api = OpenTrivia::with_client(client.clone(), &base_url, retry.clone());
            Arc::new(api) as Arc<dyn TriviaApi>
        });
        Ok(Self::with_api_factory(config, factory))
    }

    pub fn with_api_factory(config: QuizConfig, api_factory: ApiFactory) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(AtomicU64::new(0)),
            config,
            api_factory,
        }
    }

    /// Fresh controller with its own provider client, not registered in the session table.
    pub fn new_controller(&self) -> Arc<QuizController> {
        Arc::new(QuizController::new(
            (self.api_factory)(),
            self.config.defaults.to_options(),
            self.config.messages.clone(),
        ))
    }

    fn next_stamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Create, bootstrap and register a session.
    #[instrument(level = "info", skip(self))]
    pub async fn create_session(&self) -> (String, Arc<QuizController>, Outcome) {
        let ctl = self.new_controller();
        let outcome = ctl.bootstrap().await;
        let id = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            ctl: ctl.clone(),
            last_seen: Instant::now(),
            stamp: self.next_stamp(),
        };

        let mut sessions = self.sessions.write().await;
        let max = self.config.sessions.max_sessions.max(1);
        while sessions.len() >= max {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.stamp)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    sessions.remove(&k);
                    info!(
                        target: "quiz",
                        session = %k,
                        "Session table full; dropped least recently used"
                    );
                }
                None => break,
            }
        }
        sessions.insert(id.clone(), entry);
        info!(target: "quiz", session = %id, total = sessions.len(), "Session created");
        (id, ctl, outcome)
    }

    /// Look up a session and mark it as used.
    pub async fn get_session(&self, id: &str) -> Option<Arc<QuizController>> {
        let stamp = self.next_stamp();
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        entry.stamp = stamp;
        Some(entry.ctl.clone())
    }

    #[instrument(level = "info", skip(self))]
    pub async fn remove_session(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions not used for at least `max_idle`. Returns how many were dropped.
    /// In-flight actions keep their controller alive until they finish.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| e.last_seen.elapsed() < max_idle);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "quiz", evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    /// Periodically evict idle sessions for the lifetime of the process.
    pub fn spawn_session_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(self);
        let idle = state.config.sessions.idle_timeout();
        let period = state.config.sessions.sweep_interval();
        info!(
            target: "trivia_quiz",
            idle_secs = idle.as_secs(),
            sweep_secs = period.as_secs(),
            "Session sweeper started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = state.evict_idle(idle).await;
                debug!(target: "quiz", evicted, "Session sweep done");
            }
        })
    }
}
