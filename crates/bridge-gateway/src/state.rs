use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use bridge_collab::{DirectoryClient, EscrowClient, Executor};
use bridge_state::{FreeTierLimiter, TaskRegistry, TrustStore};

use crate::config::Config;
use crate::ws::WsHub;

/// Shared application state handed to every handler (§4 components wired
/// together). Construction is the node binary's job; the gateway only
/// consumes it.
pub struct AppState {
    pub config: Config,
    pub registry: TaskRegistry,
    pub limiter: FreeTierLimiter,
    pub trust_store: TrustStore,
    pub executor: Arc<dyn Executor>,
    pub escrow: Arc<dyn EscrowClient>,
    pub directory: Option<Arc<dyn DirectoryClient>>,
    pub ws_hub: WsHub,
    pub started_at: Instant,
    /// `/sandbox` trial counter (§4.1): hourly, per peer, independent of the
    /// daily free-tier counters since it has its own reset cadence.
    pub sandbox_counters: DashMap<String, (u32, i64)>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: Config,
        executor: Arc<dyn Executor>,
        escrow: Arc<dyn EscrowClient>,
        directory: Option<Arc<dyn DirectoryClient>>,
    ) -> Self {
        let registry = TaskRegistry::new(
            config.args.max_pending,
            config.args.max_completed,
            config.args.completed_ttl_seconds,
        );
        let limiter = FreeTierLimiter::load_from(&config.args.rate_limit_store_path);
        let trust_store = TrustStore::load(&config.args.trust_store_path, config.args.max_profiles);

        Self {
            config,
            registry,
            limiter,
            trust_store,
            executor,
            escrow,
            directory,
            ws_hub: WsHub::new(),
            started_at: Instant::now(),
            sandbox_counters: DashMap::new(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
