use std::path::PathBuf;

use clap::Parser;

use bridge_core::constants::{
    DEFAULT_BODY_LIMIT_BYTES, DEFAULT_COMPLETED_TTL_SECONDS, DEFAULT_FREE_TIER_IDENTITY_DAILY_CAP,
    DEFAULT_MAX_COMPLETED, DEFAULT_MAX_PENDING, DEFAULT_MAX_PROFILES, DEFAULT_SYNC_TIMEOUT_SECONDS,
    FREE_TIER_PEER_DAILY_CAP,
};

/// Command-line / environment-variable configuration (§6.6). Every field
/// here corresponds to a documented option; `Config::validate` collects
/// every violation rather than stopping at the first.
#[derive(Debug, Parser, Clone)]
#[command(name = "bridge-node", about = "Agent bridge gateway node")]
pub struct Args {
    /// Executor/provider signing key, `0x` + 64 hex chars.
    #[arg(long, env = "BRIDGE_PRIVATE_KEY")]
    pub private_key: String,

    #[arg(long, env = "BRIDGE_PORT", default_value_t = 8787)]
    pub port: u16,

    #[arg(long, env = "BRIDGE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "BRIDGE_TASK_TIMEOUT_SECONDS", default_value_t = 300)]
    pub task_timeout_seconds: u32,

    #[arg(long, env = "BRIDGE_PRICE_PER_TASK", default_value_t = 0.0)]
    pub price_per_task: f64,

    /// Upstream directory/discovery node. Absent disables the discovery proxy.
    #[arg(long, env = "BRIDGE_NODE_URL")]
    pub node_url: Option<String>,

    #[arg(long, env = "BRIDGE_ESCROW_ADDRESS")]
    pub escrow_address: Option<String>,
    #[arg(long, env = "BRIDGE_ESCROW_RPC_URL")]
    pub escrow_rpc_url: Option<String>,
    #[arg(long, env = "BRIDGE_ESCROW_PROVIDER_DID")]
    pub escrow_provider_did: Option<String>,

    #[arg(long, env = "BRIDGE_PAYMENT_ENABLED", default_value_t = false)]
    pub payment_enabled: bool,
    #[arg(long, env = "BRIDGE_USDC_ADDRESS")]
    pub usdc_address: Option<String>,
    #[arg(long, env = "BRIDGE_PAY_TO")]
    pub pay_to: Option<String>,
    #[arg(long, env = "BRIDGE_PAYMENT_VALIDITY_SECONDS")]
    pub validity_period_seconds: Option<u64>,

    #[arg(long, env = "BRIDGE_REQUIRE_AUTH", default_value_t = false)]
    pub require_auth: bool,
    #[arg(long, env = "BRIDGE_BEARER_TOKEN")]
    pub bearer_token: Option<String>,
    #[arg(long, env = "BRIDGE_WS_AUTH_TOKEN")]
    pub ws_auth_token: Option<String>,

    #[arg(long, env = "BRIDGE_ORIGIN_ALLOWLIST", value_delimiter = ',')]
    pub origin_allowlist: Vec<String>,

    #[arg(long, env = "BRIDGE_SANDBOX_ROOT", default_value = "./sandbox")]
    pub sandbox_root: PathBuf,
    #[arg(long, env = "BRIDGE_EXECUTOR_BINARY")]
    pub executor_binary: Option<PathBuf>,

    #[arg(long, env = "BRIDGE_TRUST_STORE_PATH", default_value = "./data/trust-store.json")]
    pub trust_store_path: PathBuf,
    #[arg(long, env = "BRIDGE_RATE_LIMIT_STORE_PATH", default_value = "./data/rate-limits.json")]
    pub rate_limit_store_path: PathBuf,

    #[arg(long, env = "BRIDGE_MAX_PENDING", default_value_t = DEFAULT_MAX_PENDING)]
    pub max_pending: usize,
    #[arg(long, env = "BRIDGE_MAX_COMPLETED", default_value_t = DEFAULT_MAX_COMPLETED)]
    pub max_completed: usize,
    #[arg(long, env = "BRIDGE_MAX_PROFILES", default_value_t = DEFAULT_MAX_PROFILES)]
    pub max_profiles: usize,
    #[arg(long, env = "BRIDGE_COMPLETED_TTL_SECONDS", default_value_t = DEFAULT_COMPLETED_TTL_SECONDS)]
    pub completed_ttl_seconds: i64,
    #[arg(long, env = "BRIDGE_BODY_LIMIT_BYTES", default_value_t = DEFAULT_BODY_LIMIT_BYTES)]
    pub body_limit_bytes: usize,
    #[arg(long, env = "BRIDGE_SYNC_TIMEOUT_SECONDS", default_value_t = DEFAULT_SYNC_TIMEOUT_SECONDS)]
    pub sync_timeout_seconds: u64,
    #[arg(long, env = "BRIDGE_FREE_TIER_IDENTITY_DAILY_CAP", default_value_t = DEFAULT_FREE_TIER_IDENTITY_DAILY_CAP)]
    pub free_tier_identity_daily_cap: u32,
    #[arg(long, env = "BRIDGE_FREE_TIER_PEER_DAILY_CAP", default_value_t = FREE_TIER_PEER_DAILY_CAP)]
    pub free_tier_peer_daily_cap: u32,

    #[arg(long, env = "BRIDGE_AGENT_NAME", default_value = "agent-bridge")]
    pub agent_name: String,
    #[arg(long, env = "BRIDGE_AGENT_DESCRIPTION", default_value = "An autonomous agent reachable over the bridge protocol.")]
    pub agent_description: String,
    #[arg(long, env = "BRIDGE_DOCUMENTATION_URL")]
    pub documentation_url: Option<String>,
    #[arg(long, env = "BRIDGE_TERMS_URL")]
    pub terms_of_service_url: Option<String>,
    #[arg(long, env = "BRIDGE_PRIVACY_URL")]
    pub privacy_policy_url: Option<String>,
}

/// Validated, immutable-after-construction configuration (§5 "shared-resource
/// discipline"). `Config::from_args` is the only way to produce one.
#[derive(Debug, Clone)]
pub struct Config {
    pub args: Args,
    pub escrow_configured: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        if !is_valid_private_key(&args.private_key) {
            errors.push("private_key must match ^0x[0-9a-fA-F]{64}$".to_string());
        }
        if args.port == 0 {
            errors.push("port must be between 1 and 65535".to_string());
        }
        if args.task_timeout_seconds < 1 {
            errors.push("task_timeout_seconds must be >= 1".to_string());
        }
        if args.price_per_task < 0.0 {
            errors.push("price_per_task must be >= 0".to_string());
        }
        if let Some(url) = &args.node_url {
            if url::Url::parse(url).is_err() {
                errors.push("node_url must be a valid URL".to_string());
            }
        }

        let escrow_fields = [
            args.escrow_address.is_some(),
            args.escrow_rpc_url.is_some(),
            args.escrow_provider_did.is_some(),
        ];
        let escrow_any = escrow_fields.iter().any(|v| *v);
        let escrow_all = escrow_fields.iter().all(|v| *v);
        if escrow_any && !escrow_all {
            errors.push(
                "escrow address/rpc_url/provider_did must be configured all-or-nothing".to_string(),
            );
        }

        if args.payment_enabled && args.usdc_address.is_none() {
            errors.push("usdc_address is required when payment middleware is enabled".to_string());
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Config {
            escrow_configured: escrow_all,
            args,
        })
    }
}

fn is_valid_private_key(key: &str) -> bool {
    key.strip_prefix("0x")
        .map(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            private_key: format!("0x{}", "a".repeat(64)),
            port: 8787,
            host: "127.0.0.1".into(),
            task_timeout_seconds: 300,
            price_per_task: 0.0,
            node_url: None,
            escrow_address: None,
            escrow_rpc_url: None,
            escrow_provider_did: None,
            payment_enabled: false,
            usdc_address: None,
            pay_to: None,
            validity_period_seconds: None,
            require_auth: false,
            bearer_token: None,
            ws_auth_token: None,
            origin_allowlist: vec![],
            sandbox_root: "./sandbox".into(),
            executor_binary: None,
            trust_store_path: "./data/trust-store.json".into(),
            rate_limit_store_path: "./data/rate-limits.json".into(),
            max_pending: DEFAULT_MAX_PENDING,
            max_completed: DEFAULT_MAX_COMPLETED,
            max_profiles: DEFAULT_MAX_PROFILES,
            completed_ttl_seconds: DEFAULT_COMPLETED_TTL_SECONDS,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            sync_timeout_seconds: DEFAULT_SYNC_TIMEOUT_SECONDS,
            free_tier_identity_daily_cap: DEFAULT_FREE_TIER_IDENTITY_DAILY_CAP,
            free_tier_peer_daily_cap: FREE_TIER_PEER_DAILY_CAP,
            agent_name: "agent-bridge".into(),
            agent_description: "test".into(),
            documentation_url: None,
            terms_of_service_url: None,
            privacy_policy_url: None,
        }
    }

    #[test]
    fn valid_args_pass() {
        assert!(Config::from_args(base_args()).is_ok());
    }

    #[test]
    fn rejects_malformed_private_key() {
        let mut args = base_args();
        args.private_key = "not-a-key".into();
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn reports_all_errors_at_once() {
        let mut args = base_args();
        args.private_key = "bad".into();
        args.task_timeout_seconds = 0;
        let errs = Config::from_args(args).unwrap_err();
        assert!(errs.len() >= 2);
    }

    #[test]
    fn rejects_partial_escrow_config() {
        let mut args = base_args();
        args.escrow_address = Some("0xabc".into());
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn accepts_full_escrow_config() {
        let mut args = base_args();
        args.escrow_address = Some("0xabc".into());
        args.escrow_rpc_url = Some("http://localhost:9000".into());
        args.escrow_provider_did = Some("did:key:zabc".into());
        let cfg = Config::from_args(args).unwrap();
        assert!(cfg.escrow_configured);
    }

    #[test]
    fn rejects_payment_without_usdc_address() {
        let mut args = base_args();
        args.payment_enabled = true;
        assert!(Config::from_args(args).is_err());
    }
}
