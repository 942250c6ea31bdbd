// src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use std::num::NonZeroU32;
use std::str::FromStr;
use governor::Quota;
use ipnetwork::IpNetwork;
use log::warn;

pub const DOMAIN: &str = "mc_server_stats";

pub const DEFAULT_SCAN_INTERVAL: u64 = 60;
pub const DEFAULT_DISCOVERY_INTERVAL: u64 = 300; // 5 minutes
pub const SCAN_PORT_MIN: u16 = 25565;
pub const SCAN_PORT_MAX: u16 = 25575;

pub const SCAN_INTERVAL_RANGE: (u64, u64) = (10, 3600);
pub const DISCOVERY_INTERVAL_RANGE: (u64, u64) = (30, 86400);

const DEFAULT_TRUSTED_NETWORKS: &str = "127.0.0.0/8,::1/128,10.0.0.0/8,172.16.0.0/12,192.168.0.0/16";

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub data_dir: PathBuf,

    // Network timeouts
    pub status_timeout_secs: u64,
    pub scan_timeout_secs: u64,

    // Rate limiting for mutating API calls
    pub api_period_secs: u64,
    pub api_burst_limit: u32,

    // Clients allowed to use /api
    pub trusted_networks: Vec<IpNetwork>,
    // Extra browser origins for the dashboard card, e.g. https://ha.example.com
    pub cors_origins: Vec<String>,

    // Dashboard card registration
    pub card_register_attempts: u32,
    pub card_register_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            data_dir: PathBuf::from("data"),
            status_timeout_secs: 5,
            scan_timeout_secs: 3,
            api_period_secs: 1,
            api_burst_limit: 20,
            trusted_networks: parse_networks(DEFAULT_TRUSTED_NETWORKS),
            cors_origins: Vec::new(),
            card_register_attempts: 5,
            card_register_delay_secs: 3,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => match v.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Ignoring invalid value for {}: {:?}", key, v);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parses a comma separated CIDR list, skipping malformed items.
pub fn parse_networks(list: &str) -> Vec<IpNetwork> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match IpNetwork::from_str(s) {
            Ok(network) => Some(network),
            Err(e) => {
                warn!("Ignoring invalid trusted network {}: {}", s, e);
                None
            }
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),

            port: env_or("PORT", defaults.port),

            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),

            status_timeout_secs: env_or("STATUS_TIMEOUT_SECS", defaults.status_timeout_secs),

            scan_timeout_secs: env_or("SCAN_TIMEOUT_SECS", defaults.scan_timeout_secs),

            api_period_secs: env_or("API_PERIOD_SECS", defaults.api_period_secs),

            api_burst_limit: env_or("API_BURST_LIMIT", defaults.api_burst_limit),

            trusted_networks: env::var("TRUSTED_NETWORKS")
                .map(|v| parse_networks(&v))
                .unwrap_or(defaults.trusted_networks),

            cors_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|origin| origin.trim().trim_end_matches('/').to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),

            card_register_attempts: env_or("CARD_REGISTER_ATTEMPTS", defaults.card_register_attempts),

            card_register_delay_secs: env_or("CARD_REGISTER_DELAY_SECS", defaults.card_register_delay_secs),
        }
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn card_register_delay(&self) -> Duration {
        Duration::from_secs(self.card_register_delay_secs)
    }

    pub fn api_quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.api_burst_limit).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(Duration::from_secs(self.api_period_secs))
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }

    pub fn entries_path(&self) -> PathBuf {
        self.data_dir.join("entries.json")
    }

    pub fn resources_path(&self) -> PathBuf {
        self.data_dir.join("resources.json")
    }
}
