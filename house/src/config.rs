use arcade_types::Token;
use rand::{rngs::OsRng, RngCore};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MIN_BET: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const DEFAULT_MAX_BET: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
pub const DEFAULT_ROUND_TTL_SECS: u64 = 600;
pub const DEFAULT_PERSISTENCE_BUFFER: usize = 1_024;
pub const DEFAULT_WAGER_HISTORY_LIMIT: usize = 100_000;
pub const DEFAULT_HTTP_RATE_LIMIT_PER_SECOND: u64 = 50;
pub const DEFAULT_HTTP_RATE_LIMIT_BURST: u32 = 100;
pub const DEFAULT_HTTP_BODY_LIMIT_BYTES: usize = 16 * 1024;

/// Length of the house secret in bytes.
pub const HOUSE_SECRET_LEN: usize = 32;

/// Secret that every round's reveal is derived from.
#[derive(Clone, PartialEq, Eq)]
pub struct HouseSecret([u8; HOUSE_SECRET_LEN]);

impl HouseSecret {
    pub fn new(bytes: [u8; HOUSE_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; HOUSE_SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a hex encoded secret (an optional `0x` prefix is accepted).
    pub fn from_hex(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = commonware_utils::from_hex(trimmed)?;
        let bytes: [u8; HOUSE_SECRET_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HouseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HouseSecret(..)")
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HouseConfig {
    /// Credit canonical payouts to the ledger. When disabled, payouts are recorded as deferred.
    pub payouts_enabled: bool,
    pub min_bet: Decimal,
    pub max_bet: Option<Decimal>,
    /// Tokens accepted for wagers, deposits and withdrawals (empty accepts any).
    pub allowed_tokens: Vec<Token>,
    pub round_ttl_secs: u64,
    pub persistence_path: Option<PathBuf>,
    pub persistence_buffer: Option<usize>,
    pub wager_history_limit: Option<usize>,
    pub http_rate_limit_per_second: Option<u64>,
    pub http_rate_limit_burst: Option<u32>,
    pub http_body_limit_bytes: Option<usize>,
    /// Browser origins allowed to call the house (`*` allows any).
    pub allowed_origins: Vec<String>,
    /// Admit requests that carry no `Origin` header.
    pub allow_no_origin: bool,
    /// Bearer token guarding `/metrics` (open when unset).
    #[serde(skip)]
    pub metrics_token: Option<String>,
    #[serde(skip)]
    pub house_secret: HouseSecret,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            payouts_enabled: false,
            min_bet: DEFAULT_MIN_BET,
            max_bet: Some(DEFAULT_MAX_BET),
            allowed_tokens: Vec::new(),
            round_ttl_secs: DEFAULT_ROUND_TTL_SECS,
            persistence_path: None,
            persistence_buffer: Some(DEFAULT_PERSISTENCE_BUFFER),
            wager_history_limit: Some(DEFAULT_WAGER_HISTORY_LIMIT),
            http_rate_limit_per_second: Some(DEFAULT_HTTP_RATE_LIMIT_PER_SECOND),
            http_rate_limit_burst: Some(DEFAULT_HTTP_RATE_LIMIT_BURST),
            http_body_limit_bytes: Some(DEFAULT_HTTP_BODY_LIMIT_BYTES),
            allowed_origins: Vec::new(),
            allow_no_origin: false,
            metrics_token: None,
            house_secret: HouseSecret::generate(),
        }
    }
}

impl HouseConfig {
    pub fn round_ttl(&self) -> Duration {
        Duration::from_secs(self.round_ttl_secs.max(1))
    }

    /// How often open rounds are checked for expiry.
    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs((self.round_ttl_secs / 10).clamp(1, 60))
    }

    pub fn persistence_buffer_capacity(&self) -> usize {
        self.persistence_buffer
            .unwrap_or(DEFAULT_PERSISTENCE_BUFFER)
            .max(1)
    }

    pub fn accepts_token(&self, token: &Token) -> bool {
        self.allowed_tokens.is_empty() || self.allowed_tokens.contains(token)
    }
}
