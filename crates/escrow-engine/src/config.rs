//! Engine configuration from defaults and environment variables.

use crate::domain::services::default_program_id;
use crate::errors::ConfigError;
use std::env;
use std::str::FromStr;
use tracing::warn;

/// Configuration for the escrow engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Namespace mixed into every derived record address.
    pub program_id: [u8; 32],

    /// Reject eligibility marks that would allocate more than custody can pay
    pub enforce_allocation_cap: bool,

    /// Maximum instructions per batch
    pub max_batch_size: usize,

    /// Audit log ring-buffer size
    pub event_log_capacity: usize,

    /// Consumed nonces remembered for replay protection
    pub replay_cache_capacity: usize,

    /// Longest accepted gap between now and a signed `valid_until`, in seconds
    pub instruction_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program_id: default_program_id(),
            enforce_allocation_cap: true,
            max_batch_size: 256,
            event_log_capacity: 10_000,
            replay_cache_capacity: 100_000,
            instruction_ttl_secs: 120,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ESCROW_PROGRAM_ID`: 64 hex chars (default: keccak256("wager-escrow"))
    /// - `ESCROW_ENFORCE_ALLOCATION_CAP`: true/false (default: true)
    /// - `ESCROW_MAX_BATCH_SIZE`: (default: 256)
    /// - `ESCROW_EVENT_LOG_CAPACITY`: (default: 10000)
    /// - `ESCROW_REPLAY_CACHE_CAPACITY`: (default: 100000)
    /// - `ESCROW_INSTRUCTION_TTL_SECS`: (default: 120)
    ///
    /// Malformed values are logged and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`Self::from_env`] but reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let program_id = lookup("ESCROW_PROGRAM_ID")
            .and_then(|raw| match parse_program_id(&raw) {
                Some(id) => Some(id),
                None => {
                    warn!(value = %raw, "ESCROW_PROGRAM_ID is not 32 hex bytes, using default");
                    None
                }
            })
            .unwrap_or(defaults.program_id);

        Self {
            program_id,
            enforce_allocation_cap: parse_or(
                &lookup,
                "ESCROW_ENFORCE_ALLOCATION_CAP",
                defaults.enforce_allocation_cap,
            ),
            max_batch_size: parse_or(&lookup, "ESCROW_MAX_BATCH_SIZE", defaults.max_batch_size),
            event_log_capacity: parse_or(
                &lookup,
                "ESCROW_EVENT_LOG_CAPACITY",
                defaults.event_log_capacity,
            ),
            replay_cache_capacity: parse_or(
                &lookup,
                "ESCROW_REPLAY_CACHE_CAPACITY",
                defaults.replay_cache_capacity,
            ),
            instruction_ttl_secs: parse_or(
                &lookup,
                "ESCROW_INSTRUCTION_TTL_SECS",
                defaults.instruction_ttl_secs,
            ),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "max_batch_size",
            });
        }
        if self.event_log_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "event_log_capacity",
            });
        }
        if self.replay_cache_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "replay_cache_capacity",
            });
        }
        if self.instruction_ttl_secs == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "instruction_ttl_secs",
            });
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().to_lowercase().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "malformed config value, using default");
            default
        }),
    }
}

fn parse_program_id(raw: &str) -> Option<[u8; 32]> {
    let hex_str = raw.trim().trim_start_matches("0x");
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}
