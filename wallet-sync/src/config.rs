//! Configuration management for the wallet.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wallet_ledger::{
    AddressType, Amount, DEFAULT_GAP_LIMIT, DUST_LIMIT, FeeRate, MAX_GAP_LIMIT,
};

/// Default ceiling for a user supplied fee rate, in sat/vB.
pub const DEFAULT_MAX_FEE_RATE: u64 = 100_000;

/// Default number of watched script hashes per branch.
pub const DEFAULT_MAX_SCRIPT_WATCH: usize = 10;

/// Default time a fee estimate stays fresh.
pub const DEFAULT_FEE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Chain the wallet operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl Network {
    /// BIP44 coin type level: `0'` on mainnet, `1'` on every test network.
    pub fn coin_type(&self) -> u32 {
        match self {
            Network::Bitcoin => 0,
            Network::Testnet | Network::Signet | Network::Regtest => 1,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Bitcoin => "bitcoin",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
            "testnet" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("Invalid network: {}", other)),
        }
    }
}

/// Configuration for the wallet sync core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Network to use.
    pub network: Network,

    /// Consecutive unused addresses scanned before a branch stops.
    pub gap_limit: u32,

    /// Confirmations before a mined transaction counts as confirmed.
    pub min_block_confirm: u32,

    /// Highest fee rate a send may request.
    pub max_fee_rate: FeeRate,

    /// Smallest output value the builder will create.
    pub dust_limit: Amount,

    /// Script hashes kept subscribed per branch.
    pub max_script_watch: usize,

    /// Script type of derived addresses.
    pub address_type: AddressType,

    /// Buffered events before slow subscribers start lagging.
    pub event_capacity: usize,

    /// How long a fee estimate is reused.
    pub fee_cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            gap_limit: DEFAULT_GAP_LIMIT,
            min_block_confirm: 1,
            max_fee_rate: FeeRate::new(DEFAULT_MAX_FEE_RATE),
            dust_limit: Amount::from_sat(DUST_LIMIT),
            max_script_watch: DEFAULT_MAX_SCRIPT_WATCH,
            address_type: AddressType::P2wpkh,
            event_capacity: 1000,
            fee_cache_ttl: DEFAULT_FEE_CACHE_TTL,
        }
    }
}

impl Config {
    /// Create a new configuration for the given network.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Create a configuration for mainnet.
    pub fn mainnet() -> Self {
        Self::new(Network::Bitcoin)
    }

    /// Create a configuration for testnet.
    pub fn testnet() -> Self {
        Self::new(Network::Testnet)
    }

    /// Create a configuration for regtest.
    pub fn regtest() -> Self {
        Self::new(Network::Regtest)
    }

    pub fn with_gap_limit(mut self, gap_limit: u32) -> Self {
        self.gap_limit = gap_limit;
        self
    }

    pub fn with_min_block_confirm(mut self, confirmations: u32) -> Self {
        self.min_block_confirm = confirmations;
        self
    }

    pub fn with_max_fee_rate(mut self, rate: FeeRate) -> Self {
        self.max_fee_rate = rate;
        self
    }

    pub fn with_dust_limit(mut self, limit: Amount) -> Self {
        self.dust_limit = limit;
        self
    }

    pub fn with_max_script_watch(mut self, max: usize) -> Self {
        self.max_script_watch = max;
        self
    }

    pub fn with_address_type(mut self, address_type: AddressType) -> Self {
        self.address_type = address_type;
        self
    }

    pub fn with_fee_cache_ttl(mut self, ttl: Duration) -> Self {
        self.fee_cache_ttl = ttl;
        self
    }

    /// BIP44 coin type for the configured network.
    pub fn coin_type(&self) -> u32 {
        self.network.coin_type()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.gap_limit == 0 {
            return Err("gap_limit must be > 0".to_string());
        }
        if self.gap_limit > MAX_GAP_LIMIT {
            return Err(format!("gap_limit must be <= {}", MAX_GAP_LIMIT));
        }
        if self.max_fee_rate.is_zero() {
            return Err("max_fee_rate must be > 0".to_string());
        }
        if self.dust_limit.is_negative() {
            return Err("dust_limit must not be negative".to_string());
        }
        if self.max_script_watch == 0 {
            return Err("max_script_watch must be > 0".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be > 0".to_string());
        }
        if self.address_type != AddressType::P2wpkh {
            return Err(format!("Unsupported address type: {}", self.address_type));
        }
        Ok(())
    }
}
