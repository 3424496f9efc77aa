// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration of permission calculation and caching.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vouch_core::{Algorithm, WeightTable, WeightTableError};

/// Default lifetime of cached permissions.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default number of cached permission sets over all shards.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default number of independently locked cache shards.
pub const DEFAULT_CACHE_SHARDS: usize = 16;

/// How conflicting grants are resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// When `true`, a grant held directly by the user replaces whatever the default user or user
    /// groups granted on the same object. When `false`, it is combined with it by weight.
    pub explicit: bool,

    /// Which of two conflicting levels wins.
    pub algorithm: Algorithm,

    /// Order of permission levels.
    pub weights: WeightTable,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            explicit: true,
            algorithm: Algorithm::HigherWins,
            weights: WeightTable::default(),
        }
    }
}

/// Configuration of the permission cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Calculate permissions on every request when `false`.
    pub enabled: bool,

    /// Entries older than this are recalculated. `None` keeps them until they are invalidated.
    pub ttl: Option<Duration>,

    /// Maximum number of entries, split evenly over the shards. Least recently used entries are
    /// dropped first.
    pub capacity: usize,

    /// Number of independently locked shards, at least one is used.
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Some(DEFAULT_CACHE_TTL),
            capacity: DEFAULT_CACHE_CAPACITY,
            shards: DEFAULT_CACHE_SHARDS,
        }
    }
}

/// Configuration parameters for a permission engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calculator: CalculatorConfig,
    pub cache: CacheConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), WeightTableError> {
        self.calculator.weights.validate()
    }
}
