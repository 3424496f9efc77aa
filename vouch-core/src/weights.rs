// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Level, Namespace, ObjectPermission, ParseError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WeightTableError {
    #[error("weights of namespace {namespace} must strictly increase from none to admin")]
    NotMonotonic { namespace: Namespace },
}

/// Strategy to pick one of two conflicting permission levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// The level with the higher weight wins.
    #[default]
    HigherWins,

    /// The level with the lower weight wins.
    LowerWins,
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Algorithm::HigherWins => "higher-wins",
            Algorithm::LowerWins => "lower-wins",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for Algorithm {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "higher-wins" => Ok(Algorithm::HigherWins),
            "lower-wins" => Ok(Algorithm::LowerWins),
            other => Err(ParseError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Integer rank of every level inside one namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelWeights {
    pub none: u32,
    pub read: u32,
    pub write: u32,
    pub admin: u32,
}

impl LevelWeights {
    pub fn get(&self, level: Level) -> u32 {
        match level {
            Level::None => self.none,
            Level::Read => self.read,
            Level::Write => self.write,
            Level::Admin => self.admin,
        }
    }

    fn is_monotonic(&self) -> bool {
        self.none < self.read && self.read < self.write && self.write < self.admin
    }
}

impl Default for LevelWeights {
    fn default() -> Self {
        Self {
            none: 0,
            read: 1,
            write: 3,
            admin: 4,
        }
    }
}

/// Total order of permission levels, per namespace.
///
/// Every level of every namespace has a weight by construction. A table read from configuration
/// has to pass [`WeightTable::validate`] before it is used, an out-of-order table is a
/// configuration error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    pub repository: LevelWeights,
    pub repository_group: LevelWeights,
    pub user_group: LevelWeights,
}

impl WeightTable {
    /// Check that weights strictly increase from `none` to `admin` in every namespace.
    pub fn validate(&self) -> Result<(), WeightTableError> {
        for namespace in Namespace::ALL {
            if !self.weights(namespace).is_monotonic() {
                return Err(WeightTableError::NotMonotonic { namespace });
            }
        }
        Ok(())
    }

    pub fn weights(&self, namespace: Namespace) -> &LevelWeights {
        match namespace {
            Namespace::Repository => &self.repository,
            Namespace::RepositoryGroup => &self.repository_group,
            Namespace::UserGroup => &self.user_group,
        }
    }

    pub fn weight(&self, permission: ObjectPermission) -> u32 {
        self.weights(permission.namespace).get(permission.level)
    }

    /// Weight of a permission given in its string form.
    ///
    /// Fails with a [`ParseError`] when the string names an undefined level.
    pub fn weight_of(&self, permission: &str) -> Result<u32, ParseError> {
        Ok(self.weight(permission.parse()?))
    }

    /// Pick the winning permission out of the `new` and the `current` one.
    ///
    /// On equal weight the current permission is kept. Applied pairwise over any number of grants
    /// this is a plain `max` or `min`, so the result does not depend on iteration order.
    ///
    /// # Panics
    ///
    /// Panics when both permissions belong to different namespaces, they can't be compared.
    pub fn choose(
        &self,
        algorithm: Algorithm,
        new: ObjectPermission,
        current: ObjectPermission,
    ) -> ObjectPermission {
        assert_eq!(
            new.namespace, current.namespace,
            "can't compare permissions of different namespaces"
        );

        let new_weight = self.weight(new);
        let current_weight = self.weight(current);

        let new_wins = match algorithm {
            Algorithm::HigherWins => new_weight > current_weight,
            Algorithm::LowerWins => new_weight < current_weight,
        };

        if new_wins { new } else { current }
    }
}
