// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const GLOBAL_PREFIX: &str = "global";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    #[error("unknown permission level '{level}' in namespace {namespace}")]
    UnknownLevel { namespace: Namespace, level: String },

    #[error("expected a permission in namespace {expected}, got {actual}")]
    NamespaceMismatch {
        expected: Namespace,
        actual: Namespace,
    },

    #[error("unknown resolution algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Object kinds a permission level can be granted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Repository,
    RepositoryGroup,
    UserGroup,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Namespace::Repository,
        Namespace::RepositoryGroup,
        Namespace::UserGroup,
    ];

    /// Prefix used in the string form of permissions of this namespace.
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Repository => "repository",
            Namespace::RepositoryGroup => "group",
            Namespace::UserGroup => "usergroup",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Namespace::ALL
            .into_iter()
            .find(|namespace| namespace.prefix() == prefix)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// The four levels an object permission can have. Every level includes all lower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// No access, the object is not even visible.
    None,

    /// Permission to see and read an object.
    Read,

    /// Permission to write to an object.
    Write,

    /// Permission to change settings and permissions of an object.
    Admin,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::None, Level::Read, Level::Write, Level::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Read => "read",
            Level::Write => "write",
            Level::Admin => "admin",
        }
    }

    fn from_str_opt(value: &str) -> Option<Self> {
        Level::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A permission level inside one object namespace, for example "repository.write".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ObjectPermission {
    pub namespace: Namespace,
    pub level: Level,
}

impl ObjectPermission {
    pub fn new(namespace: Namespace, level: Level) -> Self {
        Self { namespace, level }
    }

    pub fn repository(level: Level) -> Self {
        Self::new(Namespace::Repository, level)
    }

    pub fn repository_group(level: Level) -> Self {
        Self::new(Namespace::RepositoryGroup, level)
    }

    pub fn user_group(level: Level) -> Self {
        Self::new(Namespace::UserGroup, level)
    }

    /// Highest level of the given namespace.
    pub fn admin(namespace: Namespace) -> Self {
        Self::new(namespace, Level::Admin)
    }

    /// Lowest level of the given namespace.
    pub fn none(namespace: Namespace) -> Self {
        Self::new(namespace, Level::None)
    }

    /// Parse a permission string and make sure it belongs to the expected namespace.
    pub fn parse_in(namespace: Namespace, value: &str) -> Result<Self, ParseError> {
        let permission: Self = value.parse()?;
        if permission.namespace != namespace {
            return Err(ParseError::NamespaceMismatch {
                expected: namespace,
                actual: permission.namespace,
            });
        }
        Ok(permission)
    }
}

impl Display for ObjectPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace.prefix(), self.level.as_str())
    }
}

impl FromStr for ObjectPermission {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (prefix, level) = value
            .split_once('.')
            .ok_or_else(|| ParseError::UnknownPermission(value.to_string()))?;
        let namespace = Namespace::from_prefix(prefix)
            .ok_or_else(|| ParseError::UnknownPermission(value.to_string()))?;
        let level = Level::from_str_opt(level).ok_or_else(|| ParseError::UnknownLevel {
            namespace,
            level: level.to_string(),
        })?;
        Ok(Self { namespace, level })
    }
}

impl From<ObjectPermission> for String {
    fn from(value: ObjectPermission) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ObjectPermission {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// System-wide capability of a user.
///
/// Six families are "configurable": each holds a boolean value and is replaced as a whole when a
/// user or user group stops inheriting the default user's global permissions. Capabilities outside
/// of these families are kept as opaque `Other` values.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GlobalPermission {
    /// Super-administrator.
    Admin,

    /// Creating top-level repositories.
    CreateRepository(bool),

    /// Forking repositories.
    ForkRepository(bool),

    /// Creating repository groups.
    CreateRepositoryGroup(bool),

    /// Creating user groups.
    CreateUserGroup(bool),

    /// Creating repositories inside repository groups the user can write to.
    CreateWithWriteOnRepositoryGroup(bool),

    /// Whether per-object defaults of the default user apply.
    InheritDefaultPermissions(bool),

    /// Any other capability, for example registration or password reset policies.
    Other(String),
}

impl GlobalPermission {
    /// Returns `true` if this permission belongs to one of the configurable families.
    pub fn is_configurable(&self) -> bool {
        !matches!(self, GlobalPermission::Admin | GlobalPermission::Other(_))
    }

    fn family(&self) -> Option<(&'static str, bool)> {
        match self {
            GlobalPermission::Admin | GlobalPermission::Other(_) => None,
            GlobalPermission::CreateRepository(value) => Some(("repository.create", *value)),
            GlobalPermission::ForkRepository(value) => Some(("repository.fork", *value)),
            GlobalPermission::CreateRepositoryGroup(value) => Some(("group.create", *value)),
            GlobalPermission::CreateUserGroup(value) => Some(("usergroup.create", *value)),
            GlobalPermission::CreateWithWriteOnRepositoryGroup(value) => {
                Some(("group.create_with_write", *value))
            }
            GlobalPermission::InheritDefaultPermissions(value) => {
                Some(("inherit_default_permissions", *value))
            }
        }
    }

    fn from_family(family: &str, value: bool) -> Option<Self> {
        let permission = match family {
            "repository.create" => GlobalPermission::CreateRepository(value),
            "repository.fork" => GlobalPermission::ForkRepository(value),
            "group.create" => GlobalPermission::CreateRepositoryGroup(value),
            "usergroup.create" => GlobalPermission::CreateUserGroup(value),
            "group.create_with_write" => GlobalPermission::CreateWithWriteOnRepositoryGroup(value),
            "inherit_default_permissions" => GlobalPermission::InheritDefaultPermissions(value),
            _ => return None,
        };
        Some(permission)
    }
}

impl Display for GlobalPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self, self.family()) {
            (_, Some((family, value))) => write!(f, "{GLOBAL_PREFIX}.{family}.{value}"),
            (GlobalPermission::Other(value), None) => write!(f, "{value}"),
            (_, None) => write!(f, "{GLOBAL_PREFIX}.admin"),
        }
    }
}

impl FromStr for GlobalPermission {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let unknown = || ParseError::UnknownPermission(value.to_string());

        let rest = value
            .strip_prefix(GLOBAL_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(unknown)?;

        if rest == "admin" {
            return Ok(GlobalPermission::Admin);
        }

        if let Some((family, flag)) = rest.rsplit_once('.') {
            let flag = match flag {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            };

            match (GlobalPermission::from_family(family, true), flag) {
                (Some(_), Some(flag)) => {
                    return GlobalPermission::from_family(family, flag).ok_or_else(unknown);
                }
                // A known family with a value other than true or false is a typo, not a new
                // capability.
                (Some(_), None) => return Err(unknown()),
                (None, _) => (),
            }
        }

        // Names of configurable families without any value are equally invalid.
        if GlobalPermission::from_family(rest, true).is_some() {
            return Err(unknown());
        }

        Ok(GlobalPermission::Other(value.to_string()))
    }
}

impl From<GlobalPermission> for String {
    fn from(value: GlobalPermission) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for GlobalPermission {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
