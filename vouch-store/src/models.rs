// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rows returned by grant queries.
use serde::{Deserialize, Serialize};
use vouch_core::{GlobalPermission, ObjectId, ObjectPermission, UserId};

/// A user account as seen by the permission engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,

    /// When `false` the user is detached from the default user's configurable global permissions
    /// and from its per-object defaults.
    pub inherit_default_permissions: bool,
}

impl User {
    /// Regular, non-admin user inheriting default permissions.
    pub fn new(id: UserId, username: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            is_admin: false,
            inherit_default_permissions: true,
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn without_default_permissions(mut self) -> Self {
        self.inherit_default_permissions = false;
        self
    }
}

/// Object a grant points at, with the attributes the calculation needs from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub owner: UserId,

    /// Only repositories can be private, for all other objects this is `false`.
    pub private: bool,
}

impl ObjectRef {
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }
}

/// Grant of an object permission, either held directly or reaching a user through one of their
/// user groups (`via`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGrant {
    pub object: ObjectRef,
    pub permission: ObjectPermission,
    pub via: Option<ObjectId>,
}

/// A user group as a subject of grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupRef {
    pub id: ObjectId,
    pub inherit_default_permissions: bool,
}

/// Membership of a user in an active user group, together with the group's global grants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group: UserGroupRef,
    pub global_grants: Vec<GlobalPermission>,
}

/// Who grants are looked up for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantSource {
    /// Grants held by the user directly.
    User(UserId),

    /// Grants held by any active user group the user is a member of.
    UserGroupsOf(UserId),
}

/// An IP address or network a user is allowed to connect from, as stored.
///
/// The range is kept in its raw string form, it is only parsed when access is checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRule {
    pub range: String,
    pub description: Option<String>,
}

impl IpRule {
    pub fn new(range: &str) -> Self {
        Self {
            range: range.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}
