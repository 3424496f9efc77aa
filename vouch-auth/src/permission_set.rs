// SPDX-License-Identifier: MIT OR Apache-2.0

//! Effective permissions of a user.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vouch_core::{GlobalPermission, Level, Namespace, ObjectId, ObjectPermission};

/// Where a resolved object permission came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOrigin {
    /// Forced to admin because the user is a super-administrator.
    SuperAdmin,

    /// Baseline granted to the default user.
    Default,

    /// Baseline withheld because the repository is private.
    Private,

    /// Forced to admin because the user owns the object.
    Owner,

    /// Granted to a user group the user is a member of.
    UserGroup(ObjectId),

    /// Granted to the user directly.
    User,
}

/// The resolved permission on one object together with every assignment which led to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPermission {
    permission: ObjectPermission,
    origin: PermissionOrigin,
    history: Vec<(ObjectPermission, PermissionOrigin)>,
}

impl ResolvedPermission {
    pub fn permission(&self) -> ObjectPermission {
        self.permission
    }

    pub fn level(&self) -> Level {
        self.permission.level
    }

    pub fn origin(&self) -> PermissionOrigin {
        self.origin
    }

    /// All assignments in the order they were applied, the last one is the resolved permission.
    pub fn history(&self) -> &[(ObjectPermission, PermissionOrigin)] {
        &self.history
    }
}

/// Resolved permissions on all reachable objects of one namespace.
///
/// An object missing from the map is unknown, callers must treat it like the most restrictive
/// level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<ObjectId, ResolvedPermission>);

impl PermissionMap {
    pub(crate) fn set(
        &mut self,
        id: ObjectId,
        permission: ObjectPermission,
        origin: PermissionOrigin,
    ) {
        let resolved = self.0.entry(id).or_insert_with(|| ResolvedPermission {
            permission,
            origin,
            history: Vec::new(),
        });
        resolved.permission = permission;
        resolved.origin = origin;
        resolved.history.push((permission, origin));
    }

    /// Resolved permission on an object, `None` if the object is unknown.
    pub fn get(&self, id: ObjectId) -> Option<ObjectPermission> {
        self.0.get(&id).map(|resolved| resolved.permission)
    }

    /// Resolved level on an object, unknown objects resolve to [`Level::None`].
    pub fn level(&self, id: ObjectId) -> Level {
        self.0
            .get(&id)
            .map(|resolved| resolved.level())
            .unwrap_or(Level::None)
    }

    pub fn resolved(&self, id: ObjectId) -> Option<&ResolvedPermission> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all objects and their permissions, ordered by object id.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, ObjectPermission)> + '_ {
        self.0
            .iter()
            .map(|(id, resolved)| (*id, resolved.permission))
    }

    /// Ids of all objects with at least the given level.
    pub fn at_least(&self, level: Level) -> Vec<ObjectId> {
        self.iter()
            .filter(|(_, permission)| permission.level >= level)
            .map(|(id, _)| id)
            .collect()
    }
}

/// Effective permissions of a user: a set of global capabilities and exactly one permission per
/// reachable object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub global: BTreeSet<GlobalPermission>,
    pub repositories: PermissionMap,
    pub repository_groups: PermissionMap,
    pub user_groups: PermissionMap,
}

impl PermissionSet {
    pub fn objects(&self, namespace: Namespace) -> &PermissionMap {
        match namespace {
            Namespace::Repository => &self.repositories,
            Namespace::RepositoryGroup => &self.repository_groups,
            Namespace::UserGroup => &self.user_groups,
        }
    }

    pub(crate) fn objects_mut(&mut self, namespace: Namespace) -> &mut PermissionMap {
        match namespace {
            Namespace::Repository => &mut self.repositories,
            Namespace::RepositoryGroup => &mut self.repository_groups,
            Namespace::UserGroup => &mut self.user_groups,
        }
    }

    /// Returns `true` if the global capabilities contain the super-administrator flag.
    pub fn is_admin(&self) -> bool {
        self.global.contains(&GlobalPermission::Admin)
    }

    /// All of the required global permissions are held (subset test).
    pub fn has_global_all(&self, required: &[GlobalPermission]) -> bool {
        required
            .iter()
            .all(|permission| self.global.contains(permission))
    }

    /// Any of the required global permissions is held (intersection test).
    pub fn has_global_any(&self, required: &[GlobalPermission]) -> bool {
        required
            .iter()
            .any(|permission| self.global.contains(permission))
    }

    /// The level held on an object is every one of the required levels.
    pub fn has_object_all(&self, namespace: Namespace, id: ObjectId, required: &[Level]) -> bool {
        let held = self.objects(namespace).level(id);
        required.iter().all(|level| *level == held)
    }

    /// The level held on an object is one of the required levels.
    pub fn has_object_any(&self, namespace: Namespace, id: ObjectId, required: &[Level]) -> bool {
        let held = self.objects(namespace).level(id);
        required.contains(&held)
    }
}
