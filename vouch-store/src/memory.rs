// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for users, user groups, objects and their grants.
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use vouch_core::{GlobalPermission, Namespace, ObjectId, ObjectPermission, UserId};

use crate::{
    GrantSource, GrantStore, IpRule, Membership, ObjectGrant, ObjectRef, User, UserGroupRef,
};

/// Id of the default user in a fresh `MemoryStore`.
pub const DEFAULT_USER_ID: UserId = UserId(1);

/// Username of the default user in a fresh `MemoryStore`.
pub const DEFAULT_USERNAME: &str = "default";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("user {0} does not exist")]
    UnknownUser(UserId),

    #[error("user group {0} does not exist")]
    UnknownUserGroup(ObjectId),

    #[error("{0} {1} does not exist")]
    UnknownObject(Namespace, ObjectId),
}

/// Holder of a grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subject {
    User(UserId),
    UserGroup(ObjectId),
}

#[derive(Clone, Debug)]
struct UserGroupRecord {
    inherit_default_permissions: bool,
    active: bool,
    members: BTreeSet<UserId>,
}

/// An in-memory store for users, user groups, objects and grants.
#[derive(Clone, Debug)]
pub struct InnerMemoryStore {
    default_user: UserId,
    users: BTreeMap<UserId, User>,
    objects: BTreeMap<(Namespace, ObjectId), ObjectRef>,
    user_groups: BTreeMap<ObjectId, UserGroupRecord>,
    global_grants: BTreeMap<Subject, BTreeSet<GlobalPermission>>,
    object_grants: BTreeMap<(Subject, Namespace, ObjectId), ObjectPermission>,
    ip_rules: BTreeMap<UserId, Vec<IpRule>>,
}

impl InnerMemoryStore {
    fn ensure_user(&self, id: UserId) -> Result<(), MemoryStoreError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(MemoryStoreError::UnknownUser(id))
        }
    }

    fn ensure_subject(&self, subject: Subject) -> Result<(), MemoryStoreError> {
        match subject {
            Subject::User(id) => self.ensure_user(id),
            Subject::UserGroup(id) => {
                if self.user_groups.contains_key(&id) {
                    Ok(())
                } else {
                    Err(MemoryStoreError::UnknownUserGroup(id))
                }
            }
        }
    }

    fn active_groups_of(
        &self,
        user: UserId,
    ) -> impl Iterator<Item = (&ObjectId, &UserGroupRecord)> {
        self.user_groups
            .iter()
            .filter(move |(_, group)| group.active && group.members.contains(&user))
    }

    fn grants_of(
        &self,
        subject: Subject,
        namespace: Namespace,
        scope: Option<ObjectId>,
    ) -> Vec<ObjectGrant> {
        self.object_grants
            .iter()
            .filter(|((holder, grant_namespace, object), _)| {
                *holder == subject
                    && *grant_namespace == namespace
                    && scope.is_none_or(|scope| scope == *object)
            })
            .filter_map(|((_, _, object), permission)| {
                // Grants are removed together with their objects, a missing object is skipped.
                let object = self.objects.get(&(namespace, *object))?;
                let via = match subject {
                    Subject::User(_) => None,
                    Subject::UserGroup(group) => Some(group),
                };
                Some(ObjectGrant {
                    object: *object,
                    permission: *permission,
                    via,
                })
            })
            .collect()
    }
}

/// An in-memory grant store.
///
/// `MemoryStore` supports usage in asynchronous and multi-threaded contexts by wrapping an
/// `InnerMemoryStore` with an `RwLock` and `Arc`. Convenience methods are provided to obtain a
/// read- or write-lock on the underlying store.
///
/// A fresh store contains only the default user, see [`DEFAULT_USER_ID`].
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        let default_user = User::new(DEFAULT_USER_ID, DEFAULT_USERNAME);
        let inner = InnerMemoryStore {
            default_user: default_user.id,
            users: BTreeMap::from([(default_user.id, default_user)]),
            objects: BTreeMap::new(),
            user_groups: BTreeMap::new(),
            global_grants: BTreeMap::new(),
            object_grants: BTreeMap::new(),
            ip_rules: BTreeMap::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    pub fn default_user_id(&self) -> UserId {
        self.read_store().default_user
    }

    /// Insert or replace a user.
    pub fn insert_user(&self, user: User) {
        self.write_store().users.insert(user.id, user);
    }

    pub fn add_repository(
        &self,
        id: ObjectId,
        owner: UserId,
        private: bool,
    ) -> Result<(), MemoryStoreError> {
        self.add_object(Namespace::Repository, id, owner, private)
    }

    pub fn add_repository_group(
        &self,
        id: ObjectId,
        owner: UserId,
    ) -> Result<(), MemoryStoreError> {
        self.add_object(Namespace::RepositoryGroup, id, owner, false)
    }

    /// Add an (active) user group. It is a grant holder and an object grants can be assigned on
    /// at the same time.
    pub fn add_user_group(
        &self,
        id: ObjectId,
        owner: UserId,
        inherit_default_permissions: bool,
    ) -> Result<(), MemoryStoreError> {
        self.add_object(Namespace::UserGroup, id, owner, false)?;
        self.write_store().user_groups.insert(
            id,
            UserGroupRecord {
                inherit_default_permissions,
                active: true,
                members: BTreeSet::new(),
            },
        );
        Ok(())
    }

    fn add_object(
        &self,
        namespace: Namespace,
        id: ObjectId,
        owner: UserId,
        private: bool,
    ) -> Result<(), MemoryStoreError> {
        let mut store = self.write_store();
        store.ensure_user(owner)?;
        store.objects.insert(
            (namespace, id),
            ObjectRef {
                id,
                owner,
                private: private && namespace == Namespace::Repository,
            },
        );
        Ok(())
    }

    /// Remove an object together with every grant on it.
    ///
    /// Returns `false` when the object did not exist.
    pub fn remove_object(&self, namespace: Namespace, id: ObjectId) -> bool {
        let mut store = self.write_store();
        let removed = store.objects.remove(&(namespace, id)).is_some();
        store.object_grants.retain(|(_, grant_namespace, object), _| {
            (*grant_namespace, *object) != (namespace, id)
        });
        if namespace == Namespace::UserGroup && store.user_groups.remove(&id).is_some() {
            let subject = Subject::UserGroup(id);
            store.global_grants.remove(&subject);
            store.object_grants.retain(|(holder, _, _), _| *holder != subject);
        }
        removed
    }

    /// Change the owner of an object.
    pub fn set_owner(
        &self,
        namespace: Namespace,
        id: ObjectId,
        owner: UserId,
    ) -> Result<(), MemoryStoreError> {
        let mut store = self.write_store();
        store.ensure_user(owner)?;
        let object = store
            .objects
            .get_mut(&(namespace, id))
            .ok_or(MemoryStoreError::UnknownObject(namespace, id))?;
        object.owner = owner;
        Ok(())
    }

    /// Activate or deactivate a user group. Inactive groups don't pass on any grants.
    pub fn set_user_group_active(
        &self,
        id: ObjectId,
        active: bool,
    ) -> Result<(), MemoryStoreError> {
        let mut store = self.write_store();
        let group = store
            .user_groups
            .get_mut(&id)
            .ok_or(MemoryStoreError::UnknownUserGroup(id))?;
        group.active = active;
        Ok(())
    }

    /// Add a user to a user group.
    ///
    /// Returns `true` when the user was not a member before.
    pub fn add_member(&self, group: ObjectId, user: UserId) -> Result<bool, MemoryStoreError> {
        let mut store = self.write_store();
        store.ensure_user(user)?;
        let group = store
            .user_groups
            .get_mut(&group)
            .ok_or(MemoryStoreError::UnknownUserGroup(group))?;
        Ok(group.members.insert(user))
    }

    /// Remove a user from a user group.
    ///
    /// Returns `true` when the user was a member.
    pub fn remove_member(&self, group: ObjectId, user: UserId) -> Result<bool, MemoryStoreError> {
        let mut store = self.write_store();
        let group = store
            .user_groups
            .get_mut(&group)
            .ok_or(MemoryStoreError::UnknownUserGroup(group))?;
        Ok(group.members.remove(&user))
    }

    /// Grant a global permission.
    pub fn grant_global(
        &self,
        subject: Subject,
        permission: GlobalPermission,
    ) -> Result<(), MemoryStoreError> {
        let mut store = self.write_store();
        store.ensure_subject(subject)?;
        store
            .global_grants
            .entry(subject)
            .or_default()
            .insert(permission);
        Ok(())
    }

    /// Revoke a global permission.
    ///
    /// Returns `true` when the permission was granted before.
    pub fn revoke_global(&self, subject: Subject, permission: &GlobalPermission) -> bool {
        self.write_store()
            .global_grants
            .get_mut(&subject)
            .is_some_and(|grants| grants.remove(permission))
    }

    /// Grant a permission on an object, replacing any previous grant of the subject on it.
    pub fn grant_object(
        &self,
        subject: Subject,
        object: ObjectId,
        permission: ObjectPermission,
    ) -> Result<(), MemoryStoreError> {
        let mut store = self.write_store();
        store.ensure_subject(subject)?;
        if !store.objects.contains_key(&(permission.namespace, object)) {
            return Err(MemoryStoreError::UnknownObject(permission.namespace, object));
        }
        store
            .object_grants
            .insert((subject, permission.namespace, object), permission);
        Ok(())
    }

    /// Revoke the grant of a subject on an object.
    ///
    /// Returns `true` when there was a grant.
    pub fn revoke_object(&self, subject: Subject, namespace: Namespace, object: ObjectId) -> bool {
        self.write_store()
            .object_grants
            .remove(&(subject, namespace, object))
            .is_some()
    }

    /// Assign an IP rule to a user.
    pub fn add_ip_rule(&self, user: UserId, rule: IpRule) -> Result<(), MemoryStoreError> {
        let mut store = self.write_store();
        store.ensure_user(user)?;
        store.ip_rules.entry(user).or_default().push(rule);
        Ok(())
    }

    /// Remove all IP rules of a user.
    pub fn clear_ip_rules(&self, user: UserId) {
        self.write_store().ip_rules.remove(&user);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GrantStore for MemoryStore {
    type Error = Infallible;

    async fn default_user(&self) -> Result<User, Self::Error> {
        let store = self.read_store();
        let user = store
            .users
            .get(&store.default_user)
            .cloned()
            .expect("default user exists in store");
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, Self::Error> {
        Ok(self.read_store().users.get(&id).cloned())
    }

    async fn global_grants(&self, user: UserId) -> Result<Vec<GlobalPermission>, Self::Error> {
        let grants = self
            .read_store()
            .global_grants
            .get(&Subject::User(user))
            .map(|grants| grants.iter().cloned().collect())
            .unwrap_or_default();
        Ok(grants)
    }

    async fn user_group_memberships(
        &self,
        user: UserId,
    ) -> Result<Vec<Membership>, Self::Error> {
        let store = self.read_store();
        let memberships = store
            .active_groups_of(user)
            .map(|(id, group)| Membership {
                group: UserGroupRef {
                    id: *id,
                    inherit_default_permissions: group.inherit_default_permissions,
                },
                global_grants: store
                    .global_grants
                    .get(&Subject::UserGroup(*id))
                    .map(|grants| grants.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();
        Ok(memberships)
    }

    async fn object_grants(
        &self,
        source: GrantSource,
        namespace: Namespace,
        scope: Option<ObjectId>,
    ) -> Result<Vec<ObjectGrant>, Self::Error> {
        let store = self.read_store();
        let grants = match source {
            GrantSource::User(user) => store.grants_of(Subject::User(user), namespace, scope),
            GrantSource::UserGroupsOf(user) => store
                .active_groups_of(user)
                .flat_map(|(group, _)| {
                    store.grants_of(Subject::UserGroup(*group), namespace, scope)
                })
                .collect(),
        };
        Ok(grants)
    }

    async fn user_group_members(&self, group: ObjectId) -> Result<Vec<UserId>, Self::Error> {
        let members = self
            .read_store()
            .user_groups
            .get(&group)
            .map(|group| group.members.iter().copied().collect())
            .unwrap_or_default();
        Ok(members)
    }

    async fn ip_rules(&self, user: UserId) -> Result<Vec<IpRule>, Self::Error> {
        Ok(self
            .read_store()
            .ip_rules
            .get(&user)
            .cloned()
            .unwrap_or_default())
    }
}
