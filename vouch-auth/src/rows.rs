// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fetching and shaping the grant rows a calculation runs on.
use tracing::{trace, warn};
use vouch_core::{GlobalPermission, Namespace, Scope, UserId};
use vouch_store::{GrantSource, GrantStore, Membership, ObjectGrant};

/// Object grants of all three namespaces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectRows {
    pub repositories: Vec<ObjectGrant>,
    pub repository_groups: Vec<ObjectGrant>,
    pub user_groups: Vec<ObjectGrant>,
}

impl ObjectRows {
    pub fn get(&self, namespace: Namespace) -> &[ObjectGrant] {
        match namespace {
            Namespace::Repository => &self.repositories,
            Namespace::RepositoryGroup => &self.repository_groups,
            Namespace::UserGroup => &self.user_groups,
        }
    }

    pub fn get_mut(&mut self, namespace: Namespace) -> &mut Vec<ObjectGrant> {
        match namespace {
            Namespace::Repository => &mut self.repositories,
            Namespace::RepositoryGroup => &mut self.repository_groups,
            Namespace::UserGroup => &mut self.user_groups,
        }
    }

    pub fn len(&self) -> usize {
        self.repositories.len() + self.repository_groups.len() + self.user_groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fetch<S: GrantStore>(
        store: &S,
        source: GrantSource,
        scope: Scope,
    ) -> Result<Self, S::Error> {
        let mut rows = ObjectRows::default();
        for namespace in Namespace::ALL {
            let grants = store
                .object_grants(source, namespace, scope.get(namespace))
                .await?;
            *rows.get_mut(namespace) = shape(namespace, grants);
        }
        Ok(rows)
    }
}

/// Every grant row one permission calculation depends on.
///
/// Rows are complete or not there at all: fetching either returns all of them or the first store
/// error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrantRows {
    /// Global grants of the default user.
    pub default_global: Vec<GlobalPermission>,

    /// Active user groups of the user and their global grants.
    pub memberships: Vec<Membership>,

    /// Global grants of the user.
    pub user_global: Vec<GlobalPermission>,

    /// Object grants of the default user, everyone's baseline.
    pub default_objects: ObjectRows,

    /// Object grants reaching the user through user groups.
    pub group_objects: ObjectRows,

    /// Object grants held by the user directly.
    pub user_objects: ObjectRows,
}

impl GrantRows {
    /// Fetch all rows needed to calculate the permissions of a regular user.
    pub async fn fetch<S: GrantStore>(
        store: &S,
        user: UserId,
        default_user: UserId,
        scope: Scope,
    ) -> Result<Self, S::Error> {
        let rows = GrantRows {
            default_global: store.global_grants(default_user).await?,
            memberships: store.user_group_memberships(user).await?,
            user_global: store.global_grants(user).await?,
            default_objects: ObjectRows::fetch(store, GrantSource::User(default_user), scope)
                .await?,
            group_objects: ObjectRows::fetch(store, GrantSource::UserGroupsOf(user), scope)
                .await?,
            user_objects: ObjectRows::fetch(store, GrantSource::User(user), scope).await?,
        };

        trace!(
            "fetched {} default, {} user group and {} direct object grants for user {}",
            rows.default_objects.len(),
            rows.group_objects.len(),
            rows.user_objects.len(),
            user
        );

        Ok(rows)
    }

    /// Fetch the rows needed for a super-administrator.
    ///
    /// Administrators get every object the default user holds a baseline on, regardless of any
    /// scope.
    pub async fn fetch_for_admin<S: GrantStore>(
        store: &S,
        default_user: UserId,
    ) -> Result<Self, S::Error> {
        Ok(GrantRows {
            default_objects: ObjectRows::fetch(
                store,
                GrantSource::User(default_user),
                Scope::UNRESTRICTED,
            )
            .await?,
            ..Default::default()
        })
    }
}

/// Drop rows a store returned for the wrong namespace. They can't be compared with the others.
fn shape(namespace: Namespace, grants: Vec<ObjectGrant>) -> Vec<ObjectGrant> {
    grants
        .into_iter()
        .filter(|grant| {
            let matches = grant.permission.namespace == namespace;
            if !matches {
                warn!(
                    "ignoring grant {} on object {} returned for namespace {}",
                    grant.permission, grant.object.id, namespace
                );
            }
            matches
        })
        .collect()
}
