// SPDX-License-Identifier: MIT OR Apache-2.0

//! Merge grant rows of all sources into the effective permissions of one user.
//!
//! The calculation runs in a fixed order, every step builds on the result of the previous ones:
//!
//! 1. Super-administrators get `admin` on every object the default user holds a baseline on and
//!    nothing else is looked at.
//! 2. Global permissions start with the default user's global grants.
//! 3. User groups which don't inherit default permissions replace the configurable global
//!    permission families with their own grants, a user who doesn't inherit does the same with
//!    their own global grants afterwards.
//! 4. Object permissions start with the default user's baseline. Owners get `admin`, private
//!    repositories of other users get `none` and users who stopped inheriting object permissions
//!    get `none` everywhere.
//! 5. Grants reaching the user through user groups replace the baseline. Several of them on the
//!    same object are combined by weight.
//! 6. Grants held by the user directly either replace the result (explicit mode) or are combined
//!    with it by weight.
//!
//! Ownership is checked again in every step, an owner always ends up with `admin`.
use std::collections::BTreeSet;

use tracing::{debug, trace};
use vouch_core::{GlobalPermission, Namespace, ObjectPermission, UserId};
use vouch_store::{ObjectGrant, User};

use crate::config::CalculatorConfig;
use crate::permission_set::{PermissionOrigin, PermissionSet};
use crate::rows::GrantRows;

/// Attributes of the user the calculation is done for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalculationInput {
    pub user: UserId,
    pub is_admin: bool,
    pub inherit_default_permissions: bool,

    /// Calculate the permissions an administrator would have as a regular user.
    pub super_admin_as_user: bool,
}

impl From<&User> for CalculationInput {
    fn from(user: &User) -> Self {
        Self {
            user: user.id,
            is_admin: user.is_admin,
            inherit_default_permissions: user.inherit_default_permissions,
            super_admin_as_user: false,
        }
    }
}

impl CalculationInput {
    /// Returns `true` if the calculation short-circuits for a super-administrator.
    pub fn is_super_admin(&self) -> bool {
        self.is_admin && !self.super_admin_as_user
    }
}

/// Pure permission calculation over already fetched grant rows.
#[derive(Clone, Copy, Debug)]
pub struct PermissionCalculator<'a> {
    config: &'a CalculatorConfig,
}

impl<'a> PermissionCalculator<'a> {
    pub fn new(config: &'a CalculatorConfig) -> Self {
        Self { config }
    }

    pub fn calculate(&self, input: &CalculationInput, rows: &GrantRows) -> PermissionSet {
        debug!(
            "calculating permissions for user {} (admin: {}, inherit: {}, explicit: {}, {})",
            input.user,
            input.is_admin,
            input.inherit_default_permissions,
            self.config.explicit,
            self.config.algorithm
        );

        let mut permissions = PermissionSet::default();

        if input.is_super_admin() {
            self.admin_permissions(rows, &mut permissions);
            return permissions;
        }

        self.global_permissions(input, rows, &mut permissions);

        let inherit_objects = !permissions
            .global
            .contains(&GlobalPermission::InheritDefaultPermissions(false));

        for namespace in Namespace::ALL {
            self.default_object_permissions(
                input.user,
                namespace,
                inherit_objects,
                rows.default_objects.get(namespace),
                &mut permissions,
            );
            self.user_group_object_permissions(
                input.user,
                namespace,
                rows.group_objects.get(namespace),
                &mut permissions,
            );
            self.user_object_permissions(
                input.user,
                namespace,
                rows.user_objects.get(namespace),
                &mut permissions,
            );
        }

        debug!(
            "user {}: {} global, {} repositories, {} repository groups, {} user groups",
            input.user,
            permissions.global.len(),
            permissions.repositories.len(),
            permissions.repository_groups.len(),
            permissions.user_groups.len()
        );

        permissions
    }

    fn admin_permissions(&self, rows: &GrantRows, permissions: &mut PermissionSet) {
        permissions.global = BTreeSet::from([
            GlobalPermission::Admin,
            GlobalPermission::CreateWithWriteOnRepositoryGroup(true),
        ]);

        for namespace in Namespace::ALL {
            let map = permissions.objects_mut(namespace);
            for grant in rows.default_objects.get(namespace) {
                map.set(
                    grant.object.id,
                    ObjectPermission::admin(namespace),
                    PermissionOrigin::SuperAdmin,
                );
            }
        }
    }

    fn global_permissions(
        &self,
        input: &CalculationInput,
        rows: &GrantRows,
        permissions: &mut PermissionSet,
    ) {
        permissions.global = rows.default_global.iter().cloned().collect();

        // Memberships are ordered by group id. If several non-inheriting groups set the same
        // family, the group with the highest id wins.
        let mut memberships: Vec<_> = rows
            .memberships
            .iter()
            .filter(|membership| !membership.group.inherit_default_permissions)
            .collect();
        memberships.sort_by_key(|membership| membership.group.id);

        for membership in memberships {
            trace!(
                "user group {} does not inherit default permissions, applying its {} global grants",
                membership.group.id,
                membership.global_grants.len()
            );
            replace_configurable(&mut permissions.global, &membership.global_grants);
        }

        if !input.inherit_default_permissions {
            replace_configurable(&mut permissions.global, &rows.user_global);

            let decided = rows.user_global.iter().any(|permission| {
                matches!(permission, GlobalPermission::InheritDefaultPermissions(_))
            });
            if !decided {
                permissions
                    .global
                    .insert(GlobalPermission::InheritDefaultPermissions(false));
            }
        }
    }

    fn default_object_permissions(
        &self,
        user: UserId,
        namespace: Namespace,
        inherit_objects: bool,
        grants: &[ObjectGrant],
        permissions: &mut PermissionSet,
    ) {
        let map = permissions.objects_mut(namespace);

        for grant in grants {
            let (permission, origin) = if grant.object.is_owned_by(user) {
                (ObjectPermission::admin(namespace), PermissionOrigin::Owner)
            } else if namespace == Namespace::Repository && grant.object.private {
                (ObjectPermission::none(namespace), PermissionOrigin::Private)
            } else if !inherit_objects {
                (ObjectPermission::none(namespace), PermissionOrigin::Default)
            } else {
                (grant.permission, PermissionOrigin::Default)
            };

            map.set(grant.object.id, permission, origin);
        }
    }

    fn user_group_object_permissions(
        &self,
        user: UserId,
        namespace: Namespace,
        grants: &[ObjectGrant],
        permissions: &mut PermissionSet,
    ) {
        let map = permissions.objects_mut(namespace);

        // The first group grant on an object replaces the baseline, any further one is combined
        // with it.
        let mut seen = BTreeSet::new();

        for grant in grants {
            let id = grant.object.id;
            let first = seen.insert(id);

            if grant.object.is_owned_by(user) {
                map.set(id, ObjectPermission::admin(namespace), PermissionOrigin::Owner);
                continue;
            }

            let origin = match grant.via {
                Some(group) => PermissionOrigin::UserGroup(group),
                None => PermissionOrigin::User,
            };

            match map.get(id) {
                Some(current) if !first => {
                    let winner =
                        self.config
                            .weights
                            .choose(self.config.algorithm, grant.permission, current);
                    if winner != current {
                        map.set(id, winner, origin);
                    }
                }
                _ => map.set(id, grant.permission, origin),
            }
        }
    }

    /// Direct grants of the user replace the current value in explicit mode and are combined with
    /// it by weight otherwise. Objects without a current value take the direct grant as is in both
    /// modes, under `lower-wins` as well. It is not weighed against an implicit `none`.
    fn user_object_permissions(
        &self,
        user: UserId,
        namespace: Namespace,
        grants: &[ObjectGrant],
        permissions: &mut PermissionSet,
    ) {
        let map = permissions.objects_mut(namespace);

        for grant in grants {
            let id = grant.object.id;

            if grant.object.is_owned_by(user) {
                map.set(id, ObjectPermission::admin(namespace), PermissionOrigin::Owner);
                continue;
            }

            match map.get(id) {
                Some(current) if !self.config.explicit => {
                    let winner =
                        self.config
                            .weights
                            .choose(self.config.algorithm, grant.permission, current);
                    if winner != current {
                        map.set(id, winner, PermissionOrigin::User);
                    }
                }
                _ => map.set(id, grant.permission, PermissionOrigin::User),
            }
        }
    }
}

/// Drop all configurable global permissions and add the given grants instead.
fn replace_configurable(global: &mut BTreeSet<GlobalPermission>, grants: &[GlobalPermission]) {
    global.retain(|permission| !permission.is_configurable());
    global.extend(grants.iter().cloned());
}
