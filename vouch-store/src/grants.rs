// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for read-only queries on users, grants and IP rules.
use std::fmt::{Debug, Display};

use vouch_core::{GlobalPermission, Namespace, ObjectId, UserId};

use crate::{GrantSource, IpRule, Membership, ObjectGrant, User};

/// Interface for querying everything a permission calculation depends on.
///
/// Two variants of the trait are provided: one which is thread-safe (implementing `Send`) and one
/// which is purely intended for single-threaded execution contexts.
///
/// Ownership and privacy of objects are embedded in the returned rows. Implementations perform no
/// retries, any error is handed to the caller unchanged.
#[trait_variant::make(GrantStore: Send)]
pub trait LocalGrantStore {
    type Error: Display + Debug;

    /// Get the default ("anonymous") user whose grants form everyone's baseline.
    async fn default_user(&self) -> Result<User, Self::Error>;

    /// Get a user.
    ///
    /// Returns `None` when no user with this id exists.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, Self::Error>;

    /// Get the global grants a user holds directly.
    async fn global_grants(&self, user: UserId) -> Result<Vec<GlobalPermission>, Self::Error>;

    /// Get all active user groups a user is a member of, ordered by group id.
    ///
    /// Groups are returned even if they hold no global grants, the calculation needs their
    /// inheritance flag.
    async fn user_group_memberships(&self, user: UserId)
    -> Result<Vec<Membership>, Self::Error>;

    /// Get object grants of one namespace.
    ///
    /// When `scope` is set, only grants on that single object are returned.
    async fn object_grants(
        &self,
        source: GrantSource,
        namespace: Namespace,
        scope: Option<ObjectId>,
    ) -> Result<Vec<ObjectGrant>, Self::Error>;

    /// Get the ids of all members of a user group.
    async fn user_group_members(&self, group: ObjectId) -> Result<Vec<UserId>, Self::Error>;

    /// Get the IP rules assigned to a user.
    async fn ip_rules(&self, user: UserId) -> Result<Vec<IpRule>, Self::Error>;
}
