// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures and stores for testing permission calculations.
use std::convert::Infallible;
use std::sync::Arc;

use thiserror::Error;
use vouch_core::{GlobalPermission, Level, Namespace, ObjectId, ObjectPermission, UserId};
use vouch_store::{
    GrantSource, GrantStore, IpRule, Membership, MemoryStore, ObjectGrant, Subject, User,
};

use crate::{Config, Engine};

pub const ALICE: UserId = UserId(10);
pub const BOB: UserId = UserId(11);

/// Public repository owned by Bob.
pub const REPO: ObjectId = ObjectId(100);

/// Another public repository owned by Bob.
pub const OTHER_REPO: ObjectId = ObjectId(101);

/// Private repository owned by Bob.
pub const PRIVATE_REPO: ObjectId = ObjectId(102);

pub const REPO_GROUP: ObjectId = ObjectId(300);

/// User groups owned by Bob.
pub const DEVS: ObjectId = ObjectId(200);
pub const OPS: ObjectId = ObjectId(201);

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// A memory store populated with two users, a few objects and default grants on all of them.
///
/// The default user holds `read` on every repository (the private one included), on the
/// repository group and on both user groups. It may create and fork repositories.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub store: MemoryStore,
}

impl Fixture {
    pub fn new() -> Self {
        setup_logging();

        let store = MemoryStore::new();
        let default_user = Subject::User(store.default_user_id());

        store.insert_user(User::new(ALICE, "alice"));
        store.insert_user(User::new(BOB, "bob"));

        for (id, private) in [(REPO, false), (OTHER_REPO, false), (PRIVATE_REPO, true)] {
            store.add_repository(id, BOB, private).expect("add repository");
        }
        store
            .add_repository_group(REPO_GROUP, BOB)
            .expect("add repository group");
        store.add_user_group(DEVS, BOB, true).expect("add user group");
        store.add_user_group(OPS, BOB, true).expect("add user group");

        for (namespace, id) in [
            (Namespace::Repository, REPO),
            (Namespace::Repository, OTHER_REPO),
            (Namespace::Repository, PRIVATE_REPO),
            (Namespace::RepositoryGroup, REPO_GROUP),
            (Namespace::UserGroup, DEVS),
            (Namespace::UserGroup, OPS),
        ] {
            store
                .grant_object(default_user, id, ObjectPermission::new(namespace, Level::Read))
                .expect("grant default permission");
        }

        for permission in [
            GlobalPermission::CreateRepository(true),
            GlobalPermission::ForkRepository(true),
            GlobalPermission::InheritDefaultPermissions(true),
        ] {
            store
                .grant_global(default_user, permission)
                .expect("grant default global permission");
        }

        Self { store }
    }

    pub fn engine(&self, config: Config) -> Arc<Engine<MemoryStore>> {
        Arc::new(Engine::new(self.store.clone(), config).expect("valid config"))
    }

    pub fn make_owner(&self, user: UserId, repository: ObjectId) {
        self.store
            .set_owner(Namespace::Repository, repository, user)
            .expect("set owner");
    }

    pub fn join(&self, group: ObjectId, user: UserId) {
        self.store.add_member(group, user).expect("add member");
    }

    pub fn grant_repository(&self, subject: Subject, repository: ObjectId, level: Level) {
        self.store
            .grant_object(subject, repository, ObjectPermission::repository(level))
            .expect("grant repository permission");
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A store whose queries never finish.
#[derive(Clone, Copy, Debug, Default)]
pub struct PendingStore;

impl GrantStore for PendingStore {
    type Error = Infallible;

    async fn default_user(&self) -> Result<User, Self::Error> {
        std::future::pending().await
    }

    async fn get_user(&self, _id: UserId) -> Result<Option<User>, Self::Error> {
        std::future::pending().await
    }

    async fn global_grants(&self, _user: UserId) -> Result<Vec<GlobalPermission>, Self::Error> {
        std::future::pending().await
    }

    async fn user_group_memberships(
        &self,
        _user: UserId,
    ) -> Result<Vec<Membership>, Self::Error> {
        std::future::pending().await
    }

    async fn object_grants(
        &self,
        _source: GrantSource,
        _namespace: Namespace,
        _scope: Option<ObjectId>,
    ) -> Result<Vec<ObjectGrant>, Self::Error> {
        std::future::pending().await
    }

    async fn user_group_members(&self, _group: ObjectId) -> Result<Vec<UserId>, Self::Error> {
        std::future::pending().await
    }

    async fn ip_rules(&self, _user: UserId) -> Result<Vec<IpRule>, Self::Error> {
        std::future::pending().await
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("grant store unavailable")]
pub struct StoreUnavailable;

/// A store wrapping a `MemoryStore` which fails all object grant queries of one namespace.
///
/// Everything before the failing query succeeds, so calculations fail half-way through fetching.
#[derive(Clone, Debug)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub failing: Namespace,
}

impl GrantStore for FailingStore {
    type Error = StoreUnavailable;

    async fn default_user(&self) -> Result<User, Self::Error> {
        let Ok(user) = self.inner.default_user().await;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, Self::Error> {
        let Ok(user) = self.inner.get_user(id).await;
        Ok(user)
    }

    async fn global_grants(&self, user: UserId) -> Result<Vec<GlobalPermission>, Self::Error> {
        let Ok(grants) = self.inner.global_grants(user).await;
        Ok(grants)
    }

    async fn user_group_memberships(
        &self,
        user: UserId,
    ) -> Result<Vec<Membership>, Self::Error> {
        let Ok(memberships) = self.inner.user_group_memberships(user).await;
        Ok(memberships)
    }

    async fn object_grants(
        &self,
        source: GrantSource,
        namespace: Namespace,
        scope: Option<ObjectId>,
    ) -> Result<Vec<ObjectGrant>, Self::Error> {
        if namespace == self.failing {
            return Err(StoreUnavailable);
        }
        let Ok(grants) = self.inner.object_grants(source, namespace, scope).await;
        Ok(grants)
    }

    async fn user_group_members(&self, group: ObjectId) -> Result<Vec<UserId>, Self::Error> {
        let Ok(members) = self.inner.user_group_members(group).await;
        Ok(members)
    }

    async fn ip_rules(&self, user: UserId) -> Result<Vec<IpRule>, Self::Error> {
        let Ok(rules) = self.inner.ip_rules(user).await;
        Ok(rules)
    }
}
