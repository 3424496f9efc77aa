// SPDX-License-Identifier: MIT OR Apache-2.0

//! The user object callers ask for permissions.
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use vouch_core::{Level, Namespace, ObjectId, Scope, UserId};
use vouch_store::{GrantStore, User};

use crate::engine::{Engine, EngineError};
use crate::permission_set::PermissionSet;

/// A user together with lazily calculated permissions.
///
/// Permissions are calculated on first access and memoized for the lifetime of this object,
/// unscoped and per scope. An `AuthUser` is meant to live as long as one request, long-lived
/// callers go through the [`Engine`] directly to see invalidations.
#[derive(Debug)]
pub struct AuthUser<S> {
    engine: Arc<Engine<S>>,
    user: User,
    cancel: CancellationToken,
    permissions: OnceCell<Arc<PermissionSet>>,
    scoped: Mutex<HashMap<Scope, Arc<PermissionSet>>>,
}

impl<S> AuthUser<S>
where
    S: GrantStore,
{
    pub fn new(engine: Arc<Engine<S>>, user: User) -> Self {
        Self {
            engine,
            user,
            cancel: CancellationToken::new(),
            permissions: OnceCell::new(),
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a user in the store.
    pub async fn load(engine: Arc<Engine<S>>, id: UserId) -> Result<Self, EngineError<S::Error>> {
        let user = engine.get_user(id).await?;
        Ok(Self::new(engine, user))
    }

    /// The default ("anonymous") user.
    pub async fn anonymous(engine: Arc<Engine<S>>) -> Result<Self, EngineError<S::Error>> {
        let user = engine.default_user().await?;
        Ok(Self::new(engine, user))
    }

    /// Abort calculations as soon as the token gets cancelled, for example when the surrounding
    /// request went away.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    /// Unscoped permissions on all objects.
    pub async fn permissions(&self) -> Result<Arc<PermissionSet>, EngineError<S::Error>> {
        self.permissions
            .get_or_try_init(|| {
                self.engine
                    .permissions(&self.user, Scope::UNRESTRICTED, &self.cancel)
            })
            .await
            .cloned()
    }

    /// Permissions restricted to a scope.
    ///
    /// Only grants on the scoped objects are looked at, other objects are missing in the result.
    /// Super-administrators are the exception, they always get all objects.
    pub async fn permissions_with_scope(
        &self,
        scope: Scope,
    ) -> Result<Arc<PermissionSet>, EngineError<S::Error>> {
        if scope.is_unrestricted() {
            return self.permissions().await;
        }

        if let Some(permissions) = self.scoped.lock().await.get(&scope) {
            return Ok(permissions.clone());
        }

        let permissions = self
            .engine
            .permissions(&self.user, scope, &self.cancel)
            .await?;
        let mut scoped = self.scoped.lock().await;
        Ok(scoped.entry(scope).or_insert(permissions).clone())
    }

    /// Ids of all objects of a namespace with at least the given level.
    pub async fn objects_with_level(
        &self,
        namespace: Namespace,
        level: Level,
    ) -> Result<Vec<ObjectId>, EngineError<S::Error>> {
        Ok(self.permissions().await?.objects(namespace).at_least(level))
    }

    pub async fn repositories_with_level(
        &self,
        level: Level,
    ) -> Result<Vec<ObjectId>, EngineError<S::Error>> {
        self.objects_with_level(Namespace::Repository, level).await
    }

    /// Repositories this user administers.
    pub async fn repositories_admin(&self) -> Result<Vec<ObjectId>, EngineError<S::Error>> {
        self.objects_with_level(Namespace::Repository, Level::Admin)
            .await
    }

    /// Repository groups this user administers.
    pub async fn repository_groups_admin(&self) -> Result<Vec<ObjectId>, EngineError<S::Error>> {
        self.objects_with_level(Namespace::RepositoryGroup, Level::Admin)
            .await
    }

    /// User groups this user administers.
    pub async fn user_groups_admin(&self) -> Result<Vec<ObjectId>, EngineError<S::Error>> {
        self.objects_with_level(Namespace::UserGroup, Level::Admin)
            .await
    }

    /// Returns `true` if this user may connect from the given source address.
    pub async fn ip_allowed(
        &self,
        source: &str,
        inherit_from_default: bool,
    ) -> Result<bool, EngineError<S::Error>> {
        self.engine
            .ip_allowed(self.user.id, source, inherit_from_default)
            .await
    }
}
