// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission engine combining a grant store, the calculator and the cache.
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vouch_core::{ObjectId, Scope, UserId, WeightTableError};
use vouch_store::{GrantStore, User};

use crate::cache::{CacheKey, PermissionCache};
use crate::calculator::{CalculationInput, PermissionCalculator};
use crate::config::Config;
use crate::ip::IpAccess;
use crate::permission_set::PermissionSet;
use crate::rows::GrantRows;

#[derive(Debug, Error)]
pub enum EngineError<E> {
    /// The grant store failed, its error is passed on unchanged.
    #[error("grant store error: {0}")]
    Store(E),

    #[error("user {0} does not exist")]
    UnknownUser(UserId),

    #[error("permission calculation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] WeightTableError),
}

/// Calculates, caches and invalidates effective permissions of users.
///
/// Every code path changing grants in the store has to call one of the `invalidate_*` methods
/// afterwards, cached permissions are otherwise only refreshed when their time-to-live ran out.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    config: Config,
    cache: PermissionCache,
}

impl<S> Engine<S>
where
    S: GrantStore,
{
    /// Create an engine, fails when the configured weight table is invalid.
    pub fn new(store: S, config: Config) -> Result<Self, EngineError<S::Error>> {
        config.validate()?;
        let cache = PermissionCache::new(config.cache.clone());

        Ok(Self {
            store,
            config,
            cache,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, EngineError<S::Error>> {
        self.store
            .get_user(id)
            .await
            .map_err(EngineError::Store)?
            .ok_or(EngineError::UnknownUser(id))
    }

    pub async fn default_user(&self) -> Result<User, EngineError<S::Error>> {
        self.store.default_user().await.map_err(EngineError::Store)
    }

    /// Effective permissions of a user, served from the cache if possible.
    pub async fn permissions(
        &self,
        user: &User,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<Arc<PermissionSet>, EngineError<S::Error>> {
        let input = CalculationInput::from(user);
        self.cache
            .get_or_compute(CacheKey::new(user.id, scope), move || {
                self.calculate(input, scope, cancel)
            })
            .await
    }

    /// Calculate permissions without touching the cache.
    pub async fn calculate(
        &self,
        input: CalculationInput,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<PermissionSet, EngineError<S::Error>> {
        debug!(
            "fetching grants of user {} with scope {:?}",
            input.user, scope
        );
        let rows = cancellable(cancel, self.fetch_rows(&input, scope)).await?;
        Ok(PermissionCalculator::new(&self.config.calculator).calculate(&input, &rows))
    }

    async fn fetch_rows(
        &self,
        input: &CalculationInput,
        scope: Scope,
    ) -> Result<GrantRows, S::Error> {
        let default_user = self.store.default_user().await?;
        if input.is_super_admin() {
            GrantRows::fetch_for_admin(&self.store, default_user.id).await
        } else {
            GrantRows::fetch(&self.store, input.user, default_user.id, scope).await
        }
    }

    /// Returns `true` if a user may connect from the given source address.
    pub async fn ip_allowed(
        &self,
        user: UserId,
        source: &str,
        inherit_from_default: bool,
    ) -> Result<bool, EngineError<S::Error>> {
        let access = IpAccess::load(&self.store, user, inherit_from_default)
            .await
            .map_err(EngineError::Store)?;
        Ok(access.is_allowed(source))
    }

    /// Drop cached permissions of a user after their grants changed.
    pub async fn invalidate_user(&self, user: UserId) {
        self.cache.invalidate_user(user).await;
    }

    pub async fn invalidate_users(&self, users: impl IntoIterator<Item = UserId>) {
        for user in users {
            self.cache.invalidate_user(user).await;
        }
    }

    /// Drop cached permissions of every member of a user group after grants of the group changed.
    ///
    /// Members are looked up in the store, so this has to be called before members are removed.
    /// Returns the number of invalidated users.
    pub async fn invalidate_user_group(
        &self,
        group: ObjectId,
    ) -> Result<usize, EngineError<S::Error>> {
        let members = self
            .store
            .user_group_members(group)
            .await
            .map_err(EngineError::Store)?;
        let count = members.len();
        debug!("invalidating {} members of user group {}", count, group);
        self.invalidate_users(members).await;
        Ok(count)
    }

    /// Drop all cached permissions after the default user's grants changed, they are the baseline
    /// of everyone.
    pub async fn invalidate_default_user(&self) {
        self.cache.invalidate_all().await;
    }

    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }
}

/// Run a store query until it finishes or the token is cancelled, whatever happens first.
async fn cancellable<T, E, F>(
    cancel: &CancellationToken,
    future: F,
) -> Result<T, EngineError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("permission calculation cancelled");
            Err(EngineError::Cancelled)
        }
        result = future => result.map_err(EngineError::Store),
    }
}
