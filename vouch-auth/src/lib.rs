// SPDX-License-Identifier: MIT OR Apache-2.0

//! Effective permissions of users, merged from default, user group, direct and ownership grants.
//!
//! An [`Engine`] owns a [`GrantStore`](vouch_store::GrantStore), the configuration and a
//! [`PermissionCache`]. Callers create an [`AuthUser`] per request and ask it for permissions,
//! either unscoped or restricted to a single object. On a cache miss the engine fetches all grant
//! rows of the user, runs the [`PermissionCalculator`] over them and caches the result per user
//! and scope until it expires or gets invalidated.
//!
//! ```ignore
//! let engine = Arc::new(Engine::new(store, Config::default())?);
//! let user = AuthUser::load(engine.clone(), user_id).await?;
//!
//! if checks::has_repository_any(&user, repository, &[Level::Write, Level::Admin]).await? {
//!     // ...
//! }
//!
//! // Grants of the user changed.
//! engine.invalidate_user(user_id).await;
//! ```
//!
//! Access by source address is checked separately through [`IpAccess`].
mod auth_user;
mod cache;
mod calculator;
pub mod checks;
mod config;
mod engine;
mod ip;
mod permission_set;
mod rows;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use auth_user::AuthUser;
pub use cache::{CacheKey, PermissionCache};
pub use calculator::{CalculationInput, PermissionCalculator};
pub use config::{
    CacheConfig, CalculatorConfig, Config, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_SHARDS,
    DEFAULT_CACHE_TTL,
};
pub use engine::{Engine, EngineError};
pub use ip::IpAccess;
pub use permission_set::{PermissionMap, PermissionOrigin, PermissionSet, ResolvedPermission};
pub use rows::{GrantRows, ObjectRows};
