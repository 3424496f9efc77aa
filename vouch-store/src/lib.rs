// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only query interfaces for everything a permission calculation depends on, and an
//! in-memory implementation of them.
//!
//! ## Read queries
//!
//! `vouch-store` models the storage layer as a set of read queries: the default user's grants
//! (everyone's baseline), a user's direct grants, their user group memberships and the grants
//! reaching them through those groups. Object grants are queried per namespace and can be narrowed
//! down to a single object with a scope. Ownership and privacy of objects are embedded in the
//! returned rows, no extra lookups are needed.
//!
//! Permission strings are converted into typed values before they leave a store, so callers never
//! see an undefined permission level.
//!
//! ## Writes
//!
//! Creating and removing grants is an administrative concern and not part of the query traits.
//! Every code path mutating grants is responsible for invalidating cached permissions of the
//! affected users afterwards.
//!
//! ## Store implementations
//!
//! An in-memory storage solution is provided in the form of a `MemoryStore` which implements
//! `GrantStore` and offers typed administrative writes. The store is gated by the `memory` feature
//! flag and is enabled by default.
mod grants;
#[cfg(feature = "memory")]
pub mod memory;
mod models;

pub use grants::{GrantStore, LocalGrantStore};
#[cfg(feature = "memory")]
pub use memory::{MemoryStore, MemoryStoreError, Subject};
pub use models::{GrantSource, IpRule, Membership, ObjectGrant, ObjectRef, User, UserGroupRef};
