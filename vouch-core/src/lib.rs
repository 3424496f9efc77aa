// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types shared by the vouch permission engine.
//!
//! Permissions are strings at the edges of the system ("repository.write", "global.admin") but
//! tagged values everywhere else. Converting happens once, at the grant store boundary, through
//! the `FromStr` implementations of [`ObjectPermission`] and [`GlobalPermission`]. An unknown
//! level or namespace is rejected there with a [`ParseError`] and never reaches the calculation.
//!
//! Object permissions live in one of three namespaces (repositories, repository groups and user
//! groups) and always carry exactly one [`Level`]. Levels are totally ordered inside a namespace
//! through a [`WeightTable`], which is also what conflicting grants are resolved with.
mod identity;
mod permission;
mod scope;
mod weights;

pub use identity::{ObjectId, UserId};
pub use permission::{GlobalPermission, Level, Namespace, ObjectPermission, ParseError};
pub use scope::Scope;
pub use weights::{Algorithm, LevelWeights, WeightTable, WeightTableError};
