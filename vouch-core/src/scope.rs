// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{Namespace, ObjectId};

/// Optional restriction of a permission calculation to single objects.
///
/// Every field defaults to "no restriction". Scopes are normalised on construction, so a scope
/// built from the conventional `-1` sentinels equals `Scope::default()` and both share cache
/// entries.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Scope {
    pub repository: Option<ObjectId>,
    pub repository_group: Option<ObjectId>,
    pub user_group: Option<ObjectId>,
}

impl Scope {
    /// Scope without any restriction.
    pub const UNRESTRICTED: Scope = Scope {
        repository: None,
        repository_group: None,
        user_group: None,
    };

    /// Restrict to a single repository.
    pub fn repository(id: ObjectId) -> Self {
        Self {
            repository: Some(id),
            ..Self::UNRESTRICTED
        }
    }

    /// Restrict to a single repository group.
    pub fn repository_group(id: ObjectId) -> Self {
        Self {
            repository_group: Some(id),
            ..Self::UNRESTRICTED
        }
    }

    /// Restrict to a single user group.
    pub fn user_group(id: ObjectId) -> Self {
        Self {
            user_group: Some(id),
            ..Self::UNRESTRICTED
        }
    }

    /// Restrict the given namespace to a single object.
    pub fn object(namespace: Namespace, id: ObjectId) -> Self {
        match namespace {
            Namespace::Repository => Self::repository(id),
            Namespace::RepositoryGroup => Self::repository_group(id),
            Namespace::UserGroup => Self::user_group(id),
        }
    }

    /// Build a scope from raw identifiers where any negative value means "no restriction".
    pub fn from_raw(repository: i64, repository_group: i64, user_group: i64) -> Self {
        let normalise = |id: i64| u64::try_from(id).ok().map(ObjectId);
        Self {
            repository: normalise(repository),
            repository_group: normalise(repository_group),
            user_group: normalise(user_group),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::UNRESTRICTED
    }

    /// The object the given namespace is restricted to, if any.
    pub fn get(&self, namespace: Namespace) -> Option<ObjectId> {
        match namespace {
            Namespace::Repository => self.repository,
            Namespace::RepositoryGroup => self.repository_group,
            Namespace::UserGroup => self.user_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Namespace, ObjectId};

    use super::Scope;

    #[test]
    fn sentinels_normalise_to_unrestricted() {
        assert_eq!(Scope::from_raw(-1, -1, -1), Scope::default());
        assert!(Scope::from_raw(-1, -1, -1).is_unrestricted());

        let scope = Scope::from_raw(7, -1, -1);
        assert_eq!(scope, Scope::repository(ObjectId(7)));
        assert_eq!(scope.get(Namespace::Repository), Some(ObjectId(7)));
        assert_eq!(scope.get(Namespace::UserGroup), None);
    }

    #[test]
    fn object_scope_per_namespace() {
        let id = ObjectId(3);
        assert_eq!(
            Scope::object(Namespace::RepositoryGroup, id),
            Scope::repository_group(id)
        );
        assert_eq!(Scope::object(Namespace::UserGroup, id).user_group, Some(id));
        assert!(!Scope::object(Namespace::Repository, id).is_unrestricted());
    }
}
