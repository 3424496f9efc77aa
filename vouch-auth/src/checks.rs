// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission checks against a set of required permissions.
//!
//! Global checks look at the unscoped permissions, object checks narrow the calculation down to the
//! checked object. An object the user can't reach counts as `none`.
use vouch_core::{GlobalPermission, Level, Namespace, ObjectId, Scope};
use vouch_store::GrantStore;

use crate::auth_user::AuthUser;
use crate::engine::EngineError;

/// Returns `true` if the user holds every one of the required global permissions.
pub async fn has_global_all<S: GrantStore>(
    user: &AuthUser<S>,
    required: &[GlobalPermission],
) -> Result<bool, EngineError<S::Error>> {
    Ok(user.permissions().await?.has_global_all(required))
}

/// Returns `true` if the user holds at least one of the required global permissions.
pub async fn has_global_any<S: GrantStore>(
    user: &AuthUser<S>,
    required: &[GlobalPermission],
) -> Result<bool, EngineError<S::Error>> {
    Ok(user.permissions().await?.has_global_any(required))
}

async fn has_object_all<S: GrantStore>(
    user: &AuthUser<S>,
    namespace: Namespace,
    id: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    let permissions = user
        .permissions_with_scope(Scope::object(namespace, id))
        .await?;
    Ok(permissions.has_object_all(namespace, id, required))
}

async fn has_object_any<S: GrantStore>(
    user: &AuthUser<S>,
    namespace: Namespace,
    id: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    let permissions = user
        .permissions_with_scope(Scope::object(namespace, id))
        .await?;
    Ok(permissions.has_object_any(namespace, id, required))
}

pub async fn has_repository_all<S: GrantStore>(
    user: &AuthUser<S>,
    repository: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    has_object_all(user, Namespace::Repository, repository, required).await
}

/// Returns `true` if the level on the repository is one of the required levels.
pub async fn has_repository_any<S: GrantStore>(
    user: &AuthUser<S>,
    repository: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    has_object_any(user, Namespace::Repository, repository, required).await
}

pub async fn has_repository_group_all<S: GrantStore>(
    user: &AuthUser<S>,
    group: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    has_object_all(user, Namespace::RepositoryGroup, group, required).await
}

pub async fn has_repository_group_any<S: GrantStore>(
    user: &AuthUser<S>,
    group: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    has_object_any(user, Namespace::RepositoryGroup, group, required).await
}

pub async fn has_user_group_all<S: GrantStore>(
    user: &AuthUser<S>,
    group: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    has_object_all(user, Namespace::UserGroup, group, required).await
}

pub async fn has_user_group_any<S: GrantStore>(
    user: &AuthUser<S>,
    group: ObjectId,
    required: &[Level],
) -> Result<bool, EngineError<S::Error>> {
    has_object_any(user, Namespace::UserGroup, group, required).await
}

#[cfg(test)]
mod tests {
    use vouch_core::{GlobalPermission, Level, ObjectId};
    use vouch_store::Subject;

    use crate::test_utils::{ALICE, DEVS, Fixture, PRIVATE_REPO, REPO, REPO_GROUP};
    use crate::{AuthUser, Config};

    use super::*;

    const ANY_ACCESS: [Level; 3] = [Level::Read, Level::Write, Level::Admin];
    const WRITE_ACCESS: [Level; 2] = [Level::Write, Level::Admin];

    #[tokio::test]
    async fn global_checks() {
        let fixture = Fixture::new();
        let user = AuthUser::load(fixture.engine(Config::default()), ALICE)
            .await
            .unwrap();

        assert!(
            has_global_all(
                &user,
                &[
                    GlobalPermission::CreateRepository(true),
                    GlobalPermission::ForkRepository(true)
                ]
            )
            .await
            .unwrap()
        );
        assert!(
            !has_global_all(
                &user,
                &[GlobalPermission::CreateRepository(true), GlobalPermission::Admin]
            )
            .await
            .unwrap()
        );
        assert!(
            has_global_any(
                &user,
                &[GlobalPermission::CreateRepository(true), GlobalPermission::Admin]
            )
            .await
            .unwrap()
        );
        assert!(!has_global_any(&user, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn object_checks() {
        let fixture = Fixture::new();
        fixture.grant_repository(Subject::User(ALICE), REPO, Level::Write);
        let user = AuthUser::load(fixture.engine(Config::default()), ALICE)
            .await
            .unwrap();

        assert!(has_repository_any(&user, REPO, &WRITE_ACCESS).await.unwrap());
        assert!(has_repository_all(&user, REPO, &[Level::Write]).await.unwrap());
        assert!(!has_repository_all(&user, REPO, &WRITE_ACCESS).await.unwrap());

        // Private repositories of others and unknown objects are not accessible.
        assert!(!has_repository_any(&user, PRIVATE_REPO, &ANY_ACCESS).await.unwrap());
        assert!(!has_repository_any(&user, ObjectId(999), &ANY_ACCESS).await.unwrap());

        assert!(has_repository_group_any(&user, REPO_GROUP, &ANY_ACCESS).await.unwrap());
        assert!(!has_repository_group_any(&user, REPO_GROUP, &WRITE_ACCESS).await.unwrap());
        assert!(has_repository_group_all(&user, REPO_GROUP, &[Level::Read]).await.unwrap());
        assert!(has_user_group_any(&user, DEVS, &[Level::Read]).await.unwrap());
        assert!(!has_user_group_all(&user, DEVS, &[Level::Admin]).await.unwrap());
    }
}
