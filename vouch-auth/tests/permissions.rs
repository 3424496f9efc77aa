// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use rstest::rstest;
use tokio_util::sync::CancellationToken;
use vouch_auth::test_utils::{
    ALICE, BOB, DEVS, FailingStore, Fixture, OPS, OTHER_REPO, PRIVATE_REPO, REPO, REPO_GROUP,
    StoreUnavailable,
};
use vouch_auth::{
    AuthUser, CacheConfig, CalculationInput, CalculatorConfig, Config, Engine, EngineError,
    PermissionOrigin,
};
use vouch_core::{
    Algorithm, GlobalPermission, Level, Namespace, ObjectId, ObjectPermission, Scope, UserId,
};
use vouch_store::{IpRule, MemoryStore, Subject, User};

const ADMIN: UserId = UserId(1000);

fn non_explicit() -> Config {
    Config {
        calculator: CalculatorConfig {
            explicit: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn load(engine: Arc<Engine<MemoryStore>>, id: UserId) -> AuthUser<MemoryStore> {
    AuthUser::load(engine, id).await.unwrap()
}

async fn repository_level(fixture: &Fixture, config: Config, repository: ObjectId) -> Level {
    let user = load(fixture.engine(config), ALICE).await;
    user.permissions().await.unwrap().repositories.level(repository)
}

#[tokio::test]
async fn scenario_default_baseline() {
    let fixture = Fixture::new();
    let user = load(fixture.engine(Config::default()), ALICE).await;
    let permissions = user.permissions().await.unwrap();

    assert_eq!(
        permissions.repositories.get(REPO),
        Some("repository.read".parse::<ObjectPermission>().unwrap())
    );
    assert_eq!(
        permissions.repositories.resolved(REPO).unwrap().origin(),
        PermissionOrigin::Default
    );
}

#[tokio::test]
async fn scenario_user_group_grant_wins_by_weight() {
    let fixture = Fixture::new();
    fixture.join(DEVS, ALICE);
    fixture.grant_repository(Subject::UserGroup(DEVS), REPO, Level::Write);

    let user = load(fixture.engine(non_explicit()), ALICE).await;
    let permissions = user.permissions().await.unwrap();
    assert_eq!(permissions.repositories.get(REPO).unwrap().to_string(), "repository.write");
    assert_eq!(
        permissions.repositories.resolved(REPO).unwrap().origin(),
        PermissionOrigin::UserGroup(DEVS)
    );
}

#[tokio::test]
async fn scenario_owner_gets_admin() {
    let fixture = Fixture::new();
    fixture.join(DEVS, ALICE);
    fixture.grant_repository(Subject::UserGroup(DEVS), REPO, Level::Write);
    fixture.make_owner(ALICE, REPO);

    let user = load(fixture.engine(non_explicit()), ALICE).await;
    let permissions = user.permissions().await.unwrap();
    assert_eq!(permissions.repositories.get(REPO).unwrap().to_string(), "repository.admin");
}

#[tokio::test]
async fn scenario_private_repository() {
    let fixture = Fixture::new();
    let user = load(fixture.engine(Config::default()), ALICE).await;
    let permissions = user.permissions().await.unwrap();
    assert_eq!(
        permissions.repositories.get(PRIVATE_REPO).unwrap().to_string(),
        "repository.none"
    );

    // Bob owns it.
    let bob = load(fixture.engine(Config::default()), BOB).await;
    assert_eq!(
        bob.permissions().await.unwrap().repositories.level(PRIVATE_REPO),
        Level::Admin
    );
}

#[tokio::test]
async fn admins_get_admin_everywhere() {
    let fixture = Fixture::new();
    fixture.store.insert_user(User::new(ADMIN, "admin").admin());
    fixture.grant_repository(Subject::User(ADMIN), REPO, Level::None);

    let engine = fixture.engine(Config::default());
    let admin = load(engine.clone(), ADMIN).await;
    let permissions = admin.permissions().await.unwrap();

    assert!(permissions.is_admin());
    for namespace in Namespace::ALL {
        let objects = permissions.objects(namespace);
        assert!(!objects.is_empty());
        for (_, permission) in objects.iter() {
            assert_eq!(permission, ObjectPermission::admin(namespace));
        }
    }
    assert_eq!(
        admin.repositories_admin().await.unwrap(),
        vec![REPO, OTHER_REPO, PRIVATE_REPO]
    );

    // Scopes don't restrict administrators.
    let scoped = admin
        .permissions_with_scope(Scope::repository(REPO))
        .await
        .unwrap();
    assert_eq!(scoped.repositories.len(), 3);

    // Calculated as a regular user, the administrator's direct grant applies.
    let input = CalculationInput {
        super_admin_as_user: true,
        ..CalculationInput::from(admin.user())
    };
    let as_user = engine
        .calculate(input, Scope::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!as_user.is_admin());
    assert_eq!(as_user.repositories.level(REPO), Level::None);
    assert_eq!(as_user.repositories.level(OTHER_REPO), Level::Read);
}

#[rstest]
#[case(Namespace::Repository, REPO)]
#[case(Namespace::RepositoryGroup, REPO_GROUP)]
#[case(Namespace::UserGroup, OPS)]
#[tokio::test]
async fn owners_get_admin_over_any_grant(#[case] namespace: Namespace, #[case] id: ObjectId) {
    let fixture = Fixture::new();
    fixture.store.set_owner(namespace, id, ALICE).unwrap();
    fixture.join(DEVS, ALICE);
    for subject in [Subject::UserGroup(DEVS), Subject::User(ALICE)] {
        fixture
            .store
            .grant_object(subject, id, ObjectPermission::none(namespace))
            .unwrap();
    }

    let config = Config {
        calculator: CalculatorConfig {
            algorithm: Algorithm::LowerWins,
            ..Default::default()
        },
        ..Default::default()
    };
    let user = load(fixture.engine(config), ALICE).await;
    let permissions = user.permissions().await.unwrap();
    assert_eq!(
        permissions.objects(namespace).get(id),
        Some(ObjectPermission::admin(namespace))
    );
}

#[tokio::test]
async fn explicit_grant_overrides_user_groups() {
    let fixture = Fixture::new();
    fixture.join(DEVS, ALICE);
    fixture.grant_repository(Subject::UserGroup(DEVS), REPO, Level::Admin);
    fixture.grant_repository(Subject::User(ALICE), REPO, Level::Read);

    assert_eq!(
        repository_level(&fixture, Config::default(), REPO).await,
        Level::Read
    );
    assert_eq!(
        repository_level(&fixture, non_explicit(), REPO).await,
        Level::Admin
    );
}

#[rstest]
#[case(Algorithm::HigherWins, Level::Write)]
#[case(Algorithm::LowerWins, Level::Read)]
#[tokio::test]
async fn combining_user_groups_is_commutative(
    #[case] algorithm: Algorithm,
    #[case] expected: Level,
) {
    let config = Config {
        calculator: CalculatorConfig {
            algorithm,
            ..Default::default()
        },
        ..Default::default()
    };

    for (devs, ops) in [(Level::Write, Level::Read), (Level::Read, Level::Write)] {
        let fixture = Fixture::new();
        fixture.join(DEVS, ALICE);
        fixture.join(OPS, ALICE);
        fixture.grant_repository(Subject::UserGroup(DEVS), REPO, devs);
        fixture.grant_repository(Subject::UserGroup(OPS), REPO, ops);

        assert_eq!(repository_level(&fixture, config.clone(), REPO).await, expected);
    }
}

#[tokio::test]
async fn stop_inheriting_default_permissions() {
    let fixture = Fixture::new();
    fixture
        .store
        .insert_user(User::new(ALICE, "alice").without_default_permissions());
    fixture
        .store
        .grant_global(Subject::User(ALICE), GlobalPermission::ForkRepository(true))
        .unwrap();
    fixture.grant_repository(Subject::User(ALICE), OTHER_REPO, Level::Write);

    let user = load(fixture.engine(Config::default()), ALICE).await;
    let permissions = user.permissions().await.unwrap();

    assert!(!permissions.has_global_any(&[GlobalPermission::CreateRepository(true)]));
    assert!(permissions.has_global_all(&[
        GlobalPermission::ForkRepository(true),
        GlobalPermission::InheritDefaultPermissions(false),
    ]));
    assert_eq!(permissions.repositories.level(REPO), Level::None);
    assert_eq!(permissions.repository_groups.level(REPO_GROUP), Level::None);
    assert_eq!(permissions.repositories.level(OTHER_REPO), Level::Write);
}

#[tokio::test]
async fn non_inheriting_user_group_replaces_globals() {
    let fixture = Fixture::new();
    fixture.store.add_user_group(ObjectId(210), BOB, false).unwrap();
    fixture.join(ObjectId(210), ALICE);
    fixture
        .store
        .grant_global(
            Subject::UserGroup(ObjectId(210)),
            GlobalPermission::CreateRepositoryGroup(true),
        )
        .unwrap();

    let user = load(fixture.engine(Config::default()), ALICE).await;
    let permissions = user.permissions().await.unwrap();
    assert!(permissions.has_global_all(&[GlobalPermission::CreateRepositoryGroup(true)]));
    assert!(!permissions.has_global_any(&[
        GlobalPermission::CreateRepository(true),
        GlobalPermission::ForkRepository(true),
    ]));

    // The group stops passing anything on once deactivated.
    fixture
        .store
        .set_user_group_active(ObjectId(210), false)
        .unwrap();
    let user = load(fixture.engine(Config::default()), ALICE).await;
    let permissions = user.permissions().await.unwrap();
    assert!(permissions.has_global_all(&[GlobalPermission::CreateRepository(true)]));
    assert!(!permissions.has_global_any(&[GlobalPermission::CreateRepositoryGroup(true)]));
}

#[tokio::test]
async fn repeated_calculations_are_identical() {
    let fixture = Fixture::new();
    fixture.join(DEVS, ALICE);
    fixture.join(OPS, ALICE);
    fixture.grant_repository(Subject::UserGroup(DEVS), REPO, Level::Write);
    fixture.grant_repository(Subject::UserGroup(OPS), REPO, Level::Read);
    fixture.grant_repository(Subject::User(ALICE), OTHER_REPO, Level::Admin);

    let engine = fixture.engine(Config::default());
    let alice = engine.get_user(ALICE).await.unwrap();
    let cancel = CancellationToken::new();

    let first = engine
        .calculate(CalculationInput::from(&alice), Scope::default(), &cancel)
        .await
        .unwrap();
    let second = engine
        .calculate(CalculationInput::from(&alice), Scope::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(engine.cache().is_empty().await);
}

#[tokio::test]
async fn invalidate_members_of_user_group() {
    let fixture = Fixture::new();
    fixture.join(DEVS, ALICE);
    fixture.join(DEVS, BOB);
    let engine = fixture.engine(non_explicit());

    assert_eq!(
        load(engine.clone(), ALICE).await.permissions().await.unwrap().repositories.level(REPO),
        Level::Read
    );

    fixture.grant_repository(Subject::UserGroup(DEVS), REPO, Level::Write);

    // A fresh request still sees the cached value until the group is invalidated.
    assert_eq!(
        load(engine.clone(), ALICE).await.permissions().await.unwrap().repositories.level(REPO),
        Level::Read
    );
    assert_eq!(engine.invalidate_user_group(DEVS).await.unwrap(), 2);
    assert_eq!(
        load(engine.clone(), ALICE).await.permissions().await.unwrap().repositories.level(REPO),
        Level::Write
    );
}

#[tokio::test]
async fn invalidate_everyone_when_default_grants_change() {
    let fixture = Fixture::new();
    let engine = fixture.engine(Config::default());
    let default_user = fixture.store.default_user_id();

    for user in [ALICE, BOB] {
        load(engine.clone(), user).await.permissions().await.unwrap();
    }
    assert_eq!(engine.cache().len().await, 2);

    fixture.grant_repository(Subject::User(default_user), REPO, Level::Write);
    engine.invalidate_default_user().await;

    assert!(engine.cache().is_empty().await);
    assert_eq!(
        load(engine.clone(), ALICE).await.permissions().await.unwrap().repositories.level(REPO),
        Level::Write
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_see_invalidated_permissions() {
    let fixture = Fixture::new();
    let engine = fixture.engine(Config::default());
    let alice = engine.get_user(ALICE).await.unwrap();
    let bob = engine.get_user(BOB).await.unwrap();

    let mut readers = Vec::new();
    for reader in 0..8 {
        let engine = engine.clone();
        let user = if reader % 2 == 0 { alice.clone() } else { bob.clone() };
        readers.push(tokio::spawn(async move {
            let cancel = CancellationToken::new();
            for round in 0..200 {
                let scope = if round % 3 == 0 {
                    Scope::repository(REPO)
                } else {
                    Scope::default()
                };
                let permissions = engine.permissions(&user, scope, &cancel).await.unwrap();
                if user.id == BOB {
                    // Bob owns the repository.
                    assert_eq!(permissions.repositories.level(REPO), Level::Admin);
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    let cancel = CancellationToken::new();
    for round in 0..100 {
        let level = if round % 2 == 0 { Level::Write } else { Level::Admin };
        fixture.grant_repository(Subject::User(ALICE), REPO, level);
        if round % 10 == 0 {
            engine.invalidate_all().await;
        } else {
            engine.invalidate_user(ALICE).await;
        }

        // Whatever the readers calculated before the grant changed must not be served now.
        for scope in [Scope::default(), Scope::repository(REPO)] {
            let permissions = engine.permissions(&alice, scope, &cancel).await.unwrap();
            assert_eq!(permissions.repositories.level(REPO), level);
        }
        tokio::task::yield_now().await;
    }

    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn cached_permissions_expire() {
    let fixture = Fixture::new();
    let engine = fixture.engine(Config {
        cache: CacheConfig {
            ttl: Some(Duration::from_secs(10)),
            ..Default::default()
        },
        ..Default::default()
    });

    load(engine.clone(), ALICE).await.permissions().await.unwrap();
    fixture.grant_repository(Subject::User(ALICE), REPO, Level::Write);

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(
        load(engine.clone(), ALICE).await.permissions().await.unwrap().repositories.level(REPO),
        Level::Read
    );

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(
        load(engine.clone(), ALICE).await.permissions().await.unwrap().repositories.level(REPO),
        Level::Write
    );
}

#[tokio::test]
async fn store_errors_reach_the_caller() {
    let fixture = Fixture::new();
    let store = FailingStore {
        inner: fixture.store.clone(),
        failing: Namespace::UserGroup,
    };
    let engine = Arc::new(Engine::new(store, Config::default()).unwrap());

    let user = AuthUser::load(engine.clone(), ALICE).await.unwrap();
    assert_matches!(
        user.permissions().await,
        Err(EngineError::Store(StoreUnavailable))
    );
    assert!(engine.cache().is_empty().await);

    // Scopes don't avoid the failing query either.
    assert_matches!(
        user.permissions_with_scope(Scope::repository(REPO)).await,
        Err(EngineError::Store(StoreUnavailable))
    );
}

#[tokio::test]
async fn ip_access_of_user() {
    let fixture = Fixture::new();
    let default_user = fixture.store.default_user_id();
    fixture
        .store
        .add_ip_rule(default_user, IpRule::new("10.0.0.0/8").with_description("office"))
        .unwrap();
    fixture
        .store
        .add_ip_rule(ALICE, IpRule::new("2001:db8::/32"))
        .unwrap();
    fixture
        .store
        .add_ip_rule(ALICE, IpRule::new("10.0.0.0/40"))
        .unwrap();

    let user = load(fixture.engine(Config::default()), ALICE).await;
    assert!(user.ip_allowed("10.20.30.40", true).await.unwrap());
    assert!(!user.ip_allowed("10.20.30.40", false).await.unwrap());
    assert!(user.ip_allowed("2001:db8::42", false).await.unwrap());
    assert!(!user.ip_allowed("192.0.2.1", true).await.unwrap());
}
