// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use vouch_core::{Level, Namespace, ObjectId, ObjectPermission, UserId};
use vouch_store::{GrantSource, GrantStore, MemoryStore, Subject, User};

const ALICE: UserId = UserId(10);
const DEVS: ObjectId = ObjectId(200);

/// Ids of all objects of a namespace a user holds any grant on, directly or through user groups.
async fn objects_with_grants<S: GrantStore>(
    store: &S,
    user: UserId,
    namespace: Namespace,
) -> Result<BTreeSet<ObjectId>, S::Error> {
    let mut objects = BTreeSet::new();
    for source in [GrantSource::User(user), GrantSource::UserGroupsOf(user)] {
        for grant in store.object_grants(source, namespace, None).await? {
            objects.insert(grant.object.id);
        }
    }
    Ok(objects)
}

#[tokio::test]
async fn query_through_generic_store() {
    let store = MemoryStore::new();
    store.insert_user(User::new(ALICE, "alice"));
    store.add_user_group(DEVS, ALICE, true).unwrap();
    store.add_member(DEVS, ALICE).unwrap();

    for id in 1..=3 {
        store
            .add_repository(ObjectId(id), store.default_user_id(), id == 3)
            .unwrap();
    }
    store
        .grant_object(
            Subject::User(ALICE),
            ObjectId(1),
            ObjectPermission::repository(Level::Write),
        )
        .unwrap();
    store
        .grant_object(
            Subject::UserGroup(DEVS),
            ObjectId(3),
            ObjectPermission::repository(Level::Read),
        )
        .unwrap();

    let objects = objects_with_grants(&store, ALICE, Namespace::Repository)
        .await
        .unwrap();
    assert_eq!(objects, BTreeSet::from([ObjectId(1), ObjectId(3)]));

    // Alice owns the user group but holds no grant on it.
    assert!(
        objects_with_grants(&store, ALICE, Namespace::UserGroup)
            .await
            .unwrap()
            .is_empty()
    );

    // Removed repositories take their grants with them.
    store.remove_object(Namespace::Repository, ObjectId(3));
    let objects = objects_with_grants(&store, ALICE, Namespace::Repository)
        .await
        .unwrap();
    assert_eq!(objects, BTreeSet::from([ObjectId(1)]));
}
