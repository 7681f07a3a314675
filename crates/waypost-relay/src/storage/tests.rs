//! Storage layer tests for the Waypost relay.

use super::db::{unix_timestamp_ms, RelayDatabase};

async fn test_db() -> RelayDatabase {
    RelayDatabase::open_in_memory().await.unwrap()
}

async fn seed_user(db: &RelayDatabase, id: &str, email: &str) {
    db.create_user(id, email, "alice", "digest").await.unwrap();
}

// === User tests ===

#[tokio::test]
async fn create_and_find_user() {
    let db = test_db().await;
    let user = db
        .create_user("u1", "alice@example.com", "alice", "digest")
        .await
        .unwrap();

    assert_eq!(user.id, "u1");
    assert_eq!(user.email, "alice@example.com");

    let found = db.find_user_by_email("alice@example.com").await.unwrap();
    assert_eq!(found.unwrap().id, "u1");

    assert!(db.find_user_by_email("bob@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;

    let result = db
        .create_user("u2", "alice@example.com", "other", "digest")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn user_profile_has_no_digest() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;

    let profile = db.get_user_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.username, "alice");

    assert!(db.get_user_profile("missing").await.unwrap().is_none());
}

// === Machine tests ===

#[tokio::test]
async fn upsert_machine_flips_online() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;

    let machine = db
        .upsert_machine("m1", "u1", "laptop", "linux", r#"{"hasGit":true}"#)
        .await
        .unwrap();

    assert_eq!(machine.id, "m1");
    assert!(machine.is_online);
    assert!(machine.capabilities().has_git);
}

#[tokio::test]
async fn reregistering_same_name_never_creates_a_second_row() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;

    let first = db
        .upsert_machine("m1", "u1", "laptop", "linux", "{}")
        .await
        .unwrap();
    let second = db
        .upsert_machine("m2", "u1", "laptop", "macos", r#"{"hasRust":true}"#)
        .await
        .unwrap();

    // Same row, original id, refreshed platform and capabilities.
    assert_eq!(second.id, first.id);
    assert_eq!(second.platform, "macos");
    assert!(second.capabilities().has_rust);

    let machines = db.list_machines("u1").await.unwrap();
    assert_eq!(machines.len(), 1);
}

#[tokio::test]
async fn same_name_different_owner_is_a_new_row() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;
    seed_user(&db, "u2", "bob@example.com").await;

    db.upsert_machine("m1", "u1", "laptop", "linux", "{}")
        .await
        .unwrap();
    db.upsert_machine("m2", "u2", "laptop", "linux", "{}")
        .await
        .unwrap();

    assert_eq!(db.list_machines("u1").await.unwrap().len(), 1);
    assert_eq!(db.list_machines("u2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_machines_is_ordered_by_name() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;

    db.upsert_machine("m1", "u1", "zebra", "linux", "{}")
        .await
        .unwrap();
    db.upsert_machine("m2", "u1", "alpha", "linux", "{}")
        .await
        .unwrap();

    let names: Vec<String> = db
        .list_machines("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["alpha", "zebra"]);
}

#[tokio::test]
async fn set_online_and_touch_update_last_seen() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;
    db.upsert_machine("m1", "u1", "laptop", "linux", "{}")
        .await
        .unwrap();

    db.set_machine_online("m1", false).await.unwrap();
    let machine = db.get_machine("m1").await.unwrap().unwrap();
    assert!(!machine.is_online);

    db.touch_machine("m1").await.unwrap();
    let touched = db.get_machine("m1").await.unwrap().unwrap();
    // Touch refreshes last_seen without changing the flag.
    assert!(!touched.is_online);
    assert!(touched.last_seen >= machine.last_seen);
}

#[tokio::test]
async fn mark_stale_offline_transitions_exactly_the_stale_online_rows() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;

    db.upsert_machine("m1", "u1", "stale-online", "linux", "{}")
        .await
        .unwrap();
    db.upsert_machine("m2", "u1", "fresh", "linux", "{}")
        .await
        .unwrap();
    db.upsert_machine("m3", "u1", "stale-offline", "linux", "{}")
        .await
        .unwrap();
    db.set_machine_online("m3", false).await.unwrap();

    // Backdate two of them past any cutoff.
    sqlx::query("UPDATE machines SET last_seen = 0 WHERE name LIKE 'stale%'")
        .execute(db.pool())
        .await
        .unwrap();

    let cutoff = unix_timestamp_ms() - 1_000;
    let mut transitioned = db.mark_stale_offline(cutoff).await.unwrap();
    transitioned.sort();

    // Only the stale *online* machine transitions; its id is returned.
    assert_eq!(transitioned, vec!["m1"]);
    assert!(!db.get_machine("m1").await.unwrap().unwrap().is_online);
    assert!(db.get_machine("m2").await.unwrap().unwrap().is_online);

    // A second sweep finds nothing.
    assert!(db.mark_stale_offline(cutoff).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_machine_is_owner_scoped() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;
    seed_user(&db, "u2", "bob@example.com").await;
    db.upsert_machine("m1", "u1", "laptop", "linux", "{}")
        .await
        .unwrap();

    assert!(!db.delete_machine("u2", "m1").await.unwrap());
    assert!(db.get_machine("m1").await.unwrap().is_some());

    assert!(db.delete_machine("u1", "m1").await.unwrap());
    assert!(db.get_machine("m1").await.unwrap().is_none());
}

#[tokio::test]
async fn rename_machine_is_owner_scoped_and_idempotent() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;
    seed_user(&db, "u2", "bob@example.com").await;
    db.upsert_machine("m1", "u1", "laptop", "linux", "{}")
        .await
        .unwrap();

    assert!(!db.rename_machine("u2", "m1", "stolen").await.unwrap());

    assert!(db.rename_machine("u1", "m1", "desk").await.unwrap());
    assert_eq!(db.get_machine("m1").await.unwrap().unwrap().name, "desk");

    // Renaming to the current name is a no-op that still reports success.
    assert!(db.rename_machine("u1", "m1", "desk").await.unwrap());
}

#[tokio::test]
async fn deleting_a_user_cascades_to_machines() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;
    db.upsert_machine("m1", "u1", "laptop", "linux", "{}")
        .await
        .unwrap();

    sqlx::query("DELETE FROM users WHERE id = 'u1'")
        .execute(db.pool())
        .await
        .unwrap();

    assert!(db.get_machine("m1").await.unwrap().is_none());
}

// === Session tests ===

#[tokio::test]
async fn expired_sessions_are_purged() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice@example.com").await;

    let now = unix_timestamp_ms();
    db.create_session("s1", "u1", "hash-1", now - 1_000)
        .await
        .unwrap();
    db.create_session("s2", "u1", "hash-2", now + 60_000)
        .await
        .unwrap();

    let purged = db.delete_expired_sessions(now).await.unwrap();
    assert_eq!(purged, 1);

    let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(remaining.0, 1);
}
