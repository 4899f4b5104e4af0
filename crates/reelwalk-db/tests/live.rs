//! Live integration tests for reelwalk-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, Utc};
use reelwalk_core::{EventKind, InteractionState, NewProfileEvent, ProfileInteractionState};
use reelwalk_db::{
    complete_traversal_run, create_traversal_run, fail_traversal_run, find_profile_by_username,
    find_sent_reply, get_interaction_state, get_traversal_run, insert_profile_event,
    list_prefetch_usernames, list_profile_events, start_traversal_run,
    transition_interaction_state, DbError,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_test_account(pool: &sqlx::PgPool, username: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("INSERT INTO accounts (username) VALUES ($1) RETURNING id")
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("insert_test_account failed for '{username}': {e}"))
}

async fn insert_test_profile(pool: &sqlx::PgPool, account_id: i64, username: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO profiles (account_id, username, auto_reply_enabled) \
         VALUES ($1, $2, true) RETURNING id",
    )
    .bind(account_id)
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_test_profile failed for '{username}': {e}"))
}

// ---------------------------------------------------------------------------
// profile_events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn downloaded_event_is_recorded_once_per_story(pool: sqlx::PgPool) {
    let account = insert_test_account(&pool, "walker").await;
    let profile = insert_test_profile(&pool, account, "friend").await;

    let event = NewProfileEvent::for_story(
        profile,
        EventKind::StoryDownloaded,
        "3301",
        Utc::now(),
        json!({"story_id": "3301"}),
    );

    assert!(insert_profile_event(&pool, &event).await.unwrap());
    assert!(
        !insert_profile_event(&pool, &event).await.unwrap(),
        "second insert of the same story must be a no-op"
    );

    let events = list_profile_events(&pool, profile, Some(EventKind::StoryDownloaded), 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sent_reply_is_found_by_story_id_or_media_url(pool: sqlx::PgPool) {
    let account = insert_test_account(&pool, "walker").await;
    let profile = insert_test_profile(&pool, account, "friend").await;

    let event = NewProfileEvent::for_story(
        profile,
        EventKind::StoryReplySent,
        "123",
        Utc::now(),
        json!({"story_id": "123", "media_url": "https://cdn.example/a.jpg", "text": "nice!"}),
    );
    insert_profile_event(&pool, &event).await.unwrap();

    let by_id = find_sent_reply(&pool, profile, "123", None).await.unwrap();
    assert!(by_id.is_some());

    let by_url = find_sent_reply(&pool, profile, "999", Some("https://cdn.example/a.jpg"))
        .await
        .unwrap();
    assert!(by_url.is_some());

    let miss = find_sent_reply(&pool, profile, "999", Some("https://cdn.example/b.jpg"))
        .await
        .unwrap();
    assert!(miss.is_none());
}

// ---------------------------------------------------------------------------
// profiles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn profile_lookup_is_case_insensitive_and_scoped_to_account(pool: sqlx::PgPool) {
    let account = insert_test_account(&pool, "walker").await;
    let other = insert_test_account(&pool, "other").await;
    insert_test_profile(&pool, account, "Friend").await;

    assert!(find_profile_by_username(&pool, account, "friend")
        .await
        .unwrap()
        .is_some());
    assert!(find_profile_by_username(&pool, other, "friend")
        .await
        .unwrap()
        .is_none());

    let prefetch = list_prefetch_usernames(&pool, account, 5).await.unwrap();
    assert_eq!(prefetch, vec!["Friend".to_string()]);
}

// ---------------------------------------------------------------------------
// profile_interaction_states
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn transition_creates_then_updates_state(pool: sqlx::PgPool) {
    let account = insert_test_account(&pool, "walker").await;
    let profile = insert_test_profile(&pool, account, "friend").await;
    let now = Utc::now();

    assert!(get_interaction_state(&pool, profile).await.unwrap().is_none());

    transition_interaction_state(&pool, profile, |current| {
        assert!(current.is_none());
        Some(ProfileInteractionState::unavailable(
            now,
            "replies_not_allowed",
            3,
            false,
        ))
    })
    .await
    .unwrap();

    let stored = get_interaction_state(&pool, profile).await.unwrap().unwrap();
    assert_eq!(stored.state, InteractionState::Unavailable);
    assert!(stored.retry_pending(now + Duration::days(1)));

    transition_interaction_state(&pool, profile, |current| {
        assert_eq!(current.map(|s| s.state), Some(InteractionState::Unavailable));
        Some(ProfileInteractionState::reply_available(now))
    })
    .await
    .unwrap();

    let stored = get_interaction_state(&pool, profile).await.unwrap().unwrap();
    assert_eq!(stored.state, InteractionState::ReplyAvailable);
}

#[sqlx::test(migrations = "../../migrations")]
async fn transition_on_missing_profile_is_not_found(pool: sqlx::PgPool) {
    let result = transition_interaction_state(&pool, 424_242, |_| None).await;
    assert!(matches!(result, Err(DbError::NotFound)));
}

// ---------------------------------------------------------------------------
// traversal_runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn run_lifecycle_records_stats_and_reason(pool: sqlx::PgPool) {
    let account = insert_test_account(&pool, "walker").await;
    let run = create_traversal_run(&pool, account, "cli", 3).await.unwrap();
    assert_eq!(run.status, "queued");

    start_traversal_run(&pool, run.id).await.unwrap();
    complete_traversal_run(&pool, run.id, "limit_reached", &json!({"stories_visited": 3}))
        .await
        .unwrap();

    let stored = get_traversal_run(&pool, run.id).await.unwrap();
    assert_eq!(stored.status, "succeeded");
    assert_eq!(stored.terminal_reason.as_deref(), Some("limit_reached"));
    assert_eq!(stored.stats.unwrap()["stories_visited"], 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_cannot_fail_before_starting(pool: sqlx::PgPool) {
    let account = insert_test_account(&pool, "walker").await;
    let run = create_traversal_run(&pool, account, "cli", 3).await.unwrap();

    let result = fail_traversal_run(&pool, run.id, None, None, "boom").await;
    assert!(matches!(
        result,
        Err(DbError::InvalidRunTransition {
            expected_status: "running",
            ..
        })
    ));
}
