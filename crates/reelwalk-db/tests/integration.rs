//! Offline unit tests for reelwalk-db pool configuration and row types.
//! These tests do not require a live database connection.

use reelwalk_core::{InteractionState, ProfileInteractionState};
use reelwalk_db::{InteractionStateRow, PoolConfig, TraversalRunRow};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let mut app_config = reelwalk_core::AppConfig {
        database_url: "postgres://example".to_string(),
        env: reelwalk_core::Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        webdriver_url: "http://127.0.0.1:9515".to_string(),
        feed_origin: "https://feed.example".to_string(),
        api_base_url: "https://api.example".to_string(),
        api_app_id: "1".to_string(),
        api_timeout_secs: 5,
        api_max_retries: 0,
        api_backoff_base_ms: 0,
        user_agent: "ua".to_string(),
        analysis_url: None,
        comment_url: None,
        story_limit: 10,
        reply_retry_days: 3,
        blocked_tags: vec![],
        diagnostics_dir: None,
        max_concurrent_runs: 1,
        open_deadline_secs: 45,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);

    app_config.db_max_connections = 3;
    assert_eq!(PoolConfig::from_app_config(&app_config).max_connections, 3);
}

#[test]
fn interaction_state_row_converts_known_state() {
    let now = chrono::Utc::now();
    let row = InteractionStateRow {
        profile_id: 1,
        state: "unavailable".to_string(),
        reason: Some("replies_not_allowed".to_string()),
        checked_at: now,
        retry_after_at: Some(now + chrono::Duration::days(3)),
        reaction_available: false,
    };

    let state = ProfileInteractionState::try_from(row).expect("known state should convert");
    assert_eq!(state.state, InteractionState::Unavailable);
    assert!(state.retry_pending(now));
}

#[test]
fn interaction_state_row_rejects_unknown_state() {
    let row = InteractionStateRow {
        profile_id: 1,
        state: "sometimes".to_string(),
        reason: None,
        checked_at: chrono::Utc::now(),
        retry_after_at: None,
        reaction_available: false,
    };

    assert!(ProfileInteractionState::try_from(row).is_err());
}

/// Compile-time smoke test: confirm that [`TraversalRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn traversal_run_row_has_expected_fields() {
    let row = TraversalRunRow {
        id: 1_i64,
        public_id: uuid::Uuid::new_v4(),
        account_id: 2_i64,
        trigger_source: "cli".to_string(),
        status: "queued".to_string(),
        story_limit: 10_i32,
        terminal_reason: None,
        stats: None,
        error_message: None,
        started_at: None,
        completed_at: None,
        created_at: chrono::Utc::now(),
    };

    assert_eq!(row.status, "queued");
    assert_eq!(row.story_limit, 10);
    assert!(row.terminal_reason.is_none());
}
