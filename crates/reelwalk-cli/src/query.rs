//! Read-only operator queries over the event log and run records.

use chrono::{DateTime, Utc};
use reelwalk_core::EventKind;

fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "-".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Short per-event detail: the story id plus the skip reason or reply path.
pub(crate) fn event_detail(metadata: &serde_json::Value) -> String {
    let field = |key: &str| metadata.get(key).and_then(serde_json::Value::as_str);
    let mut parts = Vec::new();
    if let Some(story) = field("story_id") {
        parts.push(format!("story={story}"));
    }
    if let Some(reason) = field("reason") {
        parts.push(format!("reason={reason}"));
    }
    if let Some(path) = field("path") {
        parts.push(format!("path={path}"));
    }
    if let Some(category) = field("category") {
        parts.push(format!("category={category}"));
    }
    parts.join(" ")
}

/// Print recorded events for one profile, newest first.
///
/// # Errors
///
/// Returns an error if the account or profile is unknown, `kind` is not a
/// known event kind, or the query fails.
pub(crate) async fn run_events(
    pool: &sqlx::PgPool,
    account: &str,
    profile: &str,
    kind: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let kind = kind
        .map(|raw| {
            EventKind::parse(raw).ok_or_else(|| {
                let known: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
                anyhow::anyhow!("unknown event kind '{raw}'; expected one of {}", known.join(", "))
            })
        })
        .transpose()?;

    let account_row = reelwalk_db::get_account_by_username(pool, account)
        .await?
        .ok_or_else(|| anyhow::anyhow!("account '{account}' not found"))?;
    let profile_row = reelwalk_db::find_profile_by_username(pool, account_row.id, profile)
        .await?
        .ok_or_else(|| anyhow::anyhow!("profile '{profile}' not found for account '{account}'"))?;

    let events = reelwalk_db::list_profile_events(pool, profile_row.id, kind, limit).await?;
    if events.is_empty() {
        println!("no events recorded for {profile}");
        return Ok(());
    }

    println!("{:<21}{:<22}DETAIL", "OCCURRED", "KIND");
    for event in &events {
        println!(
            "{:<21}{:<22}{}",
            fmt_time(Some(event.occurred_at)),
            event.kind,
            event_detail(&event.metadata)
        );
    }
    Ok(())
}

/// Print the most recent traversal runs.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = reelwalk_db::list_traversal_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no traversal runs yet; run `traverse` first");
        return Ok(());
    }

    println!(
        "{:<8}{:<11}{:<26}{:<21}VISITED",
        "ID", "STATUS", "TERMINAL", "STARTED"
    );
    for run in &runs {
        let visited = run
            .stats
            .as_ref()
            .and_then(|s| s.get("stories_visited"))
            .and_then(serde_json::Value::as_u64)
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "{:<8}{:<11}{:<26}{:<21}{}",
            run.id,
            run.status,
            run.terminal_reason.as_deref().unwrap_or("-"),
            fmt_time(run.started_at),
            visited
        );
        if let Some(message) = &run.error_message {
            println!("        error: {message}");
        }
    }
    Ok(())
}
