//! Traversal command handlers: session wiring and the run-record lifecycle.
//!
//! Each run is persisted as a `traversal_runs` row that moves
//! `queued -> running -> succeeded | failed`. Once the row exists, every exit
//! path marks it terminal; a failure to do so is logged and never masks the
//! original error.

use futures::stream::{self, StreamExt};
use reelwalk_api::{ApiClientConfig, ApiSession, StoryApiClient};
use reelwalk_browser::{BrowserCookie, BrowserSession, WebDriverConfig, WebDriverSession};
use reelwalk_core::{clamp_story_limit, AppConfig};
use reelwalk_db::AccountRow;
use reelwalk_engine::{
    run_traversal, AnalysisClient, Analyzer, Collaborators, CommentClient, CommentGenerator,
    Diagnostics, Disabled, OpenerPolicy, PgStores, RunOptions, ScriptedDom, TraversalOutcome,
    DEFAULT_ITERATIONS_PER_STORY,
};

const TRIGGER_SOURCE: &str = "cli";

/// Traverse one account's carousel and persist the run record.
///
/// # Errors
///
/// Returns an error if the account is unknown or inactive, the run record
/// cannot be created, or the browser session cannot be established. A run
/// that drains without visiting anything is recorded as failed but is not an
/// error here.
pub(crate) async fn run_account(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    username: &str,
    limit: Option<i64>,
    auto_reply_only: bool,
) -> anyhow::Result<TraversalOutcome> {
    let account = reelwalk_db::get_account_by_username(pool, username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("account '{username}' not found"))?;
    if !account.is_active {
        anyhow::bail!("account '{username}' is inactive");
    }
    let options = run_options(config, limit, auto_reply_only);
    traverse_account(pool, config, &account, &options).await
}

/// Traverse every active account with bounded concurrency.
///
/// # Errors
///
/// Returns an error if accounts cannot be listed or every run failed.
pub(crate) async fn run_all(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    limit: Option<i64>,
    auto_reply_only: bool,
) -> anyhow::Result<()> {
    let accounts = reelwalk_db::list_active_accounts(pool).await?;
    if accounts.is_empty() {
        println!("no active accounts");
        return Ok(());
    }
    let options = run_options(config, limit, auto_reply_only);
    let max_concurrent = config.max_concurrent_runs.max(1);

    let results: Vec<(&AccountRow, anyhow::Result<TraversalOutcome>)> = stream::iter(&accounts)
        .map(|account| {
            let options = &options;
            async move {
                (
                    account,
                    traverse_account(pool, config, account, options).await,
                )
            }
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut failed_runs = 0usize;
    for (account, result) in &results {
        match result {
            Ok(outcome) => {
                print_outcome(&account.username, outcome);
                if !outcome.succeeded {
                    failed_runs += 1;
                }
            }
            Err(e) => {
                tracing::error!(account = %account.username, error = %e, "traversal errored");
                println!("{:<24}error: {e:#}", account.username);
                failed_runs += 1;
            }
        }
    }

    if failed_runs == accounts.len() {
        anyhow::bail!("all {failed_runs} traversal runs failed");
    }
    if failed_runs > 0 {
        tracing::warn!(
            failed_runs,
            total_runs = accounts.len(),
            "some traversal runs failed"
        );
    }
    Ok(())
}

pub(crate) fn print_outcome(username: &str, outcome: &TraversalOutcome) {
    let stats = &outcome.stats;
    println!(
        "{:<24}{:<10}{:<26}visited={} commented={} reacted={} skipped={} failed={}",
        username,
        if outcome.succeeded { "ok" } else { "failed" },
        outcome.terminal.as_str(),
        stats.stories_visited,
        stats.commented,
        stats.reacted,
        stats.total_skipped(),
        stats.total_failed(),
    );
}

pub(crate) fn run_options(config: &AppConfig, limit: Option<i64>, auto_reply_only: bool) -> RunOptions {
    RunOptions {
        story_limit: limit.map_or(config.story_limit, clamp_story_limit),
        auto_reply_only,
        reply_retry_days: config.reply_retry_days,
        blocked_tags: config.blocked_tags.clone(),
        opener: OpenerPolicy::with_deadline_secs(config.open_deadline_secs),
        iterations_per_story: DEFAULT_ITERATIONS_PER_STORY,
    }
}

async fn traverse_account(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    account: &AccountRow,
    options: &RunOptions,
) -> anyhow::Result<TraversalOutcome> {
    let story_limit = i32::try_from(options.story_limit)?;
    let run =
        reelwalk_db::create_traversal_run(pool, account.id, TRIGGER_SOURCE, story_limit).await?;
    if let Err(e) = reelwalk_db::start_traversal_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, None, format!("{e:#}")).await;
        return Err(e.into());
    }
    tracing::info!(
        account = %account.username,
        run_id = run.id,
        public_id = %run.public_id,
        story_limit,
        "traversal started"
    );

    let run_label = format!("{}-{}", account.username, run.public_id);
    let outcome = match drive(pool, config, account, options, &run_label).await {
        Ok(outcome) => outcome,
        Err(e) => {
            fail_run_best_effort(pool, run.id, None, format!("{e:#}")).await;
            return Err(e);
        }
    };

    let stats = outcome.stats.to_json();
    let terminal = outcome.terminal.as_str();
    match outcome.failure_message() {
        None => {
            if let Err(e) =
                reelwalk_db::complete_traversal_run(pool, run.id, terminal, &stats).await
            {
                fail_run_best_effort(pool, run.id, Some(&outcome), format!("{e:#}")).await;
                return Err(e.into());
            }
        }
        Some(message) => fail_run_best_effort(pool, run.id, Some(&outcome), message).await,
    }
    Ok(outcome)
}

/// Opens the browser session, runs the traversal and always closes the
/// session afterwards.
async fn drive(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    account: &AccountRow,
    options: &RunOptions,
    run_label: &str,
) -> anyhow::Result<TraversalOutcome> {
    let api_config = ApiClientConfig {
        base_url: config.api_base_url.clone(),
        app_id: config.api_app_id.clone(),
        user_agent: config.user_agent.clone(),
        timeout_secs: config.api_timeout_secs,
        max_retries: config.api_max_retries,
        backoff_base_ms: config.api_backoff_base_ms,
    };
    let session =
        ApiSession::from_cookie_json(&account.session_cookies, account.csrf_token.as_deref());
    let api = StoryApiClient::new(&api_config, session)?;

    let analyzer: Box<dyn Analyzer> = match &config.analysis_url {
        Some(url) => Box::new(AnalysisClient::new(
            url,
            config.api_timeout_secs,
            &config.user_agent,
        )?),
        None => Box::new(Disabled),
    };
    let comments: Box<dyn CommentGenerator> = match &config.comment_url {
        Some(url) => Box::new(CommentClient::new(
            url,
            config.api_timeout_secs,
            &config.user_agent,
        )?),
        None => Box::new(Disabled),
    };
    let stores = PgStores::new(pool.clone(), account.id);
    let diagnostics = Diagnostics::new(config.diagnostics_dir.clone(), run_label);

    let browser = WebDriverSession::connect(&WebDriverConfig::new(
        &config.webdriver_url,
        &config.user_agent,
    ))
    .await?;
    if let Err(e) = seed_cookies(&browser, &config.feed_origin, &account.session_cookies).await {
        close_best_effort(&browser).await;
        return Err(e);
    }

    let dom = ScriptedDom::new(browser, &config.feed_origin).with_reply_confirm(
        options.opener.settle_delay.saturating_mul(2),
        options.opener.poll_interval / 3,
    );
    let collaborators = Collaborators {
        dom: &dom,
        api: &api,
        analyzer: analyzer.as_ref(),
        comments: comments.as_ref(),
        events: &stores,
        interactions: &stores,
        profiles: &stores,
        diagnostics: &diagnostics,
    };
    let outcome = run_traversal(collaborators, options).await;
    close_best_effort(dom.browser()).await;
    Ok(outcome)
}

/// Cookies can only be set for the origin currently loaded.
async fn seed_cookies(
    browser: &WebDriverSession,
    feed_origin: &str,
    cookies: &serde_json::Value,
) -> anyhow::Result<()> {
    let fallback_domain = cookie_domain(feed_origin)?;
    browser.navigate(&format!("{}/", feed_origin.trim_end_matches('/'))).await?;
    let cookies = browser_cookies(cookies, &fallback_domain);
    if cookies.is_empty() {
        tracing::warn!("account has no stored session cookies");
    }
    for cookie in &cookies {
        browser.add_cookie(cookie).await?;
    }
    browser.refresh().await?;
    Ok(())
}

async fn close_best_effort(browser: &WebDriverSession) {
    if let Err(e) = browser.close().await {
        tracing::warn!(session_id = browser.session_id(), error = %e, "failed to close browser session");
    }
}

/// Registrable cookie domain for the feed origin, e.g. `.feed.example`.
pub(crate) fn cookie_domain(feed_origin: &str) -> anyhow::Result<String> {
    let url = reqwest::Url::parse(feed_origin)?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("feed origin '{feed_origin}' has no host"))?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    Ok(format!(".{host}"))
}

/// Stored `{name, value, domain}` cookie objects; entries without a name or
/// value are dropped.
pub(crate) fn browser_cookies(cookies: &serde_json::Value, fallback_domain: &str) -> Vec<BrowserCookie> {
    cookies
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|c| {
                    Some(BrowserCookie {
                        name: c.get("name")?.as_str()?.to_owned(),
                        value: c.get("value")?.as_str()?.to_owned(),
                        domain: c
                            .get("domain")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or(fallback_domain)
                            .to_owned(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Mark a run failed; a failure to do so is logged, not returned.
async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    outcome: Option<&TraversalOutcome>,
    message: String,
) {
    let terminal = outcome.map(|o| o.terminal.as_str());
    let stats = outcome.map(|o| o.stats.to_json());
    if let Err(mark_err) =
        reelwalk_db::fail_traversal_run(pool, run_id, terminal, stats.as_ref(), &message).await
    {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark traversal run as failed"
        );
    }
}
