//! HTTP client for the private API.
//!
//! Wraps `reqwest` with session-cookie headers, status classification into
//! [`ApiError`], and typed response deserialization. Read endpoints and thread
//! creation are retried on transient errors; reply submission is sent exactly
//! once because a retried send could post the same reply twice.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, Url};

use reelwalk_core::StoryMediaDescriptor;

use crate::error::ApiError;
use crate::normalize::normalize_story_item;
use crate::retry::{retry_with_backoff, Backoff};
use crate::types::{
    BroadcastResponse, CreateThreadResponse, MediaInfoResponse, WebProfileInfoResponse,
};

/// Authenticated session material copied from the browser account.
#[derive(Clone, Default)]
pub struct ApiSession {
    pub cookie_header: String,
    pub csrf_token: Option<String>,
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSession")
            .field("cookie_header", &"[redacted]")
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl ApiSession {
    /// Builds a session from a JSON array of `{name, value}` cookie objects.
    ///
    /// When `csrf_token` is `None`, the `csrftoken` cookie is used if present.
    #[must_use]
    pub fn from_cookie_json(cookies: &serde_json::Value, csrf_token: Option<&str>) -> Self {
        let pairs: Vec<(String, String)> = cookies
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| {
                        let name = c.get("name")?.as_str()?;
                        let value = c.get("value")?.as_str()?;
                        Some((name.to_owned(), value.to_owned()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let csrf_token = csrf_token.map(str::to_owned).or_else(|| {
            pairs
                .iter()
                .find(|(name, _)| name == "csrftoken")
                .map(|(_, value)| value.clone())
        });

        let cookie_header = pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            cookie_header,
            csrf_token,
        }
    }
}

/// Connection and retry settings for [`StoryApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub app_id: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

/// Raw bytes of a downloaded story media file.
#[derive(Debug, Clone)]
pub struct MediaBytes {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Acknowledgement of a submitted story reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyReceipt {
    pub item_id: Option<String>,
}

/// Client for the private API. One instance per traversal run.
pub struct StoryApiClient {
    client: Client,
    base_url: Url,
    app_id: String,
    session: ApiSession,
    backoff: Backoff,
}

impl StoryApiClient {
    /// Creates a client for one account session.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the underlying `reqwest::Client` cannot be
    /// constructed, or [`ApiError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(config: &ApiClientConfig, session: ApiSession) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .build()?;

        // Ensure exactly one trailing slash so `Url::join` appends rather than
        // replacing the last path segment.
        let normalised = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ApiError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            app_id: config.app_id.clone(),
            session,
            backoff: Backoff {
                max_retries: config.max_retries,
                base_ms: config.backoff_base_ms,
            },
        })
    }

    /// Resolves a username to its numeric account id.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] if the API knows no such user.
    /// - [`ApiError::SessionInvalid`] if the session was rejected.
    /// - [`ApiError::Http`] / [`ApiError::UnexpectedStatus`] on transport failure.
    pub async fn resolve_user_id(&self, username: &str) -> Result<String, ApiError> {
        let mut url = self.endpoint("api/v1/users/web_profile_info/")?;
        url.query_pairs_mut().append_pair("username", username);
        let context = format!("web_profile_info(username={username})");

        let body = retry_with_backoff(self.backoff, &context, || {
            self.get_json(url.clone(), &context)
        })
        .await?;

        let envelope: WebProfileInfoResponse =
            serde_json::from_value(body).map_err(|e| ApiError::Deserialize {
                context: context.clone(),
                source: e,
            })?;

        envelope
            .data
            .user
            .map(|u| u.id)
            .ok_or_else(|| ApiError::NotFound {
                what: format!("user {username}"),
            })
    }

    /// Looks up the media behind one story item, including capability and
    /// attribution flags.
    ///
    /// The returned descriptor's `story_id` is the id embedded in the API
    /// response; callers compare it against the id they asked for.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] if the story has expired or exposes no media.
    /// - [`ApiError::SessionInvalid`] if the session was rejected.
    /// - [`ApiError::Deserialize`] if the payload shape is unexpected.
    pub async fn fetch_story_media(
        &self,
        owner_id: &str,
        story_id: &str,
    ) -> Result<StoryMediaDescriptor, ApiError> {
        let url = self.endpoint(&format!("api/v1/media/{story_id}_{owner_id}/info/"))?;
        let context = format!("media_info(story_id={story_id})");

        let body = retry_with_backoff(self.backoff, &context, || {
            self.get_json(url.clone(), &context)
        })
        .await?;

        let info: MediaInfoResponse =
            serde_json::from_value(body).map_err(|e| ApiError::Deserialize {
                context: context.clone(),
                source: e,
            })?;

        let item = info.items.first().ok_or_else(|| ApiError::NotFound {
            what: format!("story {story_id}"),
        })?;

        normalize_story_item(item, None)
    }

    /// Creates (or re-opens) the one-to-one message thread with `recipient_id`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] if the response carries no thread id.
    /// - [`ApiError::ApiStatus`] if the API refuses the thread.
    pub async fn create_thread(&self, recipient_id: &str) -> Result<String, ApiError> {
        let url = self.endpoint("api/v1/direct_v2/create_group_thread/")?;
        let recipients = format!("[\"{recipient_id}\"]");
        let context = format!("create_group_thread(recipient={recipient_id})");

        let body = retry_with_backoff(self.backoff, &context, || {
            let form = vec![("recipient_users", recipients.clone())];
            self.post_form(url.clone(), form, &context)
        })
        .await?;

        let parsed: CreateThreadResponse =
            serde_json::from_value(body).map_err(|e| ApiError::Deserialize {
                context: context.clone(),
                source: e,
            })?;

        if parsed.status.as_deref().is_some_and(|s| s != "ok") {
            return Err(ApiError::ApiStatus(format!(
                "thread creation returned status {:?}",
                parsed.status
            )));
        }

        parsed.thread_id.ok_or_else(|| ApiError::NotFound {
            what: format!("thread for {recipient_id}"),
        })
    }

    /// Submits one reply to a story as a reel share in `thread_id`.
    ///
    /// The story is referenced by the composite `<story_id>_<owner_id>` id.
    /// Not retried.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ApiStatus`] if the response status is not `ok`, or
    /// any transport/status error from the request.
    pub async fn send_story_reply(
        &self,
        thread_id: &str,
        owner_id: &str,
        story_id: &str,
        text: &str,
    ) -> Result<ReplyReceipt, ApiError> {
        let url = self.endpoint("api/v1/direct_v2/threads/broadcast/reel_share/")?;
        let context = format!("reel_share(story_id={story_id})");
        let form = vec![
            ("action", "send_item".to_owned()),
            ("media_id", format!("{story_id}_{owner_id}")),
            ("reel_id", owner_id.to_owned()),
            ("thread_ids", format!("[\"{thread_id}\"]")),
            ("text", text.to_owned()),
            ("client_context", uuid::Uuid::new_v4().to_string()),
        ];

        let body = self.post_form(url, form, &context).await?;
        let parsed: BroadcastResponse =
            serde_json::from_value(body).map_err(|e| ApiError::Deserialize {
                context: context.clone(),
                source: e,
            })?;

        match parsed.status.as_deref() {
            Some("ok") => Ok(ReplyReceipt {
                item_id: parsed.payload.and_then(|p| p.item_id),
            }),
            other => Err(ApiError::ApiStatus(format!(
                "reel share returned status {other:?}"
            ))),
        }
    }

    /// Downloads media bytes from an absolute CDN URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MediaDownload`] on any failure, after retries.
    pub async fn download_media(&self, url: &str) -> Result<MediaBytes, ApiError> {
        let parsed = Url::parse(url).map_err(|e| ApiError::MediaDownload {
            url: url.to_owned(),
            status: None,
            reason: e.to_string(),
        })?;

        let result = retry_with_backoff(self.backoff, "download_media", || {
            let parsed = parsed.clone();
            async move {
                let response = self.client.get(parsed).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ApiError::MediaDownload {
                        url: url.to_owned(),
                        status: Some(status.as_u16()),
                        reason: format!("HTTP {status}"),
                    });
                }
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let bytes = response.bytes().await?.to_vec();
                Ok(MediaBytes {
                    bytes,
                    content_type,
                })
            }
        })
        .await;

        result.map_err(|err| match err {
            ApiError::MediaDownload { .. } => err,
            other => ApiError::MediaDownload {
                url: url.to_owned(),
                status: None,
                reason: other.to_string(),
            },
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header("X-IG-App-ID", &self.app_id)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(reqwest::header::ACCEPT, "application/json");
        if !self.session.cookie_header.is_empty() {
            request = request.header(reqwest::header::COOKIE, &self.session.cookie_header);
        }
        if let Some(token) = &self.session.csrf_token {
            request = request.header("X-CSRFToken", token);
        }
        request
    }

    async fn get_json(&self, url: Url, context: &str) -> Result<serde_json::Value, ApiError> {
        let response = self.request(Method::GET, url).send().await?;
        Self::read_json(response, context).await
    }

    async fn post_form(
        &self,
        url: Url,
        form: Vec<(&'static str, String)>,
        context: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self.request(Method::POST, url).form(&form).send().await?;
        Self::read_json(response, context).await
    }

    /// Classifies the HTTP status, parses the JSON body, and surfaces
    /// `"status": "fail"` envelopes as typed errors.
    async fn read_json(response: Response, context: &str) -> Result<serde_json::Value, ApiError> {
        let status = response.status();
        let final_url = response.url().clone();

        if final_url.path().starts_with("/accounts/login") {
            return Err(ApiError::SessionInvalid {
                status: status.as_u16(),
                message: "redirected to login".to_owned(),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ApiError::RateLimited { retry_after_secs });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::SessionInvalid {
                status: status.as_u16(),
                message: fail_message(&message).unwrap_or_else(|| "forbidden".to_owned()),
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                what: context.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                url: final_url.to_string(),
            });
        }

        let text = response.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize {
                context: context.to_owned(),
                source: e,
            })?;

        if body.get("status").and_then(serde_json::Value::as_str) == Some("fail") {
            let message = body
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_owned();
            if is_session_message(&message) {
                return Err(ApiError::SessionInvalid {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(ApiError::ApiStatus(message));
        }

        Ok(body)
    }
}

fn fail_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_owned)
}

fn is_session_message(message: &str) -> bool {
    ["login_required", "checkpoint_required", "challenge_required"]
        .iter()
        .any(|needle| message.contains(needle))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
