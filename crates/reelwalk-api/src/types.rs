//! Private API response types.
//!
//! Only the fields the engine reads are modelled; everything else in the
//! payloads is ignored. Numeric identifiers arrive as either JSON numbers or
//! strings depending on the endpoint, so they are normalised to `String`.

use serde::{Deserialize, Deserializer};

/// Accepts a JSON string or number and yields its string form.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "id_string")] String);

    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
}

// ---------------------------------------------------------------------------
// users/web_profile_info
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WebProfileInfoResponse {
    pub data: WebProfileData,
}

#[derive(Debug, Deserialize)]
pub struct WebProfileData {
    pub user: Option<WebProfileUser>,
}

#[derive(Debug, Deserialize)]
pub struct WebProfileUser {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub username: String,
}

// ---------------------------------------------------------------------------
// media/{id}/info
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MediaInfoResponse {
    #[serde(default)]
    pub items: Vec<StoryItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReelUser {
    #[serde(deserialize_with = "id_string")]
    pub pk: String,
    pub username: Option<String>,
}

/// One story item as returned by `media/{id}/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoryItem {
    #[serde(deserialize_with = "id_string")]
    pub pk: String,
    /// Composite `<pk>_<owner_id>` identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// 1 = image, 2 = video, 8 = carousel.
    pub media_type: i32,
    #[serde(default)]
    pub taken_at: Option<i64>,
    #[serde(default)]
    pub original_width: Option<u32>,
    #[serde(default)]
    pub original_height: Option<u32>,
    #[serde(default)]
    pub image_versions2: Option<ImageVersions>,
    #[serde(default)]
    pub video_versions: Option<Vec<MediaCandidate>>,
    #[serde(default)]
    pub carousel_media: Option<Vec<StoryItem>>,
    #[serde(default)]
    pub user: Option<ReelUser>,
    #[serde(default)]
    pub can_reply: Option<bool>,
    #[serde(default)]
    pub can_send_custom_emojis: Option<bool>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub is_paid_partnership: Option<bool>,
    /// Feed posts reshared into the story.
    #[serde(default)]
    pub story_feed_media: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub reshared_story_media_author: Option<ReelUser>,
    /// Third-party app credit ("Shared from ...").
    #[serde(default)]
    pub story_app_attribution: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageVersions {
    #[serde(default)]
    pub candidates: Vec<MediaCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaCandidate {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

// ---------------------------------------------------------------------------
// direct_v2
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateThreadResponse {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub thread_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastResponse {
    pub status: Option<String>,
    #[serde(default)]
    pub payload: Option<BroadcastPayload>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastPayload {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub item_id: Option<String>,
}
