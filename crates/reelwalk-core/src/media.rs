//! Resolved per-story media view.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// One entry of a multi-item (carousel) story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub url: String,
    pub media_type: MediaType,
}

/// What the private API says about one story item.
///
/// Built from a run-scoped cache and only ever referenced in event metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMediaDescriptor {
    /// Story id embedded in the resolved media (`pk`). Compared against the
    /// id the viewer was showing to catch mismatched lookups.
    pub story_id: String,
    pub url: String,
    pub media_type: MediaType,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub owner_id: String,
    pub owner_username: Option<String>,
    pub variants: Vec<MediaVariant>,
    /// Authoritative reply capability, when the API reports it.
    pub can_reply: Option<bool>,
    pub can_react: Option<bool>,
    pub is_ad: bool,
    pub is_paid_partnership: bool,
    /// Username of the account the content was reshared from, if any.
    pub reshare_source: Option<String>,
    /// Set when the story links to or credits an external profile.
    pub external_attribution: bool,
    pub taken_at: Option<i64>,
}

impl StoryMediaDescriptor {
    /// Compact JSON form for event metadata.
    #[must_use]
    pub fn to_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "story_id": self.story_id,
            "media_url": self.url,
            "media_type": self.media_type.as_str(),
            "width": self.width,
            "height": self.height,
            "owner_id": self.owner_id,
            "owner_username": self.owner_username,
            "variant_count": self.variants.len(),
        })
    }
}
