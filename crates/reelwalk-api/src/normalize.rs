//! Conversion from raw story items into [`StoryMediaDescriptor`].

use reelwalk_core::media::MediaVariant;
use reelwalk_core::{MediaType, StoryMediaDescriptor};

use crate::error::ApiError;
use crate::types::{MediaCandidate, ReelUser, StoryItem};

const MEDIA_TYPE_VIDEO: i32 = 2;
const MEDIA_TYPE_CAROUSEL: i32 = 8;

/// Normalizes one story item. `reel_owner` is used when the item itself does
/// not carry its owner.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] when the item exposes no playable or
/// displayable media URL.
pub fn normalize_story_item(
    item: &StoryItem,
    reel_owner: Option<&ReelUser>,
) -> Result<StoryMediaDescriptor, ApiError> {
    let owner = item.user.as_ref().or(reel_owner);

    let variants: Vec<MediaVariant> = item
        .carousel_media
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|child| {
            best_candidate(child).map(|c| MediaVariant {
                url: c.url.clone(),
                media_type: media_type_of(child),
            })
        })
        .collect();

    let displayed = if item.media_type == MEDIA_TYPE_CAROUSEL {
        item.carousel_media
            .as_deref()
            .and_then(<[StoryItem]>::first)
            .and_then(|first| best_candidate(first).map(|c| (c.clone(), media_type_of(first))))
    } else {
        best_candidate(item).map(|c| (c.clone(), media_type_of(item)))
    };
    let (primary, media_type) = displayed.ok_or_else(|| ApiError::NotFound {
        what: format!("media URL for story {}", item.pk),
    })?;

    let owner_id = owner.map(|o| o.pk.clone()).unwrap_or_default();
    let reshare_source = item
        .reshared_story_media_author
        .as_ref()
        .filter(|author| author.pk != owner_id)
        .map(|author| author.username.clone().unwrap_or_else(|| author.pk.clone()));

    let external_attribution = reshare_source.is_some()
        || item
            .story_feed_media
            .as_ref()
            .is_some_and(|media| !media.is_empty())
        || item
            .story_app_attribution
            .as_ref()
            .is_some_and(|v| !v.is_null());

    Ok(StoryMediaDescriptor {
        story_id: item.pk.clone(),
        url: primary.url,
        media_type,
        width: primary.width.or(item.original_width),
        height: primary.height.or(item.original_height),
        owner_id,
        owner_username: owner.and_then(|o| o.username.clone()),
        variants,
        can_reply: item.can_reply,
        can_react: item.can_send_custom_emojis,
        is_ad: item.ad_id.is_some(),
        is_paid_partnership: item.is_paid_partnership.unwrap_or(false),
        reshare_source,
        external_attribution,
        taken_at: item.taken_at,
    })
}

fn media_type_of(item: &StoryItem) -> MediaType {
    if item.media_type == MEDIA_TYPE_VIDEO {
        MediaType::Video
    } else {
        MediaType::Image
    }
}

/// The widest rendition: video for videos, image otherwise.
fn best_candidate(item: &StoryItem) -> Option<&MediaCandidate> {
    let candidates: &[MediaCandidate] = if item.media_type == MEDIA_TYPE_VIDEO {
        item.video_versions.as_deref().unwrap_or_default()
    } else {
        item.image_versions2
            .as_ref()
            .map(|v| v.candidates.as_slice())
            .unwrap_or_default()
    };
    candidates.iter().max_by_key(|c| c.width.unwrap_or(0))
}
