//! Client for the feed's private identity, story-media and direct-message API.
//!
//! The engine uses this crate for everything that does not need the browser:
//! resolving a username to its numeric id, looking up the media behind a story
//! together with its capability and attribution flags, creating a message
//! thread, submitting a story reply, and downloading media bytes.

pub mod client;
pub mod error;
pub mod normalize;
pub mod types;

mod retry;

pub use client::{ApiClientConfig, ApiSession, MediaBytes, ReplyReceipt, StoryApiClient};
pub use error::ApiError;
pub use normalize::normalize_story_item;
