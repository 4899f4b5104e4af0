//! Story carousel traversal engine.
//!
//! [`run_traversal`] opens the story viewer, then loops: resolve the story on
//! screen, run the gating and delivery chain, advance. All collaborators are
//! reached through the traits in [`ports`] and [`dom::StoryDom`], so the loop
//! runs unchanged against a live browser or in-memory fakes.

pub mod adapters;
pub mod context;
pub mod controller;
pub mod delivery;
pub mod diagnostics;
pub mod dom;
pub mod engagement;
pub mod error;
pub mod gates;
pub mod navigator;
pub mod opener;
pub mod pipeline;
pub mod ports;
pub mod quality;

pub use adapters::PgStores;
pub use context::{
    RunCaches, RunOptions, StoryContext, VisitedRefSet, DEFAULT_ITERATIONS_PER_STORY,
};
pub use controller::{run_traversal, TraversalOutcome};
pub use diagnostics::Diagnostics;
pub use dom::{ScriptedDom, StoryDom, ViewerSnapshot};
pub use engagement::{AnalysisClient, CommentClient, Disabled};
pub use error::EngineError;
pub use opener::{open_carousel, OpenerPolicy};
pub use pipeline::{process_story, Collaborators, StoryOutcome};
pub use ports::{
    AnalysisLabel, Analyzer, CommentGenerator, CommentRequest, EventStore, InteractionStore,
    ProfileDirectory, ProfileRef, StoryApi,
};
