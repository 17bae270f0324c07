//! Shared type definitions for the Tally usage telemetry client.
//!
//! Host libraries depend on this crate to build event payloads without
//! pulling in the dispatch machinery.
//!
//! # Modules
//!
//! - [`ids`] -- The anonymous per-installation [`UserId`]
//! - [`events`] -- Event payloads and their flat, ordered mapping

pub mod events;
pub mod ids;

pub use events::{
    BaseEvent, EVALUATION_EVENT, EvaluationEvent, EventError, EventMapping,
    TESTSET_GENERATION_EVENT, TestsetGenerationEvent, UsageEvent,
};
pub use ids::{USER_ID_PREFIX, UserId};
