//! Single-URL event stream: fetch + distill composed into an ordered
//! sequence of tagged events.

pub mod challenge;
pub mod events;
pub mod pipeline;

pub use challenge::{ChallengeMatch, detect_challenge};
pub use events::{AlertKind, ConfidenceHeuristics, StreamEvent};
pub use pipeline::StreamPipeline;
