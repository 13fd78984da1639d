//! Screening pipeline: scoring, ranking and position sizing.
//!
//! `CandidateRanker` turns the asset universe into a `RankedTable` using
//! `MomentumScorer` on each symbol's bar window; `AllocationPlanner` turns
//! that table plus available cash into whole-share quantities.

pub mod allocation;
pub mod ranker;
pub mod scorer;

pub use allocation::AllocationPlanner;
pub use ranker::CandidateRanker;
pub use scorer::{MomentumScorer, Rejection};
