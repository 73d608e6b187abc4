//! Multi-frame consensus.
//!
//! A single decoded frame is not trusted: a code is only confirmed once
//! it has been read a configured number of times within the session.

mod tally;

pub use tally::{ConsensusTally, Verdict, DEFAULT_THRESHOLD};
